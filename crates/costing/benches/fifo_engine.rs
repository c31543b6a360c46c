use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{Days, NaiveDate};
use cogs_costing::{Validator, calculate_summary, process_transactions};
use cogs_inventory::{InventorySnapshot, PurchaseLot, Sale};
use rust_decimal::Decimal;

const SKUS: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// `lot_count` lots spread across the SKUs, received one day apart.
fn lots(lot_count: usize) -> Vec<PurchaseLot> {
    (0..lot_count)
        .map(|i| {
            PurchaseLot::new(
                format!("L{i:06}"),
                SKUS[i % SKUS.len()],
                base_date() + Days::new(i as u64 / SKUS.len() as u64),
                Decimal::from(100),
                Decimal::from(10 + (i % 7) as i64),
                Decimal::new(125, 2),
            )
        })
        .collect()
}

/// Sales that consume roughly half the stock, with one return in ten.
fn sales(sale_count: usize, lot_count: usize) -> Vec<Sale> {
    let horizon = (lot_count / SKUS.len()).max(1) as u64 + 30;
    (0..sale_count)
        .map(|i| {
            let qty = if i % 10 == 9 { -2 } else { 5 + (i % 20) as i64 };
            Sale::new(
                format!("S{i:06}"),
                SKUS[i % SKUS.len()],
                base_date() + Days::new(i as u64 % horizon),
                Decimal::from(qty),
            )
        })
        .collect()
}

fn bench_process_transactions(c: &mut Criterion) {
    let mut group = c.benchmark_group("fifo_process_transactions");

    for &(lot_count, sale_count) in &[(100usize, 500usize), (1_000, 5_000), (5_000, 20_000)] {
        let snapshot = InventorySnapshot::new(lots(lot_count));
        let batch = sales(sale_count, lot_count);

        group.throughput(Throughput::Elements(sale_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{lot_count}_lots_{sale_count}_sales")),
            &(snapshot, batch),
            |b, (snapshot, batch)| {
                b.iter(|| process_transactions(black_box(snapshot), black_box(batch)));
            },
        );
    }

    group.finish();
}

fn bench_summary_and_validation(c: &mut Criterion) {
    let lot_batch = lots(1_000);
    let sale_batch = sales(5_000, 1_000);
    let outcome = process_transactions(&InventorySnapshot::new(lot_batch.clone()), &sale_batch);
    let validator = Validator::new(base_date() + Days::new(365));

    c.bench_function("calculate_summary_5000", |b| {
        b.iter(|| calculate_summary(black_box(&outcome.attributions)));
    });

    c.bench_function("validate_all_1000_lots_5000_sales", |b| {
        b.iter(|| validator.validate_all(black_box(&lot_batch), black_box(&sale_batch)));
    });
}

criterion_group!(benches, bench_process_transactions, bench_summary_and_validation);
criterion_main!(benches);
