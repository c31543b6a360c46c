use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use cogs_core::{DomainError, DomainResult, RunId, TenantId};
use cogs_costing::CogsAttribution;

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Expense,
}

/// Account identifier + metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "5000"
    pub name: String, // e.g. "Cost of Goods Sold"
    pub kind: AccountKind,
}

impl Account {
    pub fn new(code: impl Into<String>, name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
        }
    }
}

/// Accounts a COGS entry posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalAccounts {
    /// Debited with the cost of units sold.
    pub cogs: Account,
    /// Credited as units leave stock.
    pub inventory: Account,
}

impl Default for JournalAccounts {
    fn default() -> Self {
        Self {
            cogs: Account::new("5000", "Cost of Goods Sold", AccountKind::Expense),
            inventory: Account::new("1200", "Inventory", AccountKind::Asset),
        }
    }
}

/// One side of a journal entry (immutable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    pub account: Account,
    /// Positive amount, rounded to cents.
    pub amount: Decimal,
    /// true = debit, false = credit.
    pub is_debit: bool,
    pub memo: String,
}

/// Output format for a rendered journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalFormat {
    Csv,
    Json,
    Text,
}

impl FromStr for JournalFormat {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "text" | "txt" => Ok(Self::Text),
            other => Err(DomainError::validation(format!(
                "unsupported journal format '{other}' (expected: csv, json, text)"
            ))),
        }
    }
}

/// Double-entry journal entry recognising the cost of goods sold by a run.
///
/// One debit (COGS) / credit (Inventory) pair per SKU. A run with nothing
/// to recognise yields an entry with no lines, which is trivially balanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub run_id: RunId,
    pub tenant_id: TenantId,
    /// Date of the latest sale covered by the entry, else the run's date.
    pub entry_date: NaiveDate,
    pub description: String,
    pub lines: Vec<JournalEntryLine>,
}

impl JournalEntry {
    pub fn for_run(
        run_id: RunId,
        tenant_id: TenantId,
        attributions: &[CogsAttribution],
        accounts: &JournalAccounts,
        run_date: NaiveDate,
    ) -> DomainResult<Self> {
        let entry_date = attributions.iter().map(|a| a.sale_date).max().unwrap_or(run_date);

        let mut per_sku: BTreeMap<&str, Decimal> = BTreeMap::new();
        for attribution in attributions {
            *per_sku.entry(attribution.sku.as_str()).or_insert(Decimal::ZERO) += attribution.total_cogs();
        }

        let mut lines = Vec::with_capacity(per_sku.len() * 2);
        for (sku, cogs) in per_sku {
            let amount = cogs.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            if amount.is_zero() {
                continue;
            }
            let memo = format!("COGS {sku}");
            lines.push(JournalEntryLine {
                account: accounts.cogs.clone(),
                amount,
                is_debit: true,
                memo: memo.clone(),
            });
            lines.push(JournalEntryLine {
                account: accounts.inventory.clone(),
                amount,
                is_debit: false,
                memo,
            });
        }

        let entry = Self {
            run_id,
            tenant_id,
            entry_date,
            description: format!("FIFO cost of goods sold, run {run_id}"),
            lines,
        };
        entry.ensure_balanced()?;
        Ok(entry)
    }

    pub fn total_debits(&self) -> Decimal {
        self.lines.iter().filter(|l| l.is_debit).map(|l| l.amount).sum()
    }

    pub fn total_credits(&self) -> Decimal {
        self.lines.iter().filter(|l| !l.is_debit).map(|l| l.amount).sum()
    }

    fn ensure_balanced(&self) -> DomainResult<()> {
        if self.lines.iter().any(|l| l.amount <= Decimal::ZERO) {
            return Err(DomainError::validation("amount must be positive"));
        }
        if self.total_debits() != self.total_credits() {
            return Err(DomainError::invariant("debits must equal credits"));
        }
        Ok(())
    }

    pub fn render(&self, format: JournalFormat) -> DomainResult<String> {
        match format {
            JournalFormat::Csv => Ok(self.render_csv()),
            JournalFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| DomainError::invariant(format!("journal entry serialization failed: {e}"))),
            JournalFormat::Text => Ok(self.render_text()),
        }
    }

    fn render_csv(&self) -> String {
        let mut out = String::from("date,account_code,account_name,debit,credit,memo\n");
        for line in &self.lines {
            let (debit, credit) = if line.is_debit {
                (line.amount.to_string(), String::new())
            } else {
                (String::new(), line.amount.to_string())
            };
            let _ = writeln!(
                out,
                "{},{},{},{},{},{}",
                self.entry_date,
                line.account.code,
                csv_field(&line.account.name),
                debit,
                credit,
                csv_field(&line.memo)
            );
        }
        out
    }

    fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}  {}", self.entry_date, self.description);
        for line in &self.lines {
            let (debit, credit) = if line.is_debit {
                (format!("{:.2}", line.amount), String::new())
            } else {
                (String::new(), format!("{:.2}", line.amount))
            };
            let indent = if line.is_debit { "" } else { "    " };
            let _ = writeln!(
                out,
                "    {indent}{:<6} {:<24} {:>14} {:>14}  ; {}",
                line.account.code, line.account.name, debit, credit, line.memo
            );
        }
        let _ = writeln!(
            out,
            "    {:<31} {:>14} {:>14}",
            "Totals",
            format!("{:.2}", self.total_debits()),
            format!("{:.2}", self.total_credits())
        );
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
