//! Entity trait: identity + continuity across state changes.

use std::collections::HashSet;

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Identifiers that occur more than once, in order of their second occurrence.
///
/// Each repeated occurrence is reported, so an id seen three times yields two
/// entries.
pub fn duplicate_ids<E: Entity>(entities: &[E]) -> Vec<E::Id> {
    let mut seen = HashSet::with_capacity(entities.len());
    entities
        .iter()
        .filter(|e| !seen.insert(e.id().clone()))
        .map(|e| e.id().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(u32);

    impl Entity for Row {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.0
        }
    }

    #[test]
    fn reports_each_repeated_occurrence() {
        let rows = vec![Row(1), Row(2), Row(1), Row(3), Row(1)];
        assert_eq!(duplicate_ids(&rows), vec![1, 1]);
    }

    #[test]
    fn unique_ids_yield_nothing() {
        let rows = vec![Row(1), Row(2)];
        assert!(duplicate_ids(&rows).is_empty());
    }
}
