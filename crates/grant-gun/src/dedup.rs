use crate::transaction::{Identifier, RawTransaction};
use std::collections::HashMap;

/// Collapse transactions sharing an id, keeping the last occurrence of each.
///
/// Overlapping offset pages can return the same transaction twice when data is appended
/// between requests. The result keeps the order in which ids were first seen.
pub fn dedupe(transactions: impl IntoIterator<Item = RawTransaction>) -> Vec<RawTransaction> {
    let mut positions: HashMap<Identifier, usize> = HashMap::new();
    let mut unique: Vec<RawTransaction> = Vec::new();

    for transaction in transactions {
        match positions.get(&transaction.id) {
            Some(&at) => unique[at] = transaction,
            None => {
                positions.insert(transaction.id.clone(), unique.len());
                unique.push(transaction);
            }
        }
    }

    unique
}
