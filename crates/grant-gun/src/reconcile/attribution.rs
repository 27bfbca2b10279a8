//! Deciding which transactions are disbursements sent by the HQ organization.

use super::ReconcileConfig;
use crate::transaction::{Identifier, RawTransaction};

/// The headquarters organization, known by its numeric event id and its slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HqIdentity {
    pub event_id: Identifier,
    pub slug: String,
}

impl Default for HqIdentity {
    fn default() -> Self {
        HqIdentity {
            event_id: Identifier::new("183"),
            slug: "hq".to_owned(),
        }
    }
}

impl HqIdentity {
    fn is(&self, id: &str) -> bool {
        id == self.event_id.as_str() || id == self.slug
    }
}

/// A piece of evidence about where a transaction's funds came from.
///
/// Older API revisions only carried the flat ids, newer ones the nested transfer source, and
/// legacy records sometimes nothing but a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution<'a> {
    ByOrgId(&'a Identifier),
    BySourceId(&'a Identifier),
    BySlug(&'a str),
    ByMemoText(&'a str),
    None,
}

/// All attribution evidence of a transaction, strongest first.
pub fn attributions(transaction: &RawTransaction) -> Vec<Attribution<'_>> {
    let mut evidence = Vec::new();
    evidence.extend(transaction.from_event_id.iter().map(Attribution::ByOrgId));
    evidence.extend(transaction.from_organization_id.iter().map(Attribution::ByOrgId));
    if let Some(source) = transaction.transfer_source() {
        evidence.extend(source.id.iter().map(Attribution::BySourceId));
        evidence.extend(source.slug.as_deref().map(Attribution::BySlug));
    }
    evidence.extend(transaction.memo.as_deref().map(Attribution::ByMemoText));

    if evidence.is_empty() {
        evidence.push(Attribution::None);
    }
    evidence
}

fn attributed_to_hq(config: &ReconcileConfig, attribution: Attribution<'_>) -> bool {
    match attribution {
        Attribution::ByOrgId(id) => id == &config.hq.event_id,
        Attribution::BySourceId(id) => config.hq.is(id.as_str()),
        Attribution::BySlug(slug) => config.hq.is(slug),
        Attribution::ByMemoText(memo) => {
            !config.memo_marker.is_empty() && memo.contains(&config.memo_marker)
        }
        Attribution::None => false,
    }
}

/// The opt-out label excludes a transaction no matter how it is attributed.
pub fn is_excluded(config: &ReconcileConfig, transaction: &RawTransaction) -> bool {
    transaction.has_label(&config.opt_out_label)
}

pub fn is_hq_disbursement(config: &ReconcileConfig, transaction: &RawTransaction) -> bool {
    if is_excluded(config, transaction) {
        return false;
    }
    attributions(transaction)
        .into_iter()
        .any(|attribution| attributed_to_hq(config, attribution))
}

pub fn filter_hq_disbursements(
    config: &ReconcileConfig,
    transactions: impl IntoIterator<Item = RawTransaction>,
) -> Vec<RawTransaction> {
    transactions
        .into_iter()
        .filter(|transaction| is_hq_disbursement(config, transaction))
        .collect()
}
