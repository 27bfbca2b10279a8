//! Reconciling budget targets against what HQ has already disbursed.

mod attribution;

pub use attribution::{
    Attribution, HqIdentity, attributions, filter_hq_disbursements, is_excluded,
    is_hq_disbursement,
};

use crate::dedup::dedupe;
use crate::error::FetchError;
use crate::org::OrgIdentity;
use crate::pager::{DEFAULT_BATCH_SIZE, TransactionSource, fetch_all_transactions};
use crate::transaction::RawTransaction;
use crate::transfer::{TransferDecision, WeightedGrantUnit, compute_transfer};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub hq: HqIdentity,
    /// Memo substring that marks legacy HQ disbursements without structured attribution.
    pub memo_marker: String,
    pub opt_out_label: String,
    pub transaction_type: Option<String>,
    pub batch_size: usize,
    pub budget_slug_prefix: String,
    pub weighted_grant: WeightedGrantUnit,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            hq: HqIdentity::default(),
            memo_marker: "HQ".to_owned(),
            opt_out_label: "no-grant-calc".to_owned(),
            transaction_type: Some("disbursement".to_owned()),
            batch_size: DEFAULT_BATCH_SIZE,
            budget_slug_prefix: "ysws-budget-".to_owned(),
            weighted_grant: WeightedGrantUnit::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisbursementSummary {
    pub total_amount_cents: u64,
    pub disbursement_count: usize,
    pub disbursements: Vec<RawTransaction>,
}

/// Sum classified disbursements in integer cents.
pub fn aggregate(disbursements: Vec<RawTransaction>) -> DisbursementSummary {
    let total_amount_cents = disbursements
        .iter()
        .map(RawTransaction::amount_in_cents)
        .fold(0u64, u64::saturating_add);

    DisbursementSummary {
        total_amount_cents,
        disbursement_count: disbursements.len(),
        disbursements,
    }
}

/// Everything HQ has disbursed to `org_id`, counted once per transaction id.
pub async fn disbursements_from_hq(
    source: &impl TransactionSource,
    config: &ReconcileConfig,
    org_id: &str,
) -> Result<DisbursementSummary, FetchError> {
    let transactions = fetch_all_transactions(
        source,
        org_id,
        config.transaction_type.as_deref(),
        config.batch_size,
    )
    .await?;

    let unique = dedupe(transactions);
    let from_hq = filter_hq_disbursements(config, unique);
    Ok(aggregate(from_hq))
}

/// A budget row from the record source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetRecord {
    pub id: String,
    pub name: String,
    pub target_amount_cents: u64,
    pub budget_url: Option<String>,
}

/// Where budget records come from.
///
/// Implementations follow the backing store's pagination until it is exhausted, so callers
/// always see the complete listing.
pub trait BudgetRecordSource {
    /// List the records matching `filter`, an expression in the store's own query language.
    fn list_eligible_records(
        &self,
        filter: Option<&str>,
    ) -> impl Future<Output = anyhow::Result<Vec<BudgetRecord>>>;
}

/// A budget record together with its reconciliation result.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: BudgetRecord,
    pub org: Option<OrgIdentity>,
    pub summary: DisbursementSummary,
    pub decision: TransferDecision,
    /// Why the disbursement lookup failed. The candidate then carries zero disbursements.
    pub error: Option<String>,
}

impl Candidate {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn event_id(&self) -> Option<&str> {
        self.org
            .as_ref()
            .map(|org| org.event_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Approving this candidate would open a payment link.
    pub fn needs_transfer(&self) -> bool {
        self.decision.transfer_amount_cents > 0 && self.event_id().is_some()
    }
}

/// Look up what HQ has sent to the record's organization and compute the outstanding transfer.
///
/// Failures are captured on the returned candidate instead of being propagated.
pub async fn reconcile_candidate(
    source: &impl TransactionSource,
    config: &ReconcileConfig,
    record: BudgetRecord,
) -> Candidate {
    let mut error = None;
    let org = match record.budget_url.as_deref() {
        Some(url) => {
            let org = OrgIdentity::from_budget_url(url, &config.budget_slug_prefix);
            if org.is_none() {
                error = Some(format!("cannot derive an organization from `{url}`"));
            }
            org
        }
        None => None,
    };

    let mut summary = DisbursementSummary::default();
    if let Some(org) = &org {
        match disbursements_from_hq(source, config, &org.event_id).await {
            Ok(found) => summary = found,
            Err(fetch_error) => {
                warn!("Failed to get disbursements for {}: {fetch_error}", record.name);
                error = Some(fetch_error.to_string());
            }
        }
    }

    let decision = compute_transfer(record.target_amount_cents, summary.total_amount_cents);
    Candidate {
        record,
        org,
        summary,
        decision,
        error,
    }
}

/// Reconcile records one after another, in order.
pub async fn reconcile_all(
    source: &impl TransactionSource,
    config: &ReconcileConfig,
    records: Vec<BudgetRecord>,
) -> Vec<Candidate> {
    let mut candidates = Vec::with_capacity(records.len());
    for record in records {
        candidates.push(reconcile_candidate(source, config, record).await);
    }
    info!("Reconciled {} candidates", candidates.len());
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::{Page, PageRequest};
    use serde_json::{Value, json};
    use std::collections::HashMap;

    /// Answers every org with a fixed single-page body; unknown orgs fail with 404.
    struct FixedSource(HashMap<&'static str, Value>);

    impl TransactionSource for FixedSource {
        async fn fetch_page(
            &self,
            org_id: &str,
            _request: &PageRequest,
        ) -> Result<Page, FetchError> {
            let body = self.0.get(org_id).ok_or_else(|| FetchError::Transport {
                org_id: org_id.to_owned(),
                status: 404,
            })?;
            Ok(Page::from_json(org_id, body.clone()))
        }
    }

    fn transactions(value: Value) -> Vec<RawTransaction> {
        serde_json::from_value(value).unwrap()
    }

    fn pipeline(transactions: Vec<RawTransaction>) -> DisbursementSummary {
        aggregate(dedupe(filter_hq_disbursements(
            &ReconcileConfig::default(),
            transactions,
        )))
    }

    fn record(name: &str, target: u64, url: Option<&str>) -> BudgetRecord {
        BudgetRecord {
            id: format!("rec{name}"),
            name: name.to_owned(),
            target_amount_cents: target,
            budget_url: url.map(ToOwned::to_owned),
        }
    }

    fn format_candidate(candidate: &Candidate) -> String {
        format!(
            "{}: org={} target={} disbursed={} ({}) transfer={} over={} error={}",
            candidate.name(),
            candidate.event_id().unwrap_or("-"),
            candidate.decision.target_amount_cents,
            candidate.decision.already_disbursed_cents,
            candidate.summary.disbursement_count,
            candidate.decision.transfer_amount_cents,
            candidate.decision.over_disbursed_cents,
            candidate.error.as_deref().unwrap_or("-"),
        )
    }

    #[test]
    fn duplicated_page_excluded_label() {
        let raw = transactions(json!([
            {"id": "A", "amount_cents": -5000, "transfer": {"from": {"slug": "hq"}}},
            {"id": "A", "amount_cents": -5000, "transfer": {"from": {"slug": "hq"}}},
            {"id": "B", "amount_cents": -700, "from_event_id": 183,
             "labels": [{"name": "no-grant-calc"}]},
        ]));

        let unique = dedupe(raw);
        assert_eq!(unique.len(), 2);
        let from_hq = filter_hq_disbursements(&ReconcileConfig::default(), unique);
        assert_eq!(from_hq.len(), 1);
        assert_eq!(from_hq[0].id.as_str(), "A");

        let summary = aggregate(from_hq);
        assert_eq!(summary.disbursement_count, 1);
        assert_eq!(summary.total_amount_cents, 5000);
    }

    #[test]
    fn order_independent() {
        let raw = transactions(json!([
            {"id": 1, "amount_cents": 1000, "from_event_id": 183},
            {"id": 2, "amount": 12.345, "memo": "From HQ"},
            {"id": 1, "amount_cents": 1000, "from_event_id": 183},
            {"id": 3, "amount_cents": 999, "from_event_id": 42},
            {"id": 4, "amount_cents": -250, "transfer": {"from": {"id": 183}}},
        ]));
        let expected = pipeline(raw.clone());
        assert_eq!(expected.total_amount_cents, 1000 + 1235 + 250);
        assert_eq!(expected.disbursement_count, 3);

        let mut reversed = raw.clone();
        reversed.reverse();
        let mut rotated = raw.clone();
        rotated.rotate_left(2);
        for permutation in [reversed, rotated] {
            let summary = pipeline(permutation);
            assert_eq!(summary.total_amount_cents, expected.total_amount_cents);
            assert_eq!(summary.disbursement_count, expected.disbursement_count);
        }
    }

    #[test]
    fn aggregate_empty() {
        assert_eq!(aggregate(Vec::new()), DisbursementSummary::default());
    }

    #[tokio::test]
    async fn reconcile_candidates() {
        let source = FixedSource(HashMap::from([
            (
                "ysws-budget-partial",
                json!({"data": [
                    {"id": "t1", "amount_cents": -10000, "from_event_id": 183},
                    {"id": "t2", "amount_cents": -2500, "memo": "Refund"},
                ]}),
            ),
            (
                "ysws-budget-over",
                json!([{"id": "t3", "amount": -150.0, "transfer": {"from": {"slug": "hq"}}}]),
            ),
        ]));
        let records = vec![
            record("partial", 15000, Some("https://hcb.hackclub.com/ysws-budget-partial")),
            record("over", 10000, Some("https://hcb.hackclub.com/ysws-budget-over")),
            record("broken", 8500, Some("https://hcb.hackclub.com/ysws-budget-missing")),
            record("unlinked", 8500, None),
        ];

        let candidates = reconcile_all(&source, &ReconcileConfig::default(), records).await;
        let rendered: Vec<String> = candidates.iter().map(format_candidate).collect();

        insta::assert_snapshot!(rendered.join("\n"), @r"
        partial: org=ysws-budget-partial target=15000 disbursed=10000 (1) transfer=5000 over=0 error=-
        over: org=ysws-budget-over target=10000 disbursed=15000 (1) transfer=0 over=5000 error=-
        broken: org=ysws-budget-missing target=8500 disbursed=0 (0) transfer=8500 over=0 error=transactions request for `ysws-budget-missing` failed with status 404
        unlinked: org=- target=8500 disbursed=0 (0) transfer=8500 over=0 error=-
        ");

        assert!(candidates[0].needs_transfer());
        assert!(!candidates[1].needs_transfer());
        assert!(candidates[2].needs_transfer());
        assert!(!candidates[3].needs_transfer());
    }

    #[tokio::test]
    async fn undecodable_sibling_keeps_prior_disbursements() {
        let source = FixedSource(HashMap::from([(
            "ysws-budget-paid",
            json!([
                {"id": "t1", "amount_cents": -8500, "from_event_id": 183},
                {"id": "t2", "amount_cents": {"specialValue": "NaN"}, "from_event_id": 183},
            ]),
        )]));
        let record = record("paid", 8500, Some("https://hcb.hackclub.com/ysws-budget-paid"));

        let candidate = reconcile_candidate(&source, &ReconcileConfig::default(), record).await;
        assert_eq!(candidate.error, None);
        assert_eq!(candidate.decision.already_disbursed_cents, 8500);
        assert_eq!(candidate.decision.transfer_amount_cents, 0);
        assert!(!candidate.needs_transfer());
    }
}
