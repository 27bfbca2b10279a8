//! Pre-filled disbursement pages for approved transfers.

use crate::approval::{SkipReason, skip_reason};
use crate::reconcile::Candidate;
use crate::transfer::WeightedGrantUnit;
use tracing::warn;
use url::Url;

/// Opens a URL for the operator, typically in a browser tab.
pub trait PaymentLinkOpener {
    fn open(&mut self, url: &Url) -> anyhow::Result<()>;
}

/// Builds the "new disbursement" page URL for a transfer.
#[derive(Debug, Clone)]
pub struct PaymentLinks {
    pub base: Url,
    pub source_event_id: String,
    /// Prepended to "for N weighted grants" in the transfer message.
    pub message_prefix: String,
    pub weighted_grant: WeightedGrantUnit,
}

impl PaymentLinks {
    pub fn message(&self, amount_cents: u64) -> String {
        format!(
            "{}for {} weighted grants",
            self.message_prefix,
            self.weighted_grant.units_for(amount_cents)
        )
    }

    pub fn url_for(&self, event_id: &str, amount_cents: u64) -> Url {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("source_event_id", &self.source_event_id)
            .append_pair("event_id", event_id)
            .append_pair("amount", &amount_cents.to_string())
            .append_pair("message", &self.message(amount_cents));
        url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Opened(Url),
    /// The opener failed; the operator has to visit `url` by hand.
    Failed { url: Url, error: String },
    Skipped(SkipReason),
}

#[derive(Debug)]
pub struct LinkReport<'a> {
    pub candidate: &'a Candidate,
    pub outcome: LinkOutcome,
}

/// Open one payment page per approved candidate with an outstanding transfer, in order.
///
/// Candidates without a transfer or without an event id are reported as skipped. Opener
/// failures are reported, never propagated.
pub fn open_payment_links<'a>(
    approved: impl IntoIterator<Item = &'a Candidate>,
    links: &PaymentLinks,
    opener: &mut impl PaymentLinkOpener,
) -> Vec<LinkReport<'a>> {
    approved
        .into_iter()
        .map(|candidate| {
            let outcome = match (skip_reason(candidate), candidate.event_id()) {
                (None, Some(event_id)) => {
                    let url = links.url_for(event_id, candidate.decision.transfer_amount_cents);
                    match opener.open(&url) {
                        Ok(()) => LinkOutcome::Opened(url),
                        Err(error) => {
                            warn!("Failed to open payment page for {}: {error:#}", candidate.name());
                            LinkOutcome::Failed {
                                url,
                                error: format!("{error:#}"),
                            }
                        }
                    }
                }
                (Some(reason), _) => LinkOutcome::Skipped(reason),
                (None, None) => LinkOutcome::Skipped(SkipReason::MissingEventId),
            };
            LinkReport { candidate, outcome }
        })
        .collect()
}
