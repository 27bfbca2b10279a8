//! Exhaustive paging over an organization's transactions.
//!
//! The transactions endpoint has been seen paging by offset with a `total_count`, paging by
//! cursor with `has_more`, and returning everything in one response. Which one is in use is
//! detected from the first response.

use crate::error::FetchError;
use crate::transaction::{Identifier, RawTransaction};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    Offset(usize),
    After(Identifier),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub cursor: PageCursor,
    pub transaction_type: Option<String>,
}

impl PageRequest {
    fn at(limit: usize, cursor: PageCursor, transaction_type: Option<&str>) -> Self {
        PageRequest {
            limit,
            cursor,
            transaction_type: transaction_type.map(ToOwned::to_owned),
        }
    }

    /// Query parameters for this request, in the order the API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("limit", self.limit.to_string())];
        match &self.cursor {
            PageCursor::Offset(offset) => pairs.push(("offset", offset.to_string())),
            PageCursor::After(id) => pairs.push(("after", id.to_string())),
        }
        if let Some(transaction_type) = &self.transaction_type {
            pairs.push(("type", transaction_type.clone()));
        }
        pairs
    }
}

/// How the response envelope says the listing continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    TotalCount(usize),
    HasMore(bool),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<RawTransaction>,
    pub signal: PageSignal,
    /// Items in the response, including any that failed to decode.
    pub received: usize,
}

struct Shape {
    name: &'static str,
    extract: fn(&Value) -> Option<(&Vec<Value>, PageSignal)>,
}

// First match wins.
const SHAPES: &[Shape] = &[
    Shape {
        name: "data envelope",
        extract: data_envelope,
    },
    Shape {
        name: "bare list",
        extract: bare_list,
    },
    Shape {
        name: "transactions envelope",
        extract: transactions_envelope,
    },
];

fn data_envelope(value: &Value) -> Option<(&Vec<Value>, PageSignal)> {
    envelope(value, "data")
}

fn bare_list(value: &Value) -> Option<(&Vec<Value>, PageSignal)> {
    value.as_array().map(|items| (items, PageSignal::None))
}

fn transactions_envelope(value: &Value) -> Option<(&Vec<Value>, PageSignal)> {
    envelope(value, "transactions")
}

fn envelope<'a>(value: &'a Value, key: &str) -> Option<(&'a Vec<Value>, PageSignal)> {
    let items = value.get(key)?.as_array()?;
    let signal = if let Some(total) = value.get("total_count").and_then(Value::as_u64) {
        PageSignal::TotalCount(usize::try_from(total).unwrap_or(usize::MAX))
    } else if let Some(has_more) = value.get("has_more").and_then(Value::as_bool) {
        PageSignal::HasMore(has_more)
    } else {
        PageSignal::None
    };
    Some((items, signal))
}

impl Page {
    pub fn empty() -> Self {
        Page {
            items: Vec::new(),
            signal: PageSignal::None,
            received: 0,
        }
    }

    /// Normalize any known response envelope into a page.
    ///
    /// A response matching none of the known shapes is logged and treated as an empty page.
    /// Items that do not decode as transactions are logged and left out.
    pub fn from_json(org_id: &str, value: Value) -> Page {
        let Some((shape, (items, signal))) = SHAPES
            .iter()
            .find_map(|shape| (shape.extract)(&value).map(|found| (shape.name, found)))
        else {
            warn!("Unexpected transactions response shape for `{org_id}`, treating it as empty");
            return Page::empty();
        };
        debug!("Response for `{org_id}` matched {shape} with {} items", items.len());

        let received = items.len();
        let items = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| match RawTransaction::deserialize(item) {
                Ok(transaction) => Some(transaction),
                Err(error) => {
                    let id = item.get("id").map_or("?".to_owned(), Value::to_string);
                    warn!("Skipping transaction {index} (id {id}) of `{org_id}`: {error}");
                    None
                }
            })
            .collect();

        Page {
            items,
            signal,
            received,
        }
    }
}

/// A backend able to return one page of an organization's transactions.
pub trait TransactionSource {
    fn fetch_page(
        &self,
        org_id: &str,
        request: &PageRequest,
    ) -> impl Future<Output = Result<Page, FetchError>>;
}

/// Fetch every transaction of `org_id` visible under `transaction_type` (all types if `None`).
pub async fn fetch_all_transactions(
    source: &impl TransactionSource,
    org_id: &str,
    transaction_type: Option<&str>,
    batch_size: usize,
) -> Result<Vec<RawTransaction>, FetchError> {
    let batch_size = batch_size.max(1);

    info!("Fetching first batch for `{org_id}` to determine paging");
    let first = source
        .fetch_page(
            org_id,
            &PageRequest::at(batch_size, PageCursor::Offset(0), transaction_type),
        )
        .await?;

    let transactions = match first.signal {
        PageSignal::TotalCount(total) => {
            // a server capping `limit` below the batch size answers with fewer items
            let step = match first.received {
                0 => batch_size,
                received => received.min(batch_size),
            };
            fetch_by_offset(source, org_id, transaction_type, step, first.items, total).await?
        }
        PageSignal::HasMore(true) => {
            fetch_by_cursor(source, org_id, transaction_type, batch_size, first.items).await?
        }
        PageSignal::HasMore(false) | PageSignal::None => first.items,
    };

    info!("Fetched {} transactions for `{org_id}`", transactions.len());
    Ok(transactions)
}

async fn fetch_by_offset(
    source: &impl TransactionSource,
    org_id: &str,
    transaction_type: Option<&str>,
    step: usize,
    mut transactions: Vec<RawTransaction>,
    total: usize,
) -> Result<Vec<RawTransaction>, FetchError> {
    if total <= step {
        return Ok(transactions);
    }

    let requests: Vec<PageRequest> = (step..total)
        .step_by(step)
        .map(|offset| PageRequest::at(step, PageCursor::Offset(offset), transaction_type))
        .collect();
    info!(
        "Total count {total} for `{org_id}`, fetching {} additional batches in parallel",
        requests.len()
    );

    // `try_join_all` keeps request order, so pages are reassembled by offset.
    let pages = futures::future::try_join_all(
        requests
            .iter()
            .map(|request| source.fetch_page(org_id, request)),
    )
    .await?;

    for page in pages {
        transactions.extend(page.items);
    }
    Ok(transactions)
}

async fn fetch_by_cursor(
    source: &impl TransactionSource,
    org_id: &str,
    transaction_type: Option<&str>,
    batch_size: usize,
    mut transactions: Vec<RawTransaction>,
) -> Result<Vec<RawTransaction>, FetchError> {
    let mut page_len = transactions.len();
    loop {
        if page_len == 0 {
            break;
        }
        let Some(last) = transactions.last() else {
            break;
        };
        let after = last.id.clone();
        debug!("Fetching page of `{org_id}` after {after}");

        let page = source
            .fetch_page(
                org_id,
                &PageRequest::at(batch_size, PageCursor::After(after.clone()), transaction_type),
            )
            .await?;

        page_len = page.items.len();
        let has_more = matches!(page.signal, PageSignal::HasMore(true));
        transactions.extend(page.items);

        // the cursor must advance, otherwise the same page would be requested forever
        if transactions.last().map(|tx| &tx.id) == Some(&after) && page_len > 0 {
            warn!("Cursor for `{org_id}` did not advance past {after}, stopping");
            break;
        }
        if !has_more {
            break;
        }
    }
    Ok(transactions)
}
