//! Budget records stored in Airtable tables.

use anyhow::{Context, Result, anyhow};
use grant_gun::Decimal;
use grant_gun::OrgIdentity;
use grant_gun::reconcile::{BudgetRecord, BudgetRecordSource};
use grant_gun::transaction::decimal_from_json;
use grant_gun::transfer::{WeightedGrantUnit, dollars_to_cents};
use grant_gun_auth::Token;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const BUDGET_FUND_FIELD: &str = "HCB Budget Fund";
pub const WEIGHTED_GRANTS_USD_FIELD: &str = "USD for Weighted Grants";
pub const WEIGHTED_TOTAL_FIELD: &str = "Weighted–Total";
pub const PROGRAM_HCB_FIELD: &str = "HCB";
pub const NAME_FIELD: &str = "Name";

/// A non-success answer from the Airtable API.
#[derive(Debug, thiserror::Error)]
#[error("Airtable API error: {status} - {message}")]
pub struct AirtableApiError {
    pub status: u16,
    /// Airtable's error type, e.g. `INVALID_FILTER_BY_FORMULA`.
    pub kind: Option<String>,
    pub message: String,
}

impl AirtableApiError {
    /// The filter formula names a field the table does not have.
    pub fn is_unknown_field(&self) -> bool {
        self.message.starts_with("Unknown field name")
    }
}

/// `error` is an Airtable rejection of a formula that names a missing field.
pub fn is_unknown_field_error(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<AirtableApiError>()
        .is_some_and(AirtableApiError::is_unknown_field)
}

/// How the rows of a table turn into budget records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSchema {
    /// One row per grant budget. Rows without a budget fund URL are not eligible.
    Grants,
    /// One row per program. The target is the weighted total times the weighted grant unit.
    Programs { weighted_grant: WeightedGrantUnit },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<AirtableRecord>,
    #[serde(default)]
    offset: Option<String>,
}

fn text_field(fields: &Map<String, Value>, name: &str) -> Option<String> {
    let value = match fields.get(name)? {
        Value::Array(values) => values.first()?,
        value => value,
    };
    let text = value.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_owned())
}

fn number_field(fields: &Map<String, Value>, name: &str) -> Result<Decimal> {
    let value = match fields.get(name) {
        Some(Value::Array(values)) => values.first(),
        value => value,
    };
    let Some(value) = value else {
        return Ok(Decimal::ZERO);
    };
    let number = decimal_from_json(value).map_err(|error| anyhow!("field `{name}`: {error}"))?;
    Ok(number.unwrap_or_default())
}

impl RecordSchema {
    /// Map a table row to a budget record, or `None` if the row is not eligible.
    pub fn to_budget_record(
        &self,
        record: AirtableRecord,
        slug_prefix: &str,
    ) -> Result<Option<BudgetRecord>> {
        let fields = &record.fields;
        let name = text_field(fields, NAME_FIELD);

        let budget_record = match self {
            RecordSchema::Grants => {
                let Some(budget_url) = text_field(fields, BUDGET_FUND_FIELD) else {
                    return Ok(None);
                };
                let dollars = number_field(fields, WEIGHTED_GRANTS_USD_FIELD)
                    .with_context(|| format!("Invalid grant record {}", record.id))?;
                let name = name
                    .or_else(|| {
                        OrgIdentity::from_budget_url(&budget_url, slug_prefix).map(|org| org.name)
                    })
                    .unwrap_or_else(|| "Unknown".to_owned());
                BudgetRecord {
                    id: record.id,
                    name,
                    target_amount_cents: dollars_to_cents(dollars),
                    budget_url: Some(budget_url),
                }
            }
            RecordSchema::Programs { weighted_grant } => {
                let weighted_total = number_field(fields, WEIGHTED_TOTAL_FIELD)
                    .with_context(|| format!("Invalid program record {}", record.id))?;
                BudgetRecord {
                    target_amount_cents: weighted_grant.to_cents(weighted_total),
                    budget_url: text_field(fields, PROGRAM_HCB_FIELD),
                    name: name.unwrap_or_else(|| "Unknown Program".to_owned()),
                    id: record.id,
                }
            }
        };
        Ok(Some(budget_record))
    }
}

/// Filter formulas for the programs table.
///
/// `search` narrows the listing to programs whose HCB URL or name contains it.
pub fn program_formula(search: Option<&str>, with_payout_switch: bool) -> String {
    let mut clauses = vec![format!("{{{WEIGHTED_TOTAL_FIELD}}} > 0")];
    if with_payout_switch {
        clauses.push("{Enable payouts} = TRUE()".to_owned());
    }
    if let Some(search) = search {
        let needle = search.to_lowercase().replace('\\', "\\\\").replace('"', "\\\"");
        clauses.push(format!(
            "OR(SEARCH(\"{needle}\", LOWER({{{PROGRAM_HCB_FIELD}}})), SEARCH(\"{needle}\", LOWER({{{NAME_FIELD}}})))"
        ));
    }

    match clauses.as_slice() {
        [only] => only.clone(),
        _ => format!("AND({})", clauses.join(", ")),
    }
}

/// A table in an Airtable base, read with a personal access token.
pub struct AirtableClient {
    client: reqwest::Client,
    table_url: String,
    token: Token,
    schema: RecordSchema,
    slug_prefix: String,
}

impl AirtableClient {
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        base_id: &str,
        table_id: &str,
        token: Token,
        schema: RecordSchema,
        slug_prefix: &str,
    ) -> Self {
        AirtableClient {
            client,
            table_url: format!("{}/{base_id}/{table_id}", api_url.trim_end_matches('/')),
            token,
            schema,
            slug_prefix: slug_prefix.to_owned(),
        }
    }

    async fn list_page(&self, filter: Option<&str>, offset: Option<&str>) -> Result<ListResponse> {
        let mut params = Vec::new();
        if let Some(filter) = filter {
            params.push(("filterByFormula", filter));
        }
        if let Some(offset) = offset {
            params.push(("offset", offset));
        }
        let url = Url::parse_with_params(&self.table_url, params)
            .with_context(|| format!("Invalid Airtable table URL `{}`", self.table_url))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token.access_token)
            .send()
            .await
            .context("Failed to fetch Airtable data")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.unwrap_or_default();
            let message = body
                .pointer("/error/message")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .or_else(|| status.canonical_reason())
                .unwrap_or("unknown error");
            let kind = body.pointer("/error/type").and_then(Value::as_str);
            return Err(AirtableApiError {
                status: status.as_u16(),
                kind: kind.map(ToOwned::to_owned),
                message: message.to_owned(),
            }
            .into());
        }

        response
            .json()
            .await
            .context("Failed to parse Airtable response")
    }

    /// Every row matching `filter`, following the `offset` token until the listing ends.
    pub async fn list_records(&self, filter: Option<&str>) -> Result<Vec<AirtableRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let page = self.list_page(filter, offset.as_deref()).await?;
            debug!("Airtable page with {} records", page.records.len());
            records.extend(page.records);
            match page.offset {
                Some(next) if offset.as_deref() != Some(next.as_str()) => offset = Some(next),
                _ => break,
            }
        }
        Ok(records)
    }
}

impl BudgetRecordSource for AirtableClient {
    async fn list_eligible_records(&self, filter: Option<&str>) -> Result<Vec<BudgetRecord>> {
        let mut eligible = Vec::new();
        for record in self.list_records(filter).await? {
            match self.schema.to_budget_record(record, &self.slug_prefix) {
                Ok(Some(budget_record)) => eligible.push(budget_record),
                Ok(None) => {}
                Err(error) => warn!("Skipping row: {error:#}"),
            }
        }
        Ok(eligible)
    }
}
