use grant_gun::FetchError;
use grant_gun::pager::{Page, PageRequest, TransactionSource};
use grant_gun_auth::Token;
use reqwest::Url;
use serde_json::Value;
use tracing::debug;

/// Reads organization transactions from the HCB API.
pub struct HcbClient {
    client: reqwest::Client,
    api_url: String,
    token: Token,
}

impl HcbClient {
    pub fn new(client: reqwest::Client, api_url: &str, token: Token) -> Self {
        HcbClient {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
            token,
        }
    }

    fn transactions_url(&self, org_id: &str, request: &PageRequest) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.api_url).map_err(|error| FetchError::Connection {
            org_id: org_id.to_owned(),
            message: format!("invalid api url `{}`: {error}", self.api_url),
        })?;
        url.path_segments_mut()
            .map_err(|()| FetchError::Connection {
                org_id: org_id.to_owned(),
                message: format!("api url `{}` cannot take a path", self.api_url),
            })?
            .extend(["organizations", org_id, "transactions"]);
        url.query_pairs_mut().extend_pairs(request.query_pairs());
        Ok(url)
    }
}

impl TransactionSource for HcbClient {
    async fn fetch_page(&self, org_id: &str, request: &PageRequest) -> Result<Page, FetchError> {
        let url = self.transactions_url(org_id, request)?;
        debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token.access_token)
            .send()
            .await
            .map_err(|error| FetchError::Connection {
                org_id: org_id.to_owned(),
                message: error.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport {
                org_id: org_id.to_owned(),
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|error| FetchError::Decode {
                org_id: org_id.to_owned(),
                message: error.to_string(),
            })?;
        Ok(Page::from_json(org_id, body))
    }
}
