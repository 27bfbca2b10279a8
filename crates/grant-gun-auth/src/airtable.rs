use crate::Token;
use anyhow::{Context, Result, bail};

/// An Airtable personal access token read from `AIRTABLE_PAT`.
#[derive(Clone)]
pub struct AirtablePat {
    pat: String,
}

impl std::fmt::Debug for AirtablePat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AirtablePat").finish_non_exhaustive()
    }
}

impl AirtablePat {
    pub fn new(pat: impl Into<String>) -> Self {
        AirtablePat { pat: pat.into() }
    }

    pub fn from_env() -> Result<Self> {
        let pat = std::env::var("AIRTABLE_PAT")
            .context("AIRTABLE_PAT environment variable is required")?;
        Ok(AirtablePat::new(pat))
    }

    /// Check the token against the `whoami` endpoint and hand it out as a bearer token.
    pub async fn authenticate(&self, client: &reqwest::Client, api_url: &str) -> Result<Token> {
        let url = format!("{}/meta/whoami", api_url.trim_end_matches('/'));
        let valid = match client.get(url).bearer_auth(&self.pat).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Airtable whoami request failed: {error}");
                false
            }
        };
        if !valid {
            bail!("Invalid Airtable Personal Access Token");
        }

        Ok(Token {
            access_token: self.pat.clone(),
            token_type: Some("pat".to_owned()),
            refresh_token: None,
            expires_in: None,
            scope: None,
        })
    }
}
