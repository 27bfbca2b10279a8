use crate::Token;
use crate::callback::CallbackListener;
use anyhow::{Context, Result, bail};
use reqwest::Url;
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// HCB OAuth application credentials plus where to reach HCB.
#[derive(Debug, Clone)]
pub struct HcbOAuth {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub api_url: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
    grant_type: &'static str,
}

impl HcbOAuth {
    /// Read `HCB_APP_UID`, `HCB_APP_SECRET` and the optional `HCB_REDIRECT_URI`.
    pub fn from_env(api_url: &str) -> Result<Self> {
        let client_id = std::env::var("HCB_APP_UID")
            .context("HCB_APP_UID environment variable is required")?;
        let client_secret = std::env::var("HCB_APP_SECRET")
            .context("HCB_APP_SECRET environment variable is required")?;
        let redirect_uri = std::env::var("HCB_REDIRECT_URI")
            .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_owned());
        let redirect_uri = Url::parse(&redirect_uri)
            .with_context(|| format!("Invalid HCB_REDIRECT_URI `{redirect_uri}`"))?;

        Ok(HcbOAuth {
            client_id,
            client_secret,
            redirect_uri,
            api_url: api_url.trim_end_matches('/').to_owned(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn authorize_url(&self) -> Result<Url> {
        Url::parse_with_params(
            &format!("{}/oauth/authorize", self.api_url),
            [
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "read"),
            ],
        )
        .context("Failed to build HCB authorize URL")
    }

    /// The local address the redirect URI points at. The listener always binds the loopback
    /// interface.
    fn listen_addr(&self) -> Result<SocketAddr> {
        let Some(port) = self.redirect_uri.port_or_known_default() else {
            bail!("Redirect URI `{}` has no port", self.redirect_uri);
        };
        Ok(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)))
    }

    /// Run the authorization-code flow.
    ///
    /// Starts the callback listener, hands the authorize URL to `open_browser`, waits for the
    /// redirect and exchanges the code for a token. The listener is shut down before returning,
    /// whether the flow succeeded, failed or timed out.
    pub async fn authenticate(
        &self,
        client: &reqwest::Client,
        open_browser: impl FnOnce(&Url),
    ) -> Result<Token> {
        crate::init_tracing();

        let authorize_url = self.authorize_url()?;
        let mut listener =
            CallbackListener::bind(self.listen_addr()?, self.redirect_uri.path()).await?;

        open_browser(&authorize_url);

        let result = tokio::time::timeout(self.timeout, async {
            let pending = listener
                .next_callback()
                .await
                .context("OAuth callback listener stopped unexpectedly")?;
            let exchanged = match &pending.code {
                Ok(code) => self.exchange_code(client, code).await,
                Err(error) => Err(anyhow::anyhow!("HCB authorization failed: {error}")),
            };
            match &exchanged {
                Ok(_) => pending.succeed(),
                Err(error) => pending.fail(error),
            }
            exchanged
        })
        .await;

        listener.close().await?;

        match result {
            Ok(token) => token,
            Err(_) => bail!("Authentication timeout after {:?}", self.timeout),
        }
    }

    pub async fn exchange_code(&self, client: &reqwest::Client, code: &str) -> Result<Token> {
        let response = client
            .post(format!("{}/oauth/token", self.api_url))
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                redirect_uri: self.redirect_uri.as_str(),
                code,
                grant_type: "authorization_code",
            })
            .send()
            .await
            .context("Failed to reach the HCB token endpoint")?;

        let status = response.status();
        if !status.is_success() {
            bail!("HCB token exchange failed: {status}");
        }
        response
            .json::<Token>()
            .await
            .context("Failed to parse the HCB token response")
    }
}

/// Whether `token` is accepted by the HCB API.
pub async fn validate_token(client: &reqwest::Client, api_url: &str, token: &Token) -> bool {
    let url = format!("{}/organizations", api_url.trim_end_matches('/'));
    match client.get(url).bearer_auth(&token.access_token).send().await {
        Ok(response) => response.status().is_success(),
        Err(error) => {
            tracing::debug!("HCB token validation request failed: {error}");
            false
        }
    }
}
