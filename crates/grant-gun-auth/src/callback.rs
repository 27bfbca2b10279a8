//! The local HTTP listener receiving the OAuth redirect.
//!
//! The listener only lives as long as its [`CallbackListener`] handle: dropping or closing the
//! handle shuts the server down.

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    fn into_code(self) -> Result<String, String> {
        match (self.code, self.error) {
            (Some(code), _) if !code.is_empty() => Ok(code),
            (_, Some(error)) => Err(match self.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            }),
            _ => Err("No authorization code received".to_owned()),
        }
    }
}

/// A redirect that reached the listener and is waiting for its response page.
pub struct PendingCallback {
    pub code: Result<String, String>,
    reply: oneshot::Sender<Html<String>>,
}

impl PendingCallback {
    pub fn succeed(self) {
        let _ = self.reply.send(Html(
            "<h1>✅ HCB authentication successful!</h1><p>You can close this window.</p>"
                .to_owned(),
        ));
    }

    pub fn fail(self, error: &anyhow::Error) {
        let _ = self.reply.send(Html(format!(
            "<h1>❌ Authentication failed</h1><p>{}</p>",
            escape_html(&format!("{error:#}"))
        )));
    }
}

#[derive(Clone)]
struct CallbackState {
    callbacks: mpsc::Sender<PendingCallback>,
}

async fn callback_handler(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let (reply, response) = oneshot::channel();
    let pending = PendingCallback {
        code: params.into_code(),
        reply,
    };
    if state.callbacks.send(pending).await.is_err() {
        return Html("<h1>❌ Authentication is no longer in progress</h1>".to_owned());
    }
    response
        .await
        .unwrap_or_else(|_| Html("<h1>❌ Authentication was aborted</h1>".to_owned()))
}

pub struct CallbackListener {
    local_addr: SocketAddr,
    callbacks: mpsc::Receiver<PendingCallback>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<std::io::Result<()>>>,
}

impl CallbackListener {
    /// Start listening on `addr`, routing redirects arriving at `path`.
    pub async fn bind(addr: SocketAddr, path: &str) -> Result<Self> {
        let (sender, callbacks) = mpsc::channel(1);
        let app = Router::new()
            .route(path, get(callback_handler))
            .with_state(CallbackState { callbacks: sender })
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to listen for the OAuth callback on {addr}"))?;
        let local_addr = listener.local_addr()?;
        tracing::info!("Waiting for OAuth callback on http://{local_addr}{path}");

        let (shutdown, shutdown_signal) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_signal.await;
                })
                .await
        });

        Ok(CallbackListener {
            local_addr,
            callbacks,
            shutdown: Some(shutdown),
            server: Some(server),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn next_callback(&mut self) -> Option<PendingCallback> {
        self.callbacks.recv().await
    }

    /// Stop accepting connections and wait for in-flight responses to be written.
    pub async fn close(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(server) = self.server.take() {
            server
                .await
                .context("OAuth callback listener panicked")?
                .context("OAuth callback listener failed")?;
        }
        Ok(())
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(code: Option<&str>, error: Option<&str>, description: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(ToOwned::to_owned),
            error: error.map(ToOwned::to_owned),
            error_description: description.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn code_or_error() {
        assert_eq!(params(Some("abc"), None, None).into_code(), Ok("abc".to_owned()));
        assert_eq!(
            params(None, Some("access_denied"), Some("user said no")).into_code(),
            Err("access_denied: user said no".to_owned())
        );
        assert_eq!(
            params(Some(""), None, None).into_code(),
            Err("No authorization code received".to_owned())
        );
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
    }
}
