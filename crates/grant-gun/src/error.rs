use thiserror::Error;

/// Failure while paging through an organization's transactions.
///
/// Any of these aborts the whole fetch; a partial transaction list is never returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transactions request for `{org_id}` failed with status {status}")]
    Transport { org_id: String, status: u16 },
    #[error("transactions request for `{org_id}` could not be sent: {message}")]
    Connection { org_id: String, message: String },
    #[error("transactions response for `{org_id}` is not valid JSON: {message}")]
    Decode { org_id: String, message: String },
}

impl FetchError {
    pub fn org_id(&self) -> &str {
        match self {
            FetchError::Transport { org_id, .. }
            | FetchError::Connection { org_id, .. }
            | FetchError::Decode { org_id, .. } => org_id,
        }
    }
}
