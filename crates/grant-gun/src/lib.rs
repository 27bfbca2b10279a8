pub mod approval;
mod dedup;
mod error;
pub mod links;
mod org;
pub mod pager;
pub mod reconcile;
pub mod transaction;
pub mod transfer;

pub use dedup::dedupe;
pub use error::FetchError;
pub use org::OrgIdentity;

pub type Decimal = rust_decimal::Decimal;

pub use anyhow::Result;
