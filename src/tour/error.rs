//! Errors surfaced to the host.
//!
//! These only occur when a controller is built or a run is started. Once a
//! run is active nothing is fatal: missing targets, stale navigation and bad
//! detection rules are absorbed and logged.

use thiserror::Error;

use super::catalog::CatalogError;
use super::registry::RunId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TourError {
    #[error("invalid tour catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("tour run {0} is already active")]
    AlreadyActive(RunId),

    #[error("tour timing must be positive ({0})")]
    InvalidTiming(&'static str),

    #[error("tour controller is no longer running")]
    ControllerGone,
}
