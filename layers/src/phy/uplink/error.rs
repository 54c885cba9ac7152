//! Error type for the uplink PHY core's fallible construction/configuration boundary.
//!
//! The data-plane itself never returns `Result`: PDU rejection, executor
//! rejection, and discard are reported exclusively through the results
//! notifier and the FSM counters (see `fsm` and `slot_processor`).

use thiserror::Error;

/// Errors raised while building or configuring the uplink core.
#[derive(Error, Debug)]
pub enum UlCoreError {
    #[error("invalid uplink core configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid PDU: {0}")]
    InvalidPdu(String),

    #[error("repository busy or slot not yet released")]
    RepositoryBusy,

    #[error("resource grid unavailable")]
    GridUnavailable,

    #[error("uplink core not initialized")]
    NotInitialized,
}
