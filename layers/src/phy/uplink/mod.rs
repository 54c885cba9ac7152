//! Uplink PHY processing core: PRACH detection, PUSCH decoding, PUCCH
//! reception and SRS channel estimation orchestrated by a per-slot FSM.
//!
//! This module owns admission, dispatch, and ordering; the concrete DSP
//! kernels (LDPC, channel estimation math, correlation detectors) are
//! consumed through the traits in [`traits`] and supplied by collaborators
//! outside this crate, per SPEC_FULL.md §1/§6.

pub mod channel_state_manager;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pdu_repository;
pub mod processor_pool;
pub mod slot_processor;
pub mod srs_estimator;
pub mod tpmi_select;
pub mod traits;
pub mod types;

pub use channel_state_manager::ChannelStateManager;
pub use config::UplinkCoreConfig;
pub use error::UlCoreError;
pub use fsm::UplinkProcessorFsm;
pub use processor_pool::UplinkProcessorPool;
pub use slot_processor::{SlotGrid, SlotProcessor};
pub use srs_estimator::SrsEstimator;
pub use tpmi_select::get_tpmi_select_info;
