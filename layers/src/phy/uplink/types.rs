//! Data model for the uplink PHY core: slot addressing, SRS configuration and
//! results, PDU descriptors, and per-UE channel state.

use common::types::Rnti;
use num_complex::Complex32;

/// Maximum number of OFDM symbols in a slot (normal cyclic prefix).
pub const NOF_SYMBOLS_PER_SLOT: usize = 14;
/// Upper bound on simultaneous SRS/PUSCH/PUCCH transmit or receive ports.
pub const MAX_PORTS: usize = 4;

/// Point in time identified by numerology, SFN and slot-in-frame.
///
/// `system_slot()` folds the three fields into a single comparable integer;
/// it is what the processor pool's circular assignment array is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotPoint {
    /// Subcarrier-spacing index μ ∈ {0..4}.
    pub numerology: u8,
    /// System frame number, wraps at 1024.
    pub sfn: u16,
    /// Slot index within the frame, 0..slots_per_frame(numerology).
    pub slot_index: u16,
}

impl SlotPoint {
    pub fn new(numerology: u8, sfn: u16, slot_index: u16) -> Self {
        Self { numerology, sfn, slot_index }
    }

    /// Number of slots per radio frame at this numerology.
    pub fn slots_per_frame(&self) -> u16 {
        1u16 << self.numerology
    }

    /// Monotonically increasing slot counter used for circular-array indexing.
    pub fn system_slot(&self) -> u32 {
        self.sfn as u32 * self.slots_per_frame() as u32 + self.slot_index as u32
    }
}

/// Number of antenna ports: SRS/PUSCH only ever use 1, 2 or 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneTwoFour {
    One = 1,
    Two = 2,
    Four = 4,
}

impl OneTwoFour {
    pub fn as_usize(self) -> usize {
        self as usize
    }
}

/// SRS comb size, parameter K_TC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombSize {
    Two = 2,
    Four = 4,
}

impl CombSize {
    pub fn as_usize(self) -> usize {
        self as usize
    }

    /// Maximum cyclic shift index for this comb size.
    pub fn n_cs_max(self) -> u8 {
        match self {
            CombSize::Two => 8,
            CombSize::Four => 12,
        }
    }
}

/// Frequency/group/sequence hopping selection. Group and sequence hopping are
/// validated-out (see `SrsResourceConfiguration::is_valid`); the core only
/// supports `Neither`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrSequenceHopping {
    Neither,
    GroupHopping,
    SequenceHopping,
}

/// Periodic/semi-persistent SRS transmission timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicityAndOffset {
    pub periodicity: u16,
    pub offset: u16,
}

/// Parameters required to receive an SRS resource, TS 38.211 §6.4.1.4.
#[derive(Debug, Clone, Copy)]
pub struct SrsResourceConfiguration {
    pub nof_antenna_ports: OneTwoFour,
    pub nof_symbols: OneTwoFour,
    /// l0: starting OFDM symbol, counted from the start of the slot.
    pub start_symbol: u8,
    /// C_SRS, selects a row of the TS 38.211 6.4.1.4.3 bandwidth table.
    pub configuration_index: u8,
    pub sequence_id: u16,
    /// B_SRS.
    pub bandwidth_index: u8,
    pub comb_size: CombSize,
    pub comb_offset: u8,
    /// n_CS_SRS.
    pub cyclic_shift: u8,
    /// n_RRC.
    pub freq_position: u8,
    /// n_shift.
    pub freq_shift: u16,
    /// b_hop.
    pub freq_hopping: u8,
    pub hopping: GroupOrSequenceHopping,
    pub periodicity: Option<PeriodicityAndOffset>,
}

impl SrsResourceConfiguration {
    /// Structural + range validation; does not touch the resource grid.
    ///
    /// Group/sequence hopping and intra-SRS frequency hopping are out of
    /// scope for this core (`DESIGN NOTES`): both are rejected here rather
    /// than silently ignored.
    pub fn is_valid(&self) -> bool {
        let start = self.start_symbol as usize;
        let nof_symbols = self.nof_antenna_ports_symbols();
        if start + nof_symbols > NOF_SYMBOLS_PER_SLOT {
            return false;
        }
        if self.comb_offset as usize >= self.comb_size.as_usize() {
            return false;
        }
        if self.cyclic_shift >= self.comb_size.n_cs_max() {
            return false;
        }
        if self.freq_position > 67 || self.freq_shift > 268 || self.bandwidth_index > 3 || self.freq_hopping > 3 {
            return false;
        }
        if self.freq_hopping < self.bandwidth_index {
            return false;
        }
        if self.hopping != GroupOrSequenceHopping::Neither {
            return false;
        }
        true
    }

    fn nof_antenna_ports_symbols(&self) -> usize {
        self.nof_symbols.as_usize()
    }

    pub fn end_symbol_index(&self) -> usize {
        self.start_symbol as usize + self.nof_symbols.as_usize() - 1
    }
}

/// TS 38.211 6.3.1.5 codebook subset restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodebookSubset {
    FullyAndPartialAndNonCoherent,
    PartialAndNonCoherent,
    NonCoherent,
}

/// Dense Rx × Tx complex channel matrix, row-major by (rx_port, tx_port).
#[derive(Debug, Clone, PartialEq)]
pub struct SrsChannelMatrix {
    nof_rx_ports: usize,
    nof_tx_ports: usize,
    coefficients: Vec<Complex32>,
}

impl SrsChannelMatrix {
    pub fn new(nof_rx_ports: usize, nof_tx_ports: usize) -> Self {
        Self {
            nof_rx_ports,
            nof_tx_ports,
            coefficients: vec![Complex32::new(0.0, 0.0); nof_rx_ports * nof_tx_ports],
        }
    }

    pub fn from_coefficients(nof_rx_ports: usize, nof_tx_ports: usize, coefficients: Vec<Complex32>) -> Self {
        assert_eq!(coefficients.len(), nof_rx_ports * nof_tx_ports);
        Self { nof_rx_ports, nof_tx_ports, coefficients }
    }

    pub fn nof_rx_ports(&self) -> usize {
        self.nof_rx_ports
    }

    pub fn nof_tx_ports(&self) -> usize {
        self.nof_tx_ports
    }

    fn index(&self, rx_port: usize, tx_port: usize) -> usize {
        rx_port * self.nof_tx_ports + tx_port
    }

    pub fn get(&self, rx_port: usize, tx_port: usize) -> Complex32 {
        self.coefficients[self.index(rx_port, tx_port)]
    }

    pub fn set(&mut self, rx_port: usize, tx_port: usize, value: Complex32) {
        let idx = self.index(rx_port, tx_port);
        self.coefficients[idx] = value;
    }

    pub fn frobenius_norm(&self) -> f32 {
        self.coefficients.iter().map(|c| c.norm_sqr()).sum::<f32>().sqrt()
    }

    pub fn scale(&mut self, factor: f32) {
        for c in &mut self.coefficients {
            *c *= factor;
        }
    }

    /// Scales the matrix so that its Frobenius norm equals sqrt(Rx*Tx) and the
    /// first coefficient is a purely real, positive number. Used by the SRS
    /// round-trip test law to compare matrices up to a complex scalar.
    pub fn normalize(&self) -> Self {
        let mut out = self.clone();
        let norm = out.frobenius_norm();
        if norm > f32::EPSILON {
            out.scale(((self.nof_rx_ports * self.nof_tx_ports) as f32).sqrt() / norm);
        }
        let first = out.coefficients[0];
        let first_mag = first.norm();
        if first_mag > f32::EPSILON {
            let phase_correction = Complex32::new(first.re, first.im) / first_mag;
            for c in &mut out.coefficients {
                *c /= phase_correction;
            }
        }
        out
    }

    /// True if the two matrices, after independent normalization, differ by
    /// no more than `tolerance` in Frobenius distance.
    pub fn is_near(&self, other: &SrsChannelMatrix, tolerance: f32) -> bool {
        if self.nof_rx_ports != other.nof_rx_ports || self.nof_tx_ports != other.nof_tx_ports {
            return false;
        }
        let a = self.normalize();
        let b = other.normalize();
        let dist_sqr: f32 = a
            .coefficients
            .iter()
            .zip(b.coefficients.iter())
            .map(|(x, y)| (x - y).norm_sqr())
            .sum();
        dist_sqr.sqrt() <= tolerance
    }
}

/// Time-alignment measurement reported by the (external) time-alignment
/// estimator and aggregated by the SRS channel estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAlignmentMeasurement {
    /// Estimated time alignment, seconds.
    pub value_seconds: f64,
    /// Estimator resolution, seconds.
    pub resolution_seconds: f64,
    /// Minimum measurable value, seconds.
    pub min_seconds: f64,
    /// Maximum measurable value, seconds.
    pub max_seconds: f64,
}

/// Result of SRS channel estimation: §4.1.
#[derive(Debug, Clone)]
pub struct SrsEstimatorResult {
    /// Channel matrix normalised by the noise standard deviation.
    pub channel_matrix: SrsChannelMatrix,
    pub epre_db: Option<f32>,
    pub rsrp_db: Option<f32>,
    pub noise_variance: f32,
    pub time_alignment: TimeAlignmentMeasurement,
}

impl SrsEstimatorResult {
    /// The silent-failure result returned when the configuration was not
    /// validated upstream: a zero matrix with no power estimates.
    pub fn empty(nof_rx_ports: usize, nof_tx_ports: usize) -> Self {
        Self {
            channel_matrix: SrsChannelMatrix::new(nof_rx_ports, nof_tx_ports),
            epre_db: None,
            rsrp_db: None,
            noise_variance: 0.0,
            time_alignment: TimeAlignmentMeasurement {
                value_seconds: 0.0,
                resolution_seconds: 0.0,
                min_seconds: 0.0,
                max_seconds: 0.0,
            },
        }
    }
}

/// UCI status attached to PUSCH/PUCCH results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UciStatus {
    Unknown,
    Valid,
    Invalid,
}

// --- PDU descriptors -------------------------------------------------------

/// Minimal carrier/allocation/MCS description needed to drive a PUSCH
/// processor invocation; the concrete decoder is a consumed collaborator.
#[derive(Debug, Clone)]
pub struct PuschAllocation {
    pub start_symbol_index: u8,
    pub nof_symbols: u8,
    pub start_rb: u16,
    pub nof_rb: u16,
    pub nof_layers: u8,
    pub mcs_index: u8,
    pub redundancy_version: u8,
    pub new_data: bool,
}

impl PuschAllocation {
    pub fn end_symbol_index(&self) -> usize {
        self.start_symbol_index as usize + self.nof_symbols as usize - 1
    }
}

/// PUSCH PDU descriptor.
#[derive(Debug, Clone)]
pub struct PuschPdu {
    pub rnti: Rnti,
    pub harq_id: u8,
    pub tb_size_bytes: u32,
    pub allocation: PuschAllocation,
    /// Number of HARQ-ACK bits multiplexed on PUSCH (UCI-on-PUSCH), 0 if none.
    pub nof_harq_ack_bits: u16,
    pub nof_codeblocks: u16,
}

impl PuschPdu {
    pub fn end_symbol_index(&self) -> usize {
        self.allocation.end_symbol_index()
    }

    pub fn has_uci(&self) -> bool {
        self.nof_harq_ack_bits > 0
    }
}

/// PUCCH Format 0 configuration (sequence-only, 1-2 symbols).
#[derive(Debug, Clone, PartialEq)]
pub struct PucchFormat0Config {
    pub start_symbol_index: u8,
    pub nof_symbols: u8,
    pub initial_cyclic_shift: u8,
}

/// PUCCH Format 1 configuration (spread sequence, up to 14 symbols).
#[derive(Debug, Clone, PartialEq)]
pub struct PucchFormat1Config {
    pub start_symbol_index: u8,
    pub nof_symbols: u8,
    pub initial_cyclic_shift: u8,
    pub time_domain_occ: u8,
    pub nof_harq_ack: u8,
}

/// PUCCH Formats 2/3/4 configuration (payload-bearing).
#[derive(Debug, Clone, PartialEq)]
pub struct PucchFormat234Config {
    pub start_symbol_index: u8,
    pub nof_symbols: u8,
    pub start_rb: u16,
    pub nof_rb: u16,
    pub nof_harq_ack: u16,
}

/// Tagged union over the five PUCCH format configurations (§4.3, §9).
#[derive(Debug, Clone, PartialEq)]
pub enum PucchFormatConfig {
    Format0(PucchFormat0Config),
    Format1(PucchFormat1Config),
    Format2(PucchFormat234Config),
    Format3(PucchFormat234Config),
    Format4(PucchFormat234Config),
}

impl PucchFormatConfig {
    pub fn end_symbol_index(&self) -> usize {
        let (start, nof) = match self {
            PucchFormatConfig::Format0(c) => (c.start_symbol_index, c.nof_symbols),
            PucchFormatConfig::Format1(c) => (c.start_symbol_index, c.nof_symbols),
            PucchFormatConfig::Format2(c) | PucchFormatConfig::Format3(c) | PucchFormatConfig::Format4(c) => {
                (c.start_symbol_index, c.nof_symbols)
            }
        };
        start as usize + nof as usize - 1
    }

    pub fn nof_harq_ack(&self) -> u16 {
        match self {
            PucchFormatConfig::Format0(_) => 1,
            PucchFormatConfig::Format1(c) => c.nof_harq_ack as u16,
            PucchFormatConfig::Format2(c) | PucchFormatConfig::Format3(c) | PucchFormatConfig::Format4(c) => {
                c.nof_harq_ack
            }
        }
    }
}

/// Reception context shared by every uplink PDU: who sent it and when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UlReceptionContext {
    pub slot: SlotPoint,
    pub sector_id: u16,
    pub rnti: Rnti,
}

/// PUCCH PDU descriptor.
#[derive(Debug, Clone)]
pub struct PucchPdu {
    pub context: UlReceptionContext,
    pub config: PucchFormatConfig,
}

/// Common parameters of a Format-1 PUCCH transmission used to decide whether
/// two PDUs share a batch (§4.3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PucchFormat1CommonConfig {
    pub start_symbol_index: u8,
    pub nof_symbols: u8,
}

impl From<&PucchFormat1Config> for PucchFormat1CommonConfig {
    fn from(c: &PucchFormat1Config) -> Self {
        Self { start_symbol_index: c.start_symbol_index, nof_symbols: c.nof_symbols }
    }
}

/// SRS PDU descriptor.
#[derive(Debug, Clone, Copy)]
pub struct SrsPdu {
    pub context: UlReceptionContext,
    pub config: SrsResourceConfiguration,
}

impl SrsPdu {
    pub fn end_symbol_index(&self) -> usize {
        self.config.end_symbol_index()
    }
}

// --- Channel-state manager types --------------------------------------------

/// CSI report as delivered by the UE on PUCCH/PUSCH UCI.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsiReport {
    pub first_tb_wideband_cqi: Option<u8>,
    /// Rank indicator, if reported.
    pub ri: Option<u8>,
    /// Precoding matrix indicator, if reported.
    pub pmi: Option<u8>,
}

/// A single TPMI candidate and its achieved mean layer SINR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TpmiInfo {
    pub tpmi: u32,
    pub avg_sinr_db: f32,
}

/// Selected TPMI per supported layer count, plus per-layer SINR breakdown
/// (supplemented from `original_source`, see SPEC_FULL.md §10.5).
#[derive(Debug, Clone)]
pub struct PuschTpmiSelectInfo {
    /// Index 0 = 1 layer, index 1 = 2 layers, ...
    per_layer_count: Vec<TpmiInfo>,
    per_layer_sinr_db: Vec<Vec<f32>>,
}

impl PuschTpmiSelectInfo {
    pub fn new(per_layer_count: Vec<TpmiInfo>, per_layer_sinr_db: Vec<Vec<f32>>) -> Self {
        Self { per_layer_count, per_layer_sinr_db }
    }

    pub fn get_max_nof_layers(&self) -> usize {
        self.per_layer_count.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.per_layer_count.is_empty()
    }

    /// Returns the selection for `nof_layers` layers, `nof_layers` in [1, max].
    pub fn get_tpmi_select(&self, nof_layers: usize) -> Option<TpmiInfo> {
        if nof_layers == 0 || nof_layers > self.per_layer_count.len() {
            return None;
        }
        Some(self.per_layer_count[nof_layers - 1])
    }

    pub fn get_sinr_db_layer(&self, nof_layers: usize) -> Option<&[f32]> {
        if nof_layers == 0 || nof_layers > self.per_layer_sinr_db.len() {
            return None;
        }
        Some(&self.per_layer_sinr_db[nof_layers - 1])
    }
}

/// Exponential moving average with a fast start: the first sample is taken
/// verbatim, later samples are blended with `alpha`.
#[derive(Debug, Clone, Copy)]
pub struct ExpAverageFastStart {
    alpha: f32,
    value: Option<f32>,
}

impl ExpAverageFastStart {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    pub fn push(&mut self, sample: f32) {
        self.value = Some(match self.value {
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        });
    }

    pub fn get(&self) -> Option<f32> {
        self.value
    }
}

/// Per-UE channel state aggregated from CSI reports and SRS measurements.
#[derive(Debug, Clone)]
pub struct ChannelState {
    nof_dl_ports: u8,
    pusch_snr_db: Option<f32>,
    average_pusch_sinr_db: ExpAverageFastStart,
    wideband_cqi: Option<u8>,
    recommended_dl_layers: u8,
    recommended_pmi: Vec<Option<u8>>,
    latest_csi_report: Option<CsiReport>,
    last_pusch_tpmi_select_info: Option<PuschTpmiSelectInfo>,
}

impl ChannelState {
    /// α = 0.5 fast-start EMA, per §4.7.
    const ALPHA_EMA_SINR: f32 = 0.5;
    const NOF_LAYER_CHOICES: usize = 4;

    pub fn new(nof_dl_ports: u8) -> Self {
        Self {
            nof_dl_ports,
            pusch_snr_db: None,
            average_pusch_sinr_db: ExpAverageFastStart::new(Self::ALPHA_EMA_SINR),
            wideband_cqi: None,
            recommended_dl_layers: 1,
            recommended_pmi: vec![None; Self::NOF_LAYER_CHOICES],
            latest_csi_report: None,
            last_pusch_tpmi_select_info: None,
        }
    }

    pub fn update_pusch_snr(&mut self, snr_db: f32) {
        self.pusch_snr_db = Some(snr_db);
        self.average_pusch_sinr_db.push(snr_db);
    }

    pub fn get_pusch_snr(&self) -> Option<f32> {
        self.pusch_snr_db
    }

    pub fn get_pusch_average_sinr(&self) -> Option<f32> {
        self.average_pusch_sinr_db.get()
    }

    pub fn get_wideband_cqi(&self) -> Option<u8> {
        self.wideband_cqi
    }

    pub fn get_nof_dl_layers(&self) -> u8 {
        self.recommended_dl_layers
    }

    /// Outside an enterprise scheduler build UL layers are always reported
    /// as 1, matching the original's open-source fallback.
    pub fn get_nof_ul_layers(&self) -> u8 {
        1
    }

    pub fn get_latest_csi_report(&self) -> Option<CsiReport> {
        self.latest_csi_report
    }

    pub fn get_latest_tpmi_select_info(&self) -> Option<&PuschTpmiSelectInfo> {
        self.last_pusch_tpmi_select_info.as_ref()
    }

    /// Returns 0 if no TPMI info is available yet or `nof_layers` is out of
    /// range, else the selected TPMI for that layer count.
    pub fn get_recommended_pusch_tpmi(&self, nof_layers: usize) -> u32 {
        self.last_pusch_tpmi_select_info
            .as_ref()
            .and_then(|info| info.get_tpmi_select(nof_layers))
            .map(|sel| sel.tpmi)
            .unwrap_or(0)
    }

    fn nof_layers_to_index(nof_layers: u8) -> usize {
        (nof_layers.saturating_sub(1)) as usize
    }

    /// Folds a CSI report into the state. Returns `false` if the report is
    /// structurally inconsistent with the configured port count (RI exceeds
    /// DL ports, or PMI reported on a single DL port).
    pub fn handle_csi_report(&mut self, report: CsiReport) -> bool {
        self.latest_csi_report = Some(report);

        if let Some(cqi) = report.first_tb_wideband_cqi {
            self.wideband_cqi = Some(cqi);
        }

        if let Some(ri) = report.ri {
            if ri > self.nof_dl_ports {
                return false;
            }
            self.recommended_dl_layers = ri;
        }

        if let Some(pmi) = report.pmi {
            if self.nof_dl_ports <= 1 {
                return false;
            }
            let idx = Self::nof_layers_to_index(self.recommended_dl_layers).min(self.recommended_pmi.len() - 1);
            self.recommended_pmi[idx] = Some(pmi);
        }

        true
    }

    pub fn set_tpmi_select_info(&mut self, info: PuschTpmiSelectInfo) {
        self.last_pusch_tpmi_select_info = Some(info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_point_system_slot_orders_by_sfn_then_slot() {
        let a = SlotPoint::new(1, 0, 1);
        let b = SlotPoint::new(1, 0, 0);
        let c = SlotPoint::new(1, 1, 0);
        assert!(a.system_slot() > b.system_slot());
        assert!(c.system_slot() > a.system_slot());
    }

    #[test]
    fn srs_resource_configuration_rejects_hopping() {
        let mut cfg = valid_srs_config();
        cfg.hopping = GroupOrSequenceHopping::GroupHopping;
        assert!(!cfg.is_valid());
    }

    #[test]
    fn srs_resource_configuration_rejects_overflowing_symbol_range() {
        let mut cfg = valid_srs_config();
        cfg.start_symbol = 13;
        cfg.nof_symbols = OneTwoFour::Four;
        assert!(!cfg.is_valid());
    }

    fn valid_srs_config() -> SrsResourceConfiguration {
        SrsResourceConfiguration {
            nof_antenna_ports: OneTwoFour::Two,
            nof_symbols: OneTwoFour::Four,
            start_symbol: 10,
            configuration_index: 0,
            sequence_id: 0,
            bandwidth_index: 0,
            comb_size: CombSize::Two,
            comb_offset: 0,
            cyclic_shift: 0,
            freq_position: 0,
            freq_shift: 0,
            freq_hopping: 0,
            hopping: GroupOrSequenceHopping::Neither,
            periodicity: None,
        }
    }

    #[test]
    fn channel_matrix_normalize_is_scale_and_phase_invariant() {
        let m = SrsChannelMatrix::from_coefficients(
            2,
            1,
            vec![Complex32::new(2.0, 0.0), Complex32::new(1.0, 1.0)],
        );
        let scaled = {
            let mut s = m.clone();
            s.scale(3.0);
            s
        };
        assert!(m.is_near(&scaled, 1e-4));
    }

    #[test]
    fn exp_average_fast_start_takes_first_sample_verbatim() {
        let mut avg = ExpAverageFastStart::new(0.5);
        avg.push(10.0);
        assert_eq!(avg.get(), Some(10.0));
        avg.push(20.0);
        assert_eq!(avg.get(), Some(15.0));
    }

    #[test]
    fn channel_state_rejects_ri_exceeding_dl_ports() {
        let mut state = ChannelState::new(2);
        let report = CsiReport { ri: Some(3), ..Default::default() };
        assert!(!state.handle_csi_report(report));
    }

    #[test]
    fn channel_state_recommended_tpmi_defaults_to_zero() {
        let state = ChannelState::new(2);
        assert_eq!(state.get_recommended_pusch_tpmi(1), 0);
    }
}
