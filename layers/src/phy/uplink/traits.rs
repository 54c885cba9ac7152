//! Narrow capability interfaces consumed by the uplink core (SPEC_FULL.md §6).
//!
//! Everything here is implemented by collaborators outside this crate's
//! scope: hardware-accelerator bindings, the concrete DSP kernels, the
//! rate-matching buffer pool, and the executor backing threads. The core
//! only ever talks to these traits.

use num_complex::Complex32;

use super::pdu_repository::PucchFormat1Batch;
use super::types::{
    PucchFormatConfig, PucchPdu, PuschPdu, SlotPoint, SrsEstimatorResult, SrsPdu, TimeAlignmentMeasurement,
    UciStatus, UlReceptionContext,
};
use common::types::Rnti;

/// Random-access, read-only view of complex samples for one slot, indexed by
/// (port, symbol, subcarrier).
pub trait ResourceGridReader: Send + Sync {
    /// Copies `out.len()` samples starting at subcarrier `k0`, with the given
    /// stride, from `symbol` on `port`, into `out`.
    fn get(&self, out: &mut [Complex32], port: usize, symbol: usize, k0: usize, stride: usize);

    fn nof_ports(&self) -> usize;
    fn nof_symbols(&self) -> usize;
}

/// Random-access, write-only view of the same grid, used by the PHY tap.
pub trait ResourceGridWriter: Send + Sync {
    fn put(&mut self, samples: &[Complex32], port: usize, symbol: usize, k0: usize, stride: usize);
}

/// Generates the low-PAPR (Zadoff-Chu derived) reference sequences used by
/// SRS and PUCCH/PUSCH DM-RS, TS 38.211 §5.2.2.
pub trait LowPaprSequenceGenerator: Send + Sync {
    /// Fills `out` with a sequence of length `out.len()` for group `u`,
    /// sequence number `v`, cyclic shift `n_cs` out of `n_cs_max`.
    fn generate(&self, out: &mut [Complex32], u: u32, v: u32, n_cs: u8, n_cs_max: u8);
}

/// Estimates residual time alignment from a stack of per-Rx-port
/// least-squares channel estimates.
pub trait TimeAlignmentEstimator: Send + Sync {
    fn estimate(&self, re_buffer: &[Complex32], comb: usize, scs_khz: u32, max_ta_seconds: f64) -> TimeAlignmentMeasurement;
}

/// Outcome of a PUSCH decode: the two-stage notifier invoked by the PUSCH
/// processor, control (UCI) first, then data (SCH); `configure` binds the
/// processor's callback to one specific PDU before `process` is invoked.
pub trait PuschProcessorResultNotifier: Send {
    fn on_uci(&mut self, harq_ack_status: UciStatus);
    fn on_sch(&mut self, tb_crc_ok: bool, payload: &[u8]);
}

/// PUSCH decoder, consumed through a narrow interface; the concrete LDPC /
/// rate-dematching / modulation-mapping kernels are external.
pub trait PuschProcessor: Send + Sync {
    fn is_valid(&self, pdu: &PuschPdu) -> bool;

    fn process(
        &self,
        grid: &dyn ResourceGridReader,
        pdu: &PuschPdu,
        payload: &mut [u8],
        notifier: &mut dyn PuschProcessorResultNotifier,
    );
}

/// Result of one PUCCH format's reception for one UE.
#[derive(Debug, Clone)]
pub struct PucchProcessorResult {
    pub context: UlReceptionContext,
    pub uci_status: UciStatus,
    pub harq_ack_bits: Vec<bool>,
}

/// PUCCH receiver, dispatched by format through the slot processor.
pub trait PucchProcessor: Send + Sync {
    fn is_valid(&self, pdu: &PucchPdu) -> bool;

    fn process(&self, grid: &dyn ResourceGridReader, pdu: &PucchPdu) -> PucchProcessorResult;

    /// Batched Format-1 reception: one call covering every UE sharing a
    /// common Format-1 configuration, returning one result per UE.
    fn process_format1_batch(
        &self,
        grid: &dyn ResourceGridReader,
        common: &PucchFormatConfig,
        ue_contexts: &[UlReceptionContext],
    ) -> Vec<PucchProcessorResult>;
}

/// Raw PRACH capture buffer handed to the detector.
pub struct PrachBuffer<'a> {
    pub samples: &'a [Complex32],
}

/// Detection context: which preamble index / occasion this capture covers.
#[derive(Debug, Clone, Copy)]
pub struct PrachContext {
    pub slot: SlotPoint,
    pub sector_id: u16,
}

/// Result of one PRACH detection attempt.
#[derive(Debug, Clone)]
pub struct PrachDetectionResult {
    pub detected_preambles: Vec<(u8, f32)>,
}

/// PRACH detector; symbol-independent, dispatched off its own counter rather
/// than the PDU FSM (SPEC_FULL.md §4.4).
pub trait PrachDetector: Send + Sync {
    fn detect(&self, buffer: &PrachBuffer<'_>, context: &PrachContext) -> PrachDetectionResult;
}

/// Reservation handle for a rate-matching receive buffer; dropping it
/// returns the buffer to the pool.
pub trait RxBuffer: Send {}

/// Single-consumer-per-(HARQ id, slot) rate-matching buffer pool.
pub trait RateMatchBufferPool: Send + Sync {
    fn reserve(&self, slot: SlotPoint, harq_id: u8, nof_codeblocks: u16, new_data: bool) -> Option<Box<dyn RxBuffer>>;

    /// Advances the pool's internal slot bookkeeping; called once per slot
    /// when `end_symbol_index == 0`.
    fn run_slot(&self, slot: SlotPoint);
}

/// Non-blocking task executor: `execute` either accepts the closure (it will
/// run to completion exactly once) or rejects it (returns `false`); never
/// blocks the caller.
pub trait Executor: Send + Sync {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) -> bool;
    fn defer(&self, task: Box<dyn FnOnce() + Send>) -> bool {
        self.execute(task)
    }
}

/// Optional PHY tap: observes the grid and the PDU lists dispatched at a
/// symbol boundary, and is also notified of symbols carrying no PDUs at all.
///
/// Takes only read access to the grid: the grid is shared via an atomic
/// reference count with the PUSCH/PUCCH/SRS tasks dispatched for the same
/// symbol (SPEC_FULL.md §5), so a mutable borrow is not obtainable here
/// without re-architecting grid ownership. `grid_writer` is deliberately
/// absent from this signature for that reason.
pub trait PhyTap: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    fn handle_ul_symbol(
        &self,
        grid_reader: &dyn ResourceGridReader,
        slot: SlotPoint,
        symbol: usize,
        pusch_list: &[PuschPdu],
        pucch_list: &[PucchPdu],
        pucch_f1_list: &[PucchFormat1Batch],
        srs_list: &[SrsPdu],
    );

    fn handle_quiet_grid(&self, grid_reader: &dyn ResourceGridReader, slot: SlotPoint);
}

/// PRACH detection result delivered to the MAC.
#[derive(Debug, Clone)]
pub struct UlPrachResults {
    pub context: PrachContext,
    pub detection: PrachDetectionResult,
}

/// Control (UCI-on-PUSCH) result delivered to the MAC.
#[derive(Debug, Clone)]
pub struct UlPuschResultsControl {
    pub rnti: Rnti,
    pub harq_id: u8,
    pub uci_status: UciStatus,
}

impl UlPuschResultsControl {
    pub fn create_discarded(rnti: Rnti, harq_id: u8) -> Self {
        Self { rnti, harq_id, uci_status: UciStatus::Unknown }
    }
}

/// Data (SCH) result delivered to the MAC.
#[derive(Debug, Clone)]
pub struct UlPuschResultsData {
    pub rnti: Rnti,
    pub harq_id: u8,
    pub tb_crc_ok: bool,
    pub payload: Vec<u8>,
}

impl UlPuschResultsData {
    pub fn create_discarded(rnti: Rnti, harq_id: u8) -> Self {
        Self { rnti, harq_id, tb_crc_ok: false, payload: Vec::new() }
    }
}

/// PUCCH result delivered to the MAC.
#[derive(Debug, Clone)]
pub struct UlPucchResults {
    pub context: UlReceptionContext,
    pub uci_status: UciStatus,
    pub harq_ack_bits: Vec<bool>,
}

impl UlPucchResults {
    pub fn create_discarded(context: UlReceptionContext) -> Self {
        Self { context, uci_status: UciStatus::Unknown, harq_ack_bits: Vec::new() }
    }
}

/// SRS result delivered to the MAC/scheduler.
#[derive(Debug, Clone)]
pub struct UlSrsResults {
    pub context: UlReceptionContext,
    pub estimate: SrsEstimatorResult,
}

/// Result notifier exposed to the MAC/FAPI translation layer
/// (SPEC_FULL.md §6 "Exposed").
pub trait UpperPhyRxResultsNotifier: Send + Sync {
    fn on_new_prach_results(&self, results: UlPrachResults);
    fn on_new_pusch_results_control(&self, results: UlPuschResultsControl);
    fn on_new_pusch_results_data(&self, results: UlPuschResultsData);
    fn on_new_pucch_results(&self, results: UlPucchResults);
    fn on_new_srs_results(&self, results: UlSrsResults);
}
