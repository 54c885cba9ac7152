//! Per-slot orchestrator: wires the FSM, the PDU repository, and the
//! consumed processor/executor collaborators together (SPEC_FULL.md §4, §7).
//!
//! One `SlotProcessor` instance is reused slot after slot (`ProcessorPool`
//! owns the pool); `get_pdu_slot_repository` resets it for a new slot and
//! `handle_rx_symbol` is called once per OFDM symbol boundary to dispatch
//! whatever PDUs are due.

use std::sync::{Arc, Mutex};

use common::types::Rnti;
use tracing::{debug, trace, warn};

use super::channel_state_manager::ChannelStateManager;
use super::fsm::UplinkProcessorFsm;
use super::pdu_repository::{PduSlotRepository, PucchFormat1Batch};
use super::srs_estimator::SrsEstimator;
use super::traits::{
    Executor, LowPaprSequenceGenerator, PhyTap, PrachBuffer, PrachContext, PrachDetector, PucchProcessor,
    PucchProcessorResult, PuschProcessor, PuschProcessorResultNotifier, RateMatchBufferPool, ResourceGridReader,
    ResourceGridWriter, TimeAlignmentEstimator, UlPrachResults, UlPucchResults, UlPuschResultsControl,
    UlPuschResultsData, UlSrsResults, UpperPhyRxResultsNotifier,
};
use super::types::{PucchFormatConfig, PucchPdu, PuschPdu, SlotPoint, SrsPdu, UciStatus};

/// Grid type bound shared by every trait that touches the resource grid.
pub trait SlotGrid: ResourceGridReader + ResourceGridWriter + 'static {}
impl<T: ResourceGridReader + ResourceGridWriter + 'static> SlotGrid for T {}

struct CollectingPuschNotifier {
    rnti: Rnti,
    harq_id: u8,
    notifier: Arc<dyn UpperPhyRxResultsNotifier>,
}

impl PuschProcessorResultNotifier for CollectingPuschNotifier {
    fn on_uci(&mut self, harq_ack_status: UciStatus) {
        self.notifier
            .on_new_pusch_results_control(UlPuschResultsControl { rnti: self.rnti, harq_id: self.harq_id, uci_status: harq_ack_status });
    }

    fn on_sch(&mut self, tb_crc_ok: bool, payload: &[u8]) {
        self.notifier
            .on_new_pusch_results_data(UlPuschResultsData { rnti: self.rnti, harq_id: self.harq_id, tb_crc_ok, payload: payload.to_vec() });
    }
}

/// Orchestrates admission, symbol-boundary dispatch, and discard for one
/// resource grid's worth of uplink reception.
pub struct SlotProcessor<G: SlotGrid> {
    fsm: Arc<UplinkProcessorFsm>,
    current_slot: Mutex<Option<SlotPoint>>,
    repository: Mutex<Option<Arc<Mutex<PduSlotRepository<G>>>>>,
    pusch_processor: Arc<dyn PuschProcessor>,
    pucch_processor: Arc<dyn PucchProcessor>,
    prach_detector: Arc<dyn PrachDetector>,
    rate_match_pool: Arc<dyn RateMatchBufferPool>,
    executor: Arc<dyn Executor>,
    notifier: Arc<dyn UpperPhyRxResultsNotifier>,
    phy_tap: Option<Arc<dyn PhyTap>>,
    srs_sequence_generator: Arc<dyn LowPaprSequenceGenerator>,
    srs_ta_estimator: Arc<dyn TimeAlignmentEstimator>,
    channel_state_manager: Arc<ChannelStateManager>,
}

impl<G: SlotGrid> SlotProcessor<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pusch_processor: Arc<dyn PuschProcessor>,
        pucch_processor: Arc<dyn PucchProcessor>,
        prach_detector: Arc<dyn PrachDetector>,
        rate_match_pool: Arc<dyn RateMatchBufferPool>,
        executor: Arc<dyn Executor>,
        notifier: Arc<dyn UpperPhyRxResultsNotifier>,
        phy_tap: Option<Arc<dyn PhyTap>>,
        srs_sequence_generator: Arc<dyn LowPaprSequenceGenerator>,
        srs_ta_estimator: Arc<dyn TimeAlignmentEstimator>,
        channel_state_manager: Arc<ChannelStateManager>,
    ) -> Self {
        Self {
            fsm: Arc::new(UplinkProcessorFsm::new()),
            current_slot: Mutex::new(None),
            repository: Mutex::new(None),
            pusch_processor,
            pucch_processor,
            prach_detector,
            rate_match_pool,
            executor,
            notifier,
            phy_tap,
            srs_sequence_generator,
            srs_ta_estimator,
            channel_state_manager,
        }
    }

    pub fn is_accepting(&self) -> bool {
        self.fsm.is_accepting()
    }

    pub fn is_slot_valid(&self, slot: SlotPoint) -> bool {
        self.fsm.is_slot_valid(slot)
    }

    /// Opens admission for `slot` against `grid`. Returns `false` if the
    /// processor was not idle (a previous slot's repository was never
    /// released), in which case the caller must not admit PDUs this slot.
    pub fn get_pdu_slot_repository(&self, slot: SlotPoint, grid: Arc<G>) -> bool {
        if !self.fsm.start_new_slot(slot) {
            warn!(?slot, "slot processor was not idle, dropping new slot");
            return false;
        }
        // Drop the previous slot's repository before constructing the new one
        // so its `Drop` impl does not spin waiting on a grid clone that only
        // the about-to-be-overwritten `Arc` was holding alive.
        let mut repository = self.repository.lock().unwrap();
        let previous = repository.take();
        *self.current_slot.lock().unwrap() = Some(slot);
        *repository = Some(Arc::new(Mutex::new(PduSlotRepository::new(grid))));
        drop(repository);
        drop(previous);
        true
    }

    pub fn add_pusch_pdu(&self, pdu: PuschPdu) {
        if let Some(repo) = self.repository.lock().unwrap().as_ref() {
            if repo.lock().unwrap().add_pusch(pdu) {
                self.fsm.increment_pending_pdu_count();
            }
        }
    }

    pub fn add_pucch_pdu(&self, pdu: PucchPdu) {
        if let Some(repo) = self.repository.lock().unwrap().as_ref() {
            if let Some(true) = repo.lock().unwrap().add_pucch(pdu) {
                self.fsm.increment_pending_pdu_count();
            }
        }
    }

    pub fn add_srs_pdu(&self, pdu: SrsPdu) {
        if let Some(repo) = self.repository.lock().unwrap().as_ref() {
            if repo.lock().unwrap().add_srs(pdu) {
                self.fsm.increment_pending_pdu_count();
            }
        }
    }

    pub fn finish_adding_pdus(&self) {
        self.fsm.stop_accepting_pdu();
    }

    /// PRACH detection runs off its own counter, independent of the PDU FSM
    /// above (SPEC_FULL.md §4.4): it is not gated by `start_handle_rx_symbol`
    /// and can proceed even while the main FSM is locked or discarding.
    pub fn process_prach(&self, samples: &[num_complex::Complex32], context: PrachContext) {
        self.fsm.on_prach_detection();
        let detector = self.prach_detector.clone();
        let notifier = self.notifier.clone();
        let fsm = self.fsm.clone();
        let buffer_owned = samples.to_vec();
        let accepted = self.executor.execute(Box::new(move || {
            let buffer = PrachBuffer { samples: &buffer_owned };
            let detection = detector.detect(&buffer, &context);
            notifier.on_new_prach_results(UlPrachResults { context, detection });
            fsm.on_end_prach_detection();
        }));
        if !accepted {
            // No PRACH discard sentinel exists; a rejected detection attempt
            // simply never reports, matching the silent-drop SRS contract.
            self.fsm.on_end_prach_detection();
        }
    }

    /// Dispatches every PDU due at `symbol`. Returns `false` without
    /// dispatching anything if the FSM refuses the lock (stopped, already
    /// locked by a concurrent symbol or a discard, or nothing queued).
    ///
    /// `valid` reflects the lower layer's per-symbol capture status
    /// (SPEC_FULL.md §4.5, original `uplink_slot_processor.h`'s
    /// `handle_rx_symbol(end_symbol_index, is_valid)`); an invalid symbol
    /// still runs the symbol-0 rate-match pool turnover but never dispatches
    /// real kernel work against samples that are known to be bad.
    pub fn handle_rx_symbol(&self, symbol: usize, valid: bool) -> bool {
        if symbol == 0 {
            if let Some(slot) = *self.current_slot.lock().unwrap() {
                self.rate_match_pool.run_slot(slot);
            }
        }

        if !self.fsm.start_handle_rx_symbol() {
            return false;
        }

        let repo_handle = self.repository.lock().unwrap().clone();
        if let Some(repo_handle) = repo_handle {
            let (pusch_due, format1_due, other_due, srs_due) = {
                let repo = repo_handle.lock().unwrap();
                (
                    repo.pusch_due_at(symbol).to_vec(),
                    repo.pucch_format1_due_at(symbol).to_vec(),
                    repo.pucch_other_due_at(symbol).to_vec(),
                    repo.srs_due_at(symbol).to_vec(),
                )
            };

            let slot = *self.current_slot.lock().unwrap().as_ref().unwrap();

            if pusch_due.is_empty() && format1_due.is_empty() && other_due.is_empty() && srs_due.is_empty() {
                if let Some(tap) = &self.phy_tap {
                    let grid = repo_handle.lock().unwrap().grid().clone();
                    tap.handle_quiet_grid(grid.as_ref(), slot);
                }
            } else if let Some(tap) = &self.phy_tap {
                let grid = repo_handle.lock().unwrap().grid().clone();
                tap.handle_ul_symbol(grid.as_ref(), slot, symbol, &pusch_due, &other_due, &format1_due, &srs_due);
            }

            if valid {
                for pdu in pusch_due {
                    self.dispatch_pusch(&repo_handle, pdu);
                }
                for batch in format1_due {
                    self.dispatch_pucch_format1(&repo_handle, batch);
                }
                for pdu in other_due {
                    self.dispatch_pucch_other(&repo_handle, pdu);
                }
                for pdu in srs_due {
                    self.dispatch_srs(&repo_handle, pdu);
                }
            } else {
                debug!(symbol, "invalid symbol capture, discarding due pdus without dispatch");
                for pdu in pusch_due {
                    self.emit_discarded_pusch(&pdu);
                    self.fsm.on_finish_processing_pdu();
                }
                for batch in format1_due {
                    for ctx in &batch.ue_contexts {
                        self.notifier.on_new_pucch_results(UlPucchResults::create_discarded(*ctx));
                    }
                    self.fsm.on_finish_processing_pdu();
                }
                for pdu in other_due {
                    self.notifier.on_new_pucch_results(UlPucchResults::create_discarded(pdu.context));
                    self.fsm.on_finish_processing_pdu();
                }
                for _srs in srs_due {
                    self.fsm.on_finish_processing_pdu();
                }
            }
        }

        self.fsm.finish_handle_rx_symbol();
        true
    }

    fn dispatch_pusch(&self, repo: &Arc<Mutex<PduSlotRepository<G>>>, pdu: PuschPdu) {
        if !self.fsm.on_create_pdu_task() {
            return;
        }
        let grid = repo.lock().unwrap().grid().clone();
        let processor = self.pusch_processor.clone();
        let notifier = self.notifier.clone();
        let fsm = self.fsm.clone();
        let rate_match_pool = self.rate_match_pool.clone();
        let slot = self.current_slot.lock().unwrap().unwrap();

        let reserved = rate_match_pool.reserve(slot, pdu.harq_id, pdu.nof_codeblocks, pdu.allocation.new_data);
        if reserved.is_none() {
            self.emit_discarded_pusch(&pdu);
            self.fsm.on_finish_processing_pdu();
            return;
        }

        let pdu_for_task = pdu.clone();
        let accepted = self.executor.execute(Box::new(move || {
            let _buffer = reserved;
            let mut payload = vec![0u8; pdu_for_task.tb_size_bytes as usize];
            let mut result_notifier = CollectingPuschNotifier { rnti: pdu_for_task.rnti, harq_id: pdu_for_task.harq_id, notifier };
            processor.process(grid.as_ref(), &pdu_for_task, &mut payload, &mut result_notifier);
            fsm.on_finish_processing_pdu();
        }));

        if !accepted {
            self.emit_discarded_pusch(&pdu);
            self.fsm.on_finish_processing_pdu();
        }
    }

    fn emit_discarded_pusch(&self, pdu: &PuschPdu) {
        if pdu.has_uci() {
            self.notifier.on_new_pusch_results_control(UlPuschResultsControl::create_discarded(pdu.rnti, pdu.harq_id));
        }
        self.notifier.on_new_pusch_results_data(UlPuschResultsData::create_discarded(pdu.rnti, pdu.harq_id));
    }

    fn dispatch_pucch_format1(&self, repo: &Arc<Mutex<PduSlotRepository<G>>>, batch: PucchFormat1Batch) {
        if !self.fsm.on_create_pdu_task() {
            return;
        }
        let grid = repo.lock().unwrap().grid().clone();
        let processor = self.pucch_processor.clone();
        let notifier = self.notifier.clone();
        let fsm = self.fsm.clone();

        let common_cfg = super::types::PucchFormat1Config {
            start_symbol_index: batch.common.start_symbol_index,
            nof_symbols: batch.common.nof_symbols,
            initial_cyclic_shift: 0,
            time_domain_occ: 0,
            nof_harq_ack: 1,
        };
        let ue_contexts = batch.ue_contexts.clone();
        let accepted = self.executor.execute(Box::new(move || {
            let config = PucchFormatConfig::Format1(common_cfg);
            let results = processor.process_format1_batch(grid.as_ref(), &config, &ue_contexts);
            for result in results {
                notifier.on_new_pucch_results(UlPucchResults {
                    context: result.context,
                    uci_status: result.uci_status,
                    harq_ack_bits: result.harq_ack_bits,
                });
            }
            fsm.on_finish_processing_pdu();
        }));

        if !accepted {
            for ctx in &batch.ue_contexts {
                self.notifier.on_new_pucch_results(UlPucchResults::create_discarded(*ctx));
            }
            self.fsm.on_finish_processing_pdu();
        }
    }

    fn dispatch_pucch_other(&self, repo: &Arc<Mutex<PduSlotRepository<G>>>, pdu: PucchPdu) {
        if !self.fsm.on_create_pdu_task() {
            return;
        }
        let grid = repo.lock().unwrap().grid().clone();
        let processor = self.pucch_processor.clone();
        let notifier = self.notifier.clone();
        let fsm = self.fsm.clone();

        let pdu_for_task = pdu.clone();
        let accepted = self.executor.execute(Box::new(move || {
            let result: PucchProcessorResult = processor.process(grid.as_ref(), &pdu_for_task);
            notifier.on_new_pucch_results(UlPucchResults {
                context: result.context,
                uci_status: result.uci_status,
                harq_ack_bits: result.harq_ack_bits,
            });
            fsm.on_finish_processing_pdu();
        }));

        if !accepted {
            self.notifier.on_new_pucch_results(UlPucchResults::create_discarded(pdu.context));
            self.fsm.on_finish_processing_pdu();
        }
    }

    /// SRS executor rejection is a silent drop (SPEC_FULL.md §4.5): no
    /// discarded-SRS sentinel exists, the FSM unit is simply retired.
    fn dispatch_srs(&self, repo: &Arc<Mutex<PduSlotRepository<G>>>, pdu: SrsPdu) {
        if !self.fsm.on_create_pdu_task() {
            return;
        }
        let grid = repo.lock().unwrap().grid().clone();
        let notifier = self.notifier.clone();
        let fsm = self.fsm.clone();
        let sequence_generator = self.srs_sequence_generator.clone();
        let ta_estimator = self.srs_ta_estimator.clone();
        let channel_state_manager = self.channel_state_manager.clone();
        let scs_khz = 15u32 << pdu.context.slot.numerology;

        let accepted = self.executor.execute(Box::new(move || {
            let estimator = SrsEstimator::new(sequence_generator.as_ref(), ta_estimator.as_ref());
            let estimate = estimator.estimate(grid.as_ref(), &pdu.config, scs_khz);
            channel_state_manager.update_srs_channel_matrix(pdu.context.rnti, &estimate);
            trace!(rnti = ?pdu.context.rnti, "srs estimate published");
            notifier.on_new_srs_results(UlSrsResults { context: pdu.context, estimate });
            fsm.on_finish_processing_pdu();
        }));

        if !accepted {
            debug!("srs task rejected by executor, dropping silently");
            self.fsm.on_finish_processing_pdu();
        }
    }

    /// Discards every PDU still pending for the current slot: takes the
    /// locked bit, drains the repository, emits discard sentinels (SRS
    /// excepted), and returns the FSM to idle. Returns `false` if discard was
    /// not possible (nothing pending, already locked, or stopped) — this is
    /// the resolved Open Question from SPEC_FULL.md §9: a concurrent
    /// `handle_rx_symbol` for a late symbol simply observes the locked bit
    /// and backs off, it is not an error.
    pub fn discard_slot(&self) -> bool {
        if !self.fsm.start_discard_slot() {
            return false;
        }

        if let Some(repo_handle) = self.repository.lock().unwrap().take() {
            let (pusch, format1, other, srs) = repo_handle.lock().unwrap().drain_discardable_from(0);

            for pdu in pusch {
                self.emit_discarded_pusch(&pdu);
                self.fsm.on_finish_processing_pdu();
            }
            for batch in format1 {
                for ctx in &batch.ue_contexts {
                    self.notifier.on_new_pucch_results(UlPucchResults::create_discarded(*ctx));
                }
                self.fsm.on_finish_processing_pdu();
            }
            for pdu in other {
                self.notifier.on_new_pucch_results(UlPucchResults::create_discarded(pdu.context));
                self.fsm.on_finish_processing_pdu();
            }
            for _srs in srs {
                self.fsm.on_finish_processing_pdu();
            }
        }

        self.fsm.finish_discard_slot();
        true
    }

    pub fn stop(&self) {
        self.fsm.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::traits::{PrachDetectionResult, ResourceGridReader, ResourceGridWriter};
    use super::super::types::{CodebookSubset, PuschAllocation, TimeAlignmentMeasurement, UlReceptionContext};
    use num_complex::Complex32;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct NullSequenceGenerator;
    impl LowPaprSequenceGenerator for NullSequenceGenerator {
        fn generate(&self, out: &mut [Complex32], _u: u32, _v: u32, _n_cs: u8, _n_cs_max: u8) {
            out.fill(Complex32::new(1.0, 0.0));
        }
    }

    struct ZeroTaEstimator;
    impl TimeAlignmentEstimator for ZeroTaEstimator {
        fn estimate(&self, _re_buffer: &[Complex32], _comb: usize, _scs_khz: u32, _max_ta_seconds: f64) -> TimeAlignmentMeasurement {
            TimeAlignmentMeasurement { value_seconds: 0.0, resolution_seconds: 1e-9, min_seconds: -1e-6, max_seconds: 1e-6 }
        }
    }

    struct NullGrid;
    impl ResourceGridReader for NullGrid {
        fn get(&self, out: &mut [Complex32], _port: usize, _symbol: usize, _k0: usize, _stride: usize) {
            out.fill(Complex32::new(0.0, 0.0));
        }
        fn nof_ports(&self) -> usize {
            1
        }
        fn nof_symbols(&self) -> usize {
            14
        }
    }
    impl ResourceGridWriter for NullGrid {
        fn put(&mut self, _samples: &[Complex32], _port: usize, _symbol: usize, _k0: usize, _stride: usize) {}
    }

    struct ImmediateExecutor;
    impl Executor for ImmediateExecutor {
        fn execute(&self, task: Box<dyn FnOnce() + Send>) -> bool {
            task();
            true
        }
    }

    struct RejectingExecutor;
    impl Executor for RejectingExecutor {
        fn execute(&self, _task: Box<dyn FnOnce() + Send>) -> bool {
            false
        }
    }

    struct NullPusch;
    impl PuschProcessor for NullPusch {
        fn is_valid(&self, _pdu: &PuschPdu) -> bool {
            true
        }
        fn process(&self, _grid: &dyn ResourceGridReader, _pdu: &PuschPdu, _payload: &mut [u8], notifier: &mut dyn PuschProcessorResultNotifier) {
            notifier.on_uci(UciStatus::Valid);
            notifier.on_sch(true, &[0u8; 4]);
        }
    }

    struct NullPucch;
    impl PucchProcessor for NullPucch {
        fn is_valid(&self, _pdu: &PucchPdu) -> bool {
            true
        }
        fn process(&self, _grid: &dyn ResourceGridReader, pdu: &PucchPdu) -> PucchProcessorResult {
            PucchProcessorResult { context: pdu.context, uci_status: UciStatus::Valid, harq_ack_bits: vec![true] }
        }
        fn process_format1_batch(&self, _grid: &dyn ResourceGridReader, _common: &PucchFormatConfig, ue_contexts: &[UlReceptionContext]) -> Vec<PucchProcessorResult> {
            ue_contexts
                .iter()
                .map(|ctx| PucchProcessorResult { context: *ctx, uci_status: UciStatus::Valid, harq_ack_bits: vec![true] })
                .collect()
        }
    }

    struct NullPrach;
    impl PrachDetector for NullPrach {
        fn detect(&self, _buffer: &PrachBuffer<'_>, _context: &PrachContext) -> PrachDetectionResult {
            PrachDetectionResult { detected_preambles: vec![] }
        }
    }

    struct AlwaysReserve;
    impl RateMatchBufferPool for AlwaysReserve {
        fn reserve(&self, _slot: SlotPoint, _harq_id: u8, _nof_codeblocks: u16, _new_data: bool) -> Option<Box<dyn super::super::traits::RxBuffer>> {
            struct Dummy;
            impl super::super::traits::RxBuffer for Dummy {}
            Some(Box::new(Dummy))
        }
        fn run_slot(&self, _slot: SlotPoint) {}
    }

    struct CountingNotifier {
        pusch_data: AtomicUsize,
        pucch: AtomicUsize,
        prach: AtomicBool,
    }
    impl UpperPhyRxResultsNotifier for CountingNotifier {
        fn on_new_prach_results(&self, _results: UlPrachResults) {
            self.prach.store(true, Ordering::Relaxed);
        }
        fn on_new_pusch_results_control(&self, _results: UlPuschResultsControl) {}
        fn on_new_pusch_results_data(&self, _results: UlPuschResultsData) {
            self.pusch_data.fetch_add(1, Ordering::Relaxed);
        }
        fn on_new_pucch_results(&self, _results: UlPucchResults) {
            self.pucch.fetch_add(1, Ordering::Relaxed);
        }
        fn on_new_srs_results(&self, _results: UlSrsResults) {}
    }

    fn processor(executor: Arc<dyn Executor>, notifier: Arc<CountingNotifier>) -> SlotProcessor<NullGrid> {
        SlotProcessor::new(
            Arc::new(NullPusch),
            Arc::new(NullPucch),
            Arc::new(NullPrach),
            Arc::new(AlwaysReserve),
            executor,
            notifier,
            None,
            Arc::new(NullSequenceGenerator),
            Arc::new(ZeroTaEstimator),
            Arc::new(ChannelStateManager::new(2, 4, CodebookSubset::FullyAndPartialAndNonCoherent)),
        )
    }

    fn pusch_pdu(rnti: u16) -> PuschPdu {
        PuschPdu {
            rnti: Rnti::new(rnti),
            harq_id: 0,
            tb_size_bytes: 4,
            allocation: PuschAllocation {
                start_symbol_index: 0,
                nof_symbols: 2,
                start_rb: 0,
                nof_rb: 10,
                nof_layers: 1,
                mcs_index: 5,
                redundancy_version: 0,
                new_data: true,
            },
            nof_harq_ack_bits: 0,
            nof_codeblocks: 1,
        }
    }

    #[test]
    fn end_to_end_pusch_dispatch_reaches_notifier() {
        let notifier = Arc::new(CountingNotifier { pusch_data: AtomicUsize::new(0), pucch: AtomicUsize::new(0), prach: AtomicBool::new(false) });
        let slot_processor = processor(Arc::new(ImmediateExecutor), notifier.clone());

        let slot = SlotPoint::new(1, 0, 0);
        assert!(slot_processor.get_pdu_slot_repository(slot, Arc::new(NullGrid)));
        slot_processor.add_pusch_pdu(pusch_pdu(5));
        slot_processor.finish_adding_pdus();

        assert!(slot_processor.handle_rx_symbol(1, true));
        assert_eq!(notifier.pusch_data.load(Ordering::Relaxed), 1);
        assert!(slot_processor.get_pdu_slot_repository(SlotPoint::new(1, 0, 1), Arc::new(NullGrid)), "fsm must have drained back to idle");
    }

    #[test]
    fn rejected_executor_task_emits_discard_sentinel() {
        let notifier = Arc::new(CountingNotifier { pusch_data: AtomicUsize::new(0), pucch: AtomicUsize::new(0), prach: AtomicBool::new(false) });
        let slot_processor = processor(Arc::new(RejectingExecutor), notifier.clone());

        let slot = SlotPoint::new(1, 0, 0);
        slot_processor.get_pdu_slot_repository(slot, Arc::new(NullGrid));
        slot_processor.add_pusch_pdu(pusch_pdu(5));
        slot_processor.finish_adding_pdus();

        slot_processor.handle_rx_symbol(1, true);
        assert_eq!(notifier.pusch_data.load(Ordering::Relaxed), 1, "discard sentinel still reaches the notifier");
    }

    #[test]
    fn discard_slot_drains_without_notifying_srs() {
        let notifier = Arc::new(CountingNotifier { pusch_data: AtomicUsize::new(0), pucch: AtomicUsize::new(0), prach: AtomicBool::new(false) });
        let slot_processor = processor(Arc::new(ImmediateExecutor), notifier.clone());

        let slot = SlotPoint::new(1, 0, 0);
        slot_processor.get_pdu_slot_repository(slot, Arc::new(NullGrid));
        slot_processor.add_srs_pdu(SrsPdu {
            context: UlReceptionContext { slot, sector_id: 0, rnti: Rnti::new(9) },
            config: super::super::types::SrsResourceConfiguration {
                nof_antenna_ports: super::super::types::OneTwoFour::One,
                nof_symbols: super::super::types::OneTwoFour::One,
                start_symbol: 13,
                configuration_index: 0,
                sequence_id: 0,
                bandwidth_index: 0,
                comb_size: super::super::types::CombSize::Two,
                comb_offset: 0,
                cyclic_shift: 0,
                freq_position: 0,
                freq_shift: 0,
                freq_hopping: 0,
                hopping: super::super::types::GroupOrSequenceHopping::Neither,
                periodicity: None,
            },
        });
        slot_processor.finish_adding_pdus();

        assert!(slot_processor.discard_slot());
        assert_eq!(notifier.pucch.load(Ordering::Relaxed), 0);
        assert!(slot_processor.get_pdu_slot_repository(SlotPoint::new(1, 0, 1), Arc::new(NullGrid)));
    }

    #[test]
    fn late_handle_rx_symbol_after_discard_is_a_noop_not_an_error() {
        let notifier = Arc::new(CountingNotifier { pusch_data: AtomicUsize::new(0), pucch: AtomicUsize::new(0), prach: AtomicBool::new(false) });
        let slot_processor = processor(Arc::new(ImmediateExecutor), notifier);

        let slot = SlotPoint::new(1, 0, 0);
        slot_processor.get_pdu_slot_repository(slot, Arc::new(NullGrid));
        slot_processor.add_pusch_pdu(pusch_pdu(1));
        slot_processor.finish_adding_pdus();

        assert!(slot_processor.discard_slot());
        assert!(!slot_processor.handle_rx_symbol(2, true), "late symbol must back off, not panic or error");
    }
}
