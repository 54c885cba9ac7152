//! Pool of per-numerology `SlotProcessor`s with round-robin assignment
//! (SPEC_FULL.md §4.6).
//!
//! Each active numerology gets its own vector of processors so two
//! concurrent slots at the same numerology never contend for the same FSM;
//! a fixed-size circular array maps `system_slot() % CIRCULAR_ASSIGNMENT_LEN`
//! to a processor index, matching the teacher's round-robin dispatch used
//! elsewhere in the PHY for worker assignment.

use std::sync::Arc;

use tracing::warn;

use super::channel_state_manager::ChannelStateManager;
use super::config::UplinkCoreConfig;
use super::slot_processor::{SlotGrid, SlotProcessor};
use super::traits::{
    Executor, LowPaprSequenceGenerator, PhyTap, PrachDetector, PucchProcessor, PuschProcessor, RateMatchBufferPool,
    TimeAlignmentEstimator, UpperPhyRxResultsNotifier,
};
use super::types::SlotPoint;

/// Circular assignment array length; sized generously above any realistic
/// per-numerology concurrency so collisions between in-flight slots are rare.
const CIRCULAR_ASSIGNMENT_LEN: usize = 16;

/// One numerology's pool of reusable slot processors.
struct NumerologyPool<G: SlotGrid> {
    processors: Vec<Arc<SlotProcessor<G>>>,
}

impl<G: SlotGrid> NumerologyPool<G> {
    fn processor_for(&self, slot: SlotPoint) -> &Arc<SlotProcessor<G>> {
        let index = (slot.system_slot() as usize % CIRCULAR_ASSIGNMENT_LEN) % self.processors.len();
        &self.processors[index]
    }
}

/// Top-level uplink processor pool: one `NumerologyPool` per active
/// numerology (0..5), built once from `UplinkCoreConfig::active_scs` and
/// `max_concurrency`.
pub struct UplinkProcessorPool<G: SlotGrid> {
    pools: Vec<Option<NumerologyPool<G>>>,
    default_numerology: u8,
}

impl<G: SlotGrid> UplinkProcessorPool<G> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &UplinkCoreConfig,
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
        let mut pools = Vec::with_capacity(5);
        let mut default_numerology = 0u8;
        for numerology in 0u8..5 {
            if config.is_numerology_active(numerology) {
                default_numerology = numerology;
                let processors = (0..config.max_concurrency.max(1))
                    .map(|_| {
                        Arc::new(SlotProcessor::new(
                            pusch_processor.clone(),
                            pucch_processor.clone(),
                            prach_detector.clone(),
                            rate_match_pool.clone(),
                            executor.clone(),
                            notifier.clone(),
                            phy_tap.clone(),
                            srs_sequence_generator.clone(),
                            srs_ta_estimator.clone(),
                            channel_state_manager.clone(),
                        ))
                    })
                    .collect();
                pools.push(Some(NumerologyPool { processors }));
            } else {
                pools.push(None);
            }
        }
        Self { pools, default_numerology }
    }

    /// Returns the processor assigned to `slot`, falling back to the default
    /// active numerology's pool (logged once) if `slot`'s own numerology is
    /// not configured active — this should not happen in a correctly
    /// configured cell, but a dangling reference beats a panic on the data
    /// plane.
    pub fn processor_for(&self, slot: SlotPoint) -> Arc<SlotProcessor<G>> {
        if let Some(Some(pool)) = self.pools.get(slot.numerology as usize) {
            return pool.processor_for(slot).clone();
        }
        warn!(numerology = slot.numerology, "no pool configured for this numerology, using default");
        self.pools[self.default_numerology as usize]
            .as_ref()
            .expect("at least one numerology must be active")
            .processor_for(slot)
            .clone()
    }

    pub fn stop(&self) {
        for pool in self.pools.iter().flatten() {
            for processor in &pool.processors {
                processor.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::traits::{
        PrachBuffer, PrachContext, PrachDetectionResult, PucchProcessorResult, PuschProcessorResultNotifier,
        ResourceGridReader, ResourceGridWriter, RxBuffer, UlPrachResults, UlPucchResults, UlPuschResultsControl,
        UlPuschResultsData, UlSrsResults,
    };
    use super::super::types::{CodebookSubset, PucchFormatConfig, PucchPdu, PuschPdu, TimeAlignmentMeasurement, UciStatus, UlReceptionContext};
    use num_complex::Complex32;

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

    struct NullExecutor;
    impl Executor for NullExecutor {
        fn execute(&self, task: Box<dyn FnOnce() + Send>) -> bool {
            task();
            true
        }
    }

    struct NullPusch;
    impl PuschProcessor for NullPusch {
        fn is_valid(&self, _pdu: &PuschPdu) -> bool {
            true
        }
        fn process(&self, _grid: &dyn ResourceGridReader, _pdu: &PuschPdu, _payload: &mut [u8], _notifier: &mut dyn PuschProcessorResultNotifier) {}
    }

    struct NullPucch;
    impl PucchProcessor for NullPucch {
        fn is_valid(&self, _pdu: &PucchPdu) -> bool {
            true
        }
        fn process(&self, _grid: &dyn ResourceGridReader, pdu: &PucchPdu) -> PucchProcessorResult {
            PucchProcessorResult { context: pdu.context, uci_status: UciStatus::Valid, harq_ack_bits: vec![] }
        }
        fn process_format1_batch(&self, _grid: &dyn ResourceGridReader, _common: &PucchFormatConfig, ue_contexts: &[UlReceptionContext]) -> Vec<PucchProcessorResult> {
            ue_contexts.iter().map(|ctx| PucchProcessorResult { context: *ctx, uci_status: UciStatus::Valid, harq_ack_bits: vec![] }).collect()
        }
    }

    struct NullPrach;
    impl PrachDetector for NullPrach {
        fn detect(&self, _buffer: &PrachBuffer<'_>, _context: &PrachContext) -> PrachDetectionResult {
            PrachDetectionResult { detected_preambles: vec![] }
        }
    }

    struct NullRateMatch;
    impl RateMatchBufferPool for NullRateMatch {
        fn reserve(&self, _slot: SlotPoint, _harq_id: u8, _nof_codeblocks: u16, _new_data: bool) -> Option<Box<dyn RxBuffer>> {
            struct Dummy;
            impl RxBuffer for Dummy {}
            Some(Box::new(Dummy))
        }
        fn run_slot(&self, _slot: SlotPoint) {}
    }

    struct NullNotifier;
    impl UpperPhyRxResultsNotifier for NullNotifier {
        fn on_new_prach_results(&self, _results: UlPrachResults) {}
        fn on_new_pusch_results_control(&self, _results: UlPuschResultsControl) {}
        fn on_new_pusch_results_data(&self, _results: UlPuschResultsData) {}
        fn on_new_pucch_results(&self, _results: UlPucchResults) {}
        fn on_new_srs_results(&self, _results: UlSrsResults) {}
    }

    fn pool() -> UplinkProcessorPool<NullGrid> {
        let mut config = UplinkCoreConfig::default();
        config.active_scs = 0b0000_0011; // numerologies 0 and 1
        config.max_concurrency = 2;
        UplinkProcessorPool::new(
            &config,
            Arc::new(NullPusch),
            Arc::new(NullPucch),
            Arc::new(NullPrach),
            Arc::new(NullRateMatch),
            Arc::new(NullExecutor),
            Arc::new(NullNotifier),
            None,
            Arc::new(NullSequenceGenerator),
            Arc::new(ZeroTaEstimator),
            Arc::new(ChannelStateManager::new(2, 4, CodebookSubset::FullyAndPartialAndNonCoherent)),
        )
    }

    #[test]
    fn round_robin_assigns_distinct_processors_for_distinct_slots() {
        let pool = pool();
        let p0 = pool.processor_for(SlotPoint::new(1, 0, 0));
        let p1 = pool.processor_for(SlotPoint::new(1, 0, 1));
        assert!(!Arc::ptr_eq(&p0, &p1), "consecutive slots must not collide in a 2-wide pool");
    }

    #[test]
    fn same_slot_maps_to_same_processor() {
        let pool = pool();
        let p0 = pool.processor_for(SlotPoint::new(1, 5, 2));
        let p1 = pool.processor_for(SlotPoint::new(1, 5, 2));
        assert!(Arc::ptr_eq(&p0, &p1));
    }

    #[test]
    fn inactive_numerology_falls_back_to_default() {
        let pool = pool();
        let _ = pool.processor_for(SlotPoint::new(4, 0, 0));
    }
}
