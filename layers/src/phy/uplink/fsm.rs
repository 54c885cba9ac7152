//! Lock-free per-slot finite-state machine (SPEC_FULL.md §4.4).
//!
//! One 32-bit atomic word tracks admission, the locked critical section, and
//! the in-queue / in-execution PDU counts; a second atomic tracks pending
//! PRACH detections independently. All transitions are CAS loops; there are
//! no mutexes and no blocking waits except the 10 µs back-off in `stop()`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use super::types::SlotPoint;

const ACCEPTING_MASK: u32 = 0x8000_0000;
const LOCKED_MASK: u32 = 0x4000_0000;
const STATE_IDLE: u32 = 0x0000_0000;
const STATE_STOPPED: u32 = 0x7FFF_FFFF;
const INC_QUEUE: u32 = 0x1;
const INC_EXEC: u32 = 0x1000;
const MASK_EXEC: u32 = 0x00FF_F000; // bits 23:12
const MASK_QUEUE: u32 = 0x0000_0FFF; // bits 11:0

const DRAIN_BACKOFF: Duration = Duration::from_micros(10);

fn is_accepting(state: u32) -> bool {
    state & ACCEPTING_MASK != 0
}

fn is_locked(state: u32) -> bool {
    state & LOCKED_MASK != 0
}

fn is_idle(state: u32) -> bool {
    state == STATE_IDLE
}

fn is_stopped(state: u32) -> bool {
    state == STATE_STOPPED
}

fn exec_count(state: u32) -> u32 {
    (state & MASK_EXEC) >> 12
}

fn queue_count(state: u32) -> u32 {
    state & MASK_QUEUE
}

/// Per-slot admission/processing state machine.
pub struct UplinkProcessorFsm {
    state: AtomicU32,
    pending_prach_count: AtomicU32,
    configured_slot: Mutex<Option<SlotPoint>>,
}

impl Default for UplinkProcessorFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl UplinkProcessorFsm {
    pub fn new() -> Self {
        Self {
            state: AtomicU32::new(STATE_IDLE),
            pending_prach_count: AtomicU32::new(0),
            configured_slot: Mutex::new(None),
        }
    }

    /// Transitions idle → accepting for `slot`. Returns `false` (no-op) if
    /// the FSM was not idle, e.g. a previous slot's repository was never
    /// released.
    pub fn start_new_slot(&self, slot: SlotPoint) -> bool {
        if self
            .state
            .compare_exchange(STATE_IDLE, ACCEPTING_MASK, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *self.configured_slot.lock().unwrap() = Some(slot);
        true
    }

    /// True iff the FSM is in a dispatchable state (not idle/accepting/
    /// locked/stopped) and `slot` matches the slot it was configured for.
    pub fn is_slot_valid(&self, slot: SlotPoint) -> bool {
        let state = self.state.load(Ordering::Acquire);
        if is_idle(state) || is_accepting(state) || is_locked(state) || is_stopped(state) {
            return false;
        }
        *self.configured_slot.lock().unwrap() == Some(slot)
    }

    /// Clears the accepting-PDU bit once admission closes.
    pub fn stop_accepting_pdu(&self) {
        let prev = self.state.fetch_xor(ACCEPTING_MASK, Ordering::AcqRel);
        debug_assert!(is_accepting(prev), "stop_accepting_pdu called while not accepting");
    }

    /// Enqueues one more pending PDU (or, for a PUCCH Format-1 batch, one
    /// pending batch).
    pub fn increment_pending_pdu_count(&self) {
        let prev = self.state.fetch_add(INC_QUEUE, Ordering::AcqRel);
        debug_assert!(is_accepting(prev), "increment_pending_pdu_count called while not accepting");
    }

    /// Takes the locked bit for a receive-symbol dispatch window. Returns
    /// `false` without side effects if the FSM is stopped, already locked,
    /// or has nothing queued.
    pub fn start_handle_rx_symbol(&self) -> bool {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if is_stopped(state) || is_locked(state) || queue_count(state) == 0 {
                return false;
            }
            if self
                .state
                .compare_exchange_weak(state, state | LOCKED_MASK, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub fn finish_handle_rx_symbol(&self) {
        let prev = self.state.fetch_xor(LOCKED_MASK, Ordering::AcqRel);
        debug_assert!(is_locked(prev), "finish_handle_rx_symbol called while not locked");
    }

    /// Called when a dispatched PDU becomes an executor task: moves one unit
    /// from "queued" bookkeeping into "in execution" by incrementing the
    /// exec counter (the queue counter is only cleared on completion).
    pub fn on_create_pdu_task(&self) -> bool {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if is_stopped(state) {
                return false;
            }
            debug_assert!(!is_accepting(state) && queue_count(state) > 0);
            if self
                .state
                .compare_exchange_weak(state, state + INC_EXEC, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Retires one in-flight PDU: decrements both queue and exec counters in
    /// a single atomic op, the last visible effect of a PDU's lifecycle.
    pub fn on_finish_processing_pdu(&self) {
        let prev = self.state.fetch_sub(INC_QUEUE + INC_EXEC, Ordering::AcqRel);
        debug_assert!(!is_accepting(prev) && !is_stopped(prev));
        debug_assert!(exec_count(prev) > 0 && queue_count(prev) > 0);
    }

    /// Takes the locked bit for a discard and pre-inflates the exec counter
    /// to the queue count, so that the ordinary completion path
    /// (`on_finish_processing_pdu`) naturally drains it without spawning any
    /// kernels. Returns `false` if there is nothing to discard or the FSM is
    /// not in a dischargeable state.
    pub fn start_discard_slot(&self) -> bool {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if is_stopped(state) || is_locked(state) || queue_count(state) == 0 || exec_count(state) > 0 {
                return false;
            }
            let queue = queue_count(state);
            let new_state = state | (queue << 12) | LOCKED_MASK;
            if self
                .state
                .compare_exchange_weak(state, new_state, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Resets to idle once a discard has drained both counters to zero.
    pub fn finish_discard_slot(&self) {
        let prev = self.state.swap(STATE_IDLE, Ordering::AcqRel);
        debug_assert!(is_locked(prev));
        debug_assert_eq!(exec_count(prev), 0);
        debug_assert_eq!(queue_count(prev), 0);
    }

    /// Pre-increments the PRACH counter; saturating no-op once stopped.
    pub fn on_prach_detection(&self) {
        loop {
            let count = self.pending_prach_count.load(Ordering::Acquire);
            if self.state.load(Ordering::Acquire) == STATE_STOPPED {
                return;
            }
            if self
                .pending_prach_count
                .compare_exchange_weak(count, count + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
        }
    }

    pub fn on_end_prach_detection(&self) {
        let prev = self.pending_prach_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert_ne!(prev, 0, "on_end_prach_detection called with no pending detections");
    }

    /// Busy-waits (10 µs back-off) until the FSM is safe to stop (not
    /// accepting, no exec in flight, not locked), moves it to the terminal
    /// `stopped` state, then does the same for the PRACH counter.
    pub fn stop(&self) {
        loop {
            let state = self.state.load(Ordering::Acquire);
            if !is_accepting(state) && exec_count(state) == 0 && !is_locked(state) {
                if self
                    .state
                    .compare_exchange_weak(state, STATE_STOPPED, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    break;
                }
            }
            thread::sleep(DRAIN_BACKOFF);
        }
        while self.pending_prach_count.load(Ordering::Acquire) != 0 {
            thread::sleep(DRAIN_BACKOFF);
        }
    }

    pub fn is_stopped(&self) -> bool {
        is_stopped(self.state.load(Ordering::Acquire))
    }

    pub fn is_accepting(&self) -> bool {
        is_accepting(self.state.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot() -> SlotPoint {
        SlotPoint::new(1, 0, 0)
    }

    #[test]
    fn idle_to_accepting_to_dispatch_to_idle() {
        let fsm = UplinkProcessorFsm::new();
        assert!(fsm.start_new_slot(slot()));
        assert!(!fsm.start_new_slot(slot()), "second start_new_slot must fail while accepting");

        fsm.increment_pending_pdu_count();
        fsm.stop_accepting_pdu();
        assert!(fsm.is_slot_valid(slot()));

        assert!(fsm.start_handle_rx_symbol());
        assert!(fsm.on_create_pdu_task());
        fsm.finish_handle_rx_symbol();

        fsm.on_finish_processing_pdu();
        // Queue is drained but state isn't reset to idle implicitly; that is
        // only done by finish_discard_slot in this design. A real pool
        // reuses the processor for the next start_new_slot once the
        // residual word (0, with both counters at zero and accepting
        // cleared) equals STATE_IDLE, which it does here.
        assert!(fsm.start_new_slot(slot()));
    }

    #[test]
    fn accepting_and_locked_never_both_set() {
        let fsm = UplinkProcessorFsm::new();
        fsm.start_new_slot(slot());
        fsm.increment_pending_pdu_count();
        fsm.stop_accepting_pdu();
        assert!(fsm.start_handle_rx_symbol());
        let state = fsm.state.load(Ordering::Acquire);
        assert!(!(is_accepting(state) && is_locked(state)));
    }

    #[test]
    fn start_handle_rx_symbol_fails_with_nothing_queued() {
        let fsm = UplinkProcessorFsm::new();
        fsm.start_new_slot(slot());
        fsm.stop_accepting_pdu();
        assert!(!fsm.start_handle_rx_symbol());
    }

    #[test]
    fn late_rx_symbol_short_circuits_against_discard() {
        // Open question resolution: discard takes the locked bit first, a
        // late handle_rx_symbol then observes locked and backs off.
        let fsm = UplinkProcessorFsm::new();
        fsm.start_new_slot(slot());
        fsm.increment_pending_pdu_count();
        fsm.stop_accepting_pdu();

        assert!(fsm.start_discard_slot());
        assert!(!fsm.start_handle_rx_symbol());

        fsm.on_finish_processing_pdu();
        fsm.finish_discard_slot();
        assert!(fsm.start_new_slot(slot()));
    }

    #[test]
    fn prach_counter_drains_independently_of_pdu_counters() {
        let fsm = UplinkProcessorFsm::new();
        fsm.on_prach_detection();
        fsm.on_prach_detection();
        fsm.on_end_prach_detection();
        fsm.on_end_prach_detection();
        assert_eq!(fsm.pending_prach_count.load(Ordering::Acquire), 0);
    }

    #[test]
    fn stop_is_terminal() {
        let fsm = UplinkProcessorFsm::new();
        fsm.stop();
        assert!(fsm.is_stopped());
        assert!(!fsm.start_new_slot(slot()));
    }
}
