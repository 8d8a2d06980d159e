//! The two execution stages and their stall state.
//!
//! Every CPU owns an independent pair: the head stage, whose stall flag
//! mirrors the real hardware interrupt mask, and the root stage, whose
//! stall flag is purely software. The two flags are deliberately separate
//! fields so the concepts cannot be conflated. Stalling the head stage
//! implicitly stops delivery to the root stage as well, because no event
//! can reach the pipeline while the hardware mask is raised.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::irq_log::EventLog;
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    /// High-priority stage: always eligible to run on a real hardware
    /// interrupt.
    Head = 0,
    /// Regular stage: conventional kernel execution, subject to software
    /// masking.
    Root = 1,
}

impl Stage {
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    pub(crate) fn from_u8(v: u8) -> Stage {
        if v == 0 {
            Stage::Head
        } else {
            Stage::Root
        }
    }

    pub(crate) fn other(self) -> Stage {
        match self {
            Stage::Head => Stage::Root,
            Stage::Root => Stage::Head,
        }
    }
}

/// One stage's per-CPU state.
pub(crate) struct StageState {
    stalled: AtomicBool,
    /// Set while this stage's log is draining. New events for the stage
    /// defer into the log behind the entries already queued, which keeps
    /// per-source delivery in arrival order.
    replaying: AtomicBool,
    pub(crate) log: EventLog,
}

impl StageState {
    pub fn new() -> Self {
        StageState {
            stalled: AtomicBool::new(false),
            replaying: AtomicBool::new(false),
            log: EventLog::new(),
        }
    }

    pub fn stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    pub fn set_stalled(&self, v: bool) {
        self.stalled.store(v, Ordering::Release);
    }

    /// Atomically stall, returning whether the stage was already stalled.
    pub fn test_and_stall(&self) -> bool {
        self.stalled.swap(true, Ordering::AcqRel)
    }

    /// Claim the drain loop; false when a replay is already running.
    pub fn try_begin_replay(&self) -> bool {
        !self.replaying.swap(true, Ordering::AcqRel)
    }

    pub fn end_replay(&self) {
        self.replaying.store(false, Ordering::Release);
    }

    pub fn in_replay(&self) -> bool {
        self.replaying.load(Ordering::Acquire)
    }
}

impl Pipeline {
    /// Pure query of a stage's stall flag on the current CPU.
    pub fn is_stalled(&self, stage: Stage) -> bool {
        self.cpu().stage(stage).stalled()
    }

    /// Idempotently stop immediate delivery to `stage` on the current CPU.
    ///
    /// For the head stage this raises the real hardware mask; for the root
    /// stage it only sets the software bit and hardware delivery continues.
    pub fn stall(&self, stage: Stage) {
        let st = self.cpu().stage(stage);
        match stage {
            Stage::Head => {
                self.platform().hw_disable_irqs();
                st.set_stalled(true);
            }
            Stage::Root => {
                st.set_stalled(true);
            }
        }
    }

    /// Reopen delivery to `stage` and replay its log if non-empty.
    ///
    /// Replay runs handlers synchronously, so this call can re-enter
    /// arbitrary handler code; callers must not treat it as a plain flag
    /// flip.
    pub fn unstall(&self, stage: Stage) {
        let st = self.cpu().stage(stage);
        match stage {
            Stage::Head => {
                st.set_stalled(false);
                self.sync_stage(Stage::Head);
                self.platform().hw_enable_irqs();
            }
            Stage::Root => {
                st.set_stalled(false);
                if self.root_work_pending() {
                    self.sync_stage(Stage::Root);
                }
            }
        }
    }
}
