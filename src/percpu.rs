//! Per-CPU pipeline state.
//!
//! One cache-line-aligned context per CPU, reached through the CPU-indexed
//! table owned by the pipeline; lifetime is pipeline init to shutdown. A CPU
//! touches only its own context, with one exception: the synthetic-post
//! inbox, which accepts cross-CPU traffic through a lock-free queue.

use core::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::irq::Irq;
use crate::stage::{Stage, StageState};

/// Cross-CPU synthetic posts one CPU can have queued before draining them.
pub(crate) const INBOX_CAPACITY: usize = 64;

#[repr(align(64))]
pub(crate) struct CpuState {
    pub(crate) id: usize,
    stages: [StageState; 2],
    /// Stage of the currently executing frame.
    current: AtomicU8,
    /// Dispatch nesting depth on this CPU.
    nesting: AtomicUsize,
    /// Arrival sequence counter feeding the event logs.
    seq: AtomicU64,
    /// Synthetic posts from other CPUs, drained on the next pipeline entry.
    pub(crate) inbox: ArrayQueue<Irq>,
}

impl CpuState {
    pub fn new(id: usize) -> Self {
        CpuState {
            id,
            stages: [StageState::new(), StageState::new()],
            current: AtomicU8::new(Stage::Root as u8),
            nesting: AtomicUsize::new(0),
            seq: AtomicU64::new(0),
            inbox: ArrayQueue::new(INBOX_CAPACITY),
        }
    }

    pub fn stage(&self, stage: Stage) -> &StageState {
        &self.stages[stage.index()]
    }

    pub fn current_stage(&self) -> Stage {
        Stage::from_u8(self.current.load(Ordering::Acquire))
    }

    /// Switch the active execution frame, returning the previous stage.
    pub fn set_current(&self, stage: Stage) -> Stage {
        Stage::from_u8(self.current.swap(stage as u8, Ordering::AcqRel))
    }

    pub fn irq_enter(&self) {
        self.nesting.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the nesting depth remaining after this exit.
    pub fn irq_exit(&self) -> usize {
        self.nesting.fetch_sub(1, Ordering::AcqRel) - 1
    }

    #[allow(dead_code)]
    pub fn in_irq(&self) -> bool {
        self.nesting.load(Ordering::Acquire) != 0
    }

    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }
}
