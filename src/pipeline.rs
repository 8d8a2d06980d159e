//! Pipeline assembly and one-time global initialization.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32};

use conquer_once::spin::OnceCell;

use crate::binding::IrqBinding;
use crate::irq::NR_IRQS;
use crate::percpu::CpuState;
use crate::platform::Platform;
use crate::spinlock::HybridSpinLock;

/// The interrupt pipeline: two stages per CPU, a shared handler-binding
/// table, and the synthetic vector space. The only shared mutable state in
/// the core is this structure; everything per-CPU inside it is reached
/// through the CPU-indexed table.
pub struct Pipeline {
    platform: &'static dyn Platform,
    pub(crate) cpus: Box<[CpuState]>,
    pub(crate) bindings: HybridSpinLock<Box<[Option<IrqBinding>]>>,
    /// Lines currently held at the controller awaiting delivery.
    pub(crate) line_held: Box<[AtomicBool]>,
    /// Allocation bitmap for the synthetic vector space.
    pub(crate) virq_map: AtomicU32,
    pub(crate) idle_hook: AtomicPtr<()>,
}

impl Pipeline {
    pub fn new(platform: &'static dyn Platform) -> Self {
        let cpus: Vec<CpuState> = (0..platform.num_cpus()).map(CpuState::new).collect();
        let slots: Vec<Option<IrqBinding>> = (0..NR_IRQS).map(|_| None).collect();
        let line_held: Vec<AtomicBool> = (0..NR_IRQS).map(|_| AtomicBool::new(false)).collect();
        Pipeline {
            platform,
            cpus: cpus.into_boxed_slice(),
            bindings: HybridSpinLock::new(slots.into_boxed_slice()),
            line_held: line_held.into_boxed_slice(),
            virq_map: AtomicU32::new(0),
            idle_hook: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn platform(&self) -> &'static dyn Platform {
        self.platform
    }

    pub fn num_cpus(&self) -> usize {
        self.cpus.len()
    }

    /// The executing CPU's pipeline state.
    pub(crate) fn cpu(&self) -> &CpuState {
        &self.cpus[self.platform.cpu_id()]
    }

    pub(crate) fn cpu_at(&self, cpu: usize) -> &CpuState {
        &self.cpus[cpu]
    }
}

static PIPELINE: OnceCell<Pipeline> = OnceCell::uninit();

/// Bring up the global pipeline. Call once during kernel init, before the
/// first interrupt can reach [`Pipeline::dispatch`].
pub fn init(platform: &'static dyn Platform) {
    PIPELINE.init_once(|| {
        log::info!(
            "PIPELINE_INIT: two-stage interrupt pipeline, {} cpu(s)",
            platform.num_cpus()
        );
        Pipeline::new(platform)
    });
}

/// The global pipeline instance.
pub fn pipeline() -> &'static Pipeline {
    PIPELINE.get().expect("interrupt pipeline not initialized")
}
