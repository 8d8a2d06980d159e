//! Virtual interrupt masking for the root stage.
//!
//! Regular kernel code keeps its conventional disable/enable interrupts
//! contract, but the operations reduce to the root stage's software stall
//! bit. The hardware mask is left untouched, so head-stage handlers keep
//! running while the root stage is masked. This is a drop-in semantic
//! replacement for a single-stage mask API.

use crate::context::RootContext;
use crate::pipeline::Pipeline;
use crate::stage::Stage;

/// Saved root-stage mask state for nested save/restore sections.
#[must_use]
#[derive(Debug, Clone, Copy)]
pub struct IrqFlags {
    pub(crate) was_stalled: bool,
}

impl Pipeline {
    /// Disable root-stage interrupt delivery on this CPU.
    pub fn local_irq_disable(&self, _ctx: &RootContext) {
        debug_assert_eq!(self.cpu().current_stage(), Stage::Root);
        self.stall(Stage::Root);
    }

    /// Re-enable root-stage delivery, replaying anything that was deferred
    /// while masked. May re-enter arbitrary root handlers.
    pub fn local_irq_enable(&self, _ctx: &RootContext) {
        self.unstall(Stage::Root);
    }

    /// Disable root-stage delivery and return the previous mask state.
    pub fn local_irq_save(&self, _ctx: &RootContext) -> IrqFlags {
        debug_assert_eq!(self.cpu().current_stage(), Stage::Root);
        self.save_and_stall_root()
    }

    /// Restore a state saved by [`Pipeline::local_irq_save`]. Restoring to
    /// "was masked" leaves the stage stalled; nested pairs compose for any
    /// depth.
    pub fn local_irq_restore(&self, _ctx: &RootContext, flags: IrqFlags) {
        self.restore_root(flags)
    }

    pub fn root_irqs_disabled(&self, _ctx: &RootContext) -> bool {
        self.is_stalled(Stage::Root)
    }

    /// Run `f` with root-stage delivery masked, restoring the previous
    /// state afterwards.
    pub fn without_irqs<R>(&self, ctx: &RootContext, f: impl FnOnce() -> R) -> R {
        let flags = self.local_irq_save(ctx);
        let ret = f();
        self.local_irq_restore(ctx, flags);
        ret
    }

    pub(crate) fn save_and_stall_root(&self) -> IrqFlags {
        IrqFlags {
            was_stalled: self.cpu().stage(Stage::Root).test_and_stall(),
        }
    }

    pub(crate) fn restore_root(&self, flags: IrqFlags) {
        if !flags.was_stalled {
            self.unstall(Stage::Root);
        }
    }
}
