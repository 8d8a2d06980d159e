//! Handler bindings and the registration API.
//!
//! A binding maps one interrupt identifier to at most one head handler and
//! at most one root handler, plus the line's trigger type and mask/ack
//! operations. The table is shared between registration (regular context)
//! and the dispatcher (interrupt entry), so it sits behind a hybrid lock.

use core::sync::atomic::Ordering;

use crate::context::{ExecContext, HeadContext, RootContext};
use crate::irq::{Error, Irq, TriggerType};
use crate::pipeline::Pipeline;
use crate::stage::Stage;

/// Handler invoked on the high-priority stage. Runs with the interrupted
/// context suspended; must not call root-only APIs (none accept a
/// [`HeadContext`]).
pub type HeadHandler = fn(&Pipeline, &HeadContext, Irq);

/// Handler invoked on the regular stage, either immediately or during
/// replay after the stage unstalls.
pub type RootHandler = fn(&Pipeline, &RootContext, Irq);

/// Mask and acknowledge operations for a line whose delivery may be
/// deferred. The exact sequence (mask+ack vs mask+eoi) is hardware-family
/// specific, so it is supplied by a platform adapter per line rather than
/// fixed here; getting it wrong causes interrupt storms.
#[derive(Debug, Clone, Copy)]
pub struct LineOps {
    /// Stop the line from re-asserting while delivery is pending.
    pub hold: Option<fn(Irq)>,
    /// Undo `hold` once delivery completes.
    pub release: Option<fn(Irq)>,
    /// Fallback unmask for controllers without a dedicated release.
    pub unmask: Option<fn(Irq)>,
}

impl LineOps {
    pub const NONE: LineOps = LineOps {
        hold: None,
        release: None,
        unmask: None,
    };
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IrqBinding {
    pub trigger: TriggerType,
    pub head: Option<HeadHandler>,
    pub root: Option<RootHandler>,
    pub ops: LineOps,
}

/// Identifies one stage's attachment to a line; pass back to
/// [`Pipeline::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingHandle {
    pub(crate) irq: Irq,
    pub(crate) stage: Stage,
}

impl BindingHandle {
    pub fn irq(&self) -> Irq {
        self.irq
    }
}

fn validate(irq: Irq, trigger: TriggerType, ops: &LineOps) -> Result<(), Error> {
    if !irq.is_valid() {
        return Err(Error::BadIrq);
    }
    if ops.hold.is_some() {
        if !trigger.needs_hold() || irq.is_synthetic() {
            return Err(Error::HoldNotSupported);
        }
        if ops.release.is_none() && ops.unmask.is_none() {
            // Accepting this would leave the line masked forever after the
            // first deferred delivery.
            return Err(Error::HoldWithoutRelease);
        }
    }
    Ok(())
}

impl Pipeline {
    /// Attach a high-priority handler to `irq`.
    ///
    /// Line ops belong to the line and are taken from its first
    /// registration; a second-stage registration must agree on the trigger
    /// type. All validation is synchronous.
    pub fn register_head(
        &self,
        ctx: &RootContext,
        irq: Irq,
        trigger: TriggerType,
        handler: HeadHandler,
        ops: LineOps,
    ) -> Result<BindingHandle, Error> {
        validate(irq, trigger, &ops)?;
        if irq.is_synthetic() && !self.virq_allocated(irq) {
            return Err(Error::BadIrq);
        }
        let mut tbl = self.bindings.lock(self, ExecContext::Kernel(ctx));
        let slot = &mut tbl[irq.index()];
        if let Some(b) = slot {
            if b.trigger != trigger {
                return Err(Error::TriggerMismatch);
            }
            if b.head.is_some() {
                return Err(Error::HandlerSlotBusy);
            }
            b.head = Some(handler);
        } else {
            *slot = Some(IrqBinding {
                trigger,
                head: Some(handler),
                root: None,
                ops,
            });
        }
        drop(tbl);
        log::debug!("IRQ_BIND: head handler on irq {} ({:?})", irq, trigger);
        Ok(BindingHandle {
            irq,
            stage: Stage::Head,
        })
    }

    /// Attach a regular-stage handler to `irq`. Same contract as
    /// [`Pipeline::register_head`].
    pub fn register_root(
        &self,
        ctx: &RootContext,
        irq: Irq,
        trigger: TriggerType,
        handler: RootHandler,
        ops: LineOps,
    ) -> Result<BindingHandle, Error> {
        validate(irq, trigger, &ops)?;
        if irq.is_synthetic() && !self.virq_allocated(irq) {
            return Err(Error::BadIrq);
        }
        let mut tbl = self.bindings.lock(self, ExecContext::Kernel(ctx));
        let slot = &mut tbl[irq.index()];
        if let Some(b) = slot {
            if b.trigger != trigger {
                return Err(Error::TriggerMismatch);
            }
            if b.root.is_some() {
                return Err(Error::HandlerSlotBusy);
            }
            b.root = Some(handler);
        } else {
            *slot = Some(IrqBinding {
                trigger,
                head: None,
                root: Some(handler),
                ops,
            });
        }
        drop(tbl);
        log::debug!("IRQ_BIND: root handler on irq {} ({:?})", irq, trigger);
        Ok(BindingHandle {
            irq,
            stage: Stage::Root,
        })
    }

    /// Detach the handler named by `handle`. The binding is destroyed when
    /// its last handler goes; a line still held at that point is released
    /// so it does not stay masked with nobody left to unmask it.
    pub fn unregister(&self, ctx: &RootContext, handle: BindingHandle) -> Result<(), Error> {
        let mut tbl = self.bindings.lock(self, ExecContext::Kernel(ctx));
        let slot = &mut tbl[handle.irq.index()];
        let Some(b) = slot else {
            return Err(Error::NoSuchBinding);
        };
        let ops = b.ops;
        match handle.stage {
            Stage::Head => {
                if b.head.take().is_none() {
                    return Err(Error::NoSuchBinding);
                }
            }
            Stage::Root => {
                if b.root.take().is_none() {
                    return Err(Error::NoSuchBinding);
                }
            }
        }
        let now_empty = b.head.is_none() && b.root.is_none();
        if now_empty {
            *slot = None;
        }
        drop(tbl);
        if now_empty && self.line_held[handle.irq.index()].swap(false, Ordering::AcqRel) {
            if let Some(release) = ops.release {
                release(handle.irq);
            } else if let Some(unmask) = ops.unmask {
                unmask(handle.irq);
            }
        }
        log::debug!(
            "IRQ_UNBIND: {:?} handler off irq {}",
            handle.stage,
            handle.irq
        );
        Ok(())
    }

    /// Snapshot of the binding for `irq`, taken under the hybrid lock on
    /// the pipeline entry path.
    pub(crate) fn binding_of(&self, irq: Irq) -> Option<IrqBinding> {
        if !irq.is_valid() {
            return None;
        }
        let tbl = self.bindings.lock(self, ExecContext::Pipeline);
        tbl[irq.index()]
    }
}
