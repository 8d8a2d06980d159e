//! Flow dispatcher: the single entry point for every incoming event.
//!
//! Each event either runs its head handler immediately, runs its root
//! handler immediately, or is recorded into the root stage's log for
//! replay, evaluated in that order. Level-like trigger types are held at
//! the controller before the decision so a deferred line cannot re-assert,
//! and released once delivery completes.

use core::sync::atomic::Ordering;

use crate::binding::{HeadHandler, IrqBinding, RootHandler};
use crate::context::{HeadContext, RootContext};
use crate::irq::Irq;
use crate::pipeline::Pipeline;
use crate::stage::Stage;

impl Pipeline {
    /// Feed one hardware event into the pipeline. Called from the
    /// low-level interrupt entry with the trap frame already saved.
    pub fn dispatch(&self, irq: Irq) {
        let cpu = self.cpu();
        cpu.irq_enter();
        match self.binding_of(irq) {
            None => {
                log::warn!("IRQ_DISPATCH: unhandled irq {}", irq);
            }
            Some(b) => {
                if b.trigger.needs_hold() {
                    self.hold_line(irq, &b);
                }
                if b.head.is_some() {
                    let head = cpu.stage(Stage::Head);
                    if head.stalled() || head.in_replay() {
                        // Behind a raised mask or an active drain the event
                        // queues up; the drain delivers it in order.
                        head.log.record(irq, cpu.next_seq());
                    } else {
                        if let Some(h) = b.head {
                            self.deliver_head(irq, h);
                        }
                        self.release_line(irq, &b);
                    }
                } else {
                    let rt = cpu.stage(Stage::Root);
                    if cpu.current_stage() == Stage::Root && !rt.stalled() && !rt.in_replay() {
                        // Matches the single-stage model: the interrupted
                        // context was unmasked root code, so run it right
                        // here.
                        if let Some(h) = b.root {
                            self.deliver_root(irq, h);
                        }
                        self.release_line(irq, &b);
                    } else {
                        rt.log.record(irq, cpu.next_seq());
                    }
                }
            }
        }
        let depth = cpu.irq_exit();
        // Root work posted from head context must run before this frame
        // hands control back to the hardware.
        if depth == 0 && !self.is_stalled(Stage::Root) && self.root_work_pending() {
            self.sync_stage(Stage::Root);
        }
    }

    pub(crate) fn root_work_pending(&self) -> bool {
        let cpu = self.cpu();
        !cpu.stage(Stage::Root).log.is_empty() || !cpu.inbox.is_empty()
    }

    /// Drain a stage's log front to back, firing each entry's handler with
    /// the stage active. Re-entrant calls fall through to the outer drain
    /// so ordering is preserved.
    pub(crate) fn sync_stage(&self, stage: Stage) {
        let cpu = self.cpu();
        let st = cpu.stage(stage);
        if !st.try_begin_replay() {
            // The drain already running on this CPU picks the work up.
            return;
        }
        // Accept cross-CPU synthetic posts first so they are not stranded
        // behind an empty log.
        while let Some(virq) = cpu.inbox.pop() {
            self.route_virq(virq);
        }
        loop {
            if st.stalled() {
                // Re-stalled by a handler; the remainder replays on the
                // next unstall.
                break;
            }
            let Some(entry) = st.log.pop() else {
                break;
            };
            log::trace!("IRQ_REPLAY: irq {} (seq {})", entry.irq, entry.seq);
            self.invoke_logged(stage, entry.irq);
        }
        st.end_replay();
    }

    fn invoke_logged(&self, stage: Stage, irq: Irq) {
        let Some(b) = self.binding_of(irq) else {
            // Binding disposed while the event sat in the log.
            log::debug!("IRQ_REPLAY: dropping event for unbound irq {}", irq);
            return;
        };
        match stage {
            Stage::Head => {
                if let Some(h) = b.head {
                    self.deliver_head(irq, h);
                }
            }
            Stage::Root => {
                if let Some(h) = b.root {
                    self.deliver_root(irq, h);
                }
            }
        }
        self.release_line(irq, &b);
    }

    pub(crate) fn deliver_head(&self, irq: Irq, handler: HeadHandler) {
        let cpu = self.cpu();
        let prev = cpu.set_current(Stage::Head);
        let ctx = HeadContext::new();
        handler(self, &ctx, irq);
        cpu.set_current(prev);
    }

    pub(crate) fn deliver_root(&self, irq: Irq, handler: RootHandler) {
        let cpu = self.cpu();
        let prev = cpu.set_current(Stage::Root);
        let ctx = RootContext::new();
        handler(self, &ctx, irq);
        cpu.set_current(prev);
    }

    fn hold_line(&self, irq: Irq, b: &IrqBinding) {
        if let Some(hold) = b.ops.hold {
            if !self.line_held[irq.index()].swap(true, Ordering::AcqRel) {
                hold(irq);
            }
        }
    }

    fn release_line(&self, irq: Irq, b: &IrqBinding) {
        if self.line_held[irq.index()].swap(false, Ordering::AcqRel) {
            if let Some(release) = b.ops.release {
                release(irq);
            } else if let Some(unmask) = b.ops.unmask {
                unmask(irq);
            }
        }
    }
}
