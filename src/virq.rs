//! Synthetic interrupt vectors for cross-stage notification.
//!
//! A synthetic vector has no hardware backing; it is bound to handlers like
//! any line and posted from software. A head-stage poster targeting a
//! root-bound vector performs a deferred wake-up of the regular kernel; a
//! root-stage poster targeting a head-bound vector requests urgent
//! execution at the head stage's next opportunity, which is immediately
//! unless the hardware mask is raised.

use core::sync::atomic::Ordering;

use crate::binding::{BindingHandle, HeadHandler, LineOps, RootHandler};
use crate::context::RootContext;
use crate::irq::{Error, Irq, TriggerType, NR_HW_IRQS, NR_VIRQS, VIRQ_BASE};
use crate::pipeline::Pipeline;
use crate::stage::Stage;

// The allocation bitmap is a single u32.
const _: () = assert!(NR_VIRQS <= 32, "synthetic vector space exceeds its bitmap");

impl Pipeline {
    /// Reserve a fresh synthetic vector.
    pub fn alloc_virq(&self, _ctx: &RootContext) -> Result<Irq, Error> {
        loop {
            let cur = self.virq_map.load(Ordering::Acquire);
            let free = (!cur).trailing_zeros() as usize;
            if free >= NR_VIRQS {
                return Err(Error::VectorExhausted);
            }
            if self
                .virq_map
                .compare_exchange(cur, cur | 1 << free, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let virq = Irq(VIRQ_BASE + free as u16);
                log::debug!("VIRQ_ALLOC: vector {} reserved", virq);
                return Ok(virq);
            }
        }
    }

    pub(crate) fn virq_allocated(&self, virq: Irq) -> bool {
        if !virq.is_synthetic() {
            return false;
        }
        let bit = virq.index() - NR_HW_IRQS;
        (self.virq_map.load(Ordering::Acquire) & (1 << bit)) != 0
    }

    pub fn bind_virq_head(
        &self,
        ctx: &RootContext,
        virq: Irq,
        handler: HeadHandler,
    ) -> Result<BindingHandle, Error> {
        if !virq.is_synthetic() {
            return Err(Error::BadIrq);
        }
        self.register_head(ctx, virq, TriggerType::Edge, handler, LineOps::NONE)
    }

    pub fn bind_virq_root(
        &self,
        ctx: &RootContext,
        virq: Irq,
        handler: RootHandler,
    ) -> Result<BindingHandle, Error> {
        if !virq.is_synthetic() {
            return Err(Error::BadIrq);
        }
        self.register_root(ctx, virq, TriggerType::Edge, handler, LineOps::NONE)
    }

    /// Post a synthetic event on the current CPU. Delivery follows the
    /// dispatcher rules: immediate when the target stage can run now,
    /// logged for replay otherwise.
    pub fn post(&self, virq: Irq) -> Result<(), Error> {
        if !self.virq_allocated(virq) {
            return Err(Error::BadIrq);
        }
        self.route_virq(virq);
        Ok(())
    }

    /// Post a synthetic event to another CPU through its inbox, then kick
    /// it so the event is noticed promptly.
    pub fn post_remote(&self, cpu: usize, virq: Irq) -> Result<(), Error> {
        if cpu >= self.num_cpus() {
            return Err(Error::BadCpu);
        }
        if !self.virq_allocated(virq) {
            return Err(Error::BadIrq);
        }
        if cpu == self.platform().cpu_id() {
            self.route_virq(virq);
            return Ok(());
        }
        if self.cpu_at(cpu).inbox.push(virq).is_err() {
            log::error!("VIRQ_POST: inbox overflow on cpu {}", cpu);
            panic!("synthetic post inbox overflow");
        }
        self.platform().kick_cpu(cpu);
        Ok(())
    }

    /// Release a vector. Whatever handlers are still bound are detached,
    /// and posts already queued for it are dropped at replay.
    pub fn dispose_virq(&self, ctx: &RootContext, virq: Irq) -> Result<(), Error> {
        if !self.virq_allocated(virq) {
            return Err(Error::BadIrq);
        }
        let _ = self.unregister(
            ctx,
            BindingHandle {
                irq: virq,
                stage: Stage::Head,
            },
        );
        let _ = self.unregister(
            ctx,
            BindingHandle {
                irq: virq,
                stage: Stage::Root,
            },
        );
        let bit = virq.index() - NR_HW_IRQS;
        self.virq_map.fetch_and(!(1u32 << bit), Ordering::AcqRel);
        log::debug!("VIRQ_DISPOSE: vector {} released", virq);
        Ok(())
    }

    /// Apply the dispatcher rules to a synthetic event on the current CPU.
    pub(crate) fn route_virq(&self, virq: Irq) {
        let Some(b) = self.binding_of(virq) else {
            log::debug!("VIRQ_POST: dropping post for unbound vector {}", virq);
            return;
        };
        let cpu = self.cpu();
        let target = match (b.head.is_some(), b.root.is_some()) {
            (true, false) => Stage::Head,
            (false, true) => Stage::Root,
            // Bound on both sides: a post targets the poster's opposite
            // stage.
            (true, true) => cpu.current_stage().other(),
            (false, false) => return,
        };
        match target {
            Stage::Head => {
                let head = cpu.stage(Stage::Head);
                if head.stalled() || head.in_replay() {
                    head.log.record(virq, cpu.next_seq());
                } else if let Some(h) = b.head {
                    self.deliver_head(virq, h);
                }
            }
            Stage::Root => {
                let rt = cpu.stage(Stage::Root);
                if cpu.current_stage() == Stage::Root && !rt.stalled() && !rt.in_replay() {
                    if let Some(h) = b.root {
                        self.deliver_root(virq, h);
                    }
                } else {
                    rt.log.record(virq, cpu.next_seq());
                }
            }
        }
    }
}
