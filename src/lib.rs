//! Two-stage interrupt delivery pipeline.
//!
//! A small set of latency-critical handlers runs on a high-priority "head"
//! stage that keeps receiving hardware events, while the regular "root"
//! stage gets a conventional disable/enable interrupts contract backed by a
//! software stall bit and a per-CPU replay log instead of the real hardware
//! mask. The dispatcher decides per event whether to run the head handler
//! immediately, run the root handler immediately, or record the event for
//! replay when the root stage unstalls; level-like lines are held at the
//! controller while a delivery is pending.
//!
//! ```rust,ignore
//! irqpipe::init(&PLATFORM);
//! let pl = irqpipe::pipeline();
//! let ctx = unsafe { irqpipe::RootContext::assume() };
//! pl.register_head(&ctx, Irq(32), TriggerType::Edge, tick, LineOps::NONE)?;
//!
//! // from the low-level interrupt entry:
//! irqpipe::pipeline().dispatch(Irq(vector));
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod binding;
pub mod context;
mod dispatch;
pub mod idle;
pub mod irq;
mod irq_log;
pub mod mask;
pub mod memdev;
mod percpu;
pub mod pipeline;
pub mod platform;
pub mod spinlock;
pub mod stage;
mod virq;

pub use binding::{BindingHandle, HeadHandler, LineOps, RootHandler};
pub use context::{ExecContext, HeadContext, RootContext};
pub use idle::IdleHook;
pub use irq::{Error, Irq, TriggerType, NR_HW_IRQS, NR_IRQS, NR_VIRQS};
pub use mask::IrqFlags;
pub use memdev::{MemStat, UmmRegion};
pub use pipeline::{init, pipeline, Pipeline};
pub use platform::Platform;
pub use spinlock::{HardSpinLock, HybridSpinLock, VirtSpinLock};
pub use stage::Stage;
