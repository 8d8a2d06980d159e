//! Execution-context capability markers.
//!
//! Head-stage code must never call into root-only logic. Instead of relying
//! on a runtime assertion, root-only APIs take a `&RootContext` parameter.
//! Head handlers are handed a `&HeadContext`, so calling a root-only routine
//! from one is a type error, not a latent bug.

use core::marker::PhantomData;

/// Proof that the caller is executing on the high-priority stage of the
/// current CPU. Created by the dispatcher around head handler invocation.
pub struct HeadContext {
    // Tied to the current CPU, so neither Send nor Sync.
    _not_send: PhantomData<*mut ()>,
}

impl HeadContext {
    pub(crate) fn new() -> Self {
        HeadContext {
            _not_send: PhantomData,
        }
    }

    /// Assert head-stage execution without going through the dispatcher.
    ///
    /// # Safety
    ///
    /// The caller must actually be executing head-stage code on the current
    /// CPU, for example inside a low-level trap entry that has not yet
    /// entered the pipeline.
    pub unsafe fn assume() -> Self {
        Self::new()
    }
}

/// Proof that the caller is executing on the regular stage of the current
/// CPU. Created by the dispatcher around root handler invocation; ordinary
/// kernel code obtains one at a point where its stage is known.
pub struct RootContext {
    _not_send: PhantomData<*mut ()>,
}

impl RootContext {
    pub(crate) fn new() -> Self {
        RootContext {
            _not_send: PhantomData,
        }
    }

    /// Assert regular-stage execution.
    ///
    /// # Safety
    ///
    /// The caller must actually be executing regular-stage code on the
    /// current CPU.
    pub unsafe fn assume() -> Self {
        Self::new()
    }
}

/// The execution context a hybrid lock resolves against at acquire time.
/// Explicit rather than ambient, so the resolution is testable in isolation.
#[derive(Clone, Copy)]
pub enum ExecContext<'a> {
    /// The low-level interrupt-entry path into the pipeline, or head-stage
    /// execution. Hybrid locks acquired here mask hardware interrupts.
    Pipeline,
    /// Ordinary regular-stage kernel execution. Hybrid locks acquired here
    /// only stall the regular stage.
    Kernel(&'a RootContext),
}
