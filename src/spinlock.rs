//! The three critical-section primitives shared by the two stages.
//!
//! All three wrap their data and hand out RAII guards, but they differ in
//! what "masked" means for the section:
//!
//! - [`HardSpinLock`] always raises the real hardware mask. Either stage may
//!   take one, and sections must stay very short because they also block
//!   head-stage delivery.
//! - [`VirtSpinLock`] only stalls the root stage; head delivery continues.
//!   Root-stage code only, which is why acquisition takes a `&RootContext`.
//! - [`HybridSpinLock`] resolves at acquire time: hard on the pipeline
//!   entry path, virtual from ordinary kernel code. The guard remembers the
//!   chosen mode so release restores the matching state. One lock
//!   declaration can then serialize both the rare low-level traversal and
//!   the common regular-context traversal of a shared structure.
//!
//! A holder of a hard or hybrid-as-hard guard must not block, sleep, or
//! call anything that revalidates the root stage's mask state.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

use crate::context::{ExecContext, RootContext};
use crate::mask::IrqFlags;
use crate::pipeline::Pipeline;

struct RawSpin {
    locked: AtomicBool,
}

impl RawSpin {
    const fn new() -> Self {
        RawSpin {
            locked: AtomicBool::new(false),
        }
    }

    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            spin_loop();
        }
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Spinlock that masks real hardware interrupts for the critical section.
pub struct HardSpinLock<T> {
    raw: RawSpin,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for HardSpinLock<T> {}
unsafe impl<T: Send> Sync for HardSpinLock<T> {}

impl<T> HardSpinLock<T> {
    pub const fn new(data: T) -> Self {
        HardSpinLock {
            raw: RawSpin::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock<'a>(&'a self, pl: &'a Pipeline) -> HardGuard<'a, T> {
        let hw_was_enabled = pl.platform().hw_irqs_enabled();
        pl.platform().hw_disable_irqs();
        self.raw.lock();
        HardGuard {
            lock: self,
            pl,
            hw_was_enabled,
        }
    }
}

pub struct HardGuard<'a, T> {
    lock: &'a HardSpinLock<T>,
    pl: &'a Pipeline,
    hw_was_enabled: bool,
}

impl<T> Deref for HardGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for HardGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for HardGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
        if self.hw_was_enabled {
            self.pl.platform().hw_enable_irqs();
        }
    }
}

/// Spinlock that stalls only the root stage for the critical section.
pub struct VirtSpinLock<T> {
    raw: RawSpin,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for VirtSpinLock<T> {}
unsafe impl<T: Send> Sync for VirtSpinLock<T> {}

impl<T> VirtSpinLock<T> {
    pub const fn new(data: T) -> Self {
        VirtSpinLock {
            raw: RawSpin::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock<'a>(&'a self, pl: &'a Pipeline, ctx: &'a RootContext) -> VirtGuard<'a, T> {
        let flags = pl.local_irq_save(ctx);
        self.raw.lock();
        VirtGuard {
            lock: self,
            pl,
            flags,
        }
    }
}

pub struct VirtGuard<'a, T> {
    lock: &'a VirtSpinLock<T>,
    pl: &'a Pipeline,
    flags: IrqFlags,
}

impl<T> Deref for VirtGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for VirtGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for VirtGuard<'_, T> {
    fn drop(&mut self) {
        // Unlock before unmasking so replayed handlers can retake the lock.
        self.lock.raw.unlock();
        self.pl.restore_root(self.flags);
    }
}

#[derive(Clone, Copy)]
enum HybridMode {
    Hard { hw_was_enabled: bool },
    Virt { flags: IrqFlags },
}

/// Spinlock whose masking flavor is picked by the caller's execution
/// context at acquire time.
pub struct HybridSpinLock<T> {
    raw: RawSpin,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for HybridSpinLock<T> {}
unsafe impl<T: Send> Sync for HybridSpinLock<T> {}

impl<T> HybridSpinLock<T> {
    pub const fn new(data: T) -> Self {
        HybridSpinLock {
            raw: RawSpin::new(),
            data: UnsafeCell::new(data),
        }
    }

    pub fn lock<'a>(&'a self, pl: &'a Pipeline, ctx: ExecContext<'a>) -> HybridGuard<'a, T> {
        let mode = match ctx {
            ExecContext::Pipeline => {
                let hw_was_enabled = pl.platform().hw_irqs_enabled();
                pl.platform().hw_disable_irqs();
                HybridMode::Hard { hw_was_enabled }
            }
            ExecContext::Kernel(root) => HybridMode::Virt {
                flags: pl.local_irq_save(root),
            },
        };
        self.raw.lock();
        HybridGuard {
            lock: self,
            pl,
            mode,
        }
    }
}

pub struct HybridGuard<'a, T> {
    lock: &'a HybridSpinLock<T>,
    pl: &'a Pipeline,
    mode: HybridMode,
}

impl<T> Deref for HybridGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for HybridGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for HybridGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
        match self.mode {
            HybridMode::Hard { hw_was_enabled } => {
                if hw_was_enabled {
                    self.pl.platform().hw_enable_irqs();
                }
            }
            HybridMode::Virt { flags } => self.pl.restore_root(flags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_spin_lock_unlock() {
        let raw = RawSpin::new();
        raw.lock();
        assert!(raw.locked.load(Ordering::Relaxed));
        raw.unlock();
        assert!(!raw.locked.load(Ordering::Relaxed));
        raw.lock();
        raw.unlock();
    }
}
