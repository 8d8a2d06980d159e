//! Idle-entry veto hook for power management.
//!
//! Before parking a CPU in a low-power state, the regular kernel asks the
//! pipeline whether that is safe. A high-priority subsystem that needs a
//! shared timer kept alive registers a hook here; with no hook attached the
//! answer defaults to yes. Entry is always refused while either stage still
//! has undelivered events, since those would sit unserved until the next
//! wake-up.

use core::mem;
use core::ptr;
use core::sync::atomic::Ordering;

use crate::context::RootContext;
use crate::pipeline::Pipeline;
use crate::stage::Stage;

/// Answers "may this CPU enter a low-power state now".
pub type IdleHook = fn(cpu: usize) -> bool;

impl Pipeline {
    pub fn set_idle_hook(&self, hook: IdleHook) {
        self.idle_hook.store(hook as *mut (), Ordering::Release);
    }

    pub fn clear_idle_hook(&self) {
        self.idle_hook.store(ptr::null_mut(), Ordering::Release);
    }

    pub fn idle_entry_allowed(&self, _ctx: &RootContext) -> bool {
        let cpu = self.cpu();
        if !cpu.stage(Stage::Head).log.is_empty() || self.root_work_pending() {
            return false;
        }
        let p = self.idle_hook.load(Ordering::Acquire);
        if p.is_null() {
            return true;
        }
        let hook: IdleHook = unsafe { mem::transmute(p) };
        hook(cpu.id)
    }
}
