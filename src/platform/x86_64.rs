//! Uniprocessor x86_64 adapter: RFLAGS.IF masking plus a mask+ack line
//! strategy for the legacy 8259 pair.

use pic8259::ChainedPics;
use x86_64::instructions::interrupts;

use crate::binding::LineOps;
use crate::irq::Irq;
use crate::platform::Platform;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub static PICS: spin::Mutex<ChainedPics> =
    spin::Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

pub struct X86Platform;

impl Platform for X86Platform {
    fn cpu_id(&self) -> usize {
        0
    }

    fn num_cpus(&self) -> usize {
        1
    }

    fn hw_irqs_enabled(&self) -> bool {
        interrupts::are_enabled()
    }

    fn hw_disable_irqs(&self) {
        interrupts::disable();
    }

    fn hw_enable_irqs(&self) {
        interrupts::enable();
    }
}

fn set_line_masked(vector: u8, masked: bool) {
    let line = vector.wrapping_sub(PIC_1_OFFSET);
    let mut pics = PICS.lock();
    unsafe {
        let [a, b] = pics.read_masks();
        let (a, b) = if line < 8 {
            let bit = 1u8 << line;
            if masked {
                (a | bit, b)
            } else {
                (a & !bit, b)
            }
        } else {
            let bit = 1u8 << (line - 8);
            if masked {
                (a, b | bit)
            } else {
                (a, b & !bit)
            }
        };
        pics.write_masks(a, b);
    }
}

/// Mask the line at the controller and acknowledge it, so a level source
/// cannot re-assert while its delivery is deferred.
pub fn pic_hold(irq: Irq) {
    let vector = irq.0 as u8;
    set_line_masked(vector, true);
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}

/// Unmask the line once its handler has completed.
pub fn pic_release(irq: Irq) {
    set_line_masked(irq.0 as u8, false);
}

/// Hold/release pair for level-triggered lines behind the 8259 pair.
pub fn pic_line_ops() -> LineOps {
    LineOps {
        hold: Some(pic_hold),
        release: Some(pic_release),
        unmask: None,
    }
}
