use crate::hardware::{HardwareCapability, SpecialRegister};

/// Bits of `TPIDRRO_EL0` that hold the core number.
pub const CORE_ID_MASK: u64 = 0x7;

/// The number of the core executing the caller, in `0..=7`.
///
/// The value is read from `TPIDRRO_EL0`, which the kernel updates on every
/// context switch. If the thread migrates between the read and the use of the
/// result the value is stale; pin the thread first (see [`affinity`]) when the
/// answer matters.
///
/// [`affinity`]: affinity/index.html
pub fn current_core<H: HardwareCapability + ?Sized>(hw: &H) -> u8 {
    (hw.read_special_register(SpecialRegister::CoreId) & CORE_ID_MASK) as u8
}
