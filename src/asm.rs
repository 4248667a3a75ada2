//! Raw instruction emission for the `aarch64` hardware capability.
//!
//! The PMC registers (`S3_1_c15_*`, `S3_2_c15_*`) are only readable from EL0
//! when the kernel has opened them to user space; otherwise reading them
//! raises an undefined-instruction exception.

use std::arch::asm;

/// PACIA1716: sign `addr` with the A instruction key, modifier `salt`.
#[inline(always)]
pub unsafe fn pacia(addr: u64, salt: u64) -> u64 {
    let mut result = addr;
    asm!(
        "hint #8",
        inout("x17") result,
        in("x16") salt,
        options(nomem, nostack, preserves_flags),
    );
    result
}

/// AUTIA1716: authenticate `addr` with the A instruction key, modifier `salt`.
#[inline(always)]
pub unsafe fn autia(addr: u64, salt: u64) -> u64 {
    let mut result = addr;
    asm!(
        "hint #12",
        inout("x17") result,
        in("x16") salt,
        options(nomem, nostack, preserves_flags),
    );
    result
}

#[inline(always)]
pub unsafe fn read_tpidrro_el0() -> u64 {
    let val: u64;
    asm!("mrs {}, tpidrro_el0", out(reg) val, options(nomem, nostack, preserves_flags));
    val
}

#[inline(always)]
pub unsafe fn read_pmcr0() -> u64 {
    let val: u64;
    asm!("mrs {}, s3_1_c15_c0_0", out(reg) val, options(nomem, nostack, preserves_flags));
    val
}

#[inline(always)]
pub unsafe fn read_pmcr1() -> u64 {
    let val: u64;
    asm!("mrs {}, s3_1_c15_c1_0", out(reg) val, options(nomem, nostack, preserves_flags));
    val
}

#[inline(always)]
pub unsafe fn read_pmc0() -> u64 {
    let val: u64;
    asm!("isb", "mrs {}, s3_2_c15_c0_0", out(reg) val, options(nomem, nostack, preserves_flags));
    val
}

#[inline(always)]
pub unsafe fn read_pmc1() -> u64 {
    let val: u64;
    asm!("isb", "mrs {}, s3_2_c15_c1_0", out(reg) val, options(nomem, nostack, preserves_flags));
    val
}
