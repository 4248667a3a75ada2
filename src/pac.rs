//! Pointer authentication codes (PACs).
//!
//! A signed pointer carries a 16 bit PAC in the bits above the 47 bit virtual
//! address:
//!
//! ```text
//! 63        56| 55 |54      47|46      0|
//! +-----------+----+----------+---------+
//! | PAC[15:8] | EL | PAC[7:0] | Address |
//! +-----------+----+----------+---------+
//! ```
//!
//! `EL` is 1 for kernel pointers and 0 for user pointers and is preserved by
//! signing.
//!
//! # Authentication failure
//!
//! [`authenticate`] never reports failure as an error. When the salt does not
//! match the one used to sign, the hardware replaces the PAC bits with a poison
//! pattern that makes the pointer non-canonical. Nothing happens until the
//! poisoned value is used: loading from it or branching to it raises a
//! translation fault in hardware, which arrives as a signal
//! (`SIGSEGV`/`SIGBUS`), not as a return value. This is an architectural
//! contract of the instruction, and callers probing PACs must arrange for that
//! fault themselves.
//!
//! [`authenticate`]: fn.authenticate.html

use crate::hardware::HardwareCapability;

/// A 16 bit pointer authentication code.
pub type Pac = u16;

/// The bits of a pointer that hold the PAC and the `EL` bit.
pub const PAC_BITMASK: u64 = 0xFFFF_8000_0000_0000;

/// Number of distinct PACs.
pub const NUM_PACS: usize = 1 << 16;

const EL_BIT: u64 = 1 << 55;
const POISON_SHIFT: u32 = 53;

/// Returns the PAC part of a signed pointer.
pub fn extract_pac(signed_pointer: u64) -> Pac {
    let lower = (signed_pointer >> 47) & 0xff;
    let upper = (signed_pointer >> 56) & 0xff;
    ((upper << 8) | lower) as Pac
}

/// Place `pac` into `pointer`, keeping the address and `EL` bits.
pub fn encode_pac(pac: Pac, pointer: u64) -> u64 {
    let lower = (pac as u64 & 0xff) << 47;
    let upper = ((pac as u64 >> 8) & 0xff) << 56;

    (pointer & !PAC_BITMASK) | lower | upper | (pointer & EL_BIT)
}

/// True for kernel pointers (bit 55 set).
pub fn is_kernel_pointer(addr: u64) -> bool {
    addr & EL_BIT != 0
}

/// Remove the PAC, restoring the canonical form selected by the `EL` bit.
pub fn strip(pointer: u64) -> u64 {
    if is_kernel_pointer(pointer) {
        pointer | PAC_BITMASK
    } else {
        pointer & !PAC_BITMASK
    }
}

/// The value a failed authentication yields for `address`.
pub(crate) fn poison(address: u64) -> u64 {
    (address & !(0b11 << POISON_SHIFT)) | (0b01 << POISON_SHIFT)
}

/// A pointer carrying a PAC in its high bits.
///
/// It has the width and representation of a plain pointer; only
/// [`authenticate`] with the signing salt gives the address back in usable
/// form.
///
/// [`authenticate`]: fn.authenticate.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignedPointer(u64);

impl SignedPointer {
    /// Wrap a raw pointer value.
    pub fn from_raw(raw: u64) -> Self {
        SignedPointer(raw)
    }

    /// The pointer bits, PAC included.
    pub fn raw(&self) -> u64 {
        self.0
    }

    /// The PAC carried by this pointer.
    pub fn pac(&self) -> Pac {
        extract_pac(self.0)
    }

    /// The same address under a different PAC.
    pub fn with_pac(&self, pac: Pac) -> Self {
        SignedPointer(encode_pac(pac, self.0))
    }

    /// The canonical address, without checking the PAC.
    pub fn stripped(&self) -> u64 {
        strip(self.0)
    }

    /// True for kernel pointers.
    pub fn is_kernel(&self) -> bool {
        is_kernel_pointer(self.0)
    }
}

impl std::fmt::Display for SignedPointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Sign `address` under `salt`.
///
/// ```
/// use perfmon::hardware::Simulated;
/// use perfmon::pac;
///
/// let hw = Simulated::new(0x5eed);
/// let signed = pac::sign(&hw, 0x1_0000_4000, 0xfeed);
///
/// assert_eq!(pac::authenticate(&hw, signed, 0xfeed), 0x1_0000_4000);
/// ```
pub fn sign<H: HardwareCapability + ?Sized>(hw: &H, address: u64, salt: u64) -> SignedPointer {
    SignedPointer(hw.sign(address, salt))
}

/// Authenticate `pointer` under `salt`.
///
/// Returns the address when `salt` is the signing salt, or another salt that
/// happens to produce the same 16 bit PAC. Otherwise the result is poisoned; see the [module documentation](index.html#authentication-failure).
pub fn authenticate<H: HardwareCapability + ?Sized>(
    hw: &H,
    pointer: SignedPointer,
    salt: u64,
) -> u64 {
    hw.authenticate(pointer.0, salt)
}

/// Iterates over `addr` signed with every possible PAC, in PAC order.
#[derive(Debug, Clone)]
pub struct PacIterator {
    pacs: std::ops::RangeInclusive<Pac>,
    addr: u64,
}

impl Iterator for PacIterator {
    type Item = SignedPointer;

    fn next(&mut self) -> Option<Self::Item> {
        let addr = self.addr;
        self.pacs
            .next()
            .map(|pac| SignedPointer(encode_pac(pac, addr)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pacs.size_hint()
    }
}

impl ExactSizeIterator for PacIterator {}

/// Every candidate signed form of `addr`, for brute forcing a PAC.
pub fn iterate_pacs(addr: u64) -> PacIterator {
    PacIterator {
        pacs: 0..=Pac::MAX,
        addr: strip(addr),
    }
}
