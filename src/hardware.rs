use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(target_arch = "aarch64")]
use crate::asm::*;
#[cfg(not(target_arch = "aarch64"))]
use crate::stubs::*;

use crate::pac::{encode_pac, extract_pac, poison, strip};

/// System registers readable through a [`HardwareCapability`].
///
/// [`HardwareCapability`]: trait.HardwareCapability.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialRegister {
    /// `TPIDRRO_EL0`, whose low bits hold the executing core number.
    CoreId,
    /// PMC control register 0 (`S3_1_c15_c0_0`).
    Pmcr0,
    /// PMC control register 1 (`S3_1_c15_c1_0`).
    Pmcr1,
    /// The fixed cycle counter (`S3_2_c15_c0_0`).
    Pmc0,
    /// The fixed instruction counter (`S3_2_c15_c1_0`).
    Pmc1,
}

impl SpecialRegister {
    /// Every readable register.
    pub const ALL: [SpecialRegister; 5] = [
        SpecialRegister::CoreId,
        SpecialRegister::Pmcr0,
        SpecialRegister::Pmcr1,
        SpecialRegister::Pmc0,
        SpecialRegister::Pmc1,
    ];

    /// The assembler name of the register.
    pub fn encoding(&self) -> &'static str {
        match self {
            SpecialRegister::CoreId => "TPIDRRO_EL0",
            SpecialRegister::Pmcr0 => "S3_1_c15_c0_0",
            SpecialRegister::Pmcr1 => "S3_1_c15_c1_0",
            SpecialRegister::Pmc0 => "S3_2_c15_c0_0",
            SpecialRegister::Pmc1 => "S3_2_c15_c1_0",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// The instruction-level operations the PAC primitives and the core-id reader
/// are built on.
///
/// Implementations must be pure with respect to `sign` and `authenticate`:
/// the same inputs always produce the same output.
pub trait HardwareCapability {
    /// Sign `address` with the A instruction key and modifier `salt`.
    fn sign(&self, address: u64, salt: u64) -> u64;

    /// Authenticate `pointer` with the A instruction key and modifier `salt`.
    ///
    /// Returns the address when the PAC matches, or a poisoned, non-canonical
    /// value when it does not.
    fn authenticate(&self, pointer: u64, salt: u64) -> u64;

    /// Read a system register.
    fn read_special_register(&self, register: SpecialRegister) -> u64;
}

/// The instructions of the executing CPU.
///
/// On targets other than `aarch64` every operation panics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Native;

impl HardwareCapability for Native {
    fn sign(&self, address: u64, salt: u64) -> u64 {
        unsafe { pacia(address, salt) }
    }

    fn authenticate(&self, pointer: u64, salt: u64) -> u64 {
        unsafe { autia(pointer, salt) }
    }

    fn read_special_register(&self, register: SpecialRegister) -> u64 {
        unsafe {
            match register {
                SpecialRegister::CoreId => read_tpidrro_el0(),
                SpecialRegister::Pmcr0 => read_pmcr0(),
                SpecialRegister::Pmcr1 => read_pmcr1(),
                SpecialRegister::Pmc0 => read_pmc0(),
                SpecialRegister::Pmc1 => read_pmc1(),
            }
        }
    }
}

/// A software model of the PAC unit and system registers.
///
/// The PAC is a 16 bit keyed hash of the address and salt, placed where the
/// hardware places it. The counters advance on every read, wrapping at 2^64.
///
/// As on hardware, a PAC is only 16 bits, so two different salts give the same
/// PAC for an address about once in 65536 pairs. A pointer signed under one of
/// them then authenticates under the other. Searching all [`NUM_PACS`] values
/// always finds the PAC that authenticates.
///
/// [`NUM_PACS`]: ../pac/constant.NUM_PACS.html
/// All state is atomic, so a `Simulated` can be shared between threads.
///
/// ```
/// use perfmon::hardware::{HardwareCapability, Simulated, SpecialRegister};
///
/// let hw = Simulated::new(0x5eed);
/// hw.set_register(SpecialRegister::CoreId, 6);
///
/// assert_eq!(perfmon::current_core(&hw), 6);
/// ```
#[derive(Debug)]
pub struct Simulated {
    key: u64,
    registers: [AtomicU64; 5],
    steps: [u64; 5],
}

/// Cycles the simulated `PMC0` advances per read.
pub const SIMULATED_CYCLES_PER_READ: u64 = 64;

/// Instructions the simulated `PMC1` advances per read.
pub const SIMULATED_INSTRUCTIONS_PER_READ: u64 = 16;

impl Simulated {
    /// A model whose PAC key is `key`.
    pub fn new(key: u64) -> Self {
        let mut steps = [0; 5];
        steps[SpecialRegister::Pmc0.index()] = SIMULATED_CYCLES_PER_READ;
        steps[SpecialRegister::Pmc1.index()] = SIMULATED_INSTRUCTIONS_PER_READ;

        Self {
            key,
            registers: Default::default(),
            steps,
        }
    }

    /// Overwrite the raw contents of `register`.
    pub fn set_register(&self, register: SpecialRegister, value: u64) {
        self.registers[register.index()].store(value, Ordering::SeqCst);
    }

    fn pac(&self, address: u64, salt: u64) -> u16 {
        (mix(address ^ mix(salt ^ self.key)) >> 48) as u16
    }
}

impl Default for Simulated {
    fn default() -> Self {
        Self::new(0)
    }
}

impl HardwareCapability for Simulated {
    fn sign(&self, address: u64, salt: u64) -> u64 {
        let address = strip(address);
        encode_pac(self.pac(address, salt), address)
    }

    fn authenticate(&self, pointer: u64, salt: u64) -> u64 {
        let address = strip(pointer);
        if extract_pac(pointer) == self.pac(address, salt) {
            address
        } else {
            poison(address)
        }
    }

    fn read_special_register(&self, register: SpecialRegister) -> u64 {
        let i = register.index();
        let step = self.steps[i];
        self.registers[i]
            .fetch_add(step, Ordering::SeqCst)
            .wrapping_add(step)
    }
}

// splitmix64 finaliser
fn mix(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
