//! An in-memory model of the perfmon facility.
//!
//! [`SimulatedPerfmon`] answers the same control calls as the kernel device,
//! decoded through the same [`ControlVocabulary`], so the session protocol can
//! be exercised on machines without the hardware.
//!
//! ```
//! use perfmon::simulated::{SimulatedPerfmon, M1_CYCLE_COUNTER};
//! use perfmon::{ControlVocabulary, Session};
//!
//! let device = SimulatedPerfmon::apple_m1(ControlVocabulary::xnu());
//! let mut session = Session::with_device(device, ControlVocabulary::xnu())?;
//!
//! session.get_layout()?;
//! let before = session.sample()?;
//! let after = session.sample()?;
//!
//! assert!(after.delta(&before, 0, M1_CYCLE_COUNTER).unwrap() > 0);
//! # Ok::<(), perfmon::error::Error>(())
//! ```
//!
//! [`ControlVocabulary`]: ../struct.ControlVocabulary.html

use std::collections::{BTreeMap, HashMap};
use std::io;

use crate::device::ControlDevice;
use crate::event::Event;
use crate::layout::{Layout, Spec};
use crate::vocabulary::{ControlCall, ControlVocabulary};

/// Register names reported by `/dev/perfmon_core` on an M1.
pub const M1_CORE_REGISTERS: [&str; 25] = [
    "PMCR0",
    "PMCR1",
    "PMCR2",
    "PMCR3",
    "PMCR4",
    "PMESR0",
    "PMESR1",
    "PMSR",
    "OPMAT0",
    "OPMAT1",
    "PMCR_BVRNG4",
    "PMCR_BVRNG5",
    "PM_MEMFLT_CTL23",
    "PM_MEMFLT_CTL45",
    "PMMMAP",
    "PMC0",
    "PMC1",
    "PMC2",
    "PMC3",
    "PMC4",
    "PMC5",
    "PMC6",
    "PMC7",
    "PMC8",
    "PMC9",
];

/// Index of the fixed cycle counter (`PMC0`) in [`M1_CORE_REGISTERS`].
///
/// [`M1_CORE_REGISTERS`]: constant.M1_CORE_REGISTERS.html
pub const M1_CYCLE_COUNTER: usize = 15;

/// Cycles the simulated M1 cycle counter advances between two samples.
pub const M1_CYCLES_PER_SAMPLE: u64 = 1_200;

/// A simulated perfmon device.
///
/// Every `SAMPLE_REGS` call advances each register by its configured
/// increment (wrapping at 2^64) before reporting. Registering an event on
/// counter slot `n` makes register `PMCn`, when present, advance by the
/// event number on every later sample.
#[derive(Debug, Clone)]
pub struct SimulatedPerfmon {
    vocabulary: ControlVocabulary,
    registers: Vec<String>,
    unit_count: u16,
    supported_attributes: u64,
    values: Vec<u64>,
    increments: Vec<u64>,
    slots: BTreeMap<u16, Event>,
    failures: HashMap<ControlCall, i32>,
    calls: Vec<ControlCall>,
}

impl SimulatedPerfmon {
    /// A device with the given register names on `unit_count` units.
    ///
    /// All counters start at zero and do not advance; every attribute is
    /// granted on negotiation.
    ///
    /// # Panics
    ///
    /// If there are more registers than a layout can report.
    pub fn new<I, S>(vocabulary: ControlVocabulary, registers: I, unit_count: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registers: Vec<String> = registers.into_iter().map(Into::into).collect();
        let reg_count = registers.len();
        assert!(
            reg_count <= u16::MAX as usize,
            "{} registers do not fit a layout",
            reg_count
        );

        Self {
            vocabulary,
            registers,
            unit_count,
            supported_attributes: u64::MAX,
            values: vec![0; reg_count * unit_count as usize],
            increments: vec![0; reg_count],
            slots: BTreeMap::new(),
            failures: HashMap::new(),
            calls: vec![],
        }
    }

    /// The core-local device of an M1: 25 registers on one unit, with a
    /// running cycle counter at [`M1_CYCLE_COUNTER`].
    ///
    /// [`M1_CYCLE_COUNTER`]: constant.M1_CYCLE_COUNTER.html
    pub fn apple_m1(vocabulary: ControlVocabulary) -> Self {
        Self::new(vocabulary, M1_CORE_REGISTERS.iter().copied(), 1)
            .with_increment(M1_CYCLE_COUNTER, M1_CYCLES_PER_SAMPLE)
    }

    /// Grant only the attributes in `mask` during negotiation.
    pub fn with_supported_attributes(self, mask: u64) -> Self {
        Self {
            supported_attributes: mask,
            ..self
        }
    }

    /// Advance `register` by `step` on every sample.
    ///
    /// # Panics
    ///
    /// If `register` is not a register of this device.
    pub fn with_increment(mut self, register: usize, step: u64) -> Self {
        assert!(
            register < self.registers.len(),
            "no register {} on a {} register device",
            register,
            self.registers.len()
        );
        self.increments[register] = step;
        self
    }

    /// Preset the counter value of `register` on `unit`.
    ///
    /// # Panics
    ///
    /// If `unit` or `register` is out of range.
    pub fn with_value(mut self, unit: usize, register: usize, value: u64) -> Self {
        self.check_register(unit, register);
        let at = unit * self.registers.len() + register;
        self.values[at] = value;
        self
    }

    /// Fail the next `call` with OS error `errno`.
    pub fn fail_next(&mut self, call: ControlCall, errno: i32) {
        self.failures.insert(call, errno);
    }

    /// Every control call received, in order.
    pub fn calls(&self) -> &[ControlCall] {
        &self.calls
    }

    /// The events bound so far, ordered by counter slot.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.slots.values()
    }

    fn check_register(&self, unit: usize, register: usize) {
        assert!(
            unit < self.unit_count as usize && register < self.registers.len(),
            "no register {} on unit {} of a {} register, {} unit device",
            register,
            unit,
            self.registers.len(),
            self.unit_count
        );
    }

    fn layout(&self) -> Layout {
        Layout {
            register_count: self.registers.len() as u16,
            unit_count: self.unit_count,
        }
    }

    fn tick(&mut self) {
        let width = self.registers.len();
        for (i, v) in self.values.iter_mut().enumerate() {
            *v = v.wrapping_add(self.increments[i % width]);
        }
    }

    fn add_event(&mut self, event: Event) -> io::Result<()> {
        if event.counter_slot as usize >= self.registers.len() {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        if self.slots.contains_key(&event.counter_slot) {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }

        let counter = format!("PMC{}", event.counter_slot);
        if let Some(idx) = self.registers.iter().position(|r| *r == counter) {
            self.increments[idx] = event.number;
        }

        self.slots.insert(event.counter_slot, event);
        Ok(())
    }
}

fn require_len(arg: &[u8], len: usize, errno: i32) -> io::Result<()> {
    if arg.len() < len {
        return Err(io::Error::from_raw_os_error(errno));
    }
    Ok(())
}

impl ControlDevice for SimulatedPerfmon {
    fn control(&mut self, request: u64, arg: &mut [u8]) -> io::Result<()> {
        let call = match self.vocabulary.call_for(request) {
            Some(c) => c,
            None => return Err(io::Error::from_raw_os_error(libc::ENOTTY)),
        };

        self.calls.push(call);

        if let Some(errno) = self.failures.remove(&call) {
            return Err(io::Error::from_raw_os_error(errno));
        }

        match call {
            ControlCall::GetLayout => {
                let format = self.vocabulary.layout;
                require_len(arg, format.size, libc::EINVAL)?;
                format.encode(self.layout(), arg);
            }
            ControlCall::Specify => {
                let format = self.vocabulary.spec;
                require_len(arg, format.size, libc::EINVAL)?;

                let requested = format.decode(arg);
                let granted = Spec::new(requested.attributes & self.supported_attributes);
                arg[..format.size].copy_from_slice(&format.encode(granted));
            }
            ControlCall::ListRegs => {
                let width = self.vocabulary.name_width;
                require_len(arg, self.registers.len() * width, libc::EFAULT)?;

                for (slot, name) in arg.chunks_exact_mut(width).zip(&self.registers) {
                    let name = name.as_bytes();
                    let len = name.len().min(width - 1);
                    slot.iter_mut().for_each(|b| *b = 0);
                    slot[..len].copy_from_slice(&name[..len]);
                }
            }
            ControlCall::SampleRegs => {
                require_len(arg, self.values.len() * 8, libc::EFAULT)?;

                self.tick();
                for (out, v) in arg.chunks_exact_mut(8).zip(&self.values) {
                    out.copy_from_slice(&v.to_ne_bytes());
                }
            }
            ControlCall::AddEvent => {
                let format = self.vocabulary.event;
                require_len(arg, format.size, libc::EINVAL)?;
                self.add_event(format.decode(arg))?;
            }
            ControlCall::Configure => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m1() -> (SimulatedPerfmon, ControlVocabulary) {
        let vocab = ControlVocabulary::xnu();
        (SimulatedPerfmon::apple_m1(vocab.clone()), vocab)
    }

    #[test]
    #[should_panic(expected = "do not fit a layout")]
    fn test_too_many_registers() {
        let names = (0..=u16::MAX as usize).map(|i| format!("R{}", i));
        SimulatedPerfmon::new(ControlVocabulary::xnu(), names, 1);
    }

    #[test]
    fn test_largest_register_set() {
        let names = (0..u16::MAX as usize).map(|i| format!("R{}", i));
        let dev = SimulatedPerfmon::new(ControlVocabulary::xnu(), names, 1);

        assert_eq!(dev.layout().register_count, u16::MAX);
    }

    #[test]
    #[should_panic(expected = "no register 25")]
    fn test_increment_out_of_range() {
        let (dev, _) = m1();
        dev.with_increment(25, 1);
    }

    #[test]
    #[should_panic(expected = "no register 0 on unit 1")]
    fn test_value_on_missing_unit() {
        let (dev, _) = m1();
        dev.with_value(1, 0, 7);
    }

    #[test]
    fn test_unknown_request() {
        let (mut dev, _) = m1();
        let err = dev.control(0x1234, &mut []).unwrap_err();

        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_short_sample_buffer_faults() {
        let (mut dev, vocab) = m1();
        let mut buf = vec![0u8; 8 * 24];

        let err = dev.control(vocab.sample_regs, &mut buf).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EFAULT));
    }

    #[test]
    fn test_failure_injection_is_one_shot() {
        let (mut dev, vocab) = m1();
        dev.fail_next(ControlCall::Configure, libc::EPERM);

        let err = dev.control(vocab.configure, &mut []).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EPERM));
        assert!(dev.control(vocab.configure, &mut []).is_ok());
        assert_eq!(
            dev.calls(),
            &[ControlCall::Configure, ControlCall::Configure]
        );
    }

    #[test]
    fn test_event_drives_matching_counter() {
        let (mut dev, vocab) = m1();
        let mut buf = vocab
            .event
            .encode(&Event::new("INST_ALL", 7, 2))
            .expect("failed to encode event");
        dev.control(vocab.add_event, &mut buf)
            .expect("failed to add event");

        let mut values = vec![0u8; 25 * 8];
        dev.control(vocab.sample_regs, &mut values)
            .expect("failed to sample");

        // PMC2 is register 17
        assert_eq!(&values[17 * 8..18 * 8], &7u64.to_ne_bytes());
        assert_eq!(dev.events().count(), 1);
    }

    #[test]
    fn test_duplicate_slot_is_busy() {
        let (mut dev, vocab) = m1();
        let mut first = vocab.event.encode(&Event::new("a", 1, 3)).unwrap();
        let mut second = vocab.event.encode(&Event::new("b", 2, 3)).unwrap();

        dev.control(vocab.add_event, &mut first).unwrap();
        let err = dev.control(vocab.add_event, &mut second).unwrap_err();

        assert_eq!(err.raw_os_error(), Some(libc::EBUSY));
    }
}
