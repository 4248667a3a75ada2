//! The control-call vocabulary spoken by a perfmon device.
//!
//! The numeric request codes and the in-memory layout of every argument
//! structure are defined by the kernel, not by this crate. A
//! [`ControlVocabulary`] carries them into a [`Session`] so the protocol logic
//! never embeds platform constants. [`ControlVocabulary::xnu`] is a preset for
//! the `machine_perfmon.h` interface shipped in Kernel.framework.
//!
//! [`Session`]: ../struct.Session.html

use std::fmt;

use crate::error::{new_error, Error, ErrorKind};
use crate::event::Event;
use crate::layout::{Layout, Spec};

/// The control calls understood by a perfmon device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCall {
    /// Fill a layout structure with the register and unit counts.
    GetLayout,
    /// Submit a requested spec, receive the negotiated one.
    Specify,
    /// Fill an array of fixed-width register names.
    ListRegs,
    /// Fill a `unit × register` array of counter values.
    SampleRegs,
    /// Bind a named hardware event to a counter slot.
    AddEvent,
    /// Program the registered events into hardware.
    Configure,
}

impl ControlCall {
    /// Every control call, in vocabulary order.
    pub const ALL: [ControlCall; 6] = [
        ControlCall::GetLayout,
        ControlCall::Specify,
        ControlCall::ListRegs,
        ControlCall::SampleRegs,
        ControlCall::AddEvent,
        ControlCall::Configure,
    ];

    /// The name the kernel headers use for this call, without the
    /// `PERFMON_CTL_` prefix.
    pub fn name(&self) -> &'static str {
        match self {
            ControlCall::GetLayout => "GET_LAYOUT",
            ControlCall::Specify => "SPECIFY",
            ControlCall::ListRegs => "LIST_REGS",
            ControlCall::SampleRegs => "SAMPLE_REGS",
            ControlCall::AddEvent => "ADD_EVENT",
            ControlCall::Configure => "CONFIGURE",
        }
    }
}

impl fmt::Display for ControlCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte layout of the structure filled by `GET_LAYOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutFormat {
    /// Total structure size in bytes.
    pub size: usize,
    /// Offset of the native-endian `u16` register count.
    pub reg_count_offset: usize,
    /// Offset of the native-endian `u16` sampling unit count.
    pub unit_count_offset: usize,
}

/// Byte layout of the structure exchanged by `SPECIFY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecFormat {
    /// Total structure size in bytes.
    pub size: usize,
    /// Offset of the native-endian `u64` attribute mask.
    pub attributes_offset: usize,
}

/// Byte layout of the structure submitted by `ADD_EVENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFormat {
    /// Total structure size in bytes.
    pub size: usize,
    /// Offset of the NUL-terminated event name.
    pub name_offset: usize,
    /// Width of the event name field, terminator included.
    pub name_width: usize,
    /// Offset of the native-endian `u64` event number.
    pub number_offset: usize,
    /// Offset of the native-endian `u16` counter slot.
    pub counter_offset: usize,
}

/// Request codes and argument layouts for one perfmon facility.
///
/// ```
/// use perfmon::ControlVocabulary;
///
/// let mut vocab = ControlVocabulary::xnu();
/// vocab.name_width = 32;
/// assert!(vocab.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlVocabulary {
    /// Request code of `PERFMON_CTL_GET_LAYOUT`.
    pub get_layout: u64,
    /// Request code of `PERFMON_CTL_SPECIFY`.
    pub specify: u64,
    /// Request code of `PERFMON_CTL_LIST_REGS`.
    pub list_regs: u64,
    /// Request code of `PERFMON_CTL_SAMPLE_REGS`.
    pub sample_regs: u64,
    /// Request code of `PERFMON_CTL_ADD_EVENT`.
    pub add_event: u64,
    /// Request code of `PERFMON_CTL_CONFIGURE`.
    pub configure: u64,

    /// Width of one register name slot returned by `LIST_REGS`.
    pub name_width: usize,

    /// Layout of the `GET_LAYOUT` reply.
    pub layout: LayoutFormat,
    /// Layout of the `SPECIFY` argument.
    pub spec: SpecFormat,
    /// Layout of the `ADD_EVENT` argument.
    pub event: EventFormat,
}

const IOC_VOID: u64 = 0x2000_0000;
const IOC_OUT: u64 = 0x4000_0000;
const IOC_IN: u64 = 0x8000_0000;
const IOC_INOUT: u64 = IOC_IN | IOC_OUT;
const IOCPARM_MASK: u64 = 0x1fff;

/// Encode a BSD-style ioctl request number.
pub const fn ioc(inout: u64, group: u8, num: u8, len: usize) -> u64 {
    inout | ((len as u64 & IOCPARM_MASK) << 16) | ((group as u64) << 8) | num as u64
}

const PERFMON_IOC: u8 = b'P';

const XNU_LAYOUT: LayoutFormat = LayoutFormat {
    // pl_counter_count, pl_fixed_offset, pl_fixed_count, pl_unit_count,
    // pl_reg_count, pl_attr_count
    size: 12,
    unit_count_offset: 6,
    reg_count_offset: 8,
};

const XNU_SPEC: SpecFormat = SpecFormat {
    // ps_events, ps_attrs, ps_event_count, ps_attr_count
    size: 24,
    attributes_offset: 8,
};

const XNU_EVENT: EventFormat = EventFormat {
    // pe_name[32], pe_number, pe_counter
    size: 48,
    name_offset: 0,
    name_width: 32,
    number_offset: 32,
    counter_offset: 40,
};

impl ControlVocabulary {
    /// The `perfmon` ioctl interface of XNU on Apple Silicon.
    pub fn xnu() -> Self {
        Self {
            get_layout: ioc(IOC_OUT, PERFMON_IOC, 0, XNU_LAYOUT.size),
            list_regs: ioc(IOC_VOID, PERFMON_IOC, 2, 0),
            sample_regs: ioc(IOC_VOID, PERFMON_IOC, 3, 0),
            add_event: ioc(IOC_INOUT, PERFMON_IOC, 5, XNU_EVENT.size),
            configure: ioc(IOC_VOID, PERFMON_IOC, 6, 0),
            specify: ioc(IOC_INOUT, PERFMON_IOC, 10, XNU_SPEC.size),
            name_width: 16,
            layout: XNU_LAYOUT,
            spec: XNU_SPEC,
            event: XNU_EVENT,
        }
    }

    /// The request code for `call`.
    pub fn code(&self, call: ControlCall) -> u64 {
        match call {
            ControlCall::GetLayout => self.get_layout,
            ControlCall::Specify => self.specify,
            ControlCall::ListRegs => self.list_regs,
            ControlCall::SampleRegs => self.sample_regs,
            ControlCall::AddEvent => self.add_event,
            ControlCall::Configure => self.configure,
        }
    }

    /// Map a request code back to the call it names.
    pub fn call_for(&self, code: u64) -> Option<ControlCall> {
        ControlCall::ALL.iter().copied().find(|c| self.code(*c) == code)
    }

    /// Check that every field of every wire format lies inside its structure
    /// without overlapping another field, and that no two calls share a
    /// request code.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = || new_error(ErrorKind::InvalidVocabulary);

        for (i, a) in ControlCall::ALL.iter().enumerate() {
            if ControlCall::ALL[i + 1..]
                .iter()
                .any(|b| self.code(*a) == self.code(*b))
            {
                return Err(invalid());
            }
        }

        // Room for at least one character plus the terminator.
        if self.name_width < 2 || self.event.name_width < 2 {
            return Err(invalid());
        }

        let l = &self.layout;
        let s = &self.spec;
        let e = &self.event;
        let fits = |offset: usize, width: usize, size: usize| {
            offset.checked_add(width).map_or(false, |end| end <= size)
        };

        if !fits(l.reg_count_offset, 2, l.size)
            || !fits(l.unit_count_offset, 2, l.size)
            || !fits(s.attributes_offset, 8, s.size)
            || !fits(e.name_offset, e.name_width, e.size)
            || !fits(e.number_offset, 8, e.size)
            || !fits(e.counter_offset, 2, e.size)
        {
            return Err(invalid());
        }

        let disjoint =
            |a: (usize, usize), b: (usize, usize)| a.0 + a.1 <= b.0 || b.0 + b.1 <= a.0;

        if !disjoint((l.reg_count_offset, 2), (l.unit_count_offset, 2))
            || !disjoint((e.name_offset, e.name_width), (e.number_offset, 8))
            || !disjoint((e.name_offset, e.name_width), (e.counter_offset, 2))
            || !disjoint((e.number_offset, 8), (e.counter_offset, 2))
        {
            return Err(invalid());
        }

        Ok(())
    }
}

impl LayoutFormat {
    pub(crate) fn decode(&self, buf: &[u8]) -> Layout {
        Layout {
            register_count: read_u16(buf, self.reg_count_offset),
            unit_count: read_u16(buf, self.unit_count_offset),
        }
    }

    pub(crate) fn encode(&self, layout: Layout, buf: &mut [u8]) {
        write_u16(buf, self.reg_count_offset, layout.register_count);
        write_u16(buf, self.unit_count_offset, layout.unit_count);
    }
}

impl SpecFormat {
    pub(crate) fn encode(&self, spec: Spec) -> Vec<u8> {
        let mut buf = vec![0; self.size];
        write_u64(&mut buf, self.attributes_offset, spec.attributes);
        buf
    }

    pub(crate) fn decode(&self, buf: &[u8]) -> Spec {
        Spec {
            attributes: read_u64(buf, self.attributes_offset),
        }
    }
}

impl EventFormat {
    pub(crate) fn encode(&self, event: &Event) -> Result<Vec<u8>, Error> {
        let name = event.name.as_bytes();
        if name.is_empty() || name.contains(&0) || name.len() >= self.name_width {
            return Err(new_error(ErrorKind::InvalidEventName));
        }

        let mut buf = vec![0; self.size];
        buf[self.name_offset..self.name_offset + name.len()].copy_from_slice(name);
        write_u64(&mut buf, self.number_offset, event.number);
        write_u16(&mut buf, self.counter_offset, event.counter_slot);

        Ok(buf)
    }

    pub(crate) fn decode(&self, buf: &[u8]) -> Event {
        Event {
            name: decode_name(&buf[self.name_offset..self.name_offset + self.name_width]),
            number: read_u64(buf, self.number_offset),
            counter_slot: read_u16(buf, self.counter_offset),
        }
    }
}

/// Decode a NUL-padded fixed-width name.
pub(crate) fn decode_name(slot: &[u8]) -> String {
    let end = slot.iter().position(|b| *b == 0).unwrap_or(slot.len());
    String::from_utf8_lossy(&slot[..end]).into_owned()
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_ne_bytes([buf[at], buf[at + 1]])
}

fn write_u16(buf: &mut [u8], at: usize, v: u16) {
    buf[at..at + 2].copy_from_slice(&v.to_ne_bytes());
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut b = [0; 8];
    b.copy_from_slice(&buf[at..at + 8]);
    u64::from_ne_bytes(b)
}

fn write_u64(buf: &mut [u8], at: usize, v: u64) {
    buf[at..at + 8].copy_from_slice(&v.to_ne_bytes());
}
