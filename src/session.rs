use std::io;
use std::path::Path;

use crate::catalog::RegisterCatalog;
use crate::device::{ControlDevice, DeviceFile};
use crate::error::{new_call_error, new_error, new_io_error, new_reply_error, Error, ErrorKind};
use crate::event::Event;
use crate::layout::{Layout, Spec};
use crate::sample::SampleMatrix;
use crate::vocabulary::{ControlCall, ControlVocabulary};

/// An open session with a perfmon control device.
///
/// A session walks the device protocol: discover the [`Layout`], negotiate a
/// [`Spec`], list the register names, optionally register events, then sample
/// as often as needed. Catalog, event and sampling calls fail with
/// [`ErrorKind::Precondition`] until the layout is known.
///
/// Dropping the session (or calling [`close`]) releases the device.
///
/// ```no_run
/// # use perfmon::*;
/// let mut session = SessionConfig::default().open()?;
///
/// let layout = session.get_layout()?;
/// let spec = session.negotiate(Spec::default())?;
/// let pmc0 = session.list_registers()?.index_of("PMC0").unwrap();
///
/// let before = session.sample()?;
/// let after = session.sample()?;
///
/// println!("{:?} cycles", after.delta(&before, 0, pmc0));
/// session.close()?;
/// #
/// # Ok::<(), error::Error>(())
/// ```
///
/// # Threads
///
/// Counter state is per core, and a `Core` session samples the core running
/// the calling thread. Every method takes `&mut self`, so calls on one session
/// are serialised by construction.
///
/// [`Layout`]: struct.Layout.html
/// [`Spec`]: struct.Spec.html
/// [`ErrorKind::Precondition`]: error/enum.ErrorKind.html#variant.Precondition
/// [`close`]: #method.close
#[derive(Debug)]
pub struct Session<D: ControlDevice = DeviceFile> {
    device: D,
    vocabulary: ControlVocabulary,
    layout: Option<Layout>,
    spec: Option<Spec>,
    registers: Option<RegisterCatalog>,
    events: Vec<Event>,
    poisoned: bool,
}

impl Session<DeviceFile> {
    /// Open the device node at `path` and start a session on it.
    pub fn open(path: impl AsRef<Path>, vocabulary: ControlVocabulary) -> Result<Self, Error> {
        Self::with_device(DeviceFile::open(path)?, vocabulary)
    }
}

impl<D: ControlDevice> Session<D> {
    /// Start a session on an open `device`.
    pub fn with_device(device: D, vocabulary: ControlVocabulary) -> Result<Self, Error> {
        vocabulary.validate()?;

        debug!("perfmon session opened");

        Ok(Session {
            device,
            vocabulary,
            layout: None,
            spec: None,
            registers: None,
            events: vec![],
            poisoned: false,
        })
    }

    fn call(&mut self, call: ControlCall, arg: &mut [u8]) -> Result<(), Error> {
        let request = self.vocabulary.code(call);
        trace!("{}: request {:#x}, {} byte argument", call, request, arg.len());

        self.device
            .control(request, arg)
            .map_err(|e| new_call_error(ErrorKind::ControlCall, call, e))
    }

    fn check_usable(&self) -> Result<(), Error> {
        if self.poisoned {
            return Err(new_error(ErrorKind::Poisoned));
        }
        Ok(())
    }

    fn require_layout(&self) -> Result<Layout, Error> {
        self.check_usable()?;
        self.layout.ok_or_else(|| new_error(ErrorKind::Precondition))
    }

    /// Discover the register and sampling unit counts of the device.
    ///
    /// The first successful discovery is cached: later calls return the same
    /// layout without issuing another control call.
    pub fn get_layout(&mut self) -> Result<Layout, Error> {
        self.check_usable()?;

        if let Some(layout) = self.layout {
            return Ok(layout);
        }

        let mut buf = vec![0; self.vocabulary.layout.size];
        self.call(ControlCall::GetLayout, &mut buf)?;

        let layout = self.vocabulary.layout.decode(&buf);
        if layout.register_count == 0 || layout.unit_count == 0 {
            return Err(new_reply_error(
                ControlCall::GetLayout,
                format!(
                    "device reported {} registers on {} units",
                    layout.register_count, layout.unit_count
                ),
            ));
        }

        debug!(
            "perfmon layout: {} registers, {} units",
            layout.register_count, layout.unit_count
        );

        self.layout = Some(layout);
        Ok(layout)
    }

    /// The discovered layout, if [`get_layout`] has succeeded.
    ///
    /// [`get_layout`]: #method.get_layout
    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Request `requested` from the device and return the spec it granted.
    ///
    /// The granted spec is authoritative and may differ from the request.
    /// If the call fails the session is poisoned: every later operation
    /// returns [`ErrorKind::Poisoned`] and the session must be closed.
    ///
    /// [`ErrorKind::Poisoned`]: error/enum.ErrorKind.html#variant.Poisoned
    pub fn negotiate(&mut self, requested: Spec) -> Result<Spec, Error> {
        self.check_usable()?;

        let mut buf = self.vocabulary.spec.encode(requested);
        if let Err(e) = self.call(ControlCall::Specify, &mut buf) {
            warn!("perfmon negotiation failed, session unusable: {}", e);
            self.poisoned = true;
            return Err(e);
        }

        let granted = self.vocabulary.spec.decode(&buf);
        if granted != requested {
            debug!(
                "perfmon negotiated attributes {:#x} (requested {:#x})",
                granted.attributes, requested.attributes
            );
        }

        self.spec = Some(granted);
        Ok(granted)
    }

    /// The spec granted by the last successful [`negotiate`].
    ///
    /// [`negotiate`]: #method.negotiate
    pub fn spec(&self) -> Option<Spec> {
        self.spec
    }

    /// Fetch the ordered register names of the device.
    ///
    /// The catalog has exactly `register_count` entries and is fetched once
    /// per session.
    pub fn list_registers(&mut self) -> Result<&RegisterCatalog, Error> {
        let layout = self.require_layout()?;

        if self.registers.is_none() {
            let width = self.vocabulary.name_width;
            let mut buf = vec![0; layout.register_count as usize * width];
            self.call(ControlCall::ListRegs, &mut buf)?;
            self.registers = Some(RegisterCatalog::decode(&buf, width));
        }

        self.registers
            .as_ref()
            .ok_or_else(|| new_error(ErrorKind::Precondition))
    }

    /// The register catalog, if [`list_registers`] has succeeded.
    ///
    /// [`list_registers`]: #method.list_registers
    pub fn registers(&self) -> Option<&RegisterCatalog> {
        self.registers.as_ref()
    }

    /// Bind `event` to its counter slot.
    ///
    /// The event affects samples taken after this call returns. A slot beyond
    /// the register range fails with [`ErrorKind::SlotOutOfRange`]; a slot
    /// already bound in this session, or refused as busy by the device, fails
    /// with [`ErrorKind::SlotCollision`].
    ///
    /// [`ErrorKind::SlotOutOfRange`]: error/enum.ErrorKind.html#variant.SlotOutOfRange
    /// [`ErrorKind::SlotCollision`]: error/enum.ErrorKind.html#variant.SlotCollision
    pub fn register_event(&mut self, event: Event) -> Result<(), Error> {
        let layout = self.require_layout()?;

        if event.counter_slot >= layout.register_count {
            return Err(new_error(ErrorKind::SlotOutOfRange));
        }

        if self
            .events
            .iter()
            .any(|e| e.counter_slot == event.counter_slot)
        {
            return Err(new_error(ErrorKind::SlotCollision));
        }

        let mut buf = self.vocabulary.event.encode(&event)?;
        if let Err(e) = self.call(ControlCall::AddEvent, &mut buf) {
            return Err(match e.os_code() {
                Some(code) if code == libc::EBUSY || code == libc::EEXIST => new_call_error(
                    ErrorKind::SlotCollision,
                    ControlCall::AddEvent,
                    io::Error::from_raw_os_error(code),
                ),
                _ => e,
            });
        }

        debug!(
            "perfmon event {:?} ({:#x}) bound to slot {}",
            event.name, event.number, event.counter_slot
        );

        self.events.push(event);
        Ok(())
    }

    /// Events registered in this session, in registration order.
    pub fn registered_events(&self) -> &[Event] {
        &self.events
    }

    /// Ask the device to program the registered events into hardware.
    pub fn configure(&mut self) -> Result<(), Error> {
        self.check_usable()?;
        self.call(ControlCall::Configure, &mut [])
    }

    /// Take a snapshot of every register on every sampling unit.
    pub fn sample(&mut self) -> Result<SampleMatrix, Error> {
        let mut matrix = SampleMatrix::new(self.require_layout()?);
        self.sample_into(&mut matrix)?;
        Ok(matrix)
    }

    /// Overwrite `matrix` with a new snapshot.
    ///
    /// `matrix` must have been sized from this session's layout, otherwise
    /// [`ErrorKind::LayoutMismatch`] is returned and nothing is sampled.
    ///
    /// [`ErrorKind::LayoutMismatch`]: error/enum.ErrorKind.html#variant.LayoutMismatch
    pub fn sample_into(&mut self, matrix: &mut SampleMatrix) -> Result<(), Error> {
        let layout = self.require_layout()?;
        if matrix.layout() != layout {
            return Err(new_error(ErrorKind::LayoutMismatch));
        }

        let values = matrix.as_mut_slice();
        let bytes = unsafe {
            std::slice::from_raw_parts_mut(
                values.as_mut_ptr() as *mut u8,
                values.len() * std::mem::size_of::<u64>(),
            )
        };

        self.call(ControlCall::SampleRegs, bytes)
    }

    /// The device this session talks to.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutable access to the device, bypassing the session protocol.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Close the session, releasing the device.
    pub fn close(self) -> Result<(), Error> {
        debug!("perfmon session closed");
        self.device
            .close()
            .map_err(|e| new_io_error(ErrorKind::DeviceUnavailable, e))
    }
}
