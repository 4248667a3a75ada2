#![allow(missing_docs)]

use std::{error, fmt, io};

use crate::vocabulary::ControlCall;

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    call: Option<ControlCall>,
    cause: Option<Box<dyn error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The control device could not be opened.
    ///
    /// The device node is missing, or the caller does not have permission to
    /// open it. The underlying OS error is available as the error source.
    DeviceUnavailable,

    /// A control call returned a non-success status, or replied with data
    /// that cannot describe a valid layout.
    ///
    /// [`Error::call`] names the failing call and [`Error::os_code`] returns
    /// the status reported by the facility.
    ControlCall,

    /// The requested counter slot is already bound to another event.
    SlotCollision,

    /// The requested counter slot is outside the register range described by
    /// the session [`Layout`].
    ///
    /// [`Layout`]: ../struct.Layout.html
    SlotOutOfRange,

    /// The operation requires the session [`Layout`] to be discovered first.
    ///
    /// [`Layout`]: ../struct.Layout.html
    Precondition,

    /// A caller supplied [`SampleMatrix`] was sized for a different layout.
    ///
    /// [`SampleMatrix`]: ../struct.SampleMatrix.html
    LayoutMismatch,

    /// The event name contains a NUL byte or does not fit the fixed-width
    /// name field of the control vocabulary.
    InvalidEventName,

    /// The [`ControlVocabulary`] describes wire formats that cannot hold
    /// their own fields.
    ///
    /// [`ControlVocabulary`]: ../struct.ControlVocabulary.html
    InvalidVocabulary,

    /// Spec negotiation failed earlier in this session.
    ///
    /// The session state is unspecified after a failed negotiation; close it
    /// and open a new one.
    Poisoned,

    /// The operation is not available on this target.
    Unsupported,
}

impl ErrorKind {
    fn description(&self) -> &'static str {
        match self {
            ErrorKind::DeviceUnavailable => "perfmon device unavailable",
            ErrorKind::ControlCall => "control call failed",
            ErrorKind::SlotCollision => "counter slot already in use",
            ErrorKind::SlotOutOfRange => "counter slot out of range",
            ErrorKind::Precondition => "layout has not been discovered",
            ErrorKind::LayoutMismatch => "sample buffer does not match session layout",
            ErrorKind::InvalidEventName => "invalid event name",
            ErrorKind::InvalidVocabulary => "invalid control vocabulary",
            ErrorKind::Poisoned => "session poisoned by failed negotiation",
            ErrorKind::Unsupported => "unsupported on this target",
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self.cause {
            None => None,
            Some(ref b) => Some(b.as_ref()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.description())?;
        if let Some(call) = self.call {
            write!(f, " ({})", call)?;
        }
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

#[doc(hidden)]
impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.kind == other.kind && self.call == other.call
    }
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The control call that produced this error, if any.
    pub fn call(&self) -> Option<ControlCall> {
        self.call
    }

    /// The OS status code reported by the device or facility, if any.
    pub fn os_code(&self) -> Option<i32> {
        self.cause
            .as_ref()
            .and_then(|c| c.downcast_ref::<io::Error>())
            .and_then(io::Error::raw_os_error)
    }
}

pub(crate) fn new_error(kind: ErrorKind) -> Error {
    Error {
        kind,
        call: None,
        cause: None,
    }
}

pub(crate) fn new_io_error(kind: ErrorKind, cause: io::Error) -> Error {
    Error {
        kind,
        call: None,
        cause: Some(Box::new(cause)),
    }
}

pub(crate) fn new_call_error(kind: ErrorKind, call: ControlCall, cause: io::Error) -> Error {
    Error {
        kind,
        call: Some(call),
        cause: Some(Box::new(cause)),
    }
}

pub(crate) fn new_reply_error(call: ControlCall, msg: impl Into<String>) -> Error {
    let msg: String = msg.into();
    Error {
        kind: ErrorKind::ControlCall,
        call: Some(call),
        cause: Some(msg.into()),
    }
}
