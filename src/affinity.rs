//! Steering the calling thread onto a kind of core.
//!
//! Counter state is per core, so a `Core` session only reports on the core
//! the sampling thread runs on. macOS offers no hard affinity; the QoS class
//! of a thread decides whether the scheduler places it on performance or
//! efficiency cores.

#[cfg(target_os = "macos")]
use std::io;

#[cfg(target_os = "macos")]
use crate::error::new_io_error;
#[cfg(not(target_os = "macos"))]
use crate::error::new_error;
use crate::error::{Error, ErrorKind};

/// The kinds of core on an Apple Silicon CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreKind {
    /// Performance ("P") cores.
    Performance,
    /// Efficiency ("E") cores.
    Efficiency,
}

impl CoreKind {
    /// The `qos_class_t` (see `sys/qos.h`) that schedules onto this kind.
    pub fn qos_class(&self) -> u32 {
        match self {
            // QOS_CLASS_USER_INTERACTIVE
            CoreKind::Performance => 0x21,
            // QOS_CLASS_BACKGROUND
            CoreKind::Efficiency => 0x09,
        }
    }
}

#[cfg(target_os = "macos")]
extern "C" {
    fn pthread_set_qos_class_self_np(
        qos_class: libc::c_uint,
        relative_priority: libc::c_int,
    ) -> libc::c_int;
}

/// Ask the scheduler to run the calling thread on `kind` cores.
///
/// Only available on macOS; elsewhere this returns
/// [`ErrorKind::Unsupported`].
///
/// [`ErrorKind::Unsupported`]: ../error/enum.ErrorKind.html#variant.Unsupported
pub fn prefer_core(kind: CoreKind) -> Result<(), Error> {
    #[cfg(target_os = "macos")]
    {
        let rv = unsafe { pthread_set_qos_class_self_np(kind.qos_class(), 0) };
        if rv != 0 {
            return Err(new_io_error(
                ErrorKind::Unsupported,
                io::Error::from_raw_os_error(rv),
            ));
        }

        debug!("thread QoS class set to {:#x} ({:?})", kind.qos_class(), kind);
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    {
        let _ = kind;
        Err(new_error(ErrorKind::Unsupported))
    }
}
