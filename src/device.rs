use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use crate::error::{new_io_error, Error, ErrorKind};

/// A device that accepts perfmon control calls.
///
/// [`DeviceFile`] issues real `ioctl(2)` calls; [`SimulatedPerfmon`] models the
/// kernel facility in memory for tests.
///
/// [`DeviceFile`]: struct.DeviceFile.html
/// [`SimulatedPerfmon`]: simulated/struct.SimulatedPerfmon.html
pub trait ControlDevice {
    /// Issue control call `request` with `arg` as its in/out argument buffer.
    ///
    /// An empty `arg` is passed to the device as a null pointer. The device
    /// writes at most `arg.len()` bytes.
    fn control(&mut self, request: u64, arg: &mut [u8]) -> io::Result<()>;

    /// Release the device, reporting any error from doing so.
    fn close(self) -> io::Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// An open perfmon device node.
///
/// The descriptor is closed when this value is dropped.
#[derive(Debug)]
pub struct DeviceFile {
    fd: RawFd,
    path: PathBuf,
}

impl DeviceFile {
    /// Open the device node at `path` for reading and writing.
    ///
    /// A missing node, insufficient permissions or a path containing a NUL
    /// byte fail with [`ErrorKind::DeviceUnavailable`]; there is no fallback.
    ///
    /// [`ErrorKind::DeviceUnavailable`]: error/enum.ErrorKind.html#variant.DeviceUnavailable
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            new_io_error(
                ErrorKind::DeviceUnavailable,
                io::Error::new(io::ErrorKind::InvalidInput, "path contains a NUL byte"),
            )
        })?;

        let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDWR | libc::O_CLOEXEC) };
        if fd < 0 {
            return Err(new_io_error(
                ErrorKind::DeviceUnavailable,
                io::Error::last_os_error(),
            ));
        }

        Ok(Self {
            fd,
            path: path.to_path_buf(),
        })
    }

    /// The path the device was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlDevice for DeviceFile {
    fn control(&mut self, request: u64, arg: &mut [u8]) -> io::Result<()> {
        let ptr = if arg.is_empty() {
            std::ptr::null_mut()
        } else {
            arg.as_mut_ptr() as *mut libc::c_void
        };

        // The request parameter type differs between libc targets.
        if unsafe { libc::ioctl(self.fd, request as _, ptr) } != 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(())
    }

    fn close(mut self) -> io::Result<()> {
        let fd = std::mem::replace(&mut self.fd, -1);
        if unsafe { libc::close(fd) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsRawFd for DeviceFile {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for DeviceFile {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe { libc::close(self.fd) };
        }
    }
}
