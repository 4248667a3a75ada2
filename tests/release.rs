use std::os::unix::io::{AsRawFd, RawFd};

use perfmon::error::*;
use perfmon::*;

// Descriptor numbers are reused as soon as they are freed, so every check
// lives in this one test to keep other tests from opening files in between.

fn is_open(fd: RawFd) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

fn assert_released(fd: RawFd) {
    assert!(!is_open(fd), "descriptor {} still open", fd);
    assert_eq!(
        std::io::Error::last_os_error().raw_os_error(),
        Some(libc::EBADF)
    );
}

#[test]
fn test_device_released_on_every_path() {
    // Dropping the device.
    let dev = DeviceFile::open("/dev/null").expect("failed to open /dev/null");
    let fd = dev.as_raw_fd();
    assert!(is_open(fd));
    drop(dev);
    assert_released(fd);

    // Session construction failing on an unusable vocabulary.
    let dev = DeviceFile::open("/dev/null").expect("failed to open /dev/null");
    let fd = dev.as_raw_fd();
    let mut vocab = ControlVocabulary::xnu();
    vocab.event.number_offset = vocab.event.name_offset;

    let err = Session::with_device(dev, vocab).expect_err("expected invalid vocabulary");
    assert_eq!(err.kind(), &ErrorKind::InvalidVocabulary);
    assert_released(fd);

    // Dropping a session after a failed control call.
    let dev = DeviceFile::open("/dev/null").expect("failed to open /dev/null");
    let fd = dev.as_raw_fd();
    let mut session =
        Session::with_device(dev, ControlVocabulary::xnu()).expect("failed to open session");
    assert_eq!(
        session.get_layout().unwrap_err().kind(),
        &ErrorKind::ControlCall
    );
    assert!(is_open(fd));
    drop(session);
    assert_released(fd);

    // Closing a session explicitly.
    let dev = DeviceFile::open("/dev/null").expect("failed to open /dev/null");
    let fd = dev.as_raw_fd();
    let session =
        Session::with_device(dev, ControlVocabulary::xnu()).expect("failed to open session");
    session.close().expect("failed to close session");
    assert_released(fd);
}
