use std::fs::File;
use std::io::{Error, Result};
use std::mem::MaybeUninit;
use std::os::fd::{AsRawFd, FromRawFd};

use perf_event_open_sys::ioctls;

use super::{bindings as b, Attr};

pub fn perf_event_open(attr: &Attr, pid: i32, cpu: i32, group_fd: i32, flags: u64) -> Result<File> {
    let num = libc::SYS_perf_event_open;
    let fd = unsafe { libc::syscall(num, attr, pid, cpu, group_fd, flags) };
    if fd != -1 {
        Ok(unsafe { File::from_raw_fd(fd as _) })
    } else {
        Err(Error::last_os_error())
    }
}

macro_rules! group_ioctl {
    ($(#[$doc:meta])* $name:ident, $op:ident) => {
        $(#[$doc])*
        pub fn $name(leader: &File) -> Result<()> {
            let fd = leader.as_raw_fd();
            let result = unsafe { ioctls::$op(fd, b::PERF_IOC_FLAG_GROUP as _) };
            if result != -1 {
                Ok(())
            } else {
                Err(Error::last_os_error())
            }
        }
    };
}

group_ioctl!(
    /// Enables the leader and all of its siblings.
    enable,
    ENABLE
);
group_ioctl!(disable, DISABLE);
group_ioctl!(
    /// Zeroes the counts of the whole group. Enabled and running times keep going.
    reset,
    RESET
);

pub fn read(file: &File, buf: &mut [u8]) -> Result<usize> {
    let fd = file.as_raw_fd();
    let count = buf.len();
    let buf = buf.as_mut_ptr() as _;
    let bytes = unsafe { libc::read(fd, buf, count) };
    if bytes != -1 {
        Ok(bytes as _)
    } else {
        Err(Error::last_os_error())
    }
}

/// Microseconds on `clock`.
pub fn clock_usec(clock: libc::clockid_t) -> Result<i64> {
    let mut ts = MaybeUninit::<libc::timespec>::uninit();
    let result = unsafe { libc::clock_gettime(clock, ts.as_mut_ptr()) };
    if result != -1 {
        let ts = unsafe { ts.assume_init() };
        Ok(ts.tv_sec as i64 * 1_000_000 + ts.tv_nsec as i64 / 1_000)
    } else {
        Err(Error::last_os_error())
    }
}
