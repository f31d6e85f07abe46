use std::fs::File;
use std::os::fd::AsRawFd;

use crate::ffi::bindings as b;
use crate::topology::Granularity;

#[derive(Clone, Copy, Debug)]
pub struct All;

#[derive(Clone, Copy, Debug)]
pub struct Cpu(pub u32);

impl Cpu {
    pub const ALL: All = All;
}

#[derive(Clone, Copy, Debug)]
pub struct Proc(pub u32);

impl Proc {
    pub const ALL: All = All;
    pub const CURRENT: Proc = Proc(0);
}

/// A cgroup directory, see `PERF_FLAG_PID_CGROUP`.
///
/// The directory must stay open for as long as the driver is used.
#[derive(Clone, Copy, Debug)]
pub struct Cgroup<'a>(pub &'a File);

/// Arguments of `perf_event_open` selecting what is counted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub(crate) pid: i32,
    pub(crate) cpu: i32,
    pub(crate) flags: u64,
}

impl Target {
    /// Whether the target counts a single task rather than a CPU or cgroup.
    pub fn is_task(&self) -> bool {
        self.pid >= 0 && self.flags & b::PERF_FLAG_PID_CGROUP as u64 == 0
    }

    /// Granularity event sets count at with this target.
    ///
    /// A task is followed across CPUs, anything else counts whatever runs
    /// on the selected CPU.
    pub fn granularity(&self) -> Granularity {
        if self.is_task() {
            Granularity::Thread
        } else {
            Granularity::System
        }
    }
}

macro_rules! into_target {
    ($ty: ty, $destruct: tt, $pid: expr, $cpu: expr, $flags: expr) => {
        impl From<$ty> for Target {
            fn from($destruct: $ty) -> Self {
                Target {
                    pid: $pid as _,
                    cpu: $cpu as _,
                    flags: $flags as _,
                }
            }
        }
    };
}

into_target!((Proc, Cpu), (Proc(pid), Cpu(cpu)), pid, cpu, 0);
into_target!((Proc, All), (Proc(pid), _), pid, -1, 0);
into_target!((Cpu, All), (Cpu(cpu), _), -1, cpu, 0);

into_target!(
    (Cgroup<'_>, Cpu),
    (Cgroup(file), Cpu(cpu)),
    file.as_raw_fd(),
    cpu,
    b::PERF_FLAG_PID_CGROUP
);

// Counting every process on every CPU, or a cgroup on every CPU, is refused by the kernel:
// https://github.com/torvalds/linux/blob/4dc1d1bec89864d8076e5ab314f86f46442bfb02/kernel/events/core.c#L12835
