use std::fs::File;
use std::io::{self, Result};
use std::os::fd::AsRawFd;

use super::event::EventConfig;
use super::stat::{read_buf_size, Stat, Times, READ_FORMAT};
use crate::config::{Inherit, Opts};
use crate::ffi::syscall::{self, perf_event_open};
use crate::ffi::{bindings as b, Attr};
use crate::topology::Domain;

/// Counter group.
///
/// An event group is scheduled onto the CPU as a unit: it will be put onto
/// the CPU only if all of the events in the group can be put onto the CPU.
/// Plain event sets are a single pinned group, so their counts always cover
/// the same instructions. Multiplexed sets open one group per event and let
/// the kernel rotate them.
pub(super) struct CounterGroup {
    leader: File,
    // Siblings live as long as the leader.
    siblings: Vec<File>,
    read_buf: Vec<u8>,
    // Times at the last enable or reset.
    base: Times,
}

pub(super) fn attr(config: EventConfig, domain: Domain, pinned: bool, opts: &Opts) -> Attr {
    let mut attr = Attr {
        size: size_of::<Attr>() as _,
        ..Default::default()
    };
    attr.type_ = config.ty;
    attr.config = config.config;

    attr.set_exclude_user(!domain.user as _);
    attr.set_exclude_kernel(!domain.kernel as _);
    attr.set_exclude_hv(!domain.supervisor as _);
    attr.set_pinned(pinned as _);

    match opts.inherit {
        Some(Inherit::NewChild) => attr.set_inherit(1),
        Some(Inherit::NewThread) => {
            attr.set_inherit(1);
            attr.set_inherit_thread(1);
        }
        None => (),
    }

    attr.read_format = READ_FORMAT;
    attr.set_disabled(1);
    attr
}

impl CounterGroup {
    /// Opens `configs` as one group, the first being the leader.
    pub fn open(
        configs: &[EventConfig],
        domain: Domain,
        pinned: bool,
        opts: &Opts,
    ) -> Result<Self> {
        let Some((first, rest)) = configs.split_first() else {
            return Err(io::ErrorKind::InvalidInput.into());
        };

        // All events in a group should monitor the same task (or cgroup) and CPU:
        // https://github.com/torvalds/linux/blob/v6.13/kernel/events/core.c#L12932
        let target = &opts.target;
        let flags = target.flags | b::PERF_FLAG_FD_CLOEXEC as u64;

        let attr = attr(*first, domain, pinned, opts);
        let leader = perf_event_open(&attr, target.pid, target.cpu, -1, flags)?;

        let siblings = rest
            .iter()
            .map(|config| {
                // Only the leader may be pinned.
                let attr = self::attr(*config, domain, false, opts);
                perf_event_open(&attr, target.pid, target.cpu, leader.as_raw_fd(), flags)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            leader,
            siblings,
            read_buf: vec![0; read_buf_size(configs.len())],
            base: Times::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.siblings.len() + 1
    }

    pub fn enable(&mut self) -> Result<()> {
        syscall::reset(&self.leader)?;
        self.base = self.stat()?.times;
        syscall::enable(&self.leader)
    }

    pub fn disable(&self) -> Result<()> {
        syscall::disable(&self.leader)
    }

    /// Zeroes the counts and restarts the scaling interval.
    pub fn reset(&mut self) -> Result<()> {
        syscall::reset(&self.leader)?;
        self.base = self.stat()?.times;
        Ok(())
    }

    fn stat(&mut self) -> Result<Stat> {
        let len = syscall::read(&self.leader, &mut self.read_buf)?;
        // A pinned group that lost its counters reads as end of file.
        if len == 0 {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }
        Stat::parse(&self.read_buf[..len]).ok_or_else(|| io::ErrorKind::InvalidData.into())
    }

    /// Writes the scaled count of every member into `values`.
    pub fn read(&mut self, values: &mut [i64]) -> Result<()> {
        let stat = self.stat()?;
        for (value, count) in values.iter_mut().zip(stat.scaled(&self.base)) {
            *value = count;
        }
        Ok(())
    }
}
