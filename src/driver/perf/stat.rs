use crate::ffi::{bindings as b, deref_offset};

/// Group read format: every count in one read, with the times needed to
/// scale multiplexed counts.
pub(super) const READ_FORMAT: u64 = (b::PERF_FORMAT_GROUP
    | b::PERF_FORMAT_TOTAL_TIME_ENABLED
    | b::PERF_FORMAT_TOTAL_TIME_RUNNING) as u64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) struct Times {
    pub enabled: u64,
    pub running: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Stat {
    pub times: Times,
    /// Leader first, then the siblings in the order they were opened.
    pub counts: Vec<u64>,
}

impl Stat {
    // https://github.com/torvalds/linux/blob/v6.13/include/uapi/linux/perf_event.h#L344
    // struct read_format {
    //     u64 nr;
    //     { u64 time_enabled; } && PERF_FORMAT_TOTAL_TIME_ENABLED
    //     { u64 time_running; } && PERF_FORMAT_TOTAL_TIME_RUNNING
    //     { u64 value; } cntr[nr];
    // };
    pub(super) fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < 3 * size_of::<u64>() {
            return None;
        }

        let mut ptr = buf.as_ptr();
        let (nr, enabled, running) = unsafe {
            (
                deref_offset::<u64>(&mut ptr),
                deref_offset::<u64>(&mut ptr),
                deref_offset::<u64>(&mut ptr),
            )
        };
        if buf.len() < read_buf_size(nr as usize) {
            return None;
        }
        let counts = (0..nr).map(|_| unsafe { deref_offset(&mut ptr) }).collect();

        Some(Self {
            times: Times { enabled, running },
            counts,
        })
    }

    /// Counts since `base`, extrapolated to the whole enabled time when the
    /// group only ran part of it.
    pub(super) fn scaled(&self, base: &Times) -> impl Iterator<Item = i64> + '_ {
        let enabled = self.times.enabled.saturating_sub(base.enabled);
        let running = self.times.running.saturating_sub(base.running);
        self.counts.iter().map(move |count| {
            if running == 0 {
                0
            } else if running >= enabled {
                *count as i64
            } else {
                (*count as u128 * enabled as u128 / running as u128) as i64
            }
        })
    }
}

pub(super) fn read_buf_size(group_size: usize) -> usize {
    (3 + group_size) * size_of::<u64>()
}
