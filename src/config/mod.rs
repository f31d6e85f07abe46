//! Options of the [`PerfDriver`][crate::driver::perf::PerfDriver].

mod target;

pub use target::*;

#[derive(Clone, Debug)]
pub struct Opts {
    /// What every event set counts: a process or cgroup, on one or all CPUs.
    pub target: Target,

    pub inherit: Option<Inherit>,

    /// Hardware counters of the CPU component.
    ///
    /// Detected from `cpuid` on x86, which a hypervisor may hide. Other
    /// architectures fall back to 4 unless this is set.
    pub num_counters: Option<usize>,

    /// Events a multiplexed event set may hold.
    pub num_mpx_counters: usize,

    /// Event sets that may exist at the same time.
    pub max_sets: usize,

    /// Opens every native event once during init to find out which ones the
    /// kernel accepts. Without probing, all natives are reported available.
    pub probe: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            target: (Proc::CURRENT, Cpu::ALL).into(),
            inherit: None,
            num_counters: None,
            num_mpx_counters: 64,
            max_sets: 512,
            probe: true,
        }
    }
}

/// Controls the inherit behavior.
///
/// Inherited counters are summed over the children, so a child that exits
/// before the set is read still contributes to the counts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Inherit {
    /// New child tasks will inherit the counter.
    ///
    /// This applies only to new children, not to any existing children at the time
    /// the event set is started (nor to any new children of existing children).
    NewChild,

    /// Same as [`NewChild`][Self::NewChild], but only new threads will inherit the counter.
    ///
    /// Since `linux-5.13`: <https://github.com/torvalds/linux/commit/2b26f0aa004995f49f7b6f4100dd0e4c39a9ed5f>
    NewThread,
}
