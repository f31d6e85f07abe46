/// Privilege levels a set counts in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Domain {
    /// User space.
    pub user: bool,

    /// Kernel space.
    pub kernel: bool,

    /// Exception handlers, hypervisor and the like.
    pub other: bool,

    /// Supervisor mode.
    pub supervisor: bool,
}

impl Domain {
    pub const USER: Domain = Domain {
        user: true,
        kernel: false,
        other: false,
        supervisor: false,
    };

    pub const KERNEL: Domain = Domain {
        user: false,
        kernel: true,
        other: false,
        supervisor: false,
    };

    pub const ALL: Domain = Domain {
        user: true,
        kernel: true,
        other: true,
        supervisor: true,
    };

    pub const fn from_bits(bits: u32) -> Self {
        Self {
            user: bits & 0x1 != 0,
            kernel: bits & 0x2 != 0,
            other: bits & 0x4 != 0,
            supervisor: bits & 0x8 != 0,
        }
    }

    pub const fn bits(&self) -> u32 {
        (self.user as u32)
            | (self.kernel as u32) << 1
            | (self.other as u32) << 2
            | (self.supervisor as u32) << 3
    }

    pub fn is_empty(&self) -> bool {
        self.bits() == 0
    }

    /// Returns `true` if every level of `other` is also in `self`.
    pub fn contains(&self, other: Domain) -> bool {
        self.bits() & other.bits() == other.bits()
    }
}

/// Scope of what a counter observes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Granularity {
    /// The calling thread.
    #[default]
    Thread,
    /// All threads of the calling process.
    Process,
    /// Everything on the CPU.
    System,
    /// Everything on the CPU, including children.
    SystemChildren,
}

impl Granularity {
    pub fn bits(&self) -> u32 {
        match self {
            Self::Thread => 0x1,
            Self::Process => 0x2,
            Self::System => 0x4,
            Self::SystemChildren => 0x8,
        }
    }
}

/// Capabilities of a counting component.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Features {
    pub hardware_interrupt: bool,
    pub precise_interrupt: bool,
    /// Counting can be limited to an address range.
    pub address_range: bool,
    pub fast_counter_read: bool,
    pub fast_real_timer: bool,
    pub fast_virtual_timer: bool,
    /// Counters can be attached to another thread or process.
    pub attach: bool,
    /// Attaching requires `ptrace` permission on the target.
    pub attach_must_ptrace: bool,
    /// Children inherit counters.
    pub inherit: bool,
    /// Multiplexing is done by the kernel rather than in user space.
    pub kernel_multiplex: bool,
    pub counter_unit_masks: bool,
    /// The component counts CPU events.
    pub cpu: bool,
}

/// Static description of a counting component, see
/// [`Library::component_info`][crate::Library::component_info].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentInfo {
    pub name: String,
    pub short_name: String,
    pub description: String,
    pub version: String,
    /// Physical counters a non-multiplexed set may use.
    pub num_counters: usize,
    /// Virtual counters a multiplexed set may use, zero if multiplexing is unsupported.
    pub num_mpx_counters: usize,
    pub num_native_events: usize,
    pub default_domain: Domain,
    pub available_domains: Domain,
    pub default_granularity: Granularity,
    pub available_granularities: Vec<Granularity>,
    pub features: Features,
}

impl ComponentInfo {
    pub fn can_multiplex(&self) -> bool {
        self.num_mpx_counters > 0
    }
}
