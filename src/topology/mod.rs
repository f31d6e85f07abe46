//! Hardware introspection: processor, memory hierarchy and counting components.

use arrayvec::ArrayVec;

mod attr;
mod component;
mod memory;

pub use attr::*;
pub use component::*;
pub use memory::*;

/// Maximum number of memory hierarchy levels, and of TLB/cache descriptors per level.
pub const MAX_LEVELS: usize = 6;

/// Index of a counting component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComponentId(pub u8);

impl ComponentId {
    /// The processor's own counters.
    pub const CPU: ComponentId = ComponentId(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TlbInfo {
    pub attrs: MhAttrs,
    pub num_entries: i32,
    pub page_size: i32,
    pub associativity: Associativity,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CacheInfo {
    pub attrs: MhAttrs,
    /// Size in bytes.
    pub size: i32,
    pub line_size: i32,
    pub num_lines: i32,
    pub associativity: Associativity,
}

/// One tier of caches and TLBs.
///
/// Only valid descriptors are kept: none of them has an empty kind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryHierarchyLevel {
    pub tlb: ArrayVec<TlbInfo, MAX_LEVELS>,
    pub cache: ArrayVec<CacheInfo, MAX_LEVELS>,
}

/// Immutable snapshot of the machine, see
/// [`Library::hardware_info`][crate::Library::hardware_info].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HardwareInfo {
    /// CPUs in an SMP node.
    pub cpus: i32,
    /// Hardware threads per core.
    pub threads: i32,
    /// Cores per socket.
    pub cores: i32,
    pub sockets: i32,
    pub numa_nodes: i32,
    pub total_cpus: i32,
    pub vendor: i32,
    pub vendor_name: String,
    pub model: i32,
    pub model_name: String,
    pub revision: f32,
    pub cpuid_family: i32,
    pub cpuid_model: i32,
    pub cpuid_stepping: i32,
    pub mhz: f32,
    pub clock_mhz: i32,
    pub memory_hierarchy: Vec<MemoryHierarchyLevel>,
}

/// Raw TLB descriptor as reported by a driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawTlb {
    pub ty: u32,
    pub num_entries: i32,
    pub page_size: i32,
    pub associativity: i32,
}

/// Raw cache descriptor as reported by a driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawCache {
    pub ty: u32,
    pub size: i32,
    pub line_size: i32,
    pub num_lines: i32,
    pub associativity: i32,
}

/// Fixed-size level record. Slots after the first empty one are undefined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RawLevel {
    pub tlb: [RawTlb; MAX_LEVELS],
    pub cache: [RawCache; MAX_LEVELS],
}

/// Hardware description as reported by a driver, before validation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawHardwareInfo {
    pub cpus: i32,
    pub threads: i32,
    pub cores: i32,
    pub sockets: i32,
    pub numa_nodes: i32,
    pub total_cpus: i32,
    pub vendor: i32,
    pub vendor_name: String,
    pub model: i32,
    pub model_name: String,
    pub revision: f32,
    pub cpuid_family: i32,
    pub cpuid_model: i32,
    pub cpuid_stepping: i32,
    pub mhz: f32,
    pub clock_mhz: i32,
    /// Number of valid entries in `levels`.
    pub num_levels: i32,
    pub levels: [RawLevel; MAX_LEVELS],
}

impl From<&RawTlb> for TlbInfo {
    fn from(raw: &RawTlb) -> Self {
        Self {
            attrs: MhAttrs::from_bits(raw.ty),
            num_entries: raw.num_entries,
            page_size: raw.page_size,
            associativity: Associativity::from_raw(raw.associativity),
        }
    }
}

impl From<&RawCache> for CacheInfo {
    fn from(raw: &RawCache) -> Self {
        Self {
            attrs: MhAttrs::from_bits(raw.ty),
            size: raw.size,
            line_size: raw.line_size,
            num_lines: raw.num_lines,
            associativity: Associativity::from_raw(raw.associativity),
        }
    }
}

impl From<&RawLevel> for MemoryHierarchyLevel {
    fn from(raw: &RawLevel) -> Self {
        // Scanning stops at the first empty slot, whatever follows is garbage.
        let tlb = raw
            .tlb
            .iter()
            .map(TlbInfo::from)
            .take_while(|tlb| !tlb.attrs.is_empty())
            .collect();
        let cache = raw
            .cache
            .iter()
            .map(CacheInfo::from)
            .take_while(|cache| !cache.attrs.is_empty())
            .collect();
        Self { tlb, cache }
    }
}

impl From<&RawHardwareInfo> for HardwareInfo {
    fn from(raw: &RawHardwareInfo) -> Self {
        let levels = raw.num_levels.clamp(0, MAX_LEVELS as _) as usize;
        Self {
            cpus: raw.cpus,
            threads: raw.threads,
            cores: raw.cores,
            sockets: raw.sockets,
            numa_nodes: raw.numa_nodes,
            total_cpus: raw.total_cpus,
            vendor: raw.vendor,
            vendor_name: raw.vendor_name.clone(),
            model: raw.model,
            model_name: raw.model_name.clone(),
            revision: raw.revision,
            cpuid_family: raw.cpuid_family,
            cpuid_model: raw.cpuid_model,
            cpuid_stepping: raw.cpuid_stepping,
            mhz: raw.mhz,
            clock_mhz: raw.clock_mhz,
            memory_hierarchy: raw.levels[..levels]
                .iter()
                .map(MemoryHierarchyLevel::from)
                .collect(),
        }
    }
}
