// Attribute word of a cache or TLB descriptor:
//
//   bits 0..=3   kind                (empty 0x0, inst 0x1, data 0x2, unified 0x3, vector 0x4, trace 0x8)
//   bits 4..=7   write policy        (write-through 0x00, write-back 0x10)
//   bits 8..=11  replacement policy  (unknown 0x000, LRU 0x100, pseudo-LRU 0x200)
//   bits 12..    usage               (TLB 0x1000, prefetch buffer 0x2000)

const KIND_MASK: u32 = 0x0000_000F;
const WRITE_MASK: u32 = 0x0000_00F0;
const REPLACE_MASK: u32 = 0x0000_0F00;

pub const MH_TYPE_EMPTY: u32 = 0x0;
pub const MH_TYPE_INST: u32 = 0x1;
pub const MH_TYPE_DATA: u32 = 0x2;
pub const MH_TYPE_VECTOR: u32 = 0x4;
pub const MH_TYPE_TRACE: u32 = 0x8;
pub const MH_TYPE_UNIFIED: u32 = MH_TYPE_INST | MH_TYPE_DATA;
pub const MH_TYPE_WT: u32 = 0x00;
pub const MH_TYPE_WB: u32 = 0x10;
pub const MH_TYPE_UNKNOWN: u32 = 0x000;
pub const MH_TYPE_LRU: u32 = 0x100;
pub const MH_TYPE_PSEUDO_LRU: u32 = 0x200;
pub const MH_TYPE_TLB: u32 = 0x1000;
pub const MH_TYPE_PREF: u32 = 0x2000;

/// Associativity value meaning "fully associative".
pub const FULLY_ASSOCIATIVE: i32 = i16::MAX as i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CacheKind {
    /// Sentinel: no cache or TLB at this slot.
    Empty,
    Instruction,
    Data,
    Unified,
    Vector,
    Trace,
    Other(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WritePolicy {
    WriteThrough,
    WriteBack,
    Other(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Replacement {
    Unknown,
    Lru,
    PseudoLru,
    Other(u8),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Usage {
    /// Translation lookaside buffer rather than a memory cache.
    pub tlb: bool,
    /// Prefetch buffer.
    pub prefetch: bool,
}

/// Decoded attribute word of a memory hierarchy descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MhAttrs {
    pub kind: CacheKind,
    pub write_policy: WritePolicy,
    pub replacement: Replacement,
    pub usage: Usage,
}

impl MhAttrs {
    pub fn from_bits(bits: u32) -> Self {
        let kind = match bits & KIND_MASK {
            MH_TYPE_EMPTY => CacheKind::Empty,
            MH_TYPE_INST => CacheKind::Instruction,
            MH_TYPE_DATA => CacheKind::Data,
            MH_TYPE_UNIFIED => CacheKind::Unified,
            MH_TYPE_VECTOR => CacheKind::Vector,
            MH_TYPE_TRACE => CacheKind::Trace,
            other => CacheKind::Other(other as _),
        };
        let write_policy = match bits & WRITE_MASK {
            MH_TYPE_WT => WritePolicy::WriteThrough,
            MH_TYPE_WB => WritePolicy::WriteBack,
            other => WritePolicy::Other((other >> 4) as _),
        };
        let replacement = match bits & REPLACE_MASK {
            MH_TYPE_UNKNOWN => Replacement::Unknown,
            MH_TYPE_LRU => Replacement::Lru,
            MH_TYPE_PSEUDO_LRU => Replacement::PseudoLru,
            other => Replacement::Other((other >> 8) as _),
        };
        let usage = Usage {
            tlb: bits & MH_TYPE_TLB != 0,
            prefetch: bits & MH_TYPE_PREF != 0,
        };

        Self {
            kind,
            write_policy,
            replacement,
            usage,
        }
    }

    /// Encodes back into the attribute word.
    pub fn bits(&self) -> u32 {
        let kind = match self.kind {
            CacheKind::Empty => MH_TYPE_EMPTY,
            CacheKind::Instruction => MH_TYPE_INST,
            CacheKind::Data => MH_TYPE_DATA,
            CacheKind::Unified => MH_TYPE_UNIFIED,
            CacheKind::Vector => MH_TYPE_VECTOR,
            CacheKind::Trace => MH_TYPE_TRACE,
            CacheKind::Other(it) => it as u32 & KIND_MASK,
        };
        let write = match self.write_policy {
            WritePolicy::WriteThrough => MH_TYPE_WT,
            WritePolicy::WriteBack => MH_TYPE_WB,
            WritePolicy::Other(it) => ((it as u32) << 4) & WRITE_MASK,
        };
        let replace = match self.replacement {
            Replacement::Unknown => MH_TYPE_UNKNOWN,
            Replacement::Lru => MH_TYPE_LRU,
            Replacement::PseudoLru => MH_TYPE_PSEUDO_LRU,
            Replacement::Other(it) => ((it as u32) << 8) & REPLACE_MASK,
        };
        let mut usage = 0;
        if self.usage.tlb {
            usage |= MH_TYPE_TLB;
        }
        if self.usage.prefetch {
            usage |= MH_TYPE_PREF;
        }

        kind | write | replace | usage
    }

    pub fn is_empty(&self) -> bool {
        self.kind == CacheKind::Empty
    }
}

/// Ways of a cache or TLB.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Associativity {
    /// Unknown or not reported.
    Unknown,
    Ways(u32),
    Full,
}

impl Associativity {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            FULLY_ASSOCIATIVE => Self::Full,
            n if n > 0 => Self::Ways(n as _),
            _ => Self::Unknown,
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Ways(n) => *n as _,
            Self::Full => FULLY_ASSOCIATIVE,
        }
    }
}
