//! Vendor neutral preset events.
//!
//! The table is fixed; whether a preset can be counted, and from which native
//! events, is decided by the driver through a [`PresetDefinition`].

use std::collections::HashMap;

use super::enumerate::cat::*;
use super::{Categories, Derivation, Event};
use crate::error::{Error, ErrorKind, Result};
use crate::event::native::NativeTable;

/// A row of the preset table.
#[derive(Clone, Copy, Debug)]
pub struct Preset {
    pub event: Event,
    pub symbol: &'static str,
    pub short_descr: &'static str,
    pub long_descr: &'static str,
    categories: u32,
}

impl Preset {
    pub fn categories(&self) -> Categories {
        Categories::from_bits(self.categories)
    }
}

macro_rules! presets {
    ($($name:ident = $index:literal, [$($cat:ident)|+], $short:literal, $long:literal;)+) => {
        $(
        #[doc = $long]
        pub const $name: Event = Event::preset($index);
        )+

        static PRESETS: &[Preset] = &[$(
            Preset {
                event: $name,
                symbol: concat!("PAPI_", stringify!($name)),
                short_descr: $short,
                long_descr: $long,
                categories: 0 $(| $cat)+,
            },
        )+];
    };
}

#[rustfmt::skip]
presets! {
    L1_DCM  =   0, [CACH | L1], "L1D cache misses", "Level 1 data cache misses";
    L1_ICM  =   1, [CACH | L1], "L1I cache misses", "Level 1 instruction cache misses";
    L2_DCM  =   2, [CACH | L2], "L2D cache misses", "Level 2 data cache misses";
    L2_ICM  =   3, [CACH | L2], "L2I cache misses", "Level 2 instruction cache misses";
    L3_DCM  =   4, [CACH | L3], "L3D cache misses", "Level 3 data cache misses";
    L3_ICM  =   5, [CACH | L3], "L3I cache misses", "Level 3 instruction cache misses";
    L1_TCM  =   6, [CACH | L1], "L1 cache misses", "Level 1 cache misses";
    L2_TCM  =   7, [CACH | L2], "L2 cache misses", "Level 2 cache misses";
    L3_TCM  =   8, [CACH | L3], "L3 cache misses", "Level 3 cache misses";
    CA_SNP  =   9, [CACH], "Snoop Requests", "Requests for a snoop";
    CA_SHR  =  10, [CACH], "Ex Acces shared CL", "Requests for exclusive access to shared cache line";
    CA_CLN  =  11, [CACH], "Ex Access clean CL", "Requests for exclusive access to clean cache line";
    CA_INV  =  12, [CACH], "Cache ln invalid", "Requests for cache line invalidation";
    CA_ITV  =  13, [CACH], "Cache ln intervene", "Requests for cache line intervention";
    L3_LDM  =  14, [CACH | L3], "L3 load misses", "Level 3 load misses";
    L3_STM  =  15, [CACH | L3], "L3 store misses", "Level 3 store misses";
    BRU_IDL =  16, [IDL | BR], "Branch idle cycles", "Cycles branch units are idle";
    FXU_IDL =  17, [IDL], "IU idle cycles", "Cycles integer units are idle";
    FPU_IDL =  18, [IDL | FP], "FPU idle cycles", "Cycles floating point units are idle";
    LSU_IDL =  19, [IDL | MEM], "L/SU idle cycles", "Cycles load/store units are idle";
    TLB_DM  =  20, [TLB], "Data TLB misses", "Data translation lookaside buffer misses";
    TLB_IM  =  21, [TLB], "Instr TLB misses", "Instruction translation lookaside buffer misses";
    TLB_TL  =  22, [TLB], "Total TLB misses", "Total translation lookaside buffer misses";
    L1_LDM  =  23, [CACH | L1], "L1 load misses", "Level 1 load misses";
    L1_STM  =  24, [CACH | L1], "L1 store misses", "Level 1 store misses";
    L2_LDM  =  25, [CACH | L2], "L2 load misses", "Level 2 load misses";
    L2_STM  =  26, [CACH | L2], "L2 store misses", "Level 2 store misses";
    BTAC_M  =  27, [BR], "Br targt addr miss", "Branch target address cache misses";
    PRF_DM  =  28, [CACH], "Data prefetch miss", "Data prefetch cache misses";
    L3_DCH  =  29, [CACH | L3], "L3D cache hits", "Level 3 data cache hits";
    TLB_SD  =  30, [TLB], "TLB shootdowns", "Translation lookaside buffer shootdowns";
    CSR_FAL =  31, [INS | MEM], "Failed store cond", "Failed store conditional instructions";
    CSR_SUC =  32, [INS | MEM], "Good store cond", "Successful store conditional instructions";
    CSR_TOT =  33, [INS | MEM], "Total store cond", "Total store conditional instructions";
    MEM_SCY =  34, [MEM | IDL], "Stalled mem cycles", "Cycles Stalled Waiting for memory accesses";
    MEM_RCY =  35, [MEM | IDL], "Stalled rd cycles", "Cycles Stalled Waiting for memory Reads";
    MEM_WCY =  36, [MEM | IDL], "Stalled wr cycles", "Cycles Stalled Waiting for memory writes";
    STL_ICY =  37, [IDL], "No instr issue", "Cycles with no instruction issue";
    FUL_ICY =  38, [INS], "Max instr issue", "Cycles with maximum instruction issue";
    STL_CCY =  39, [IDL], "No instr done", "Cycles with no instructions completed";
    FUL_CCY =  40, [INS], "Max instr done", "Cycles with maximum instructions completed";
    HW_INT  =  41, [MSC], "Hdw interrupts", "Hardware interrupts";
    BR_UCN  =  42, [BR], "Uncond branch", "Unconditional branch instructions";
    BR_CN   =  43, [BR | CND], "Cond branch", "Conditional branch instructions";
    BR_TKN  =  44, [BR | CND], "Cond branch taken", "Conditional branch instructions taken";
    BR_NTK  =  45, [BR | CND], "Cond br not taken", "Conditional branch instructions not taken";
    BR_MSP  =  46, [BR | CND], "Cond br mspredictd", "Conditional branch instructions mispredicted";
    BR_PRC  =  47, [BR | CND], "Cond br predicted", "Conditional branch instructions correctly predicted";
    FMA_INS =  48, [INS | FP], "FMAs completed", "FMA instructions completed";
    TOT_IIS =  49, [INS], "Instr issued", "Instructions issued";
    TOT_INS =  50, [INS], "Instr completed", "Instructions completed";
    INT_INS =  51, [INS], "Int instructions", "Integer instructions";
    FP_INS  =  52, [INS | FP], "FP instructions", "Floating point instructions";
    LD_INS  =  53, [INS | MEM], "Loads", "Load instructions";
    SR_INS  =  54, [INS | MEM], "Stores", "Store instructions";
    BR_INS  =  55, [INS | BR], "Branches", "Branch instructions";
    VEC_INS =  56, [INS], "Vector/SIMD instr", "Vector/SIMD instructions (could include integer)";
    RES_STL =  57, [IDL], "Stalled res cycles", "Cycles stalled on any resource";
    FP_STAL =  58, [IDL | FP], "Stalled FPU cycles", "Cycles the FP unit(s) are stalled";
    TOT_CYC =  59, [MSC], "Total cycles", "Total cycles";
    LST_INS =  60, [INS | MEM], "L/S completed", "Load/store instructions completed";
    SYC_INS =  61, [INS], "Syncs completed", "Synchronization instructions completed";
    L1_DCH  =  62, [CACH | L1], "L1D cache hits", "Level 1 data cache hits";
    L2_DCH  =  63, [CACH | L2], "L2D cache hits", "Level 2 data cache hits";
    L1_DCA  =  64, [CACH | L1], "L1D cache accesses", "Level 1 data cache accesses";
    L2_DCA  =  65, [CACH | L2], "L2D cache accesses", "Level 2 data cache accesses";
    L3_DCA  =  66, [CACH | L3], "L3D cache accesses", "Level 3 data cache accesses";
    L1_DCR  =  67, [CACH | L1], "L1D cache reads", "Level 1 data cache reads";
    L2_DCR  =  68, [CACH | L2], "L2D cache reads", "Level 2 data cache reads";
    L3_DCR  =  69, [CACH | L3], "L3D cache reads", "Level 3 data cache reads";
    L1_DCW  =  70, [CACH | L1], "L1D cache writes", "Level 1 data cache writes";
    L2_DCW  =  71, [CACH | L2], "L2D cache writes", "Level 2 data cache writes";
    L3_DCW  =  72, [CACH | L3], "L3D cache writes", "Level 3 data cache writes";
    L1_ICH  =  73, [CACH | L1], "L1I cache hits", "Level 1 instruction cache hits";
    L2_ICH  =  74, [CACH | L2], "L2I cache hits", "Level 2 instruction cache hits";
    L3_ICH  =  75, [CACH | L3], "L3I cache hits", "Level 3 instruction cache hits";
    L1_ICA  =  76, [CACH | L1], "L1I cache accesses", "Level 1 instruction cache accesses";
    L2_ICA  =  77, [CACH | L2], "L2I cache accesses", "Level 2 instruction cache accesses";
    L3_ICA  =  78, [CACH | L3], "L3I cache accesses", "Level 3 instruction cache accesses";
    L1_ICR  =  79, [CACH | L1], "L1I cache reads", "Level 1 instruction cache reads";
    L2_ICR  =  80, [CACH | L2], "L2I cache reads", "Level 2 instruction cache reads";
    L3_ICR  =  81, [CACH | L3], "L3I cache reads", "Level 3 instruction cache reads";
    L1_ICW  =  82, [CACH | L1], "L1I cache writes", "Level 1 instruction cache writes";
    L2_ICW  =  83, [CACH | L2], "L2I cache writes", "Level 2 instruction cache writes";
    L3_ICW  =  84, [CACH | L3], "L3I cache writes", "Level 3 instruction cache writes";
    L1_TCH  =  85, [CACH | L1], "L1 cache hits", "Level 1 total cache hits";
    L2_TCH  =  86, [CACH | L2], "L2 cache hits", "Level 2 total cache hits";
    L3_TCH  =  87, [CACH | L3], "L3 cache hits", "Level 3 total cache hits";
    L1_TCA  =  88, [CACH | L1], "L1 cache accesses", "Level 1 total cache accesses";
    L2_TCA  =  89, [CACH | L2], "L2 cache accesses", "Level 2 total cache accesses";
    L3_TCA  =  90, [CACH | L3], "L3 cache accesses", "Level 3 total cache accesses";
    L1_TCR  =  91, [CACH | L1], "L1 cache reads", "Level 1 total cache reads";
    L2_TCR  =  92, [CACH | L2], "L2 cache reads", "Level 2 total cache reads";
    L3_TCR  =  93, [CACH | L3], "L3 cache reads", "Level 3 total cache reads";
    L1_TCW  =  94, [CACH | L1], "L1 cache writes", "Level 1 total cache writes";
    L2_TCW  =  95, [CACH | L2], "L2 cache writes", "Level 2 total cache writes";
    L3_TCW  =  96, [CACH | L3], "L3 cache writes", "Level 3 total cache writes";
    FML_INS =  97, [INS | FP], "FPU multiply", "Floating point multiply instructions";
    FAD_INS =  98, [INS | FP], "FPU add", "Floating point add instructions";
    FDV_INS =  99, [INS | FP], "FPU divide", "Floating point divide instructions";
    FSQ_INS = 100, [INS | FP], "FPU square root", "Floating point square root instructions";
    FNV_INS = 101, [INS | FP], "FPU inverse", "Floating point inverse instructions";
    FP_OPS  = 102, [FP], "FP operations", "Floating point operations";
    SP_OPS  = 103, [FP], "SP operations", "Floating point operations; optimized to count scaled single precision vector operations";
    DP_OPS  = 104, [FP], "DP operations", "Floating point operations; optimized to count scaled double precision vector operations";
    VEC_SP  = 105, [INS | FP], "SP Vector/SIMD instr", "Single precision vector/SIMD instructions";
    VEC_DP  = 106, [INS | FP], "DP Vector/SIMD instr", "Double precision vector/SIMD instructions";
    REF_CYC = 107, [MSC], "Reference cycles", "Reference clock cycles";
}

/// The whole preset table, ordered by index.
pub fn all() -> &'static [Preset] {
    PRESETS
}

pub fn lookup(event: Event) -> Option<&'static Preset> {
    if !event.is_preset() {
        return None;
    }
    // Codes with stray bits above the index are not aliases.
    PRESETS
        .get(event.index() as usize)
        .filter(|preset| preset.event == event)
}

pub fn symbol(event: Event) -> Option<&'static str> {
    lookup(event).map(|preset| preset.symbol)
}

/// Finds a preset by symbol, with or without the `PAPI_` prefix.
pub fn by_symbol(name: &str) -> Option<&'static Preset> {
    let name = name.strip_prefix("PAPI_").unwrap_or(name);
    PRESETS
        .iter()
        .find(|preset| &preset.symbol["PAPI_".len()..] == name)
}

/// How a driver counts a preset: the native events and how to combine them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetDefinition {
    pub natives: Vec<Event>,
    pub derivation: Derivation,
    pub note: Option<String>,
}

/// Preset definitions published by a driver.
#[derive(Clone, Debug, Default)]
pub struct PresetMap {
    defs: HashMap<Event, PresetDefinition>,
}

impl PresetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `preset` onto the named natives of `table`.
    ///
    /// Fails with [`ErrorKind::InvalidEvent`] if a name is unknown, or with
    /// [`ErrorKind::InvalidArgument`] if the derivation does not fit the natives.
    pub fn define(
        &mut self,
        preset: Event,
        natives: &[&str],
        derivation: Derivation,
        table: &NativeTable,
    ) -> Result<()> {
        if lookup(preset).is_none() {
            return Err(Error::new(ErrorKind::InvalidEvent, "not a preset event"));
        }
        let natives = natives
            .iter()
            .map(|name| {
                table.lookup(name).ok_or_else(|| {
                    Error::new(ErrorKind::InvalidEvent, format!("no native event {}", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        derivation.check(natives.len())?;

        self.defs.insert(
            preset,
            PresetDefinition {
                natives,
                derivation,
                note: None,
            },
        );
        Ok(())
    }

    /// Attaches a developer note to an already defined preset.
    pub fn annotate(&mut self, preset: Event, note: impl Into<String>) {
        if let Some(def) = self.defs.get_mut(&preset) {
            def.note = Some(note.into());
        }
    }

    pub fn get(&self, preset: Event) -> Option<&PresetDefinition> {
        self.defs.get(&preset)
    }

    /// Like [`get`][Self::get], but only if every native is available in `table`.
    pub fn available(&self, preset: Event, table: &NativeTable) -> Option<&PresetDefinition> {
        self.get(preset).filter(|def| {
            def.natives
                .iter()
                .all(|event| table.get(*event).is_ok_and(|native| native.available))
        })
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
