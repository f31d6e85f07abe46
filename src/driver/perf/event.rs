//! Generic perf events published as natives, and the presets built on them.

use crate::error::Result;
use crate::event::cat::*;
use crate::event::native::{NativeEvent, NativeTable};
use crate::event::preset::{self, PresetMap};
use crate::event::{Categories, Derivation};
use crate::ffi::bindings as b;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hardware {
    CpuCycle,
    BusCycle,
    RefCpuCycle,

    Cache(Type, Op, OpResult),
    CacheMiss,
    CacheAccess,

    BranchMiss,
    BranchInstr,

    BackendStalledCycle,
    FrontendStalledCycle,

    Instr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    L1d,
    L1i,
    Ll,
    Dtlb,
    Itlb,
    Bpu,
    Node,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    Read,
    Write,
    Prefetch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpResult {
    Miss,
    Access,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Software {
    CpuClock,
    TaskClock,

    PageFault,
    MinorPageFault,
    MajorPageFault,

    EmuFault,
    AlignFault,

    CtxSwitch,
    CpuMigration,
}

/// The `type` and `config` fields of a `perf_event_attr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventConfig {
    pub ty: u32,
    pub config: u64,
}

impl From<Hardware> for EventConfig {
    fn from(value: Hardware) -> Self {
        let config = match value {
            Hardware::CpuCycle => b::PERF_COUNT_HW_CPU_CYCLES as _,
            Hardware::BusCycle => b::PERF_COUNT_HW_BUS_CYCLES as _,
            Hardware::RefCpuCycle => b::PERF_COUNT_HW_REF_CPU_CYCLES as _,

            Hardware::Cache(ty, op, result) => {
                let id = match ty {
                    Type::L1d => b::PERF_COUNT_HW_CACHE_L1D,
                    Type::L1i => b::PERF_COUNT_HW_CACHE_L1I,
                    Type::Ll => b::PERF_COUNT_HW_CACHE_LL,
                    Type::Dtlb => b::PERF_COUNT_HW_CACHE_DTLB,
                    Type::Itlb => b::PERF_COUNT_HW_CACHE_ITLB,
                    Type::Bpu => b::PERF_COUNT_HW_CACHE_BPU,
                    Type::Node => b::PERF_COUNT_HW_CACHE_NODE,
                } as u64;
                let op = match op {
                    Op::Read => b::PERF_COUNT_HW_CACHE_OP_READ,
                    Op::Write => b::PERF_COUNT_HW_CACHE_OP_WRITE,
                    Op::Prefetch => b::PERF_COUNT_HW_CACHE_OP_PREFETCH,
                } as u64;
                let op_result = match result {
                    OpResult::Miss => b::PERF_COUNT_HW_CACHE_RESULT_MISS,
                    OpResult::Access => b::PERF_COUNT_HW_CACHE_RESULT_ACCESS,
                } as u64;
                id | (op << 8) | (op_result << 16)
            }

            Hardware::CacheMiss => b::PERF_COUNT_HW_CACHE_MISSES as _,
            Hardware::CacheAccess => b::PERF_COUNT_HW_CACHE_REFERENCES as _,

            Hardware::BranchMiss => b::PERF_COUNT_HW_BRANCH_MISSES as _,
            Hardware::BranchInstr => b::PERF_COUNT_HW_BRANCH_INSTRUCTIONS as _,

            Hardware::BackendStalledCycle => b::PERF_COUNT_HW_STALLED_CYCLES_BACKEND as _,
            Hardware::FrontendStalledCycle => b::PERF_COUNT_HW_STALLED_CYCLES_FRONTEND as _,

            Hardware::Instr => b::PERF_COUNT_HW_INSTRUCTIONS as _,
        };

        let ty = match value {
            Hardware::Cache(..) => b::PERF_TYPE_HW_CACHE,
            _ => b::PERF_TYPE_HARDWARE,
        };
        Self { ty, config }
    }
}

impl From<Software> for EventConfig {
    fn from(value: Software) -> Self {
        let config = match value {
            Software::CpuClock => b::PERF_COUNT_SW_CPU_CLOCK,
            Software::TaskClock => b::PERF_COUNT_SW_TASK_CLOCK,
            Software::PageFault => b::PERF_COUNT_SW_PAGE_FAULTS,
            Software::MinorPageFault => b::PERF_COUNT_SW_PAGE_FAULTS_MIN,
            Software::MajorPageFault => b::PERF_COUNT_SW_PAGE_FAULTS_MAJ,
            Software::EmuFault => b::PERF_COUNT_SW_EMULATION_FAULTS,
            Software::AlignFault => b::PERF_COUNT_SW_ALIGNMENT_FAULTS,
            Software::CtxSwitch => b::PERF_COUNT_SW_CONTEXT_SWITCHES,
            Software::CpuMigration => b::PERF_COUNT_SW_CPU_MIGRATIONS,
        } as u64;

        Self {
            ty: b::PERF_TYPE_SOFTWARE,
            config,
        }
    }
}

/// A native event and how to open it.
#[derive(Clone, Debug)]
pub(super) struct PerfNative {
    pub name: &'static str,
    pub descr: &'static str,
    pub categories: u32,
    pub config: EventConfig,
}

impl PerfNative {
    fn native_event(&self) -> NativeEvent {
        NativeEvent::new(self.name, self.descr)
            .categories(Categories::from_bits(self.categories))
            .register(self.config.ty, "type")
            .register(self.config.config as _, "config")
    }
}

macro_rules! natives {
    ($($name:literal => $event:expr, [$($cat:ident)|+], $descr:literal;)+) => {
        vec![$(
            PerfNative {
                name: $name,
                descr: $descr,
                categories: 0 $(| $cat)+,
                config: $event.into(),
            },
        )+]
    };
}

pub(super) fn hardware() -> Vec<PerfNative> {
    use Hardware::*;
    use Op::*;
    use OpResult::*;
    use Type::*;

    #[rustfmt::skip]
    let natives = natives! {
        "cycles" => CpuCycle, [MSC], "CPU cycles";
        "instructions" => Instr, [INS], "Retired instructions";
        "ref-cycles" => RefCpuCycle, [MSC], "Cycles at the reference frequency";
        "bus-cycles" => BusCycle, [MSC], "Bus cycles";
        "cache-references" => CacheAccess, [CACH], "Last level cache accesses";
        "cache-misses" => CacheMiss, [CACH], "Last level cache misses";
        "branches" => BranchInstr, [INS | BR], "Retired branch instructions";
        "branch-misses" => BranchMiss, [BR | CND], "Mispredicted branches";
        "stalled-cycles-frontend" => FrontendStalledCycle, [IDL], "Cycles the frontend issued nothing";
        "stalled-cycles-backend" => BackendStalledCycle, [IDL], "Cycles the backend retired nothing";
        "L1-dcache-loads" => Cache(L1d, Read, Access), [CACH | L1], "L1 data cache loads";
        "L1-dcache-load-misses" => Cache(L1d, Read, Miss), [CACH | L1], "L1 data cache load misses";
        "L1-dcache-stores" => Cache(L1d, Write, Access), [CACH | L1], "L1 data cache stores";
        "L1-dcache-store-misses" => Cache(L1d, Write, Miss), [CACH | L1], "L1 data cache store misses";
        "L1-icache-load-misses" => Cache(L1i, Read, Miss), [CACH | L1], "L1 instruction cache misses";
        "LLC-loads" => Cache(Ll, Read, Access), [CACH | L3], "Last level cache loads";
        "LLC-load-misses" => Cache(Ll, Read, Miss), [CACH | L3], "Last level cache load misses";
        "LLC-stores" => Cache(Ll, Write, Access), [CACH | L3], "Last level cache stores";
        "LLC-store-misses" => Cache(Ll, Write, Miss), [CACH | L3], "Last level cache store misses";
        "dTLB-loads" => Cache(Dtlb, Read, Access), [TLB], "Data TLB loads";
        "dTLB-load-misses" => Cache(Dtlb, Read, Miss), [TLB], "Data TLB load misses";
        "dTLB-store-misses" => Cache(Dtlb, Write, Miss), [TLB], "Data TLB store misses";
        "iTLB-load-misses" => Cache(Itlb, Read, Miss), [TLB], "Instruction TLB misses";
        "branch-load-misses" => Cache(Bpu, Read, Miss), [BR], "Branch predictor misses";
        "node-load-misses" => Cache(Node, Read, Miss), [MEM], "Loads served by a remote NUMA node";
    };
    natives
}

pub(super) fn software() -> Vec<PerfNative> {
    use Software::*;

    #[rustfmt::skip]
    let natives = natives! {
        "cpu-clock" => CpuClock, [MSC], "CPU clock, in nanoseconds";
        "task-clock" => TaskClock, [MSC], "Task clock, in nanoseconds";
        "page-faults" => PageFault, [MEM], "Page faults";
        "minor-faults" => MinorPageFault, [MEM], "Page faults served without I/O";
        "major-faults" => MajorPageFault, [MEM], "Page faults that needed I/O";
        "emulation-faults" => EmuFault, [INS], "Instructions emulated by the kernel";
        "alignment-faults" => AlignFault, [MEM], "Unaligned accesses fixed up by the kernel";
        "context-switches" => CtxSwitch, [MSC], "Context switches";
        "cpu-migrations" => CpuMigration, [MSC], "Migrations to another CPU";
    };
    natives
}

/// Builds the table of `natives`, asking `probe` which ones can be opened.
pub(super) fn table(
    table: &mut NativeTable,
    natives: &[PerfNative],
    mut probe: impl FnMut(&PerfNative) -> std::result::Result<(), String>,
) {
    for native in natives {
        let mut event = native.native_event();
        if let Err(reason) = probe(native) {
            log::debug!("{} is not countable: {}", native.name, reason);
            event.available = false;
            event.note = Some(reason);
        }
        table.push(event);
    }
}

/// Maps presets onto the generic hardware events.
pub(super) fn define_presets(map: &mut PresetMap, table: &NativeTable) -> Result<()> {
    use Derivation::*;

    let defs: &[(_, &[&str], _)] = &[
        (preset::TOT_CYC, &["cycles"], NotDerived),
        (preset::TOT_INS, &["instructions"], NotDerived),
        (preset::REF_CYC, &["ref-cycles"], NotDerived),
        (preset::BR_INS, &["branches"], NotDerived),
        (preset::BR_MSP, &["branch-misses"], NotDerived),
        (preset::BR_PRC, &["branches", "branch-misses"], Sub),
        (preset::STL_ICY, &["stalled-cycles-frontend"], NotDerived),
        (preset::RES_STL, &["stalled-cycles-backend"], NotDerived),
        (preset::L1_DCA, &["L1-dcache-loads", "L1-dcache-stores"], Add),
        (preset::L1_LDM, &["L1-dcache-load-misses"], NotDerived),
        (preset::L1_STM, &["L1-dcache-store-misses"], NotDerived),
        (preset::L1_DCM, &["L1-dcache-load-misses", "L1-dcache-store-misses"], Add),
        (preset::L1_ICM, &["L1-icache-load-misses"], NotDerived),
        (preset::L1_TCM, &["L1-dcache-load-misses", "L1-icache-load-misses"], Add),
        (preset::L3_LDM, &["LLC-load-misses"], NotDerived),
        (preset::L3_STM, &["LLC-store-misses"], NotDerived),
        (preset::L3_TCM, &["cache-misses"], NotDerived),
        (preset::LD_INS, &["L1-dcache-loads"], NotDerived),
        (preset::SR_INS, &["L1-dcache-stores"], NotDerived),
        (preset::LST_INS, &["L1-dcache-loads", "L1-dcache-stores"], Add),
        (preset::TLB_DM, &["dTLB-load-misses", "dTLB-store-misses"], Add),
        (preset::TLB_IM, &["iTLB-load-misses"], NotDerived),
        (preset::TLB_TL, &["dTLB-load-misses", "dTLB-store-misses", "iTLB-load-misses"], Add),
    ];

    for (preset, natives, derivation) in defs {
        map.define(*preset, natives, derivation.clone(), table)?;
    }
    map.annotate(preset::L3_TCM, "last level cache, which may not be the third");
    map.annotate(preset::L1_DCA, "loads and stores as counted by the L1 data cache");
    Ok(())
}
