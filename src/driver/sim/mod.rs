//! Deterministic software driver.
//!
//! Counts grow linearly with a manually advanced [`SimClock`], so every read
//! is exact and reproducible. Each native event may only be placed on some of
//! the physical registers, which lets register allocation fail the way real
//! PMUs do.
//!
//! ```rust
//! use perfapi::driver::sim::{SimConfig, Simulated};
//! use perfapi::event::preset;
//! use perfapi::Library;
//!
//! let config = SimConfig::default();
//! let clock = config.clock.clone();
//! let library = Library::init(Simulated::new(config)).unwrap();
//!
//! let mut set = library.create_event_set().unwrap();
//! set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();
//! set.start().unwrap();
//! clock.advance(10);
//! let mut values = [0; 2];
//! set.stop(&mut values).unwrap();
//! assert_eq!(values, [15_000, 10_000]);
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{Binding, Driver, RawHandle, Version};
use crate::error::{Error, ErrorKind, Result};
use crate::event::native::{NativeEvent, NativeTable};
use crate::event::preset::{self, PresetDefinition, PresetMap};
use crate::event::{Categories, Derivation, Event, EventModifier};
use crate::topology::*;

/// Shared time base of a simulated machine, in microseconds.
#[derive(Clone, Debug, Default)]
pub struct SimClock(Arc<AtomicU64>);

impl SimClock {
    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Lets `usec` microseconds of work happen.
    pub fn advance(&self, usec: u64) {
        self.0.fetch_add(usec, Ordering::SeqCst);
    }
}

#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Physical registers of the CPU component.
    pub num_counters: usize,
    /// Virtual counters for multiplexed sets.
    pub num_mpx_counters: usize,
    /// Event sets that can exist at the same time.
    pub max_sets: usize,
    pub mhz: u32,
    /// Privilege levels the CPU component can count in.
    pub domains: Domain,
    /// Version reported by `init`.
    pub version: Version,
    pub fail_init: bool,
    /// Reads fail while counting, the way a pinned group that lost its
    /// counters to another user does.
    pub fail_reads: bool,
    /// Returned by `hardware_info`, `None` simulates a host without introspection.
    pub topology: Option<RawHardwareInfo>,
    pub dmem: DynMemInfo,
    pub clock: SimClock,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_counters: 4,
            num_mpx_counters: 32,
            max_sets: 16,
            mhz: 1000,
            domains: Domain {
                user: true,
                kernel: true,
                ..Default::default()
            },
            version: Version::CURRENT,
            fail_init: false,
            fail_reads: false,
            topology: Some(topology()),
            dmem: DynMemInfo {
                peak: 8192,
                size: 8000,
                resident: 2048,
                high_water_mark: 2100,
                shared: 512,
                text: 256,
                library: 1024,
                heap: 600,
                locked: 0,
                stack: 132,
                pagesize: 4096,
                pte: 48,
            },
            clock: SimClock::default(),
        }
    }
}

/// A two level cache with TLBs on the first level, as most x86 parts report.
///
/// Slots after the first empty one hold garbage, the way fixed-size records
/// filled by firmware often do.
pub fn topology() -> RawHardwareInfo {
    let cache = |ty, size, assoc| RawCache {
        ty,
        size,
        line_size: 64,
        num_lines: size / 64,
        associativity: assoc,
    };
    let tlb = |ty, num_entries, assoc| RawTlb {
        ty: ty | MH_TYPE_TLB,
        num_entries,
        page_size: 4096,
        associativity: assoc,
    };

    let mut levels = [RawLevel::default(); MAX_LEVELS];
    levels[0].tlb[0] = tlb(MH_TYPE_INST, 64, 8);
    levels[0].tlb[1] = tlb(MH_TYPE_DATA, 64, FULLY_ASSOCIATIVE);
    levels[0].cache[0] = cache(MH_TYPE_DATA | MH_TYPE_WB | MH_TYPE_LRU, 32 * 1024, 8);
    levels[0].cache[1] = cache(MH_TYPE_INST | MH_TYPE_LRU, 32 * 1024, 8);
    levels[0].cache[3] = cache(0xdead, -1, -1);
    levels[1].tlb[0] = tlb(MH_TYPE_UNIFIED, 1536, 12);
    levels[1].cache[0] = cache(MH_TYPE_UNIFIED | MH_TYPE_WB | MH_TYPE_PSEUDO_LRU, 1 << 20, 16);
    levels[2].cache[0] = cache(MH_TYPE_UNIFIED, 8 << 20, 16);

    RawHardwareInfo {
        cpus: 8,
        threads: 2,
        cores: 4,
        sockets: 1,
        numa_nodes: 1,
        total_cpus: 8,
        vendor: 1,
        vendor_name: "Simulated".to_string(),
        model: 0,
        model_name: "Simulated CPU".to_string(),
        revision: 1.0,
        cpuid_family: 6,
        cpuid_model: 0,
        cpuid_stepping: 0,
        mhz: 1000.0,
        clock_mhz: 1000,
        // The third level is past the reported count and must never show up.
        num_levels: 2,
        levels,
    }
}

const ANY: u32 = u32::MAX;

struct Native {
    /// Count per microsecond.
    rate: i64,
    /// Registers the event can be placed on.
    registers: u32,
}

struct Component {
    info: ComponentInfo,
    table: NativeTable,
    natives: Vec<Native>,
}

impl Component {
    fn add(
        &mut self,
        name: &str,
        descr: &str,
        categories: u32,
        rate: i64,
        registers: u32,
    ) -> Event {
        let native = NativeEvent::new(name, descr)
            .categories(Categories::from_bits(categories))
            .register(registers, "counter mask");
        self.natives.push(Native { rate, registers });
        self.table.push(native)
    }

    fn native(&self, event: Event) -> Result<&Native> {
        self.table.get(event)?;
        Ok(&self.natives[event.index() as usize])
    }
}

struct Set {
    natives: Vec<Event>,
    binding: Option<Binding>,
    /// Tick of the last start or reset, while counting.
    since: Option<u64>,
}

/// Simulated counter driver, see the [module docs][self].
pub struct Simulated {
    config: SimConfig,
    components: Vec<Component>,
    infos: Vec<ComponentInfo>,
    presets: PresetMap,
    sets: Vec<Option<Set>>,
    threads: usize,
}

impl Simulated {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            components: vec![],
            infos: vec![],
            presets: PresetMap::new(),
            sets: vec![],
            threads: 0,
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.config.clock
    }

    fn cpu(&self) -> Component {
        use crate::event::cat::*;

        let config = &self.config;
        let mut cpu = Component {
            info: ComponentInfo {
                name: "sim".to_string(),
                short_name: "sim".to_string(),
                description: "Simulated CPU counters".to_string(),
                version: Version::CURRENT.to_string(),
                num_counters: config.num_counters,
                num_mpx_counters: config.num_mpx_counters,
                num_native_events: 0,
                default_domain: Domain::USER,
                available_domains: config.domains,
                default_granularity: Granularity::Thread,
                available_granularities: vec![Granularity::Thread],
                features: Features {
                    fast_counter_read: true,
                    fast_real_timer: true,
                    fast_virtual_timer: true,
                    cpu: true,
                    ..Default::default()
                },
            },
            table: NativeTable::new(ComponentId::CPU),
            natives: vec![],
        };

        cpu.add("SIM_CYCLES", "Core cycles", MSC, config.mhz as _, ANY);
        cpu.add("SIM_INSTRUCTIONS", "Retired instructions", INS, 1500, ANY);
        cpu.add("SIM_FP_INSTRUCTIONS", "Retired floating point instructions", INS | FP, 200, ANY);
        cpu.add("SIM_FP_FMA", "Retired fused multiply-add instructions", INS | FP, 50, 0b0011);
        cpu.add("SIM_LOADS", "Retired loads", INS | MEM, 400, ANY);
        cpu.add("SIM_STORES", "Retired stores", INS | MEM, 150, ANY);
        cpu.add("SIM_BRANCHES", "Retired branches", INS | BR, 250, ANY);
        cpu.add("SIM_BRANCH_MISSES", "Mispredicted branches", BR | CND, 10, 0b0011);
        cpu.add("SIM_L1D_MISSES", "L1 data cache misses", CACH | L1, 40, 0b0100);
        cpu.add("SIM_L1I_MISSES", "L1 instruction cache misses", CACH | L1, 5, 0b1100);
        cpu.add("SIM_L2_MISSES", "L2 cache misses", CACH | L2, 12, 0b0100);
        cpu.add("SIM_DTLB_MISSES", "Data TLB misses", TLB, 3, ANY);
        let itlb = cpu.add("SIM_ITLB_MISSES", "Instruction TLB misses", TLB, 1, ANY);
        cpu.add("SIM_STALL_CYCLES", "Cycles stalled on any resource", IDL, 300, ANY);
        cpu.add("SIM_REF_CYCLES", "Reference cycles", MSC, 100, ANY);

        // Probed as not countable on this machine.
        if let Ok(native) = cpu.table.get_mut(itlb) {
            native.available = false;
            native.note = Some("disabled by firmware".to_string());
        }

        // Natives tied to registers past the last counter can never be placed.
        let present = match config.num_counters {
            n if n >= u32::BITS as usize => ANY,
            n => (1u32 << n) - 1,
        };
        let unplaceable = cpu
            .table
            .iter()
            .filter(|(event, _)| cpu.natives[event.index() as usize].registers & present == 0)
            .map(|(event, _)| event)
            .collect::<Vec<_>>();
        for event in unplaceable {
            if let Ok(native) = cpu.table.get_mut(event) {
                native.available = false;
                let note = format!("needs a register beyond the {} counters", config.num_counters);
                native.note = Some(note);
            }
        }

        cpu.info.num_native_events = cpu.table.len();
        cpu
    }

    fn uncore(&self) -> Component {
        use crate::event::cat::*;

        let mut uncore = Component {
            info: ComponentInfo {
                name: "sim-uncore".to_string(),
                short_name: "uncore".to_string(),
                description: "Simulated memory controller counters".to_string(),
                version: Version::CURRENT.to_string(),
                num_counters: 2,
                num_mpx_counters: 0,
                num_native_events: 0,
                default_domain: Domain::ALL,
                available_domains: Domain::ALL,
                default_granularity: Granularity::System,
                available_granularities: vec![Granularity::System],
                features: Default::default(),
            },
            table: NativeTable::new(ComponentId(1)),
            natives: vec![],
        };

        uncore.add("SIM_DRAM_READS", "Memory controller read requests", MEM, 80, ANY);
        uncore.add("SIM_DRAM_WRITES", "Memory controller write requests", MEM, 30, ANY);

        uncore.info.num_native_events = uncore.table.len();
        uncore
    }

    fn define_presets(&mut self) -> Result<()> {
        let table = &self.components[0].table;
        let map = &mut self.presets;

        map.define(preset::TOT_CYC, &["SIM_CYCLES"], Derivation::NotDerived, table)?;
        map.define(preset::TOT_INS, &["SIM_INSTRUCTIONS"], Derivation::NotDerived, table)?;
        map.define(preset::FP_INS, &["SIM_FP_INSTRUCTIONS"], Derivation::NotDerived, table)?;
        map.define(preset::FMA_INS, &["SIM_FP_FMA"], Derivation::NotDerived, table)?;
        map.define(
            preset::FP_OPS,
            &["SIM_FP_INSTRUCTIONS", "SIM_FP_FMA"],
            Derivation::Postfix("N0|N1|2|*|+|".parse()?),
            table,
        )?;
        map.annotate(preset::FP_OPS, "fused multiply-adds count as two operations");
        map.define(preset::LD_INS, &["SIM_LOADS"], Derivation::NotDerived, table)?;
        map.define(preset::SR_INS, &["SIM_STORES"], Derivation::NotDerived, table)?;
        map.define(preset::LST_INS, &["SIM_LOADS", "SIM_STORES"], Derivation::Add, table)?;
        map.define(preset::BR_INS, &["SIM_BRANCHES"], Derivation::NotDerived, table)?;
        map.define(preset::BR_MSP, &["SIM_BRANCH_MISSES"], Derivation::NotDerived, table)?;
        map.define(
            preset::BR_PRC,
            &["SIM_BRANCHES", "SIM_BRANCH_MISSES"],
            Derivation::Sub,
            table,
        )?;
        map.define(preset::L1_DCM, &["SIM_L1D_MISSES"], Derivation::NotDerived, table)?;
        map.define(preset::L1_ICM, &["SIM_L1I_MISSES"], Derivation::NotDerived, table)?;
        map.define(
            preset::L1_TCM,
            &["SIM_L1D_MISSES", "SIM_L1I_MISSES"],
            Derivation::Add,
            table,
        )?;
        map.define(preset::L2_TCM, &["SIM_L2_MISSES"], Derivation::NotDerived, table)?;
        map.define(preset::TLB_DM, &["SIM_DTLB_MISSES"], Derivation::NotDerived, table)?;
        map.define(preset::TLB_IM, &["SIM_ITLB_MISSES"], Derivation::NotDerived, table)?;
        map.define(
            preset::TLB_TL,
            &["SIM_DTLB_MISSES", "SIM_ITLB_MISSES"],
            Derivation::Add,
            table,
        )?;
        map.define(preset::RES_STL, &["SIM_STALL_CYCLES"], Derivation::NotDerived, table)?;
        map.define(preset::REF_CYC, &["SIM_REF_CYCLES"], Derivation::NotDerived, table)?;

        Ok(())
    }

    fn component(&self, cid: ComponentId) -> Result<&Component> {
        self.components
            .get(cid.0 as usize)
            .ok_or_else(|| ErrorKind::InvalidComponent.into())
    }

    fn set(&self, handle: RawHandle) -> Result<&Set> {
        match self.sets.get(handle.0 as usize) {
            Some(Some(it)) => Ok(it),
            _ => Err(ErrorKind::InvalidHandle.into()),
        }
    }

    fn set_mut(&mut self, handle: RawHandle) -> Result<&mut Set> {
        match self.sets.get_mut(handle.0 as usize) {
            Some(Some(it)) => Ok(it),
            _ => Err(ErrorKind::InvalidHandle.into()),
        }
    }

    fn counts(&self, set: &Set, values: &mut [i64]) -> Result<()> {
        let (Some(since), Some(binding)) = (set.since, set.binding) else {
            return Err(ErrorKind::InvalidState.into());
        };
        if values.len() < set.natives.len() {
            return Err(ErrorKind::BufferTooSmall.into());
        }
        if self.config.fail_reads {
            return Err(Error::new(
                ErrorKind::CounterConflict,
                "counters were taken by another user",
            ));
        }

        let elapsed = self.config.clock.now().saturating_sub(since) as i64;
        let component = self.component(binding.component)?;
        for (value, event) in values.iter_mut().zip(&set.natives) {
            *value = component.native(*event)?.rate.wrapping_mul(elapsed);
        }
        Ok(())
    }
}

/// Places every event on a distinct register it accepts.
///
/// Returns the register of each event, or `None` if no placement exists.
fn assign_registers(masks: &[u32], num_registers: usize) -> Option<Vec<usize>> {
    // Augmenting paths over the event/register bipartite graph.
    fn place(
        event: usize,
        masks: &[u32],
        owner: &mut [Option<usize>],
        visited: &mut [bool],
    ) -> bool {
        let accepts = |reg: usize| masks[event] & (1 << reg) != 0;
        if let Some(reg) = (0..owner.len()).find(|reg| accepts(*reg) && owner[*reg].is_none()) {
            owner[reg] = Some(event);
            return true;
        }

        // Every register it takes is owned, try to move an owner elsewhere.
        for reg in 0..owner.len() {
            if !accepts(reg) || visited[reg] {
                continue;
            }
            visited[reg] = true;
            if let Some(other) = owner[reg] {
                if place(other, masks, owner, visited) {
                    owner[reg] = Some(event);
                    return true;
                }
            }
        }
        false
    }

    let num_registers = num_registers.min(u32::BITS as usize);
    let mut owner = vec![None; num_registers];
    for event in 0..masks.len() {
        let mut visited = vec![false; num_registers];
        if !place(event, masks, &mut owner, &mut visited) {
            return None;
        }
    }

    let mut placement = vec![0; masks.len()];
    for (reg, event) in owner.iter().enumerate() {
        if let Some(event) = event {
            placement[*event] = reg;
        }
    }
    Some(placement)
}

impl Driver for Simulated {
    fn init(&mut self) -> Result<Version> {
        if self.config.fail_init {
            return Err(Error::new(
                ErrorKind::InitializationFailed,
                "simulated hardware refused to initialize",
            ));
        }

        self.components = vec![self.cpu(), self.uncore()];
        self.infos = self.components.iter().map(|component| component.info.clone()).collect();
        self.define_presets()?;
        log::debug!(
            "simulated driver ready: {} counters, {} presets",
            self.config.num_counters,
            self.presets.len()
        );

        Ok(self.config.version)
    }

    fn register_thread(&mut self) -> Result<()> {
        self.threads += 1;
        log::trace!("registered thread #{}", self.threads);
        Ok(())
    }

    fn components(&self) -> &[ComponentInfo] {
        &self.infos
    }

    fn enum_native(&self, code: &mut Event, modifier: EventModifier) -> Result<()> {
        self.component(code.component())?
            .table
            .enumerate(code, modifier)
    }

    fn native_info(&self, event: Event) -> Result<&NativeEvent> {
        self.component(event.component())
            .map_err(|_| Error::from(ErrorKind::InvalidEvent))?
            .table
            .get(event)
    }

    fn native_code(&self, name: &str) -> Result<Event> {
        self.components
            .iter()
            .find_map(|component| component.table.lookup(name))
            .ok_or_else(|| Error::new(ErrorKind::InvalidEvent, format!("no native event {}", name)))
    }

    fn preset(&self, preset: Event) -> Option<&PresetDefinition> {
        let table = &self.components.first()?.table;
        self.presets.available(preset, table)
    }

    fn allocate(&mut self) -> Result<RawHandle> {
        let live = self.sets.iter().filter(|slot| slot.is_some()).count();
        if live >= self.config.max_sets {
            return Err(Error::new(
                ErrorKind::ResourceExhausted,
                format!("all {} simulated event sets are in use", self.config.max_sets),
            ));
        }

        let set = Set {
            natives: vec![],
            binding: None,
            since: None,
        };
        let slot = match self.sets.iter().position(|slot| slot.is_none()) {
            Some(slot) => {
                self.sets[slot] = Some(set);
                slot
            }
            None => {
                self.sets.push(Some(set));
                self.sets.len() - 1
            }
        };
        Ok(RawHandle(slot as _))
    }

    fn release(&mut self, handle: RawHandle) -> Result<()> {
        self.set(handle)?;
        self.sets[handle.0 as usize] = None;
        Ok(())
    }

    fn program(&mut self, handle: RawHandle, natives: &[Event], binding: &Binding) -> Result<()> {
        if self.set(handle)?.since.is_some() {
            return Err(ErrorKind::InvalidState.into());
        }

        if !natives.is_empty() {
            let component = self.component(binding.component)?;
            if !component.info.available_domains.contains(binding.domain) {
                return Err(Error::new(
                    ErrorKind::UnsupportedOperation,
                    format!(
                        "{} cannot count in domain {:#x}",
                        component.info.name,
                        binding.domain.bits()
                    ),
                ));
            }

            let masks = natives
                .iter()
                .map(|event| {
                    if event.component() != binding.component {
                        return Err(ErrorKind::CounterConflict.into());
                    }
                    component.native(*event).map(|native| native.registers)
                })
                .collect::<Result<Vec<_>>>()?;

            if binding.multiplex {
                if natives.len() > component.info.num_mpx_counters {
                    return Err(ErrorKind::TooManyEvents.into());
                }
            } else {
                if natives.len() > component.info.num_counters {
                    return Err(ErrorKind::TooManyEvents.into());
                }
                let placement = assign_registers(&masks, component.info.num_counters)
                    .ok_or_else(|| {
                        Error::new(ErrorKind::CounterConflict, "no register assignment fits")
                    })?;
                log::trace!("{:?} placed on registers {:?}", handle, placement);
            }
        }

        let set = self.set_mut(handle)?;
        set.natives = natives.to_vec();
        set.binding = (!natives.is_empty()).then_some(*binding);
        Ok(())
    }

    fn start(&mut self, handle: RawHandle) -> Result<()> {
        let now = self.config.clock.now();
        let set = self.set_mut(handle)?;
        if set.binding.is_none() || set.since.is_some() {
            return Err(ErrorKind::InvalidState.into());
        }
        set.since = Some(now);
        Ok(())
    }

    fn read(&mut self, handle: RawHandle, values: &mut [i64]) -> Result<()> {
        self.counts(self.set(handle)?, values)
    }

    fn reset(&mut self, handle: RawHandle) -> Result<()> {
        let now = self.config.clock.now();
        let set = self.set_mut(handle)?;
        if set.since.is_some() {
            set.since = Some(now);
        }
        Ok(())
    }

    fn stop(&mut self, handle: RawHandle, values: &mut [i64]) -> Result<()> {
        let counts = self.counts(self.set(handle)?, values);
        self.set_mut(handle)?.since = None;
        counts
    }

    fn hardware_info(&self) -> Option<RawHardwareInfo> {
        self.config.topology.clone()
    }

    fn dmem_info(&self) -> Result<DynMemInfo> {
        Ok(self.config.dmem)
    }

    fn executable_info(&self) -> Option<ExecutableInfo> {
        Some(ExecutableInfo {
            full_name: PathBuf::from("/sim/bin/workload"),
            address_info: AddressMap {
                name: "workload".to_string(),
                text_start: 0x40_0000,
                text_end: 0x48_0000,
                data_start: 0x68_0000,
                data_end: 0x69_0000,
                bss_start: 0x69_0000,
                bss_end: 0x6a_0000,
            },
        })
    }

    fn real_cyc(&self) -> i64 {
        self.real_usec() * self.config.mhz as i64
    }

    fn real_usec(&self) -> i64 {
        self.config.clock.now() as _
    }

    fn virt_cyc(&self) -> i64 {
        self.real_cyc()
    }

    fn virt_usec(&self) -> i64 {
        self.real_usec()
    }
}
