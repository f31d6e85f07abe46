//! Counting with Linux `perf_event_open`.
//!
//! The kernel's generic hardware and cache events make up the natives of the
//! CPU component, software events those of a second component. Plain event
//! sets are opened as one pinned group, so the kernel either counts all of
//! their events at once or reports the group as failed. Multiplexed sets open
//! one group per event and have their counts scaled by the fraction of time
//! each one actually ran.

use super::{Binding, Driver, RawHandle, Version};
use crate::config::Opts;
use crate::error::{Error, ErrorKind, Result};
use crate::event::native::{NativeEvent, NativeTable};
use crate::event::preset::{PresetDefinition, PresetMap};
use crate::event::{Event, EventModifier};
use crate::ffi::bindings as b;
use crate::ffi::syscall::{clock_usec, perf_event_open};
use crate::topology::*;

mod event;
mod group;
mod stat;
mod sysfs;

pub use event::{EventConfig, Hardware, Op, OpResult, Software, Type};
use event::PerfNative;
use group::CounterGroup;

/// Hardware counters assumed when they cannot be detected.
const DEFAULT_COUNTERS: usize = 4;

const SOFTWARE: ComponentId = ComponentId(1);

struct Component {
    info: ComponentInfo,
    table: NativeTable,
    natives: Vec<PerfNative>,
}

impl Component {
    fn config(&self, event: Event) -> Result<EventConfig> {
        self.table.get(event)?;
        Ok(self.natives[event.index() as usize].config)
    }
}

struct Set {
    binding: Option<Binding>,
    // One group for plain sets, one per native for multiplexed ones.
    groups: Vec<CounterGroup>,
    counting: bool,
}

/// Driver for Linux `perf_event_open`.
///
/// # Examples
///
/// ```rust,no_run
/// use perfapi::config::{Cpu, Opts, Proc};
/// use perfapi::driver::perf::PerfDriver;
/// use perfapi::Library;
///
/// let opts = Opts {
///     target: (Proc::CURRENT, Cpu(0)).into(),
///     ..Default::default()
/// };
/// let library = Library::init(PerfDriver::new(opts)).unwrap();
/// println!("{} counters", library.num_counters());
/// ```
pub struct PerfDriver {
    opts: Opts,
    components: Vec<Component>,
    infos: Vec<ComponentInfo>,
    presets: PresetMap,
    sets: Vec<Option<Set>>,
    mhz: i64,
}

impl Default for PerfDriver {
    fn default() -> Self {
        Self::new(Opts::default())
    }
}

#[cfg(target_arch = "x86_64")]
fn detect_counters() -> Option<usize> {
    use std::arch::x86_64::__cpuid;

    // Leaf 0xA: architectural performance monitoring.
    let max_leaf = unsafe { __cpuid(0) }.eax;
    if max_leaf < 0xA {
        return None;
    }
    let leaf = unsafe { __cpuid(0xA) };
    let general = (leaf.eax >> 8) & 0xff;
    let fixed = leaf.edx & 0x1f;
    (general > 0).then_some((general + fixed) as usize)
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_counters() -> Option<usize> {
    None
}

fn features() -> Features {
    Features {
        hardware_interrupt: true,
        kernel_multiplex: true,
        cpu: true,
        attach: true,
        attach_must_ptrace: true,
        inherit: true,
        fast_real_timer: cfg!(target_arch = "x86_64"),
        ..Default::default()
    }
}

impl PerfDriver {
    pub fn new(opts: Opts) -> Self {
        Self {
            opts,
            components: vec![],
            infos: vec![],
            presets: PresetMap::new(),
            sets: vec![],
            mhz: 1000,
        }
    }

    fn probe(opts: &Opts, native: &PerfNative) -> std::result::Result<(), String> {
        if !opts.probe {
            return Ok(());
        }
        let attr = group::attr(native.config, Domain::USER, false, opts);
        let target = &opts.target;
        let flags = target.flags | b::PERF_FLAG_FD_CLOEXEC as u64;
        perf_event_open(&attr, target.pid, target.cpu, -1, flags)
            .map(drop)
            .map_err(|e| e.to_string())
    }

    fn component_info(&self, name: &str, description: &str, domains: Domain) -> ComponentInfo {
        ComponentInfo {
            name: name.to_string(),
            short_name: name.to_string(),
            description: description.to_string(),
            version: Version::CURRENT.to_string(),
            num_counters: 0,
            num_mpx_counters: 0,
            num_native_events: 0,
            default_domain: Domain::USER,
            available_domains: domains,
            default_granularity: self.opts.target.granularity(),
            available_granularities: vec![self.opts.target.granularity()],
            features: features(),
        }
    }

    fn cpu(&self, domains: Domain) -> Component {
        let natives = event::hardware();
        let mut table = NativeTable::new(ComponentId::CPU);
        event::table(&mut table, &natives, |native| Self::probe(&self.opts, native));

        let mut info = self.component_info("perf_event", "Linux perf_event CPU counters", domains);
        info.num_counters = self
            .opts
            .num_counters
            .or_else(detect_counters)
            .unwrap_or(DEFAULT_COUNTERS);
        info.num_mpx_counters = self.opts.num_mpx_counters;
        info.num_native_events = table.len();

        Component {
            info,
            table,
            natives,
        }
    }

    fn software(&self, domains: Domain) -> Component {
        let natives = event::software();
        let mut table = NativeTable::new(SOFTWARE);
        event::table(&mut table, &natives, |native| Self::probe(&self.opts, native));

        let mut info =
            self.component_info("perf_event_sw", "Linux perf_event software events", domains);
        // Software events do not occupy hardware counters.
        info.num_counters = natives.len();
        info.num_native_events = table.len();
        info.features.cpu = false;

        Component {
            info,
            table,
            natives,
        }
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

    fn open(&self, natives: &[Event], binding: &Binding) -> Result<Vec<CounterGroup>> {
        let component = self.component(binding.component)?;
        let configs = natives
            .iter()
            .map(|event| {
                if event.component() != binding.component {
                    return Err(ErrorKind::CounterConflict.into());
                }
                component.config(*event)
            })
            .collect::<Result<Vec<_>>>()?;

        let capacity = if binding.multiplex {
            component.info.num_mpx_counters
        } else {
            component.info.num_counters
        };
        if configs.len() > capacity {
            return Err(ErrorKind::TooManyEvents.into());
        }

        let groups = if binding.multiplex {
            configs
                .iter()
                .map(|config| CounterGroup::open(&[*config], binding.domain, false, &self.opts))
                .collect::<std::io::Result<Vec<_>>>()?
        } else {
            let pinned = binding.component == ComponentId::CPU;
            vec![CounterGroup::open(&configs, binding.domain, pinned, &self.opts)?]
        };
        Ok(groups)
    }

    fn read_set(set: &mut Set, values: &mut [i64]) -> Result<()> {
        let len = set.groups.iter().map(|group| group.len()).sum::<usize>();
        if values.len() < len {
            return Err(ErrorKind::BufferTooSmall.into());
        }

        let mut offset = 0;
        for group in &mut set.groups {
            let len = group.len();
            group.read(&mut values[offset..offset + len])?;
            offset += len;
        }
        Ok(())
    }
}

impl Driver for PerfDriver {
    fn init(&mut self) -> Result<Version> {
        let Some(paranoid) = sysfs::perf_event_paranoid() else {
            return Err(Error::new(
                ErrorKind::InitializationFailed,
                "kernel has no perf_event support",
            ));
        };

        let privileged = unsafe { libc::geteuid() } == 0;
        let domains = if privileged || paranoid <= 1 {
            Domain {
                user: true,
                kernel: true,
                other: true,
                supervisor: true,
            }
        } else {
            Domain::USER
        };

        self.components = vec![self.cpu(domains), self.software(domains)];
        if self
            .components
            .iter()
            .all(|component| component.table.iter().all(|(_, native)| !native.available))
        {
            return Err(Error::new(
                ErrorKind::InitializationFailed,
                format!("no event can be opened, perf_event_paranoid is {}", paranoid),
            ));
        }

        self.infos = self.components.iter().map(|component| component.info.clone()).collect();
        event::define_presets(&mut self.presets, &self.components[0].table)?;

        if let Some(info) = sysfs::hardware_info() {
            let mhz = if info.clock_mhz > 0 {
                info.clock_mhz as i64
            } else {
                info.mhz as i64
            };
            self.mhz = mhz.max(1);
        }

        log::debug!(
            "perf driver ready: {} counters, {} presets, paranoid level {}",
            self.components[0].info.num_counters,
            self.presets.len(),
            paranoid
        );
        Ok(Version::CURRENT)
    }

    fn register_thread(&mut self) -> Result<()> {
        // Counters follow the thread that opened them, nothing to prepare.
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
        if live >= self.opts.max_sets {
            return Err(Error::new(
                ErrorKind::ResourceExhausted,
                format!("all {} event sets are in use", self.opts.max_sets),
            ));
        }

        let set = Set {
            binding: None,
            groups: vec![],
            counting: false,
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
        // Closing the files frees the counters.
        self.sets[handle.0 as usize] = None;
        Ok(())
    }

    fn program(&mut self, handle: RawHandle, natives: &[Event], binding: &Binding) -> Result<()> {
        if self.set(handle)?.counting {
            return Err(ErrorKind::InvalidState.into());
        }

        let groups = if natives.is_empty() {
            vec![]
        } else {
            self.open(natives, binding)?
        };
        log::trace!("{:?} opened {} groups", handle, groups.len());

        let set = self.set_mut(handle)?;
        set.groups = groups;
        set.binding = (!natives.is_empty()).then_some(*binding);
        Ok(())
    }

    fn start(&mut self, handle: RawHandle) -> Result<()> {
        let set = self.set_mut(handle)?;
        if set.binding.is_none() || set.counting {
            return Err(ErrorKind::InvalidState.into());
        }

        for i in 0..set.groups.len() {
            if let Err(e) = set.groups[i].enable() {
                for group in &set.groups[..i] {
                    let _ = group.disable();
                }
                return Err(e.into());
            }
        }
        set.counting = true;
        Ok(())
    }

    fn read(&mut self, handle: RawHandle, values: &mut [i64]) -> Result<()> {
        let set = self.set_mut(handle)?;
        if !set.counting {
            return Err(ErrorKind::InvalidState.into());
        }
        Self::read_set(set, values)
    }

    fn reset(&mut self, handle: RawHandle) -> Result<()> {
        let set = self.set_mut(handle)?;
        if set.counting {
            for group in &mut set.groups {
                group.reset()?;
            }
        }
        Ok(())
    }

    fn stop(&mut self, handle: RawHandle, values: &mut [i64]) -> Result<()> {
        let set = self.set_mut(handle)?;
        if !set.counting {
            return Err(ErrorKind::InvalidState.into());
        }
        for group in &set.groups {
            group.disable()?;
        }
        // A group that lost its counters cannot be read, it is stopped all the same.
        let counts = Self::read_set(set, values);
        set.counting = false;
        counts
    }

    fn hardware_info(&self) -> Option<RawHardwareInfo> {
        sysfs::hardware_info()
    }

    fn dmem_info(&self) -> Result<DynMemInfo> {
        Ok(sysfs::dmem_info()?)
    }

    fn executable_info(&self) -> Option<ExecutableInfo> {
        sysfs::executable_info()
    }

    #[cfg(target_arch = "x86_64")]
    fn real_cyc(&self) -> i64 {
        unsafe { std::arch::x86_64::_rdtsc() as i64 }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn real_cyc(&self) -> i64 {
        self.real_usec() * self.mhz
    }

    fn real_usec(&self) -> i64 {
        clock_usec(libc::CLOCK_MONOTONIC).unwrap_or_default()
    }

    fn virt_cyc(&self) -> i64 {
        self.virt_usec() * self.mhz
    }

    fn virt_usec(&self) -> i64 {
        clock_usec(libc::CLOCK_THREAD_CPUTIME_ID).unwrap_or_default()
    }
}

#[cfg(test)]
mod test;
