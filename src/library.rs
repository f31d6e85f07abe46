use std::sync::{Arc, Mutex, MutexGuard};

use crate::count::session::Session;
use crate::count::EventSet;
use crate::driver::{Driver, RawHandle, Version};
use crate::error::{Error, ErrorKind, Result};
use crate::event::preset;
use crate::event::{Derivation, Event, EventInfo, EventMask, EventModifier, Events};
use crate::topology::{ComponentId, ComponentInfo, DynMemInfo, ExecutableInfo, HardwareInfo};

/// A set currently counting, see [`Inner::activate`].
#[derive(Clone, Copy, Debug)]
pub(crate) struct Activation {
    pub handle: RawHandle,
    pub component: ComponentId,
    pub multiplex: bool,
}

/// State guarded by the library lock.
pub(crate) struct Inner {
    pub driver: Box<dyn Driver>,
    version: Version,
    running: Vec<Activation>,
}

impl Inner {
    pub fn component(&self, cid: ComponentId) -> Result<&ComponentInfo> {
        self.driver
            .components()
            .get(cid.0 as usize)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::InvalidComponent,
                    format!("no component {}", cid.0),
                )
            })
    }

    /// Native events an event is counted with, and how to combine their counts.
    ///
    /// Fails with [`ErrorKind::InvalidEvent`] for unknown or uncountable events.
    pub fn definition(&self, event: Event) -> Result<(Vec<Event>, Derivation)> {
        if event.is_preset() {
            if preset::lookup(event).is_none() {
                return Err(Error::new(ErrorKind::InvalidEvent, format!("no preset {}", event)));
            }
            return match self.driver.preset(event) {
                Some(def) => Ok((def.natives.clone(), def.derivation.clone())),
                None => Err(Error::new(
                    ErrorKind::InvalidEvent,
                    format!("{:?} is not available", event),
                )),
            };
        }

        let native = self.driver.native_info(event)?;
        if !native.available {
            return Err(Error::new(
                ErrorKind::InvalidEvent,
                format!("{} is not available", native.name),
            ));
        }
        Ok((vec![event], Derivation::NotDerived))
    }

    /// Records a set as counting.
    ///
    /// Only multiplexed sets may share a component.
    pub fn activate(&mut self, activation: Activation) -> Result<()> {
        let busy = self.running.iter().find(|active| {
            active.handle != activation.handle
                && active.component == activation.component
                && !(active.multiplex && activation.multiplex)
        });
        if let Some(active) = busy {
            return Err(Error::new(
                ErrorKind::CounterConflict,
                format!(
                    "component {} is in use by {:?}",
                    activation.component.0, active.handle
                ),
            ));
        }
        self.running.push(activation);
        Ok(())
    }

    pub fn deactivate(&mut self, handle: RawHandle) {
        self.running.retain(|active| active.handle != handle);
    }
}

/// Handle to an initialized driver.
///
/// Cheap to clone; all clones share the driver and the registry of running
/// event sets.
#[derive(Clone)]
pub struct Library {
    inner: Arc<Mutex<Inner>>,
}

impl Library {
    /// Initializes `driver` and registers the calling thread.
    ///
    /// Every failure is fatal: [`ErrorKind::InitializationFailed`],
    /// [`ErrorKind::VersionMismatch`] or [`ErrorKind::EnvironmentFault`].
    pub fn init(driver: impl Driver + 'static) -> Result<Self> {
        let fatal = |e: Error| {
            if e.is_fatal() {
                e
            } else {
                Error::new(ErrorKind::InitializationFailed, e.to_string())
            }
        };

        let mut driver: Box<dyn Driver> = Box::new(driver);
        let version = driver.init().map_err(fatal)?;
        if !Version::CURRENT.is_compatible(&version) {
            return Err(Error::new(
                ErrorKind::VersionMismatch,
                format!("driver implements {}, expected {}", version, Version::CURRENT),
            ));
        }
        driver.register_thread().map_err(fatal)?;

        log::debug!(
            "initialized driver v{} with {} components",
            version,
            driver.components().len()
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                driver,
                version,
                running: vec![],
            })),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the registry half updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Version reported by the driver.
    pub fn version(&self) -> Version {
        self.lock().version
    }

    /// Prepares the calling thread for counting.
    pub fn register_thread(&self) -> Result<()> {
        self.lock().driver.register_thread()
    }

    pub fn num_components(&self) -> usize {
        self.lock().driver.components().len()
    }

    pub fn component_info(&self, cid: ComponentId) -> Result<ComponentInfo> {
        self.lock().component(cid).cloned()
    }

    /// Physical counters of the CPU component.
    pub fn num_counters(&self) -> usize {
        self.lock()
            .component(ComponentId::CPU)
            .map(|info| info.num_counters)
            .unwrap_or(0)
    }

    /// Takes a fresh snapshot of the hardware.
    ///
    /// Fails with [`ErrorKind::EnvironmentFault`] if the driver cannot describe it.
    pub fn hardware_info(&self) -> Result<HardwareInfo> {
        match self.lock().driver.hardware_info() {
            Some(raw) => Ok(HardwareInfo::from(&raw)),
            None => Err(Error::new(
                ErrorKind::EnvironmentFault,
                "hardware information is not available",
            )),
        }
    }

    pub fn dmem_info(&self) -> Result<DynMemInfo> {
        self.lock().driver.dmem_info()
    }

    pub fn executable_info(&self) -> Result<ExecutableInfo> {
        self.lock().driver.executable_info().ok_or_else(|| {
            Error::new(
                ErrorKind::EnvironmentFault,
                "executable information is not available",
            )
        })
    }

    /// Lazily walks the events of `mask` accepted by `modifier`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use perfapi::driver::sim::{SimConfig, Simulated};
    /// use perfapi::{EventMask, EventModifier, Library};
    ///
    /// let library = Library::init(Simulated::new(SimConfig::default())).unwrap();
    /// for event in library.events(EventMask::PRESET, EventModifier::Available) {
    ///     let event = event.unwrap();
    ///     println!("{}", library.event_name(event).unwrap());
    /// }
    /// ```
    pub fn events(&self, mask: EventMask, modifier: EventModifier) -> Events<'_> {
        Events::new(self, mask, modifier)
    }

    /// Collects [`events`][Self::events].
    pub fn enumerate(&self, mask: EventMask, modifier: EventModifier) -> Result<Vec<Event>> {
        self.events(mask, modifier).collect()
    }

    /// Moves `code` to the next event of its universe accepted by `modifier`.
    ///
    /// [`EventModifier::First`] moves to the first event regardless of the
    /// filter. Fails with [`ErrorKind::NoMoreEvents`] at the end.
    pub(crate) fn enum_event(&self, code: &mut Event, modifier: EventModifier) -> Result<()> {
        let inner = self.lock();
        if !code.is_preset() {
            return inner.driver.enum_native(code, modifier);
        }

        let presets = preset::all();
        let start = match modifier {
            EventModifier::First => 0,
            _ => code.index() as usize + 1,
        };
        let found = presets.iter().skip(start).find(|preset| {
            let available = inner.driver.preset(preset.event).is_some();
            modifier == EventModifier::First || modifier.accepts(&preset.categories(), available)
        });

        match found {
            Some(preset) => {
                *code = preset.event;
                Ok(())
            }
            None => Err(ErrorKind::NoMoreEvents.into()),
        }
    }

    pub(crate) fn event_accepted(&self, event: Event, modifier: &EventModifier) -> Result<bool> {
        let inner = self.lock();
        if event.is_preset() {
            let preset = preset::lookup(event).ok_or(ErrorKind::InvalidEvent)?;
            let available = inner.driver.preset(event).is_some();
            Ok(modifier.accepts(&preset.categories(), available))
        } else {
            let native = inner.driver.native_info(event)?;
            Ok(modifier.accepts(&native.categories, native.available))
        }
    }

    /// Describes a preset or native event.
    pub fn event_info(&self, event: Event) -> Result<EventInfo> {
        let inner = self.lock();
        if event.is_preset() {
            let preset = preset::lookup(event).ok_or_else(|| {
                Error::new(ErrorKind::InvalidEvent, format!("no preset {}", event))
            })?;
            let name = |native: Event| {
                inner
                    .driver
                    .native_info(native)
                    .map(|native| native.name.clone())
                    .unwrap_or_default()
            };
            Ok(EventInfo::from_preset(preset, inner.driver.preset(event), name))
        } else {
            let native = inner.driver.native_info(event)?;
            Ok(EventInfo::from_native(event, native))
        }
    }

    /// Canonical name of an event: `PAPI_<SYMBOL>` for presets, the driver's
    /// name for natives.
    pub fn event_name(&self, event: Event) -> Result<String> {
        if event.is_preset() {
            return preset::symbol(event)
                .map(str::to_string)
                .ok_or_else(|| Error::new(ErrorKind::InvalidEvent, format!("no preset {}", event)));
        }
        Ok(self.lock().driver.native_info(event)?.name.clone())
    }

    /// Inverse of [`event_name`][Self::event_name].
    pub fn event_code(&self, name: &str) -> Result<Event> {
        if name.starts_with("PAPI_") {
            return preset::by_symbol(name)
                .map(|preset| preset.event)
                .ok_or_else(|| Error::new(ErrorKind::InvalidEvent, format!("no preset {}", name)));
        }
        self.lock().driver.native_code(name)
    }

    /// Allocates an empty event set.
    ///
    /// Fails with [`ErrorKind::ResourceExhausted`] when the driver has no
    /// handles left.
    pub fn create_event_set(&self) -> Result<EventSet> {
        let handle = self.lock().driver.allocate()?;
        log::trace!("allocated {:?}", handle);
        Ok(EventSet::new(self.clone(), handle))
    }

    /// Starts an idle counter session.
    pub fn session(&self) -> Session {
        Session::new(self.clone())
    }

    /// Wall clock time in cycles.
    pub fn real_cyc(&self) -> i64 {
        self.lock().driver.real_cyc()
    }

    /// Wall clock time in microseconds.
    pub fn real_usec(&self) -> i64 {
        self.lock().driver.real_usec()
    }

    /// CPU time of the calling thread in cycles.
    pub fn virt_cyc(&self) -> i64 {
        self.lock().driver.virt_cyc()
    }

    /// CPU time of the calling thread in microseconds.
    pub fn virt_usec(&self) -> i64 {
        self.lock().driver.virt_usec()
    }
}
