//! Event sets: the counting state machine.
//!
//! ```text
//!              add              start
//! Allocated ---------> Populated -------> Counting
//!     ^   <---------      |  ^   <-------
//!     |   remove last     |  |    stop
//!     |   or cleanup      |  |
//!     +-------------------+  |
//!                            v
//!                        Destroyed
//! ```
//!
//! Every operation either succeeds completely or leaves the set untouched.

use std::fmt;

use crate::driver::{Binding, RawHandle};
use crate::error::{code, Error, ErrorKind, Result};
use crate::event::{Derivation, Event};
use crate::library::{Activation, Inner};
use crate::topology::{ComponentId, Domain};
use crate::Library;

pub mod session;

/// Lifecycle state of an [`EventSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum State {
    /// No events bound.
    Allocated,
    /// Events bound, not counting.
    Populated,
    Counting,
    /// The driver handle has been released.
    Destroyed,
}

#[derive(Clone)]
struct Entry {
    event: Event,
    natives: Vec<Event>,
    derivation: Derivation,
}

/// Distinct natives of a set and where each entry finds its own.
#[derive(Default)]
struct Layout {
    natives: Vec<Event>,
    slots: Vec<Vec<usize>>,
}

impl Layout {
    fn of(entries: &[Entry]) -> Self {
        let mut layout = Self::default();
        for entry in entries {
            let slots = entry
                .natives
                .iter()
                .map(|native| match layout.natives.iter().position(|bound| bound == native) {
                    Some(pos) => pos,
                    None => {
                        layout.natives.push(*native);
                        layout.natives.len() - 1
                    }
                })
                .collect();
            layout.slots.push(slots);
        }
        layout
    }
}

/// A collection of events counted together.
///
/// Dropping a set stops it if needed and releases its driver handle.
///
/// # Examples
///
/// ```rust
/// use perfapi::driver::sim::{SimConfig, Simulated};
/// use perfapi::event::preset;
/// use perfapi::Library;
///
/// let library = Library::init(Simulated::new(SimConfig::default())).unwrap();
/// let mut set = library.create_event_set().unwrap();
/// set.add_event(preset::TOT_INS).unwrap();
/// set.add_named_event("PAPI_TOT_CYC").unwrap();
///
/// set.start().unwrap();
/// // Work to measure.
/// let mut values = [0; 2];
/// set.stop(&mut values).unwrap();
///
/// let ipc = values[0] as f64 / values[1].max(1) as f64;
/// println!("IPC: {}", ipc);
/// ```
pub struct EventSet {
    library: Library,
    handle: Option<RawHandle>,
    state: State,
    entries: Vec<Entry>,
    layout: Layout,
    multiplex: bool,
    component: Option<ComponentId>,
    domain: Option<Domain>,
    // Sets that counted without multiplexing cannot switch to it.
    started_plain: bool,
    scratch: Vec<i64>,
}

impl EventSet {
    pub(crate) fn new(library: Library, handle: RawHandle) -> Self {
        Self {
            library,
            handle: Some(handle),
            state: State::Allocated,
            entries: vec![],
            layout: Layout::default(),
            multiplex: false,
            component: None,
            domain: None,
            started_plain: false,
            scratch: vec![],
        }
    }

    fn handle(&self) -> Result<RawHandle> {
        self.handle
            .ok_or_else(|| Error::new(ErrorKind::InvalidHandle, "event set was destroyed"))
    }

    fn not_counting(&self) -> Result<RawHandle> {
        let handle = self.handle()?;
        if self.state == State::Counting {
            return Err(
                Error::new(ErrorKind::InvalidState, "event set is counting").with_code(code::EISRUN)
            );
        }
        Ok(handle)
    }

    fn counting(&self) -> Result<RawHandle> {
        let handle = self.handle()?;
        if self.state != State::Counting {
            return Err(
                Error::new(ErrorKind::InvalidState, "event set is not counting")
                    .with_code(code::ENOTRUN),
            );
        }
        Ok(handle)
    }

    fn binding(&self, inner: &Inner, component: ComponentId) -> Result<Binding> {
        let domain = match self.domain {
            Some(it) => it,
            None => inner.component(component)?.default_domain,
        };
        Ok(Binding {
            component,
            multiplex: self.multiplex,
            domain,
        })
    }

    /// Programs the driver with `entries` and commits them on success.
    fn rebind(
        &mut self,
        inner: &mut Inner,
        handle: RawHandle,
        entries: Vec<Entry>,
        component: ComponentId,
    ) -> Result<()> {
        let layout = Layout::of(&entries);
        if !layout.natives.is_empty() {
            let info = inner.component(component)?;
            let capacity = if self.multiplex {
                info.num_mpx_counters
            } else {
                info.num_counters
            };
            if layout.natives.len() > capacity {
                return Err(Error::new(
                    ErrorKind::TooManyEvents,
                    format!(
                        "{} native events do not fit in {} counters",
                        layout.natives.len(),
                        capacity
                    ),
                ));
            }
        }

        let binding = self.binding(inner, component)?;
        inner.driver.program(handle, &layout.natives, &binding)?;

        self.state = if entries.is_empty() {
            State::Allocated
        } else {
            State::Populated
        };
        self.component = Some(component);
        self.scratch.resize(layout.natives.len(), 0);
        self.entries = entries;
        self.layout = layout;
        Ok(())
    }

    /// Binds one more event, see [`add_events`][Self::add_events].
    pub fn add_event(&mut self, event: Event) -> Result<()> {
        self.add_events(&[event])
    }

    /// Binds a preset or native event by name.
    pub fn add_named_event(&mut self, name: &str) -> Result<()> {
        let event = self.library.event_code(name)?;
        self.add_event(event)
    }

    /// Appends events to the set, all of them or none.
    ///
    /// Fails with
    /// - [`ErrorKind::InvalidEvent`] for an unknown or uncountable event,
    /// - [`ErrorKind::CounterConflict`] for an event already in the set, an event
    ///   of another component, or natives the driver cannot place together,
    /// - [`ErrorKind::TooManyEvents`] when the natives exceed the counters,
    /// - [`ErrorKind::InvalidState`] while counting.
    pub fn add_events(&mut self, events: &[Event]) -> Result<()> {
        let handle = self.not_counting()?;
        if events.is_empty() {
            return Ok(());
        }
        let library = self.library.clone();
        let mut inner = library.lock();

        let mut component = self.component;
        let mut added = Vec::with_capacity(events.len());
        for (i, event) in events.iter().enumerate() {
            let duplicate = self.entries.iter().any(|entry| entry.event == *event)
                || events[..i].contains(event);
            if duplicate {
                return Err(Error::new(
                    ErrorKind::CounterConflict,
                    format!("{:?} is already in the set", event),
                ));
            }

            let (natives, derivation) = inner.definition(*event)?;
            let cid = event.component();
            match component {
                Some(bound) if bound != cid => {
                    return Err(Error::new(
                        ErrorKind::CounterConflict,
                        format!("{:?} belongs to component {}, not {}", event, cid.0, bound.0),
                    ))
                }
                _ => component = Some(cid),
            }
            added.push(Entry {
                event: *event,
                natives,
                derivation,
            });
        }

        let Some(component) = component else {
            return Ok(());
        };
        let entries = self.entries.iter().cloned().chain(added).collect();
        self.rebind(&mut inner, handle, entries, component)?;

        log::trace!("{:?} now counts {} events", handle, self.entries.len());
        Ok(())
    }

    pub fn remove_event(&mut self, event: Event) -> Result<()> {
        self.remove_events(&[event])
    }

    /// Unbinds events, all of them or none. The others keep their order.
    ///
    /// Fails with [`ErrorKind::InvalidEvent`] if an event is not in the set.
    pub fn remove_events(&mut self, events: &[Event]) -> Result<()> {
        let handle = self.not_counting()?;
        let bound = |event: &&Event| self.entries.iter().any(|entry| entry.event == **event);
        if let Some(missing) = events.iter().find(|event| !bound(event)) {
            return Err(Error::new(
                ErrorKind::InvalidEvent,
                format!("{:?} is not in the set", missing),
            ));
        }

        let library = self.library.clone();
        let mut inner = library.lock();
        let entries = self
            .entries
            .iter()
            .filter(|entry| !events.contains(&entry.event))
            .cloned()
            .collect();
        let component = self.component.unwrap_or(ComponentId::CPU);
        self.rebind(&mut inner, handle, entries, component)
    }

    pub fn num_events(&self) -> Result<usize> {
        self.handle()?;
        Ok(self.entries.len())
    }

    /// Bound events, in the order they were added.
    pub fn events(&self) -> Result<Vec<Event>> {
        self.handle()?;
        Ok(self.entries.iter().map(|entry| entry.event).collect())
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Starts counting from zero.
    ///
    /// Fails with [`ErrorKind::CounterConflict`] if another set is counting on
    /// the same component, unless both are multiplexed.
    pub fn start(&mut self) -> Result<()> {
        let handle = self.not_counting()?;
        if self.state == State::Allocated {
            return Err(Error::new(ErrorKind::InvalidState, "event set has no events"));
        }

        let library = self.library.clone();
        let mut inner = library.lock();
        let activation = Activation {
            handle,
            component: self.component.unwrap_or(ComponentId::CPU),
            multiplex: self.multiplex,
        };
        inner.activate(activation)?;
        if let Err(e) = inner.driver.start(handle) {
            inner.deactivate(handle);
            return Err(e);
        }

        self.state = State::Counting;
        self.started_plain |= !self.multiplex;
        log::debug!("{:?} started on component {}", handle, activation.component.0);
        Ok(())
    }

    fn check_len(&self, values: &[i64]) -> Result<()> {
        if values.len() < self.entries.len() {
            return Err(Error::new(
                ErrorKind::BufferTooSmall,
                format!("{} slots for {} events", values.len(), self.entries.len()),
            ));
        }
        Ok(())
    }

    // Combines native counts in `self.scratch` into one value per entry.
    fn derive(&self, mut write: impl FnMut(usize, i64)) {
        let mut natives = Vec::new();
        for (i, (entry, slots)) in self.entries.iter().zip(&self.layout.slots).enumerate() {
            natives.clear();
            natives.extend(slots.iter().map(|slot| self.scratch[*slot]));
            write(i, entry.derivation.evaluate(&natives));
        }
    }

    /// Writes the current counts without resetting them.
    pub fn read(&mut self, values: &mut [i64]) -> Result<()> {
        let handle = self.counting()?;
        self.check_len(values)?;
        self.library.lock().driver.read(handle, &mut self.scratch)?;
        self.derive(|i, value| values[i] = value);
        Ok(())
    }

    /// Adds the counts to `values`, then resets the counters.
    pub fn accumulate(&mut self, values: &mut [i64]) -> Result<()> {
        let handle = self.counting()?;
        self.check_len(values)?;
        {
            let library = self.library.clone();
            let mut inner = library.lock();
            inner.driver.read(handle, &mut self.scratch)?;
            inner.driver.reset(handle)?;
        }
        self.derive(|i, value| values[i] = values[i].wrapping_add(value));
        Ok(())
    }

    /// Stops counting and writes the final counts.
    ///
    /// The set leaves [`State::Counting`] even when the final counts cannot
    /// be read, `values` is then left untouched.
    pub fn stop(&mut self, values: &mut [i64]) -> Result<()> {
        let handle = self.counting()?;
        self.check_len(values)?;
        let stopped = {
            let library = self.library.clone();
            let mut inner = library.lock();
            let stopped = inner.driver.stop(handle, &mut self.scratch);
            inner.deactivate(handle);
            stopped
        };
        self.state = State::Populated;
        stopped?;
        self.derive(|i, value| values[i] = value);
        log::debug!("{:?} stopped", handle);
        Ok(())
    }

    /// Zeroes the counters. Does nothing unless counting, since starting
    /// always begins from zero.
    pub fn reset(&mut self) -> Result<()> {
        let handle = self.handle()?;
        if self.state == State::Counting {
            self.library.lock().driver.reset(handle)?;
        }
        Ok(())
    }

    /// Unbinds every event and turns multiplexing off. The component stays assigned.
    pub fn cleanup(&mut self) -> Result<()> {
        let handle = self.not_counting()?;
        if self.state == State::Populated {
            let library = self.library.clone();
            let mut inner = library.lock();
            let binding = self.binding(&inner, self.component.unwrap_or(ComponentId::CPU))?;
            inner.driver.program(handle, &[], &binding)?;
        }

        self.entries.clear();
        self.layout = Layout::default();
        self.scratch.clear();
        self.multiplex = false;
        self.state = State::Allocated;
        Ok(())
    }

    /// Releases the driver handle. Every later call fails with
    /// [`ErrorKind::InvalidHandle`].
    pub fn destroy(&mut self) -> Result<()> {
        let handle = self.not_counting()?;
        self.library.lock().driver.release(handle)?;

        self.handle = None;
        self.state = State::Destroyed;
        self.entries.clear();
        self.layout = Layout::default();
        log::trace!("released {:?}", handle);
        Ok(())
    }

    /// Lets the set hold more events than there are physical counters by
    /// time-sharing them.
    ///
    /// Only allowed on an empty set that never counted without multiplexing.
    /// Assigns the CPU component if none is assigned yet.
    pub fn set_multiplex(&mut self) -> Result<()> {
        self.not_counting()?;
        if self.state != State::Allocated {
            return Err(Error::new(ErrorKind::InvalidState, "event set is not empty"));
        }
        if self.started_plain {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "event set already counted without multiplexing",
            ));
        }

        let component = self.component.unwrap_or(ComponentId::CPU);
        let info = self.library.component_info(component)?;
        if !info.can_multiplex() {
            return Err(Error::new(
                ErrorKind::UnsupportedOperation,
                format!("{} cannot multiplex", info.name),
            ));
        }

        self.component = Some(component);
        self.multiplex = true;
        Ok(())
    }

    pub fn get_multiplex(&self) -> Result<bool> {
        self.handle()?;
        Ok(self.multiplex)
    }

    /// Binds the set to a component. Only allowed on an empty set.
    pub fn assign_component(&mut self, cid: ComponentId) -> Result<()> {
        self.not_counting()?;
        if self.state != State::Allocated {
            return Err(Error::new(ErrorKind::InvalidState, "event set is not empty"));
        }

        let info = self.library.component_info(cid)?;
        if self.multiplex && !info.can_multiplex() {
            return Err(Error::new(
                ErrorKind::UnsupportedOperation,
                format!("{} cannot multiplex", info.name),
            ));
        }
        self.component = Some(cid);
        Ok(())
    }

    /// Assigned component, if any.
    pub fn component(&self) -> Option<ComponentId> {
        self.component
    }

    /// Sets the privilege levels to count in.
    ///
    /// Fails with [`ErrorKind::UnsupportedOperation`] if the component does not
    /// offer them.
    pub fn set_domain(&mut self, domain: Domain) -> Result<()> {
        let handle = self.not_counting()?;
        if domain.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "empty domain"));
        }

        let library = self.library.clone();
        let mut inner = library.lock();
        let component = self.component.unwrap_or(ComponentId::CPU);
        let info = inner.component(component)?;
        if !info.available_domains.contains(domain) {
            return Err(Error::new(
                ErrorKind::UnsupportedOperation,
                format!("{} cannot count in domain {:#x}", info.name, domain.bits()),
            ));
        }

        let previous = self.domain.replace(domain);
        if self.state == State::Populated {
            let binding = self.binding(&inner, component)?;
            if let Err(e) = inner.driver.program(handle, &self.layout.natives, &binding) {
                self.domain = previous;
                return Err(e);
            }
        }
        Ok(())
    }

    /// Privilege levels counted in.
    pub fn domain(&self) -> Result<Domain> {
        self.handle()?;
        match self.domain {
            Some(it) => Ok(it),
            None => Ok(self
                .library
                .lock()
                .component(self.component.unwrap_or(ComponentId::CPU))?
                .default_domain),
        }
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSet")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("events", &self.entries.iter().map(|entry| entry.event).collect::<Vec<_>>())
            .field("multiplex", &self.multiplex)
            .field("component", &self.component)
            .finish()
    }
}

impl Drop for EventSet {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        let mut inner = self.library.lock();
        if self.state == State::Counting {
            if let Err(e) = inner.driver.stop(handle, &mut self.scratch) {
                log::warn!("failed to stop {:?} on drop: {}", handle, e);
            }
            inner.deactivate(handle);
        }
        if let Err(e) = inner.driver.release(handle) {
            log::warn!("failed to release {:?} on drop: {}", handle, e);
        }
    }
}
