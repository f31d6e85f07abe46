//! Native event tables published by drivers.

use super::{Categories, Event, EventModifier};
use crate::error::{Error, ErrorKind, Result};
use crate::topology::ComponentId;

/// A hardware or platform specific event.
#[derive(Clone, Debug, Default)]
pub struct NativeEvent {
    pub name: String,
    pub short_descr: String,
    pub long_descr: String,
    pub categories: Categories,
    /// Whether the event can be counted on this machine.
    pub available: bool,
    /// Register programming values with their names.
    pub registers: Vec<(u32, String)>,
    pub note: Option<String>,
}

impl NativeEvent {
    pub fn new(name: impl Into<String>, descr: impl Into<String>) -> Self {
        let descr = descr.into();
        Self {
            name: name.into(),
            short_descr: descr.clone(),
            long_descr: descr,
            available: true,
            ..Default::default()
        }
    }

    pub fn categories(self, categories: Categories) -> Self {
        Self { categories, ..self }
    }

    pub fn register(mut self, code: u32, name: impl Into<String>) -> Self {
        self.registers.push((code, name.into()));
        self
    }
}

/// The native events of one component, indexed by event code.
#[derive(Clone, Debug)]
pub struct NativeTable {
    component: ComponentId,
    events: Vec<NativeEvent>,
}

impl NativeTable {
    pub fn new(component: ComponentId) -> Self {
        Self {
            component,
            events: vec![],
        }
    }

    pub fn component(&self) -> ComponentId {
        self.component
    }

    /// Appends an event and returns its code.
    pub fn push(&mut self, event: NativeEvent) -> Event {
        let code = Event::native(self.component, self.events.len() as _);
        self.events.push(event);
        code
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    fn position(&self, event: Event) -> Option<usize> {
        (event.is_native() && event.component() == self.component)
            .then_some(event.index() as usize)
            .filter(|index| *index < self.events.len())
    }

    pub fn get(&self, event: Event) -> Result<&NativeEvent> {
        self.position(event)
            .map(|index| &self.events[index])
            .ok_or_else(|| Error::from(ErrorKind::InvalidEvent))
    }

    pub fn get_mut(&mut self, event: Event) -> Result<&mut NativeEvent> {
        match self.position(event) {
            Some(it) => Ok(&mut self.events[it]),
            None => Err(ErrorKind::InvalidEvent.into()),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Event> {
        self.events
            .iter()
            .position(|native| native.name == name)
            .map(|index| Event::native(self.component, index as _))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Event, &NativeEvent)> {
        self.events
            .iter()
            .enumerate()
            .map(|(i, it)| (Event::native(self.component, i as _), it))
    }

    /// Moves the cursor `code` to the next event accepted by `modifier`.
    ///
    /// [`EventModifier::First`] resets the cursor to the first event of the table.
    /// Fails with [`ErrorKind::NoMoreEvents`] when the table is exhausted.
    pub fn enumerate(&self, code: &mut Event, modifier: EventModifier) -> Result<()> {
        let start = match modifier {
            EventModifier::First => 0,
            _ => match self.position(*code) {
                Some(it) => it + 1,
                None => return Err(ErrorKind::InvalidEvent.into()),
            },
        };

        let found = self.events[start.min(self.events.len())..]
            .iter()
            .position(|native| {
                modifier == EventModifier::First
                    || modifier.accepts(&native.categories, native.available)
            })
            .map(|index| index + start);

        match found {
            Some(index) => {
                *code = Event::native(self.component, index as _);
                Ok(())
            }
            None => Err(ErrorKind::NoMoreEvents.into()),
        }
    }
}
