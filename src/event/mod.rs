//! Event identifiers and the event catalog.
//!
//! An [`Event`] is an opaque 32-bit code. Preset events are vendor neutral and
//! may be derived from several native events; native events are published by
//! a [driver][crate::driver::Driver] for one of its components.

use std::fmt;

mod derive;
mod enumerate;
mod info;
pub mod native;
pub mod preset;

pub use derive::*;
pub(crate) use enumerate::cat;
pub use enumerate::*;
pub use info::*;

use crate::topology::ComponentId;

pub(crate) const PRESET_MASK: u32 = 0x8000_0000;
pub(crate) const NATIVE_MASK: u32 = 0x4000_0000;
const COMPONENT_MASK: u32 = 0x3C00_0000;
const COMPONENT_SHIFT: u32 = 26;
const INDEX_MASK: u32 = 0x03FF_FFFF;

/// Maximum number of components a native event code can address.
pub const MAX_COMPONENTS: usize = 16;

/// Counter event identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Event(u32);

impl Event {
    pub const fn from_code(code: u32) -> Self {
        Self(code)
    }

    pub(crate) const fn preset(index: u32) -> Self {
        Self(PRESET_MASK | (index & INDEX_MASK))
    }

    /// Builds the code of the `index`-th native event of a component.
    pub const fn native(component: ComponentId, index: u32) -> Self {
        let cid = ((component.0 as u32) << COMPONENT_SHIFT) & COMPONENT_MASK;
        Self(NATIVE_MASK | cid | (index & INDEX_MASK))
    }

    pub const fn code(self) -> u32 {
        self.0
    }

    pub const fn is_preset(self) -> bool {
        self.0 & PRESET_MASK != 0
    }

    pub const fn is_native(self) -> bool {
        self.0 & PRESET_MASK == 0 && self.0 & NATIVE_MASK != 0
    }

    /// Position of the event within its universe.
    pub const fn index(self) -> u32 {
        self.0 & INDEX_MASK
    }

    /// Component counting this event. Presets always belong to the CPU component.
    pub const fn component(self) -> ComponentId {
        if self.is_native() {
            ComponentId(((self.0 & COMPONENT_MASK) >> COMPONENT_SHIFT) as _)
        } else {
            ComponentId::CPU
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match preset::symbol(*self) {
            Some(symbol) => write!(f, "Event({})", symbol),
            None => write!(f, "Event({:#010x})", self.0),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl From<Event> for u32 {
    fn from(event: Event) -> Self {
        event.0
    }
}

/// Starting point of an enumeration: which universe of events to walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventMask(u32);

impl EventMask {
    /// All preset events.
    pub const PRESET: Self = Self(PRESET_MASK);
    /// Native events of the CPU component.
    pub const NATIVE: Self = Self(NATIVE_MASK);

    /// Native events of the given component.
    pub const fn component(cid: ComponentId) -> Self {
        Self(NATIVE_MASK | (((cid.0 as u32) << COMPONENT_SHIFT) & COMPONENT_MASK))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub(crate) const fn start(self) -> Event {
        Event(self.0)
    }
}

#[cfg(test)]
mod test;
