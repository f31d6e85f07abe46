//! Counter drivers.
//!
//! A [`Driver`] owns the physical counters and knows only about native events.
//! Everything above it (presets, derivations, event set states and conflicts
//! between sets) is handled by [`Library`][crate::Library].

use crate::error::Result;
use crate::event::native::NativeEvent;
use crate::event::preset::PresetDefinition;
use crate::event::{Event, EventModifier};
use crate::topology::{
    ComponentId, ComponentInfo, Domain, DynMemInfo, ExecutableInfo, RawHardwareInfo,
};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod perf;
pub mod sim;
mod version;

pub use version::Version;

/// Driver-side identifier of an event set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub u32);

/// How the natives of a set are to be counted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub component: ComponentId,
    /// Time-share the physical counters between the natives.
    pub multiplex: bool,
    pub domain: Domain,
}

/// The capability the library drives.
///
/// Handles passed to a driver were returned by its own [`allocate`][Self::allocate]
/// and not yet released. The library never programs, starts or resets a handle
/// that is counting, and only reads or stops counting handles.
pub trait Driver: Send {
    /// Initializes the driver once, before any other call.
    fn init(&mut self) -> Result<Version>;

    /// Prepares the calling thread for counting.
    fn register_thread(&mut self) -> Result<()>;

    /// Components, indexed by [`ComponentId`].
    fn components(&self) -> &[ComponentInfo];

    /// Moves `code` to the next native event accepted by `modifier`, see
    /// [`NativeTable::enumerate`][crate::event::native::NativeTable::enumerate].
    fn enum_native(&self, code: &mut Event, modifier: EventModifier) -> Result<()>;

    fn native_info(&self, event: Event) -> Result<&NativeEvent>;

    fn native_code(&self, name: &str) -> Result<Event>;

    /// Returns how `preset` is counted, if it is countable on this machine.
    fn preset(&self, preset: Event) -> Option<&PresetDefinition>;

    /// Fails with [`ResourceExhausted`][crate::ErrorKind::ResourceExhausted]
    /// when no handle is left.
    fn allocate(&mut self) -> Result<RawHandle>;

    fn release(&mut self, handle: RawHandle) -> Result<()>;

    /// Replaces the natives bound to `handle`. An empty list unbinds everything.
    ///
    /// On failure the previous programming must be left intact.
    fn program(&mut self, handle: RawHandle, natives: &[Event], binding: &Binding) -> Result<()>;

    /// Zeroes the counters and starts counting.
    fn start(&mut self, handle: RawHandle) -> Result<()>;

    /// Writes the counts since the last start or reset, one per programmed native.
    fn read(&mut self, handle: RawHandle, values: &mut [i64]) -> Result<()>;

    fn reset(&mut self, handle: RawHandle) -> Result<()>;

    /// Stops counting and writes the final counts like [`read`][Self::read].
    ///
    /// The set is no longer counting when this returns, even if reading the
    /// final counts failed.
    fn stop(&mut self, handle: RawHandle, values: &mut [i64]) -> Result<()>;

    /// Hardware description, `None` if it cannot be determined.
    fn hardware_info(&self) -> Option<RawHardwareInfo>;

    fn dmem_info(&self) -> Result<DynMemInfo>;

    fn executable_info(&self) -> Option<ExecutableInfo>;

    fn real_cyc(&self) -> i64;

    fn real_usec(&self) -> i64;

    fn virt_cyc(&self) -> i64;

    fn virt_usec(&self) -> i64;
}
