//! Event sets, presets and multiplexing over hardware performance counters.
//!
//! A [`Library`] wraps a counter [driver][driver::Driver]. Events are picked
//! from vendor neutral [presets][event::preset] or from the driver's native
//! events, grouped into an [`EventSet`] and counted with explicit
//! start/read/accumulate/stop calls.
//!
//! ## Example
//!
//! Count how many instructions and cycles the (inefficient) fibonacci calculation takes.
//!
//! ```rust,no_run
//! use perfapi::driver::perf::PerfDriver;
//! use perfapi::event::preset;
//! use perfapi::Library;
//!
//! let library = Library::init(PerfDriver::default()).unwrap();
//!
//! let mut set = library.create_event_set().unwrap();
//! set.add_events(&[preset::TOT_INS, preset::TOT_CYC]).unwrap();
//!
//! set.start().unwrap();
//! fn fib(n: usize) -> usize {
//!     match n {
//!         0 => 0,
//!         1 => 1,
//!         n => fib(n - 1) + fib(n - 2),
//!     }
//! }
//! std::hint::black_box(fib(30));
//! let mut values = [0; 2];
//! set.stop(&mut values).unwrap();
//!
//! println!("{} instructions in {} cycles", values[0], values[1]);
//! ```
//!
//! ## Drivers
//!
//! [`PerfDriver`][driver::perf::PerfDriver] counts with Linux `perf_event_open`.
//! [`Simulated`][driver::sim::Simulated] is a deterministic software machine for
//! tests and hosts without counter access.

#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod config;
pub mod count;
pub mod driver;
pub mod error;
pub mod event;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod ffi;
mod library;
pub mod topology;

pub use count::session::{Rate, Session};
pub use count::{EventSet, State};
pub use error::{Error, ErrorKind, Result};
pub use event::{Event, EventMask, EventModifier};
pub use library::Library;
