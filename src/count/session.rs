//! One implicit event set for quick measurements.

use super::{EventSet, State};
use crate::error::{Error, ErrorKind, Result};
use crate::event::{preset, Event};
use crate::Library;

/// Totals since the first rate call, with the rate over the last interval.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rate {
    /// Wall clock seconds.
    pub real_time: f64,
    /// CPU seconds of the calling thread.
    pub proc_time: f64,
    /// Events counted.
    pub count: i64,
    /// Millions of events per CPU second, or instructions per cycle for
    /// [`Session::ipc`]. Zero when no time or cycle elapsed.
    pub rate: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RateKind {
    Flips,
    Flops,
    Ipc,
}

impl RateKind {
    fn events(self) -> [Event; 2] {
        match self {
            Self::Flips => [preset::FP_INS, preset::TOT_CYC],
            Self::Flops => [preset::FP_OPS, preset::TOT_CYC],
            Self::Ipc => [preset::TOT_INS, preset::TOT_CYC],
        }
    }
}

struct Meter {
    kind: RateKind,
    set: EventSet,
    start_real: i64,
    start_proc: i64,
    last_proc: i64,
    last: [i64; 2],
}

enum Mode {
    Idle,
    Counters(EventSet),
    Rate(Meter),
}

/// Start a list of events, read them later, stop.
///
/// The session also serves `flips`, `flops` and `ipc` rates; only one of the two
/// uses can be active at a time. Its set is an ordinary event set, so it
/// conflicts with explicit sets counting on the CPU component.
///
/// # Examples
///
/// ```rust
/// use perfapi::driver::sim::{SimConfig, Simulated};
/// use perfapi::event::preset;
/// use perfapi::Library;
///
/// let library = Library::init(Simulated::new(SimConfig::default())).unwrap();
/// let mut session = library.session();
///
/// session.start_counters(&[preset::TOT_INS, preset::BR_INS]).unwrap();
/// let mut values = [0; 2];
/// session.stop_counters(&mut values).unwrap();
/// ```
pub struct Session {
    library: Library,
    mode: Mode,
}

impl Session {
    pub(crate) fn new(library: Library) -> Self {
        Self {
            library,
            mode: Mode::Idle,
        }
    }

    /// Physical counters available to the session.
    pub fn num_counters(&self) -> usize {
        self.library.num_counters()
    }

    /// Creates a set with `events` and starts it.
    pub fn start_counters(&mut self, events: &[Event]) -> Result<()> {
        if !matches!(self.mode, Mode::Idle) {
            return Err(Error::new(ErrorKind::InvalidState, "session is already counting"));
        }

        let mut set = self.library.create_event_set()?;
        set.add_events(events)?;
        set.start()?;
        self.mode = Mode::Counters(set);
        Ok(())
    }

    fn counters(&mut self) -> Result<&mut EventSet> {
        match &mut self.mode {
            Mode::Counters(set) => Ok(set),
            _ => Err(Error::new(ErrorKind::InvalidState, "session counters are not started")),
        }
    }

    /// Writes the current counts without resetting them.
    pub fn read_counters(&mut self, values: &mut [i64]) -> Result<()> {
        self.counters()?.read(values)
    }

    /// Adds the counts to `values` and resets the counters.
    pub fn accum_counters(&mut self, values: &mut [i64]) -> Result<()> {
        self.counters()?.accumulate(values)
    }

    /// Stops counting, writes the final counts and releases the set.
    ///
    /// Also ends a rate measurement, in which case `values` receives as many of
    /// its two counts as it can hold.
    pub fn stop_counters(&mut self, values: &mut [i64]) -> Result<()> {
        let stopped = match &mut self.mode {
            Mode::Idle => {
                return Err(Error::new(ErrorKind::InvalidState, "session is not counting"))
            }
            Mode::Counters(set) => set.stop(values),
            Mode::Rate(meter) => {
                let mut last = [0; 2];
                meter.set.stop(&mut last).map(|()| {
                    let len = values.len().min(last.len());
                    values[..len].copy_from_slice(&last[..len]);
                })
            }
        };

        // A set whose final read failed has stopped all the same.
        let released = match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Counters(mut set) | Mode::Rate(Meter { mut set, .. })
                if set.state() != State::Counting =>
            {
                set.destroy()
            }
            mode => {
                self.mode = mode;
                Ok(())
            }
        };
        stopped.and(released)
    }

    /// Floating point instructions per second.
    pub fn flips(&mut self) -> Result<Rate> {
        self.rate(RateKind::Flips)
    }

    /// Floating point operations per second.
    pub fn flops(&mut self) -> Result<Rate> {
        self.rate(RateKind::Flops)
    }

    /// Instructions per cycle.
    pub fn ipc(&mut self) -> Result<Rate> {
        self.rate(RateKind::Ipc)
    }

    fn rate(&mut self, kind: RateKind) -> Result<Rate> {
        if matches!(self.mode, Mode::Idle) {
            let mut set = self.library.create_event_set()?;
            set.add_events(&kind.events())?;
            set.start()?;

            let real = self.library.real_usec();
            let proc = self.library.virt_usec();
            self.mode = Mode::Rate(Meter {
                kind,
                set,
                start_real: real,
                start_proc: proc,
                last_proc: proc,
                last: [0; 2],
            });
            return Ok(Rate::default());
        }

        match &mut self.mode {
            Mode::Idle | Mode::Counters(_) => Err(Error::new(
                ErrorKind::InvalidState,
                "session counters are in use",
            )),
            Mode::Rate(meter) if meter.kind != kind => Err(Error::new(
                ErrorKind::InvalidState,
                format!("session is measuring {:?}", meter.kind),
            )),
            Mode::Rate(meter) => {
                let mut values = [0; 2];
                meter.set.read(&mut values)?;
                let real = self.library.real_usec();
                let proc = self.library.virt_usec();

                let delta = values[0] - meter.last[0];
                let rate = match kind {
                    RateKind::Ipc => ratio(delta, values[1] - meter.last[1]),
                    _ => ratio(delta, proc - meter.last_proc),
                };
                meter.last = values;
                meter.last_proc = proc;

                Ok(Rate {
                    real_time: (real - meter.start_real) as f64 / 1e6,
                    proc_time: (proc - meter.start_proc) as f64 / 1e6,
                    count: values[0],
                    rate,
                })
            }
        }
    }
}

fn ratio(num: i64, denom: i64) -> f64 {
    if denom == 0 {
        0.0
    } else {
        num as f64 / denom as f64
    }
}
