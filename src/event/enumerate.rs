use std::iter::FusedIterator;

use super::{Event, EventMask};
use crate::error::{Error, ErrorKind, Result};
use crate::Library;

pub(crate) mod cat {
    pub const MSC: u32 = 0x0000_0100;
    pub const INS: u32 = 0x0000_0200;
    pub const IDL: u32 = 0x0000_0400;
    pub const BR: u32 = 0x0000_0800;
    pub const CND: u32 = 0x0000_1000;
    pub const MEM: u32 = 0x0000_2000;
    pub const CACH: u32 = 0x0000_4000;
    pub const L1: u32 = 0x0000_8000;
    pub const L2: u32 = 0x0001_0000;
    pub const L3: u32 = 0x0002_0000;
    pub const TLB: u32 = 0x0004_0000;
    pub const FP: u32 = 0x0008_0000;
}

/// Event categories, used to filter enumerations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Categories {
    pub misc: bool,
    pub instruction: bool,
    pub idle: bool,
    pub branch: bool,
    pub conditional_branch: bool,
    pub memory: bool,
    pub cache: bool,
    pub l1: bool,
    pub l2: bool,
    pub l3: bool,
    pub tlb: bool,
    pub floating_point: bool,
}

macro_rules! categories {
    ($(($field:ident, $bit:ident),)+) => {
        impl Categories {
            pub const fn from_bits(bits: u32) -> Self {
                Self {
                    $($field: bits & cat::$bit != 0,)+
                }
            }

            /// Encodes the categories into the wire bitmask.
            pub const fn bits(&self) -> u32 {
                let mut bits = 0;
                $(if self.$field { bits |= cat::$bit; })+
                bits
            }
        }
    };
}

categories! {
    (misc, MSC),
    (instruction, INS),
    (idle, IDL),
    (branch, BR),
    (conditional_branch, CND),
    (memory, MEM),
    (cache, CACH),
    (l1, L1),
    (l2, L2),
    (l3, L3),
    (tlb, TLB),
    (floating_point, FP),
}

impl Categories {
    pub const fn intersects(&self, other: &Self) -> bool {
        self.bits() & other.bits() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.bits() == 0
    }
}

/// Controls which events an enumeration produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventModifier {
    /// Only the first event of the universe.
    First,
    /// Every event of the universe.
    #[default]
    All,
    /// Events the driver can count.
    Available,
    /// Events in at least one of the categories.
    ///
    /// The filter must name a category: an empty one encodes like
    /// [`All`][Self::All] and enumerating with it fails with
    /// [`ErrorKind::InvalidArgument`].
    Categories(Categories),
}

impl EventModifier {
    const ALL: u32 = 0;
    const FIRST: u32 = 1;
    const AVAILABLE: u32 = 2;

    pub const fn bits(&self) -> u32 {
        match self {
            Self::All => Self::ALL,
            Self::First => Self::FIRST,
            Self::Available => Self::AVAILABLE,
            Self::Categories(it) => it.bits(),
        }
    }

    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            Self::ALL => Self::All,
            Self::FIRST => Self::First,
            Self::AVAILABLE => Self::Available,
            _ => Self::Categories(Categories::from_bits(bits)),
        }
    }

    /// Whether an event with the given traits passes the filter.
    pub fn accepts(&self, categories: &Categories, available: bool) -> bool {
        match self {
            Self::First | Self::All => true,
            Self::Available => available,
            Self::Categories(filter) => filter.intersects(categories),
        }
    }
}

enum Cursor {
    Fresh,
    Active,
    Done,
}

/// Lazy enumeration of events, see [`Library::events`].
///
/// Finite and not restartable: once exhausted, or after yielding an error, it
/// only returns `None`.
pub struct Events<'a> {
    library: &'a Library,
    code: Event,
    modifier: EventModifier,
    cursor: Cursor,
}

impl<'a> Events<'a> {
    pub(crate) fn new(library: &'a Library, mask: EventMask, modifier: EventModifier) -> Self {
        Self {
            library,
            code: mask.start(),
            modifier,
            cursor: Cursor::Fresh,
        }
    }

    fn step(&mut self) -> Option<Result<Event>> {
        if let EventModifier::Categories(filter) = self.modifier {
            if filter.is_empty() {
                return Some(Err(Error::new(
                    ErrorKind::InvalidArgument,
                    "category filter names no category",
                )));
            }
        }

        loop {
            let fresh = matches!(self.cursor, Cursor::Fresh);
            let modifier = if fresh {
                EventModifier::First
            } else {
                self.modifier
            };

            match self.library.enum_event(&mut self.code, modifier) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NoMoreEvents => return None,
                Err(e) => return Some(Err(e)),
            }

            if !fresh {
                return Some(Ok(self.code));
            }

            // The first event of the universe only counts if it passes the filter.
            self.cursor = Cursor::Active;
            match self.modifier {
                EventModifier::First => {
                    self.cursor = Cursor::Done;
                    return Some(Ok(self.code));
                }
                modifier => match self.library.event_accepted(self.code, &modifier) {
                    Ok(true) => return Some(Ok(self.code)),
                    Ok(false) => continue,
                    Err(e) => return Some(Err(e)),
                },
            }
        }
    }
}

impl Iterator for Events<'_> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.cursor, Cursor::Done) {
            return None;
        }
        let item = self.step();
        if !matches!(item, Some(Ok(_))) {
            self.cursor = Cursor::Done;
        }
        item
    }
}

impl FusedIterator for Events<'_> {}
