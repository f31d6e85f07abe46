use std::borrow::Cow;
use std::io;

use thiserror::Error;

/// Raw status codes.
///
/// The numbering follows the classic PAPI status codes.
pub mod code {
    pub const OK: i32 = 0;
    pub const EINVAL: i32 = -1;
    pub const ENOMEM: i32 = -2;
    pub const ESYS: i32 = -3;
    pub const ECMP: i32 = -4;
    pub const ECLOST: i32 = -5;
    pub const EBUG: i32 = -6;
    pub const ENOEVNT: i32 = -7;
    pub const ECNFLCT: i32 = -8;
    pub const ENOTRUN: i32 = -9;
    pub const EISRUN: i32 = -10;
    pub const ENOEVST: i32 = -11;
    pub const ENOTPRESET: i32 = -12;
    pub const ENOCNTR: i32 = -13;
    pub const EMISC: i32 = -14;
    pub const EPERM: i32 = -15;
    pub const ENOINIT: i32 = -16;
    pub const ENOCMP: i32 = -17;
    pub const ENOSUPP: i32 = -18;
    pub const ENOIMPL: i32 = -19;
    pub const EBUF: i32 = -20;
    pub const EINVAL_DOM: i32 = -21;
    pub const EATTR: i32 = -22;
    pub const ECOUNT: i32 = -23;
    pub const ECOMBO: i32 = -24;
}

/// Renders a raw status code as a human readable string.
pub fn describe(code: i32) -> &'static str {
    match code {
        code::OK => "No error",
        code::EINVAL => "Invalid argument",
        code::ENOMEM => "Insufficient memory",
        code::ESYS => "A system or C library call failed",
        code::ECMP => "Not supported by component",
        code::ECLOST => "Access to the counters was lost or interrupted",
        code::EBUG => "Internal error, please send mail to the developers",
        code::ENOEVNT => "Event does not exist",
        code::ECNFLCT => "Event exists, but cannot be counted due to hardware resource limits",
        code::ENOTRUN => "EventSet is currently not running",
        code::EISRUN => "EventSet is currently counting",
        code::ENOEVST => "No such EventSet available",
        code::ENOTPRESET => "Event in argument is not a valid preset",
        code::ENOCNTR => "Hardware does not support performance counters",
        code::EMISC => "Unknown error code",
        code::EPERM => "Permission level does not permit operation",
        code::ENOINIT => "PAPI hasn't been initialized yet",
        code::ENOCMP => "Component Index isn't set",
        code::ENOSUPP => "Not supported",
        code::ENOIMPL => "Not implemented",
        code::EBUF => "Buffer size exceeded",
        code::EINVAL_DOM => "EventSet domain is not supported for the operation",
        code::EATTR => "Invalid or missing event attributes",
        code::ECOUNT => "Too many events or attributes",
        code::ECOMBO => "Bad combination of features",
        _ => "Unknown error",
    }
}

/// Semantic classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The driver could not be initialized.
    InitializationFailed,
    /// The driver speaks an incompatible interface version.
    VersionMismatch,
    /// Unknown, unavailable or unbound event.
    InvalidEvent,
    /// The event set handle is no longer valid.
    InvalidHandle,
    /// The operation is illegal in the current event set state.
    InvalidState,
    /// More events than the component has counters for.
    TooManyEvents,
    /// The driver ran out of event set handles or memory.
    ResourceExhausted,
    /// The event cannot be counted together with the current configuration.
    CounterConflict,
    /// The value buffer is shorter than the number of bound events.
    BufferTooSmall,
    /// The hardware or driver lacks the requested feature.
    UnsupportedOperation,
    /// Introspection data is unexpectedly unavailable.
    EnvironmentFault,
    /// Enumeration cursor exhausted.
    NoMoreEvents,
    /// No component with the requested index.
    InvalidComponent,
    /// Malformed argument.
    InvalidArgument,
    /// The caller lacks the privileges for the operation.
    PermissionDenied,
    /// A system call failed.
    System,
    /// A backend code without a semantic mapping.
    Unknown,
}

impl ErrorKind {
    /// The raw code reported for this kind when no backend code is available.
    pub fn code(self) -> i32 {
        match self {
            Self::InitializationFailed => code::ENOINIT,
            Self::VersionMismatch => code::EINVAL,
            Self::InvalidEvent => code::ENOEVNT,
            Self::InvalidHandle => code::ENOEVST,
            Self::InvalidState => code::EINVAL,
            Self::TooManyEvents => code::ECOUNT,
            Self::ResourceExhausted => code::ENOMEM,
            Self::CounterConflict => code::ECNFLCT,
            Self::BufferTooSmall => code::EBUF,
            Self::UnsupportedOperation => code::ENOSUPP,
            Self::EnvironmentFault => code::EBUG,
            Self::NoMoreEvents => code::ENOEVNT,
            Self::InvalidComponent => code::ENOCMP,
            Self::InvalidArgument => code::EINVAL,
            Self::PermissionDenied => code::EPERM,
            Self::System => code::ESYS,
            Self::Unknown => code::EMISC,
        }
    }

    fn from_code(raw: i32) -> Self {
        match raw {
            code::EINVAL | code::EATTR | code::ECOMBO => Self::InvalidArgument,
            code::EINVAL_DOM => Self::UnsupportedOperation,
            code::ENOMEM => Self::ResourceExhausted,
            code::ESYS | code::ECLOST => Self::System,
            code::ECMP | code::ENOSUPP | code::ENOIMPL | code::ENOCNTR => {
                Self::UnsupportedOperation
            }
            code::EBUG => Self::EnvironmentFault,
            code::ENOEVNT | code::ENOTPRESET => Self::InvalidEvent,
            code::ECNFLCT => Self::CounterConflict,
            code::ENOTRUN | code::EISRUN => Self::InvalidState,
            code::ENOEVST => Self::InvalidHandle,
            code::EPERM => Self::PermissionDenied,
            code::ENOINIT => Self::InitializationFailed,
            code::ENOCMP => Self::InvalidComponent,
            code::EBUF => Self::BufferTooSmall,
            code::ECOUNT => Self::TooManyEvents,
            _ => Self::Unknown,
        }
    }
}

/// Error reported by every fallible operation.
///
/// Carries the semantic [`ErrorKind`], the raw status code and a message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message} ({kind:?}, code {code})")]
pub struct Error {
    kind: ErrorKind,
    code: i32,
    message: Cow<'static, str>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            code: kind.code(),
            message: message.into(),
        }
    }

    /// Builds an error from a raw status code.
    ///
    /// Codes without a semantic mapping become [`ErrorKind::Unknown`] and keep
    /// the raw value.
    pub fn from_code(raw: i32) -> Self {
        Self {
            kind: ErrorKind::from_code(raw),
            code: raw,
            message: Cow::Borrowed(describe(raw)),
        }
    }

    pub(crate) fn with_code(mut self, raw: i32) -> Self {
        self.code = raw;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the process cannot meaningfully continue counting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InitializationFailed
                | ErrorKind::VersionMismatch
                | ErrorKind::EnvironmentFault
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        let code = kind.code();
        Self {
            kind,
            code,
            message: Cow::Borrowed(describe(code)),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.raw_os_error() {
            Some(libc::ENOENT) | Some(libc::EOPNOTSUPP) => ErrorKind::InvalidEvent,
            Some(libc::EACCES) | Some(libc::EPERM) => ErrorKind::PermissionDenied,
            Some(libc::EINVAL) => ErrorKind::CounterConflict,
            Some(libc::EBUSY) => ErrorKind::CounterConflict,
            Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOMEM) => {
                ErrorKind::ResourceExhausted
            }
            Some(libc::ENOSYS) | Some(libc::ENODEV) => ErrorKind::UnsupportedOperation,
            Some(_) => ErrorKind::System,
            None => match err.kind() {
                io::ErrorKind::Unsupported => ErrorKind::UnsupportedOperation,
                io::ErrorKind::NotFound => ErrorKind::EnvironmentFault,
                io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
                _ => ErrorKind::System,
            },
        };
        Self::new(kind, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
