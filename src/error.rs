#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use core::fmt::Arguments;
use core::str::Utf8Error;

use std::path::PathBuf;

use snafu::prelude::*;

/// The RFM error type.
#[non_exhaustive]
#[derive(Snafu, Debug)]
#[snafu(context(suffix(false)))]
#[snafu(visibility(pub))]
pub enum Error {
    /// A field is too long to be framed
    NoRoom,

    /// Input buffer ran out
    RanOut,

    /// Not a UTF-8 string
    BadString,

    /// Response contents don't match the advertised length
    WrongPacketLength,

    #[snafu(display("Payload size {size} too large"))]
    BigPacket { size: u64 },

    #[snafu(display("Unknown action code {number}"))]
    UnknownAction { number: u8 },

    #[snafu(display("Unknown command \"{name}\""))]
    UnknownCommand { name: String },

    /// Only one command flag may be set
    #[snafu(display("Only one command flag may be set"))]
    MultipleActions,

    /// No command flag set
    #[snafu(display("No command flag set"))]
    NoAction,

    #[snafu(display("Command \"--{}\" requires {needs} argument", command.replace('_', "-")))]
    MissingField { command: &'static str, needs: &'static str },

    #[snafu(display("Invalid permission \"{name}\", expected read, read_write or admin"))]
    BadPermission { name: String },

    #[snafu(display("Path provided must be a directory: {}", path.display()))]
    NotDirectory { path: PathBuf },

    #[snafu(display("File {} already exists", path.display()))]
    FileExists { path: PathBuf },

    #[snafu(display("Path \"{path}\" has no file name"))]
    NoFileName { path: String },

    /// Bad application usage
    ///
    /// Returned from an API call when the API is used incorrectly,
    /// for example saving the payload of a response that wasn't a GET.
    #[snafu(display("Bad usage: {msg}"))]
    BadUsage { msg: &'static str },

    /// IO Error
    #[snafu(display("{source}"))]
    IoError { source: std::io::Error },

    // This state should not be reached, previous logic should have prevented it.
    // Create this using [`Error::bug()`] or [`.trap()`](TrapBug::trap).
    /// Program bug
    Bug,
}

impl Error {
    #[cold]
    #[track_caller]
    /// Panics in debug builds, returns [`Error::Bug`] in release.
    pub fn bug() -> Error {
        // Easier to track the source of errors in development,
        // but release builds shouldn't panic.
        if cfg!(debug_assertions) {
            panic!("Hit a bug");
        } else {
            Error::Bug
        }
    }

    /// Like [`bug()`](Error::bug) but with a message
    ///
    /// The message can be used instead of a code comment, is logged at `debug` level.
    #[cold]
    pub fn bug_fmt(args: Arguments) -> Error {
        if cfg!(debug_assertions) {
            panic!("Hit a bug: {args}");
        } else {
            debug!("Hit a bug: {args}");
            Error::Bug
        }
    }

    /// Returns `true` for errors caused by malformed or truncated wire data.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::RanOut
                | Error::BadString
                | Error::WrongPacketLength
                | Error::BigPacket { .. }
                | Error::UnknownAction { .. }
        )
    }
}

/// An RFM-specific Result type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub trait TrapBug<T> {
    /// `.trap()` should be used like `.unwrap()`, in situations
    /// never expected to fail. Instead it calls [`Error::bug()`].
    /// (or debug builds may panic)
    fn trap(self) -> Result<T, Error>;

    /// Like `trap()` but with a message, calls [`Error::bug_fmt()`]
    /// The message can be used instead of a comment.
    fn trap_msg(self, args: Arguments) -> Result<T, Error>;
}

impl<T, E> TrapBug<T> for Result<T, E> {
    fn trap(self) -> Result<T, Error> {
        // call directly so that Location::caller() works
        if let Ok(i) = self {
            Ok(i)
        } else {
            Err(Error::bug())
        }
    }
    fn trap_msg(self, args: Arguments) -> Result<T, Error> {
        if let Ok(i) = self {
            Ok(i)
        } else {
            Err(Error::bug_fmt(args))
        }
    }
}

impl<T> TrapBug<T> for Option<T> {
    #[track_caller]
    fn trap(self) -> Result<T, Error> {
        if let Some(i) = self {
            Ok(i)
        } else {
            Err(Error::bug())
        }
    }
    fn trap_msg(self, args: Arguments) -> Result<T, Error> {
        if let Some(i) = self {
            Ok(i)
        } else {
            Err(Error::bug_fmt(args))
        }
    }
}

impl From<Utf8Error> for Error {
    fn from(_e: Utf8Error) -> Error {
        Error::BadString
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IoError { source: value }
    }
}
