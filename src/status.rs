//! Server return codes.

#[allow(unused_imports)]
use {
    crate::error::{Error, Result, TrapBug},
    log::{debug, error, info, log, trace, warn},
};

use core::fmt;

use crate::config;

/// Each code gets a fixed description, generated from one table.
macro_rules! returncodes {
    (
        $( ( $code:literal, $Variant:ident, $text:literal ), )*
    ) => {

/// Return code of a response, the RC header field.
///
/// Codes the client doesn't know are kept as [`ReturnCode::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    $(
    $Variant,
    )*
    Unknown(u8),
}

impl From<u8> for ReturnCode {
    fn from(v: u8) -> Self {
        match v {
            $(
            $code => ReturnCode::$Variant,
            )*
            other => ReturnCode::Unknown(other),
        }
    }
}

impl From<ReturnCode> for u8 {
    fn from(rc: ReturnCode) -> u8 {
        match rc {
            $(
            ReturnCode::$Variant => $code,
            )*
            ReturnCode::Unknown(v) => v,
        }
    }
}

impl ReturnCode {
    /// Human readable description of the code
    pub fn description(self) -> &'static str {
        match self {
            $(
            ReturnCode::$Variant => $text,
            )*
            ReturnCode::Unknown(_) => FAILED_TEXT,
        }
    }
}

} } // macro

const FAILED_TEXT: &str = "Server action failed";

returncodes![
(1, Success, "Action completed successfully"),
(2, SessionError, "Session is invalid or has expired"),
(3, PermissionError, "User does not have the required permissions for this action"),
(4, UserExists, "User already exists"),
(5, FileExists, "File already exists"),
(6, CredentialRules, "Username must be between 3 and 20 characters and password must be between 6 and 32 characters"),
(7, BadCredentials, "Either username or password is incorrect"),
(8, DirNotEmpty, "Directory is not empty"),
(9, ResolveError, "Path could not be resolved"),
(10, NotDirectory, "Path is not a directory"),
(11, NotFile, "Path is not a regular file"),
(12, DirExists, "Directory already exists"),
(13, SocketClosed, "Socket was closed"),
(14, UserMissing, "User does not exist"),
(15, FileEmpty, "File is empty"),
(16, DirEmpty, "Directory is empty"),
(254, IoError, "Server I/O error"),
(255, Failure, "Server action failed"),
];

impl ReturnCode {
    pub fn is_success(self) -> bool {
        u8::from(self) == config::SUCCESS_RESPONSE
    }

    /// The server no longer accepts the session; an interactive
    /// client should stop.
    pub fn ends_session(self) -> bool {
        self == ReturnCode::SessionError
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), u8::from(*self))
    }
}
