//! Client for the RFM remote file management protocol.
//!
//! A [`Request`] is validated when it's built and serialized with
//! [`Request::to_bytes()`]. The bytes of the reply are handed to
//! [`Response::parse()`]. Sending the bytes is left to the caller.

#![forbid(unsafe_code)]

// avoids headscratching
#![deny(unused_must_use)]

pub mod action;
pub mod config;
pub mod error;
pub mod hash;
pub mod request;
pub mod response;
pub mod status;
pub mod wire;

pub mod rfmlog;

// Application API
pub use action::{Action, ActionFields, ActionFlags, ActionKind, UserPermission};
pub use action::{LocalSubAction, UserSubAction};
pub use error::{Error, Result};
pub use request::{Operation, Request, RequestParams, Session};
pub use response::{expected_len, Response, SaveOutcome};
pub use status::ReturnCode;
