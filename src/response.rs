//! Server responses.
//!
//! ```text
//! +--------+----------+------------+-----------------+
//! | RC u8  | RSVD u8  | SESSION u32| PAYLOAD_LEN u64 |
//! +--------+----------+------------+-----------------+
//! | MSG_LEN u8 | message | [digest (GET only)] | payload |
//! +------------------------------------------------------+
//! ```
//!
//! Everything after the fixed header is bounded by `PAYLOAD_LEN`.

#[allow(unused_imports)]
use {
    crate::error::{Error, Result, TrapBug},
    log::{debug, error, info, log, trace, warn},
};

use core::fmt;

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use pretty_hex::PrettyHex;

use crate::action::ActionKind;
use crate::config;
use crate::hash::{self, FileDigest};
use crate::request::Request;
use crate::status::ReturnCode;
use crate::wire::{self, WireError};
use crate::wire::{WireDecode, WireEncode, WireResult, WireSink, WireSource};

/// Fixed size response header
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub code: u8,
    pub reserved: u8,
    pub session_id: u32,
    pub payload_len: u64,
}

impl WireEncode for ResponseHeader {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        self.code.enc(s)?;
        self.reserved.enc(s)?;
        self.session_id.enc(s)?;
        self.payload_len.enc(s)
    }
}

impl<'de> WireDecode<'de> for ResponseHeader {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        Ok(Self {
            code: u8::dec(s)?,
            reserved: u8::dec(s)?,
            session_id: u32::dec(s)?,
            payload_len: u64::dec(s)?,
        })
    }
}

/// The part of a response covered by `PAYLOAD_LEN`
#[derive(Debug, PartialEq)]
pub struct ResponseBody<'a> {
    pub message: &'a str,
    /// Present for GET responses that carry a file
    pub digest: Option<FileDigest>,
    pub payload: &'a [u8],
}

impl WireEncode for ResponseBody<'_> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        let msg_len = u8::try_from(self.message.len()).map_err(|_| WireError::NoRoom)?;
        msg_len.enc(s)?;
        self.message.as_bytes().enc(s)?;
        self.digest.enc(s)?;
        self.payload.enc(s)
    }
}

impl<'de> WireDecode<'de> for ResponseBody<'de> {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let msg_len = u8::dec(s)? as usize;
        let message = s.take(msg_len)?;
        let message = core::str::from_utf8(message).map_err(|_| WireError::BadString)?;

        let mut digest = None;
        if s.ctx().expect_digest && s.remaining() > 0 {
            // fails with RanOut when fewer than a digest's bytes remain
            digest = Some(FileDigest::dec(s)?);
        }
        let n = s.remaining();
        let payload = s.take(n)?;
        Ok(Self { message, digest, payload })
    }
}

/// Returns the length of the complete frame starting with `header`.
///
/// `header` needs at least [`RESPONSE_HEADER_LEN`](config::RESPONSE_HEADER_LEN)
/// bytes. Lets a transport read exactly one response. Payloads larger than
/// [`MAX_RESPONSE_PAYLOAD`](config::MAX_RESPONSE_PAYLOAD) fail with
/// [`Error::BigPacket`].
pub fn expected_len(header: &[u8]) -> Result<usize> {
    let h: ResponseHeader = wire::read_wire(header, None)?;
    check_payload_len(h.payload_len)?;
    usize::try_from(h.payload_len)
        .ok()
        .and_then(|l| l.checked_add(config::RESPONSE_HEADER_LEN))
        .ok_or(Error::BigPacket { size: h.payload_len })
}

fn check_payload_len(len: u64) -> Result<()> {
    if len > config::MAX_RESPONSE_PAYLOAD {
        debug!("response payload {len} exceeds limit");
        return Err(Error::BigPacket { size: len });
    }
    Ok(())
}

/// Serializes a response frame, for peers and tests.
pub fn write_response(code: u8, session_id: u32, body: &ResponseBody) -> Result<Vec<u8>> {
    let payload_len = wire::length_enc(body)?;
    let header = ResponseHeader { code, reserved: 0, session_id, payload_len };
    let mut buf = Vec::new();
    wire::write_wire(&mut buf, &header)?;
    wire::write_wire(&mut buf, body)?;
    Ok(buf)
}

/// Result of [`Response::save_file()`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { bytes: usize, path: PathBuf },
    /// The payload didn't match its digest, nothing was written
    HashMismatch,
    /// The response didn't carry a file
    NoFile,
}

impl SaveOutcome {
    pub fn written(&self) -> bool {
        matches!(self, SaveOutcome::Written { .. })
    }
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcome::Written { bytes, path } => {
                write!(f, "Wrote {bytes} bytes to {}", path.display())
            }
            SaveOutcome::HashMismatch => f.write_str(
                "Files hash from server does not match the local hash. Will not save the file to disk.",
            ),
            SaveOutcome::NoFile => f.write_str("Server did not send a file"),
        }
    }
}

/// A parsed response, tied to the request it answers
pub struct Response<'r> {
    request: &'r Request,
    code: u8,
    reserved: u8,
    session_id: u32,
    payload_len: u64,
    message: String,
    digest: Option<FileDigest>,
    payload: Option<Vec<u8>>,
    valid_hash: bool,
}

impl<'r> Response<'r> {
    /// Parses a complete response frame for `request`.
    ///
    /// `b` must hold exactly one frame, see [`expected_len()`].
    pub fn parse(request: &'r Request, b: &[u8]) -> Result<Self> {
        trace!("response {} bytes\n{:?}", b.len(), (&b[..b.len().min(256)]).hex_dump());

        let header: ResponseHeader = wire::read_wire(b, None)?;
        check_payload_len(header.payload_len)?;

        let rest = &b[config::RESPONSE_HEADER_LEN..];
        let avail = rest.len() as u64;
        if avail < header.payload_len {
            trace!("response has {avail} of {} payload bytes", header.payload_len);
            return Err(Error::RanOut);
        }
        if avail > header.payload_len {
            return Err(Error::WrongPacketLength);
        }

        let ctx = request.parse_context();
        let body: ResponseBody = wire::read_frame(rest, &ctx)?;

        let valid_hash = match &body.digest {
            Some(d) => {
                let v = hash::verify(d, body.payload);
                if !v {
                    warn!("digest mismatch for {} byte payload", body.payload.len());
                }
                v
            }
            None => false,
        };

        let payload = if body.payload.is_empty() && body.digest.is_none() {
            None
        } else {
            Some(body.payload.to_vec())
        };

        let r = Self {
            request,
            code: header.code,
            reserved: header.reserved,
            session_id: header.session_id,
            payload_len: header.payload_len,
            message: body.message.into(),
            digest: body.digest,
            payload,
            valid_hash,
        };
        debug!("{:?}", r);
        Ok(r)
    }

    pub fn request(&self) -> &'r Request {
        self.request
    }

    /// The raw return code
    pub fn return_code(&self) -> u8 {
        self.code
    }

    pub fn status(&self) -> ReturnCode {
        ReturnCode::from(self.code)
    }

    pub fn reserved(&self) -> u8 {
        self.reserved
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    pub fn message_len(&self) -> u8 {
        // parsed from a u8 length
        self.message.len() as u8
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn digest(&self) -> Option<&FileDigest> {
        self.digest.as_ref()
    }

    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// The payload as text, for listings. Invalid UTF-8 is replaced.
    pub fn payload_text(&self) -> Option<String> {
        self.payload().map(|p| String::from_utf8_lossy(p).into_owned())
    }

    pub fn successful(&self) -> bool {
        self.code == config::SUCCESS_RESPONSE
    }

    /// Whether a digest was sent and matches the payload
    pub fn valid_hash(&self) -> bool {
        self.valid_hash
    }

    /// The action this answers. Anything sent as `LocalOp` reports the
    /// requested action instead, so a shell login is `Shell` and a bare
    /// login stays `LocalOp`.
    pub fn action(&self) -> ActionKind {
        match self.request.opcode() {
            ActionKind::LocalOp => self.request.action().kind(),
            op => op,
        }
    }

    /// Writes a downloaded file to the target resolved by the GET request.
    ///
    /// Nothing is written unless the digest matches. An existing file
    /// at the target is never overwritten.
    pub fn save_file(&self) -> Result<SaveOutcome> {
        let target = self
            .request
            .get_target()
            .ok_or(Error::BadUsage { msg: "save_file() on a response that isn't for GET" })?;

        let Some(payload) = self.payload.as_deref().filter(|_| self.digest.is_some()) else {
            return Ok(SaveOutcome::NoFile);
        };
        if !self.valid_hash {
            return Ok(SaveOutcome::HashMismatch);
        }

        let mut f = OpenOptions::new().write(true).create_new(true).open(target)?;
        let mut bytes = 0;
        for c in payload.chunks(config::WRITE_CHUNK) {
            f.write_all(c)?;
            bytes += c.len();
        }
        f.flush()?;
        info!("wrote {bytes} bytes to {}", target.display());
        Ok(SaveOutcome::Written { bytes, path: target.into() })
    }
}

impl fmt::Display for Response<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl fmt::Debug for Response<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("action", &self.action())
            .field("code", &self.code)
            .field("session_id", &self.session_id)
            .field("payload_len", &self.payload_len)
            .field("message", &self.message)
            .field("digest", &self.digest.is_some())
            .field("payload", &self.payload.as_ref().map(|p| p.len()))
            .field("valid_hash", &self.valid_hash)
            .finish()
    }
}
