//! RFM wire format reading/writing.
//!
//! All integers are big-endian. Used by the request and response
//! definitions in [`request`](crate::request) and [`response`](crate::response).

#[allow(unused_imports)]
use {
    crate::error::{Error, Result, TrapBug},
    log::{debug, error, info, log, trace, warn},
};

use core::fmt::{self, Debug};

use pretty_hex::PrettyHex;

use crate::config;

/// A generic destination for serializing, used similarly to `serde::Serializer`
pub trait WireSink {
    fn push(&mut self, v: &[u8]) -> WireResult<()>;
}

/// A generic source for a frame, used similarly to `serde::Deserializer`
pub trait WireSource<'de> {
    fn take(&mut self, len: usize) -> WireResult<&'de [u8]>;
    fn pos(&self) -> usize;
    fn remaining(&self) -> usize;
    fn ctx(&mut self) -> &mut ParseContext;
}

/// Encodes the type in RFM wire format
pub trait WireEncode {
    fn enc<S>(&self, s: &mut S) -> WireResult<()> where S: WireSink;
}

/// Decodes the type from RFM wire format
pub trait WireDecode<'de>: Sized {
    fn dec<S>(s: &mut S) -> WireResult<Self> where S: WireSource<'de>;
}

/// State needed to decode a response, since its layout depends on
/// the request it answers.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Set for GET responses, the payload carries a digest and file contents.
    pub expect_digest: bool,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A subset of [`Error`] for `WireEncode` and `WireDecode`.
#[derive(Debug)]
pub enum WireError {
    NoRoom,

    RanOut,

    BadString,

    BadNumber,

    UnknownAction { number: u8 },
}

impl From<WireError> for Error {
    fn from(w: WireError) -> Self {
        match w {
            WireError::NoRoom => Error::NoRoom,
            WireError::RanOut => Error::RanOut,
            WireError::BadString => Error::BadString,
            WireError::BadNumber => Error::WrongPacketLength,
            WireError::UnknownAction { number } => Error::UnknownAction { number },
        }
    }
}

pub type WireResult<T> = core::result::Result<T, WireError>;

///////////////////////////////////////////////

/// Decodes a complete frame, failing if `b` holds trailing bytes.
pub fn read_frame<'a, T: WireDecode<'a>>(b: &'a [u8], ctx: &ParseContext) -> Result<T> {
    let mut s = DecodeBytes::new(b, ctx.clone());
    let v = T::dec(&mut s)?;
    if s.pos() != b.len() {
        trace!("frame has {} trailing bytes", b.len() - s.pos());
        Err(Error::WrongPacketLength)
    } else {
        Ok(v)
    }
}

/// Decodes a value from the start of `b`, ignoring anything after it.
pub fn read_wire<'a, T: WireDecode<'a>>(b: &'a [u8], ctx: Option<ParseContext>) -> Result<T> {
    let mut s = DecodeBytes::new(b, ctx.unwrap_or_default());
    Ok(T::dec(&mut s)?)
}

/// Appends the wire format of `value` to `target`, returning the
/// number of bytes written.
pub fn write_wire<T>(target: &mut Vec<u8>, value: &T) -> Result<usize>
where
    T: WireEncode,
{
    let mut s = EncodeVec { target, pos: 0 };
    value.enc(&mut s)?;
    Ok(s.pos)
}

/// Returns the encoded length of `value`
pub fn length_enc<T>(value: &T) -> WireResult<u64>
where
    T: WireEncode,
{
    let mut s = EncodeLen { pos: 0 };
    value.enc(&mut s)?;
    Ok(s.pos)
}

struct EncodeVec<'a> {
    target: &'a mut Vec<u8>,
    pos: usize,
}

impl WireSink for EncodeVec<'_> {
    fn push(&mut self, v: &[u8]) -> WireResult<()> {
        self.target.extend_from_slice(v);
        self.pos += v.len();
        Ok(())
    }
}

struct EncodeLen {
    pos: u64,
}

impl WireSink for EncodeLen {
    fn push(&mut self, v: &[u8]) -> WireResult<()> {
        self.pos += v.len() as u64;
        Ok(())
    }
}

pub(crate) struct DecodeBytes<'a> {
    input: &'a [u8],
    pos: usize,
    parse_ctx: ParseContext,
}

impl<'a> DecodeBytes<'a> {
    pub(crate) fn new(input: &'a [u8], parse_ctx: ParseContext) -> Self {
        Self { input, pos: 0, parse_ctx }
    }
}

impl<'de> WireSource<'de> for DecodeBytes<'de> {
    fn take(&mut self, len: usize) -> WireResult<&'de [u8]> {
        if len > self.input.len() {
            return Err(WireError::RanOut);
        }
        let t;
        (t, self.input) = self.input.split_at(len);
        self.pos += len;
        Ok(t)
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.input.len()
    }

    fn ctx(&mut self) -> &mut ParseContext {
        &mut self.parse_ctx
    }
}

///////////////////////////////////////////////

/// A binary string with a `u16` length prefix, used for usernames,
/// passwords and paths inside payloads.
#[derive(Clone, Copy, PartialEq)]
pub struct ShortString<'a>(pub &'a [u8]);

impl<'a> ShortString<'a> {
    pub fn as_str(&self) -> Result<&'a str> {
        core::str::from_utf8(self.0).map_err(|_| Error::BadString)
    }
}

impl<'a> From<&'a str> for ShortString<'a> {
    fn from(s: &'a str) -> Self {
        ShortString(s.as_bytes())
    }
}

impl<'a> AsRef<[u8]> for ShortString<'a> {
    fn as_ref(&self) -> &'a [u8] {
        self.0
    }
}

impl Debug for ShortString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = core::str::from_utf8(self.0);
        if let Ok(s) = s {
            write!(f, "ShortString(\"{}\")", s.escape_default())
        } else {
            write!(f, "ShortString(not utf8!, {:#?})", self.0.hex_dump())
        }
    }
}

impl WireEncode for ShortString<'_> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        short_len(self.0)?.enc(s)?;
        self.0.enc(s)
    }
}

impl<'de> WireDecode<'de> for ShortString<'de> {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let len = u16::dec(s)? as usize;
        Ok(ShortString(s.take(len)?))
    }
}

/// Returns the `u16` length prefix for `v`, or `NoRoom` if it doesn't fit.
pub fn short_len(v: &[u8]) -> WireResult<u16> {
    if v.len() > config::MAX_SHORT_STRING {
        trace!("{} bytes can't be framed with a u16 length", v.len());
        return Err(WireError::NoRoom)
    }
    Ok(v.len() as u16)
}

/// A wrapper for a `u64` length prefixed structure `B`, such as a request payload.
pub struct Blob<B>(pub B);

impl<B> AsRef<B> for Blob<B> {
    fn as_ref(&self) -> &B {
        &self.0
    }
}

impl<B: WireEncode + Debug> Debug for Blob<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(len) = length_enc(&self.0) {
            write!(f, "Blob(len={len}, {:?})", self.0)
        } else {
            write!(f, "Blob(len=?, {:?})", self.0)
        }
    }
}

impl<B: WireEncode> WireEncode for Blob<B> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        let len = length_enc(&self.0)?;
        len.enc(s)?;
        self.0.enc(s)
    }
}

///////////////////////////////////////////////

impl WireEncode for u8 {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        s.push(&[*self])
    }
}

impl WireEncode for u16 {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        s.push(&self.to_be_bytes())
    }
}

impl WireEncode for u32 {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        s.push(&self.to_be_bytes())
    }
}

impl WireEncode for u64 {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        s.push(&self.to_be_bytes())
    }
}

// no length prefix
impl WireEncode for &[u8] {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        s.push(self)
    }
}

// no length prefix
impl<const N: usize> WireEncode for [u8; N] {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        s.push(self)
    }
}

impl<T: WireEncode> WireEncode for Option<T> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        if let Some(t) = self.as_ref() {
            t.enc(s)?;
        }
        Ok(())
    }
}

impl<'de> WireDecode<'de> for u8 {
    #[inline]
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let t = s.take(1)?;
        Ok(t[0])
    }
}

impl<'de> WireDecode<'de> for u16 {
    #[inline]
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        Ok(u16::from_be_bytes(<[u8; 2]>::dec(s)?))
    }
}

impl<'de> WireDecode<'de> for u32 {
    #[inline]
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        Ok(u32::from_be_bytes(<[u8; 4]>::dec(s)?))
    }
}

impl<'de> WireDecode<'de> for u64 {
    #[inline]
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        Ok(u64::from_be_bytes(<[u8; 8]>::dec(s)?))
    }
}

impl<'de, const N: usize> WireDecode<'de> for [u8; N] {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let mut l = [0u8; N];
        l.copy_from_slice(s.take(N)?);
        Ok(l)
    }
}
