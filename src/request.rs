//! Client requests.
//!
//! A [`Request`] can only be built through validation, either from
//! command flags with [`Request::new()`] or for one operation at a time
//! from a [`Session`]. [`Request::to_bytes()`] produces the wire frame:
//!
//! ```text
//!  0               1               2               3
//! +---------------+---------------+-------------------------------+
//! |    OPCODE     |   USER_FLAG   |           RESERVED            |
//! +---------------+---------------+-------------------------------+
//! |         USERNAME_LEN          |         PASSWORD_LEN          |
//! +-------------------------------+-------------------------------+
//! |                          SESSION_ID                           |
//! +---------------------------------------------------------------+
//! |                     USERNAME + PASSWORD                       |
//! +---------------------------------------------------------------+
//! |                      PAYLOAD_LEN (u64)                        |
//! +---------------------------------------------------------------+
//! |                  user payload or std payload                  |
//! +---------------------------------------------------------------+
//! ```

#[allow(unused_imports)]
use {
    crate::error::{Error, Result, TrapBug},
    log::{debug, error, info, log, trace, warn},
};

use core::fmt;

use std::path::{Path, PathBuf};

use pretty_hex::PrettyHex;
use zeroize::Zeroizing;

use crate::action::{self, Action, ActionFields, ActionFlags, ActionKind};
use crate::action::{LocalSubAction, UserPermission, UserSubAction};
use crate::hash::{self, FileDigest};
use crate::response::Response;
use crate::wire::{self, Blob, ParseContext, ShortString};
use crate::wire::{WireDecode, WireEncode, WireResult, WireSink, WireSource};

/// Fixed size part of the request header
pub const REQUEST_FIXED_LEN: usize = 12;

// Limit on how much of a frame is hex dumped at trace level
const TRACE_DUMP_LIMIT: usize = 512;

/// Account management parameters, built by [`Operation::user()`]
#[derive(Clone)]
#[non_exhaustive]
pub struct UserOperation {
    pub action: UserSubAction,
    pub perm: UserPermission,
    pub username: String,
    /// Only sent when creating an account
    pub password: Option<Zeroizing<String>>,
}

// Don't print password
impl fmt::Debug for UserOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserOperation")
            .field("action", &self.action)
            .field("perm", &self.perm)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "..."))
            .finish()
    }
}

/// An action together with the fields it depends on
#[derive(Debug, Clone)]
pub enum Operation {
    /// Authenticate only
    Authenticate,
    /// Interactive mode, logs in the same way as `Authenticate`
    Shell,
    Ls { path: String },
    Mkdir { path: String },
    Delete { path: String },
    /// Download `path` to the local file `target`, built by [`Operation::get()`]
    #[non_exhaustive]
    Get { path: String, target: PathBuf },
    /// Upload local `source` into the remote directory `dir`, built by [`Operation::put()`]
    #[non_exhaustive]
    Put { source: PathBuf, dir: String },
    #[non_exhaustive]
    User(UserOperation),
    Local { action: LocalSubAction, path: PathBuf },
}

impl Operation {
    /// Builds the operation for an already resolved `action`.
    ///
    /// `target_user` names the account for user management, `target_password`
    /// is the password of an account being created.
    pub fn resolve(
        action: Action,
        target_user: Option<&str>,
        target_password: Option<Zeroizing<String>>,
        fields: &ActionFields,
    ) -> Result<Self> {
        action.dependency().check(action.kind(), fields)?;

        let dst = || fields.dst.clone().trap();
        let src = || fields.src.clone().trap();

        let op = match action {
            Action::Authenticate => Operation::Authenticate,
            Action::Shell => Operation::Shell,
            Action::Ls => Operation::Ls { path: dst()? },
            Action::Mkdir => Operation::Mkdir { path: dst()? },
            Action::Delete => Operation::Delete { path: dst()? },
            Action::Get => Operation::get(&dst()?, &src()?)?,
            Action::Put => Operation::put(src()?, &dst()?)?,
            Action::User(sub) => {
                let username = target_user.unwrap_or_default();
                Operation::user(sub, username, fields.perm.unwrap_or_default(), target_password)?
            }
            Action::Local(l) => Operation::Local { action: l, path: src()? },
        };
        Ok(op)
    }

    /// A download of remote `path` into the local directory `local_dir`.
    ///
    /// Fails if `local_dir` isn't a directory, or if the file would
    /// overwrite something that already exists.
    pub fn get(path: &str, local_dir: &Path) -> Result<Self> {
        if !local_dir.is_dir() {
            return Err(Error::NotDirectory { path: local_dir.into() });
        }
        let name = Path::new(path)
            .file_name()
            .ok_or_else(|| Error::NoFileName { path: path.into() })?;
        let target = local_dir.join(name);
        if target.exists() {
            return Err(Error::FileExists { path: target });
        }
        Ok(Operation::Get { path: path.into(), target })
    }

    /// Management of the account `username`. `password` is dropped unless
    /// the account is being created.
    pub fn user(
        action: UserSubAction,
        username: &str,
        perm: UserPermission,
        password: Option<Zeroizing<String>>,
    ) -> Result<Self> {
        let password = match action {
            UserSubAction::Create => password,
            UserSubAction::Delete => None,
        };
        let op = Operation::User(UserOperation {
            action,
            perm,
            username: username.into(),
            password,
        });
        op.check()?;
        Ok(op)
    }

    /// An upload of the local file `source` into remote directory `dir`.
    ///
    /// The file isn't read until the request is serialized.
    pub fn put(source: PathBuf, dir: &str) -> Result<Self> {
        // check early that a remote name can be formed
        remote_put_path(&source, dir)?;
        Ok(Operation::Put { source, dir: dir.into() })
    }

    // A GET target may have been created since the operation was built,
    // so this runs again before sending.
    fn check(&self) -> Result<()> {
        match self {
            Operation::Get { target, .. } if target.exists() => {
                return Err(Error::FileExists { path: target.clone() });
            }
            Operation::Put { source, dir } => {
                remote_put_path(source, dir)?;
            }
            Operation::User(u) if u.username.is_empty() => {
                return Err(Error::MissingField {
                    command: u.action.kind().name(),
                    needs: "a username",
                });
            }
            _ => (),
        }
        Ok(())
    }

    pub fn action(&self) -> Action {
        match self {
            Operation::Authenticate => Action::Authenticate,
            Operation::Shell => Action::Shell,
            Operation::Ls { .. } => Action::Ls,
            Operation::Mkdir { .. } => Action::Mkdir,
            Operation::Delete { .. } => Action::Delete,
            Operation::Get { .. } => Action::Get,
            Operation::Put { .. } => Action::Put,
            Operation::User(u) => Action::User(u.action),
            Operation::Local { action, .. } => Action::Local(*action),
        }
    }
}

/// Remote path for an upload, `dir` joined with the base name of `source`
fn remote_put_path(source: &Path, dir: &str) -> Result<String> {
    let name = source
        .file_name()
        .ok_or_else(|| Error::NoFileName { path: source.display().to_string() })?
        .to_str()
        .ok_or(Error::BadString)?;
    let p = if dir.is_empty() {
        name.to_string()
    } else if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    };
    Ok(p)
}

/// Parameters for a single request, as supplied on a command line
pub struct RequestParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Zeroizing<String>,
    pub session_id: u32,
    pub actions: ActionFlags,
    pub fields: ActionFields,
    /// Password for an account being created
    pub other_password: Option<Zeroizing<String>>,
}

impl RequestParams {
    pub fn new(host: &str, port: u16, username: &str) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: Zeroizing::new(String::new()),
            session_id: 0,
            actions: ActionFlags::default(),
            fields: ActionFields::default(),
            other_password: None,
        }
    }
}

/// A validated request, ready to serialize
#[derive(Clone)]
pub struct Request {
    host: String,
    port: u16,
    username: String,
    password: Zeroizing<String>,
    session_id: u32,
    op: Operation,
}

impl Request {
    /// Validates `params`. Any invalid combination fails here rather
    /// than when the request is sent.
    pub fn new(params: RequestParams) -> Result<Self> {
        let (kind, target) = params.actions.select()?;
        let action = action::resolve_kind(kind, &params.fields)?;
        let op = Operation::resolve(action, target, params.other_password, &params.fields)?;
        Ok(Self {
            host: params.host,
            port: params.port,
            username: params.username,
            password: params.password,
            session_id: params.session_id,
            op,
        })
    }

    pub fn socket(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn operation(&self) -> &Operation {
        &self.op
    }

    pub fn action(&self) -> Action {
        self.op.action()
    }

    /// Value of the OPCODE field
    pub fn opcode(&self) -> ActionKind {
        self.action().opcode()
    }

    /// Value of the USER_FLAG field
    pub fn user_flag(&self) -> ActionKind {
        self.action().user_flag()
    }

    pub fn shell_mode(&self) -> bool {
        matches!(self.op, Operation::Shell)
    }

    /// Local source path, for actions that have one
    pub fn src(&self) -> Option<&Path> {
        match &self.op {
            Operation::Get { target, .. } => target.parent(),
            Operation::Put { source, .. } => Some(source),
            Operation::Local { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Remote path, for actions that have one
    pub fn dst(&self) -> Option<&str> {
        match &self.op {
            Operation::Ls { path } | Operation::Mkdir { path }
            | Operation::Delete { path } | Operation::Get { path, .. } => Some(path),
            Operation::Put { dir, .. } => Some(dir),
            _ => None,
        }
    }

    /// Account that a user management request acts on
    pub fn other_username(&self) -> Option<&str> {
        match &self.op {
            Operation::User(u) => Some(&u.username),
            _ => None,
        }
    }

    /// Whether a password for the other account should be supplied
    pub fn require_other_password(&self) -> bool {
        matches!(&self.op, Operation::User(u) if u.action == UserSubAction::Create)
    }

    /// Where a GET saves its file
    pub fn get_target(&self) -> Option<&Path> {
        match &self.op {
            Operation::Get { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Context for parsing the response to this request
    pub fn parse_context(&self) -> ParseContext {
        ParseContext { expect_digest: matches!(self.op, Operation::Get { .. }) }
    }

    /// Serializes the request.
    ///
    /// A PUT reads the whole source file here; a failure to read it
    /// is returned unchanged as [`Error::IoError`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.op.check()?;
        let action = self.action();
        let header = RequestHeader {
            opcode: action.opcode(),
            user_flag: action.user_flag(),
            username: ShortString(self.username.as_bytes()),
            password: ShortString(self.password.as_bytes()),
            session_id: self.session_id,
        };

        let mut buf = Vec::new();
        wire::write_wire(&mut buf, &header)?;

        match &self.op {
            Operation::Authenticate | Operation::Shell | Operation::Local { .. } => {
                wire::write_wire(&mut buf, &Blob(EmptyPayload))?;
            }
            Operation::User(u) => {
                let p = UserPayload {
                    action: u.action.kind(),
                    perm: u.perm,
                    username: u.username.as_str().into(),
                    password: u.password.as_ref().map(|p| p.as_str().into()),
                };
                wire::write_wire(&mut buf, &Blob(p))?;
            }
            Operation::Ls { path } | Operation::Mkdir { path }
            | Operation::Delete { path } | Operation::Get { path, .. } => {
                let p = StdPayload { path: path.as_str().into(), file: None };
                wire::write_wire(&mut buf, &Blob(p))?;
            }
            Operation::Put { source, dir } => {
                let path = remote_put_path(source, dir)?;
                let data = std::fs::read(source)?;
                let digest = hash::digest(&data);
                debug!("put {} ({} bytes) to {path}", source.display(), data.len());
                let p = StdPayload {
                    path: path.as_str().into(),
                    file: Some(FileData { digest, data: &data }),
                };
                wire::write_wire(&mut buf, &Blob(p))?;
            }
        }

        self.trace_frame(&buf);
        Ok(buf)
    }

    fn trace_frame(&self, buf: &[u8]) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        let n = buf.len().min(TRACE_DUMP_LIMIT);
        let mut dump = buf[..n].to_vec();
        // mask the password
        let start = REQUEST_FIXED_LEN + self.username.len();
        let end = (start + self.password.len()).min(n);
        if start < end {
            dump[start..end].fill(b'*');
        }
        trace!("request {} bytes\n{:?}", buf.len(), dump.hex_dump());
    }
}

// Don't print password
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("session_id", &self.session_id)
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}

/// Connection details and credentials kept across interactive requests.
///
/// Each operation gets a fresh [`Request`]; only the session id
/// carries over, copied back with [`Session::update_session()`].
#[derive(Clone)]
pub struct Session {
    host: String,
    port: u16,
    username: String,
    password: Zeroizing<String>,
    session_id: u32,
}

impl Session {
    pub fn new(host: &str, port: u16, username: &str, password: Zeroizing<String>) -> Self {
        Self { host: host.into(), port, username: username.into(), password, session_id: 0 }
    }

    /// Takes over the connection details of a validated request
    pub fn from_request(r: &Request) -> Self {
        Self {
            host: r.host.clone(),
            port: r.port,
            username: r.username.clone(),
            password: r.password.clone(),
            session_id: r.session_id,
        }
    }

    pub fn socket(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn set_session_id(&mut self, id: u32) {
        self.session_id = id;
    }

    /// Keeps the session id the server handed out
    pub fn update_session(&mut self, resp: &Response) {
        if resp.session_id() != self.session_id {
            debug!("session id {} -> {}", self.session_id, resp.session_id());
        }
        self.session_id = resp.session_id();
    }

    /// A request for `op` using this session's credentials
    pub fn request(&self, op: Operation) -> Result<Request> {
        op.check()?;
        Ok(self.build(op))
    }

    // for operations with nothing to check
    fn build(&self, op: Operation) -> Request {
        Request {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            session_id: self.session_id,
            op,
        }
    }

    pub fn authenticate(&self) -> Request {
        self.build(Operation::Authenticate)
    }

    pub fn ls(&self, path: &str) -> Request {
        self.build(Operation::Ls { path: path.into() })
    }

    pub fn mkdir(&self, path: &str) -> Request {
        self.build(Operation::Mkdir { path: path.into() })
    }

    pub fn delete(&self, path: &str) -> Request {
        self.build(Operation::Delete { path: path.into() })
    }

    pub fn get(&self, path: &str, local_dir: &Path) -> Result<Request> {
        self.request(Operation::get(path, local_dir)?)
    }

    pub fn put(&self, source: &Path, dir: &str) -> Result<Request> {
        self.request(Operation::put(source.into(), dir)?)
    }

    pub fn local(&self, action: LocalSubAction, path: &Path) -> Request {
        self.build(Operation::Local { action, path: path.into() })
    }
}

// Don't print password
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

///////////////////////////////////////////////

/// The request header, up to and including the password
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader<'a> {
    pub opcode: ActionKind,
    pub user_flag: ActionKind,
    pub username: ShortString<'a>,
    pub password: ShortString<'a>,
    pub session_id: u32,
}

impl WireEncode for RequestHeader<'_> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        self.opcode.enc(s)?;
        self.user_flag.enc(s)?;
        // reserved
        0u16.enc(s)?;
        // lengths come before both strings
        wire::short_len(self.username.0)?.enc(s)?;
        wire::short_len(self.password.0)?.enc(s)?;
        self.session_id.enc(s)?;
        self.username.0.enc(s)?;
        self.password.0.enc(s)
    }
}

impl<'de> WireDecode<'de> for RequestHeader<'de> {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let opcode = ActionKind::dec(s)?;
        let user_flag = ActionKind::dec(s)?;
        let _reserved = u16::dec(s)?;
        let ulen = u16::dec(s)? as usize;
        let plen = u16::dec(s)? as usize;
        let session_id = u32::dec(s)?;
        let username = ShortString(s.take(ulen)?);
        let password = ShortString(s.take(plen)?);
        Ok(Self { opcode, user_flag, username, password, session_id })
    }
}

/// A complete request frame, with the payload left undecoded.
///
/// Used by tests and peers that need to inspect what a client sent.
#[derive(Debug)]
pub struct RequestFrame<'a> {
    pub header: RequestHeader<'a>,
    pub payload: &'a [u8],
}

impl<'de> WireDecode<'de> for RequestFrame<'de> {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let header = RequestHeader::dec(s)?;
        let len = u64::dec(s)?;
        let len = usize::try_from(len).map_err(|_| wire::WireError::BadNumber)?;
        let payload = s.take(len)?;
        Ok(Self { header, payload })
    }
}

impl<'a> RequestFrame<'a> {
    /// Parses a complete frame
    pub fn parse(b: &'a [u8]) -> Result<Self> {
        wire::read_frame(b, &ParseContext::new())
    }

    /// Decodes a USER_OP payload
    pub fn user_payload(&self) -> Result<UserPayload<'a>> {
        if self.header.opcode != ActionKind::UserOp {
            return Err(Error::BadUsage { msg: "not a user request" });
        }
        wire::read_frame(self.payload, &ParseContext::new())
    }

    /// Decodes a path based payload. For PUT the file digest and
    /// contents are returned too.
    pub fn std_payload(&self) -> Result<StdPayload<'a>> {
        let ctx = ParseContext { expect_digest: self.header.opcode == ActionKind::Put };
        wire::read_frame(self.payload, &ctx)
    }
}

/// Payload for requests that only authenticate
#[derive(Debug)]
pub struct EmptyPayload;

impl WireEncode for EmptyPayload {
    fn enc<S>(&self, _s: &mut S) -> WireResult<()>
    where S: WireSink {
        Ok(())
    }
}

/// Payload of a USER_OP request
#[derive(Debug, PartialEq)]
pub struct UserPayload<'a> {
    pub action: ActionKind,
    pub perm: UserPermission,
    pub username: ShortString<'a>,
    /// Only present for CREATE_USER
    pub password: Option<ShortString<'a>>,
}

impl WireEncode for UserPayload<'_> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        self.action.enc(s)?;
        self.perm.enc(s)?;
        self.username.enc(s)?;
        if self.action == ActionKind::CreateUser {
            self.password.enc(s)?;
        }
        Ok(())
    }
}

impl<'de> WireDecode<'de> for UserPayload<'de> {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let action = ActionKind::dec(s)?;
        let perm = u8::dec(s)?;
        let perm = UserPermission::try_from(perm).map_err(|_| wire::WireError::BadNumber)?;
        let username = ShortString::dec(s)?;
        let password = if action == ActionKind::CreateUser && s.remaining() > 0 {
            Some(ShortString::dec(s)?)
        } else {
            None
        };
        Ok(Self { action, perm, username, password })
    }
}

/// File contents of a PUT
#[derive(PartialEq)]
pub struct FileData<'a> {
    pub digest: FileDigest,
    pub data: &'a [u8],
}

impl fmt::Debug for FileData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileData(len={}, digest={:?})", self.data.len(), self.digest.hex_dump())
    }
}

/// Payload of LS, MKDIR, DELETE, GET and PUT requests
#[derive(Debug, PartialEq)]
pub struct StdPayload<'a> {
    pub path: ShortString<'a>,
    /// PUT only
    pub file: Option<FileData<'a>>,
}

impl WireEncode for StdPayload<'_> {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        self.path.enc(s)?;
        if let Some(f) = &self.file {
            f.digest.enc(s)?;
            f.data.enc(s)?;
        }
        Ok(())
    }
}

impl<'de> WireDecode<'de> for StdPayload<'de> {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let path = ShortString::dec(s)?;
        let file = if s.ctx().expect_digest {
            let digest = FileDigest::dec(s)?;
            let n = s.remaining();
            let data = s.take(n)?;
            Some(FileData { digest, data })
        } else {
            None
        };
        Ok(Self { path, file })
    }
}

#[cfg(test)]
mod tests {
    use crate::request::*;
    use crate::action::*;
    use crate::error::Error;
    use crate::rfmlog::init_test_log;

    use std::io::Write;

    fn params(actions: ActionFlags, fields: ActionFields) -> RequestParams {
        RequestParams {
            password: Zeroizing::new("hunter22".into()),
            actions,
            fields,
            ..RequestParams::new("127.0.0.1", 9000, "alice")
        }
    }

    fn dst(d: &str) -> ActionFields {
        ActionFields { dst: Some(d.into()), ..Default::default() }
    }

    fn session() -> Session {
        Session::new("127.0.0.1", 9000, "alice", Zeroizing::new("hunter22".into()))
    }

    #[test]
    fn header_layout() {
        init_test_log();
        let mut s = session();
        s.set_session_id(0x01020304);
        let b = s.ls("/srv").to_bytes().unwrap();

        assert_eq!(b[0], ActionKind::Ls as u8);
        assert_eq!(b[1], 0);
        assert_eq!(&b[2..4], &[0, 0]);
        assert_eq!(&b[4..6], &[0, 5]);
        assert_eq!(&b[6..8], &[0, 8]);
        assert_eq!(&b[8..12], &[1, 2, 3, 4]);
        assert_eq!(&b[12..17], b"alice");
        assert_eq!(&b[17..25], b"hunter22");
        assert_eq!(&b[25..33], &6u64.to_be_bytes());
        assert_eq!(&b[33..], b"\x00\x04/srv");
    }

    #[test]
    /// header fields decode back to the values written, for all credential lengths
    fn header_roundtrip() {
        init_test_log();
        let mut lengths: Vec<usize> = (0..=300).collect();
        lengths.extend((300..=65535).step_by(4093));
        lengths.extend([65534, 65535]);

        for &len in &lengths {
            let user = "u".repeat(len);
            let pass = "p".repeat(65535 - len);
            let mut s = Session::new("h", 1, &user, Zeroizing::new(pass.clone()));
            s.set_session_id(len as u32 * 31);
            let b = s.authenticate().to_bytes().unwrap();

            let f = RequestFrame::parse(&b).unwrap();
            assert_eq!(f.header.opcode, ActionKind::LocalOp);
            assert_eq!(f.header.user_flag, ActionKind::NoOp);
            assert_eq!(f.header.username.0.len(), len);
            assert_eq!(f.header.password.0.len(), pass.len());
            assert_eq!(f.header.session_id, len as u32 * 31);
            assert_eq!(u16::from_be_bytes([b[4], b[5]]) as usize, len);
        }
    }

    #[test]
    fn credentials_too_long() {
        let user = "u".repeat(65536);
        let s = Session::new("h", 1, &user, Zeroizing::new("pw".into()));
        assert!(matches!(s.authenticate().to_bytes(), Err(Error::NoRoom)));
    }

    #[test]
    fn local_ls() {
        init_test_log();
        let fields = ActionFields { src: Some(".".into()), ..Default::default() };
        let r = Request::new(params(ActionFlags::only(ActionKind::LocalLs, None), fields)).unwrap();
        let b = r.to_bytes().unwrap();
        assert_eq!(b[0], ActionKind::LocalOp as u8);
        assert_eq!(b[0], 7);
        assert_eq!(b[1], ActionKind::LocalLs as u8);
        let f = RequestFrame::parse(&b).unwrap();
        assert!(f.payload.is_empty());
        assert_eq!(&b[b.len() - 8..], &[0; 8]);
    }

    #[test]
    fn create_user_without_password() {
        init_test_log();
        let flags = ActionFlags { create_user: Some("bob".into()), ..Default::default() };
        let fields = ActionFields { perm: Some(UserPermission::ReadWrite), ..Default::default() };
        let r = Request::new(params(flags, fields)).unwrap();
        assert_eq!(r.other_username(), Some("bob"));
        assert!(r.require_other_password());

        let b = r.to_bytes().unwrap();
        let f = RequestFrame::parse(&b).unwrap();
        assert_eq!(f.header.opcode, ActionKind::UserOp);
        assert_eq!(f.header.user_flag, ActionKind::CreateUser);
        assert_eq!(f.payload, b"\x0a\x02\x00\x03bob");
        assert_eq!(f.payload.len(), 7);
    }

    #[test]
    fn create_user_with_password() {
        let flags = ActionFlags { create_user: Some("bob".into()), ..Default::default() };
        let fields = ActionFields { perm: Some(UserPermission::Admin), ..Default::default() };
        let p = RequestParams {
            other_password: Some(Zeroizing::new("s3cret!".into())),
            ..params(flags, fields)
        };
        let r = Request::new(p).unwrap();
        let b = r.to_bytes().unwrap();
        let f = RequestFrame::parse(&b).unwrap();
        assert_eq!(f.payload, b"\x0a\x03\x00\x03bob\x00\x07s3cret!");

        let u = f.user_payload().unwrap();
        assert_eq!(u.action, ActionKind::CreateUser);
        assert_eq!(u.perm, UserPermission::Admin);
        assert_eq!(u.password.unwrap().as_str().unwrap(), "s3cret!");
    }

    #[test]
    fn delete_user() {
        let flags = ActionFlags { delete_user: Some("mallory".into()), ..Default::default() };
        let p = RequestParams {
            // ignored for deletes
            other_password: Some(Zeroizing::new("nope".into())),
            ..params(flags, ActionFields::default())
        };
        let r = Request::new(p).unwrap();
        assert!(!r.require_other_password());
        let b = r.to_bytes().unwrap();
        let f = RequestFrame::parse(&b).unwrap();
        assert_eq!(f.header.user_flag, ActionKind::DeleteUser);
        assert_eq!(f.payload, b"\x14\x01\x00\x07mallory");
    }

    #[test]
    fn put_payload() {
        init_test_log();
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("data.bin");
        let contents: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        std::fs::File::create(&src).unwrap().write_all(&contents).unwrap();

        let fields = ActionFields { src: Some(src.clone()), dst: Some("uploads".into()), perm: None };
        let r = Request::new(params(ActionFlags::only(ActionKind::Put, None), fields)).unwrap();
        let b = r.to_bytes().unwrap();

        let f = RequestFrame::parse(&b).unwrap();
        assert_eq!(f.header.opcode, ActionKind::Put);
        let path = "uploads/data.bin";
        assert_eq!(f.payload.len(), 2 + path.len() + 32 + 3000);

        let p = f.std_payload().unwrap();
        assert_eq!(p.path.as_str().unwrap(), path);
        let file = p.file.unwrap();
        assert_eq!(file.digest, hash::digest(&contents));
        assert_eq!(file.data, &contents[..]);
    }

    #[test]
    fn put_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let s = session();
        let r = s.put(&dir.path().join("absent"), "up").unwrap();
        match r.to_bytes() {
            Err(Error::IoError { source }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn put_paths() {
        assert_eq!(remote_put_path(Path::new("/a/b.txt"), "").unwrap(), "b.txt");
        assert_eq!(remote_put_path(Path::new("/a/b.txt"), "up/").unwrap(), "up/b.txt");
        assert_eq!(remote_put_path(Path::new("b.txt"), "/up").unwrap(), "/up/b.txt");
        assert!(matches!(remote_put_path(Path::new("/"), "up"), Err(Error::NoFileName { .. })));
    }

    #[test]
    fn get_prechecks() {
        init_test_log();
        let dir = tempfile::tempdir().unwrap();
        let fields = |src: &Path| ActionFields {
            src: Some(src.into()),
            dst: Some("remote/notes.txt".into()),
            perm: None,
        };
        let flags = ActionFlags::only(ActionKind::Get, None);

        let r = Request::new(params(flags.clone(), fields(dir.path()))).unwrap();
        assert_eq!(r.get_target().unwrap(), dir.path().join("notes.txt"));
        assert!(r.parse_context().expect_digest);
        let b = r.to_bytes().unwrap();
        let f = RequestFrame::parse(&b).unwrap();
        assert_eq!(f.std_payload().unwrap().path.as_str().unwrap(), "remote/notes.txt");

        // existing file is refused
        std::fs::write(dir.path().join("notes.txt"), b"old").unwrap();
        let e = Request::new(params(flags.clone(), fields(dir.path()))).unwrap_err();
        assert!(matches!(e, Error::FileExists { .. }), "{e:?}");

        // source must be a directory
        let e = Request::new(params(flags.clone(), fields(&dir.path().join("notes.txt")))).unwrap_err();
        assert!(matches!(e, Error::NotDirectory { .. }), "{e:?}");

        let e = Request::new(params(flags, fields(&dir.path().join("nowhere")))).unwrap_err();
        assert!(matches!(e, Error::NotDirectory { .. }), "{e:?}");
    }

    #[test]
    fn validation_at_construction() {
        let e = Request::new(params(ActionFlags::only(ActionKind::Mkdir, None), ActionFields::default()))
            .unwrap_err();
        assert!(matches!(e, Error::MissingField { command: "mkdir", .. }));

        let flags = ActionFlags { ls: true, delete: true, ..Default::default() };
        assert!(matches!(Request::new(params(flags, dst("x"))), Err(Error::MultipleActions)));

        let e = Request::new(params(ActionFlags::default(), dst("x"))).unwrap_err();
        assert!(matches!(e, Error::NoAction));
    }

    #[test]
    fn session_operations_checked() {
        init_test_log();
        let dir = tempfile::tempdir().unwrap();
        let s = session();

        // target appears after the request was built
        let r = s.get("files/a.txt", dir.path()).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"local").unwrap();
        let e = r.to_bytes().unwrap_err();
        assert!(matches!(e, Error::FileExists { .. }), "{e:?}");

        let op = Operation::Get { path: "files/a.txt".into(), target: dir.path().join("a.txt") };
        let e = s.request(op).unwrap_err();
        assert!(matches!(e, Error::FileExists { .. }), "{e:?}");

        let e = Operation::user(UserSubAction::Delete, "", UserPermission::Read, None).unwrap_err();
        assert!(matches!(e, Error::MissingField { command: "delete_user", .. }), "{e:?}");

        let op = Operation::User(UserOperation {
            action: UserSubAction::Create,
            perm: UserPermission::Admin,
            username: String::new(),
            password: None,
        });
        assert!(matches!(s.request(op.clone()), Err(Error::MissingField { .. })));
        let r = s.build(op);
        assert!(matches!(r.to_bytes(), Err(Error::MissingField { command: "create_user", .. })));

        let op = Operation::user(UserSubAction::Delete, "bob", UserPermission::Read, Some(Zeroizing::new("pw".into())))
            .unwrap();
        let r = s.request(op).unwrap();
        assert_eq!(r.other_username(), Some("bob"));
        assert!(!r.require_other_password());
        r.to_bytes().unwrap();
    }

    #[test]
    fn fresh_request_per_operation() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session();
        s.set_session_id(77);

        let a = s.get("files/a.txt", dir.path()).unwrap();
        let b = s.mkdir("newdir");
        // nothing from the GET leaks into the next request
        assert_eq!(b.src(), None);
        assert_eq!(b.dst(), Some("newdir"));
        assert_eq!(b.session_id(), 77);
        assert_eq!(a.dst(), Some("files/a.txt"));
        assert_eq!(a.src(), Some(dir.path()));
    }

    #[test]
    fn shell_logs_in() {
        let r = Request::new(params(ActionFlags::only(ActionKind::Shell, None), ActionFields::default()))
            .unwrap();
        assert!(r.shell_mode());
        let b = r.to_bytes().unwrap();
        let f = RequestFrame::parse(&b).unwrap();
        assert_eq!(f.header.opcode, ActionKind::LocalOp);
        assert_eq!(f.header.user_flag, ActionKind::NoOp);
        assert!(f.payload.is_empty());
    }

    #[test]
    fn debug_hides_password() {
        let r = session().authenticate();
        let s = format!("{r:?}");
        assert!(!s.contains("hunter22"));
        let s = format!("{:?}", session());
        assert!(!s.contains("hunter22"));
    }
}
