//! Actions a request can perform, and the fields each one requires.
//!
//! [`ActionKind`] holds the numeric codes shared with the server. A resolved
//! [`Action`] folds the user management and local kinds into their
//! wrapper opcodes, see [`Action::opcode()`] and [`Action::user_flag()`].

#[allow(unused_imports)]
use {
    crate::error::{Error, Result, TrapBug},
    log::{debug, error, info, log, trace, warn},
};

use core::fmt;
use core::str::FromStr;

use std::path::PathBuf;

use crate::wire::{WireDecode, WireEncode, WireError, WireResult, WireSink, WireSource};

/// Which caller supplied fields an action depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    None,
    /// `--src`
    Source,
    /// `--dst`
    Destination,
    /// `--src` and `--dst`
    Both,
    /// `--perm`
    Permission,
}

impl Dependency {
    /// Checks that `fields` holds everything this dependency needs.
    pub fn check(self, kind: ActionKind, fields: &ActionFields) -> Result<()> {
        let needs = match self {
            Dependency::None => return Ok(()),
            Dependency::Source if fields.src.is_none() => "\"--src\"",
            Dependency::Destination if fields.dst.is_none() => "\"--dst\"",
            Dependency::Both if fields.src.is_none() || fields.dst.is_none() => {
                "\"--src\" and \"--dst\""
            }
            Dependency::Permission if fields.perm.is_none() => "\"--perm\"",
            _ => return Ok(()),
        };
        Err(Error::MissingField { command: kind.name(), needs })
    }
}

/// We have repeated `match` statements for the action codes, use a macro
/// so that each code gets exactly one name and dependency.
macro_rules! actionkinds {
    (
        $( ( $code:literal,
            $Variant:ident,
            $name:literal,
            $dependency:ident
            ),
             )*
    ) => {

/// Operation codes, as sent in the OPCODE and USER_FLAG header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ActionKind {
    // variants are eg
    // Ls = 3,
    $(
    $Variant = $code,
    )*
}

impl TryFrom<u8> for ActionKind {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            // eg
            // 3 => Ok(ActionKind::Ls)
            $(
            $code => Ok(ActionKind::$Variant),
            )*
            _ => Err(Error::UnknownAction { number: v }),
        }
    }
}

impl ActionKind {
    /// All action kinds, in code order
    pub const ALL: &'static [ActionKind] = &[ $( ActionKind::$Variant, )* ];

    /// The command name, as used for command flags and shell commands
    pub fn name(self) -> &'static str {
        match self {
            $(
            ActionKind::$Variant => $name,
            )*
        }
    }

    /// Which fields must be supplied for this action
    pub fn dependency(self) -> Dependency {
        match self {
            $(
            ActionKind::$Variant => Dependency::$dependency,
            )*
        }
    }
}

impl FromStr for ActionKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        // flags are spelt with '-'
        let l = s.to_ascii_lowercase().replace('-', "_");
        match l.as_str() {
            $(
            $name => Ok(ActionKind::$Variant),
            )*
            _ => Err(Error::UnknownCommand { name: s.into() }),
        }
    }
}

} } // macro

actionkinds![
(0, NoOp, "no_op", None),
(1, UserOp, "user_op", None),
(2, Delete, "delete", Destination),
(3, Ls, "ls", Destination),
(4, Get, "get", Both),
(5, Mkdir, "mkdir", Destination),
(6, Put, "put", Both),
(7, LocalOp, "local_op", None),
(10, CreateUser, "create_user", Permission),
(20, DeleteUser, "delete_user", None),
// local codes, never sent as an OPCODE
(21, Shell, "shell", None),
(22, LocalLs, "l_ls", Source),
(23, LocalDelete, "l_delete", Source),
(24, LocalMkdir, "l_mkdir", Source),
];

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl WireEncode for ActionKind {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        (*self as u8).enc(s)
    }
}

impl<'de> WireDecode<'de> for ActionKind {
    fn dec<S>(s: &mut S) -> WireResult<Self>
    where S: WireSource<'de> {
        let v = u8::dec(s)?;
        ActionKind::try_from(v).map_err(|_| WireError::UnknownAction { number: v })
    }
}

/// Permission tier of an account, ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum UserPermission {
    #[default]
    Read = 1,
    ReadWrite = 2,
    Admin = 3,
}

impl UserPermission {
    pub fn name(self) -> &'static str {
        match self {
            UserPermission::Read => "READ",
            UserPermission::ReadWrite => "READ_WRITE",
            UserPermission::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for UserPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for UserPermission {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "READ" => Ok(UserPermission::Read),
            "READ_WRITE" => Ok(UserPermission::ReadWrite),
            "ADMIN" => Ok(UserPermission::Admin),
            _ => Err(Error::BadPermission { name: s.into() }),
        }
    }
}

impl TryFrom<u8> for UserPermission {
    type Error = Error;
    fn try_from(v: u8) -> Result<Self> {
        match v {
            1 => Ok(UserPermission::Read),
            2 => Ok(UserPermission::ReadWrite),
            3 => Ok(UserPermission::Admin),
            _ => Err(Error::BadPermission { name: v.to_string() }),
        }
    }
}

impl WireEncode for UserPermission {
    fn enc<S>(&self, s: &mut S) -> WireResult<()>
    where S: WireSink {
        (*self as u8).enc(s)
    }
}

/// Account management carried inside [`ActionKind::UserOp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSubAction {
    Create,
    Delete,
}

impl UserSubAction {
    pub fn kind(self) -> ActionKind {
        match self {
            UserSubAction::Create => ActionKind::CreateUser,
            UserSubAction::Delete => ActionKind::DeleteUser,
        }
    }
}

/// Client side filesystem actions carried inside [`ActionKind::LocalOp`].
/// The server only authenticates these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalSubAction {
    Ls,
    Delete,
    Mkdir,
}

impl LocalSubAction {
    pub fn kind(self) -> ActionKind {
        match self {
            LocalSubAction::Ls => ActionKind::LocalLs,
            LocalSubAction::Delete => ActionKind::LocalDelete,
            LocalSubAction::Mkdir => ActionKind::LocalMkdir,
        }
    }
}

/// A resolved action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Authentication only, for interactive login
    Authenticate,
    Shell,
    Ls,
    Get,
    Put,
    Mkdir,
    Delete,
    User(UserSubAction),
    Local(LocalSubAction),
}

impl Action {
    /// Returns the action for a concrete kind.
    ///
    /// `NoOp` and `UserOp` are not selectable. `LocalOp` on its own
    /// is an authentication request.
    pub fn from_kind(kind: ActionKind) -> Result<Self> {
        let a = match kind {
            ActionKind::NoOp => return Err(Error::NoAction),
            ActionKind::UserOp => return Err(Error::UnknownCommand { name: kind.name().into() }),
            ActionKind::LocalOp => Action::Authenticate,
            ActionKind::Shell => Action::Shell,
            ActionKind::Ls => Action::Ls,
            ActionKind::Get => Action::Get,
            ActionKind::Put => Action::Put,
            ActionKind::Mkdir => Action::Mkdir,
            ActionKind::Delete => Action::Delete,
            ActionKind::CreateUser => Action::User(UserSubAction::Create),
            ActionKind::DeleteUser => Action::User(UserSubAction::Delete),
            ActionKind::LocalLs => Action::Local(LocalSubAction::Ls),
            ActionKind::LocalDelete => Action::Local(LocalSubAction::Delete),
            ActionKind::LocalMkdir => Action::Local(LocalSubAction::Mkdir),
        };
        Ok(a)
    }

    /// The concrete kind, before wrapper collapsing
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Authenticate => ActionKind::LocalOp,
            Action::Shell => ActionKind::Shell,
            Action::Ls => ActionKind::Ls,
            Action::Get => ActionKind::Get,
            Action::Put => ActionKind::Put,
            Action::Mkdir => ActionKind::Mkdir,
            Action::Delete => ActionKind::Delete,
            Action::User(u) => u.kind(),
            Action::Local(l) => l.kind(),
        }
    }

    /// Value of the OPCODE header field.
    pub fn opcode(&self) -> ActionKind {
        match self {
            // the shell logs in first
            Action::Authenticate | Action::Shell | Action::Local(_) => ActionKind::LocalOp,
            Action::User(_) => ActionKind::UserOp,
            a => a.kind(),
        }
    }

    /// Value of the USER_FLAG header field.
    pub fn user_flag(&self) -> ActionKind {
        match self {
            Action::User(u) => u.kind(),
            Action::Local(l) => l.kind(),
            _ => ActionKind::NoOp,
        }
    }

    pub fn dependency(&self) -> Dependency {
        self.kind().dependency()
    }
}

/// The action selecting fields supplied by a caller, one per command flag.
///
/// Exactly one may be set. The user management flags carry the
/// name of the account to act on; an empty name counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFlags {
    pub shell: bool,
    pub ls: bool,
    pub get: bool,
    pub put: bool,
    pub mkdir: bool,
    pub delete: bool,
    pub local_ls: bool,
    pub local_delete: bool,
    pub local_mkdir: bool,
    pub create_user: Option<String>,
    pub delete_user: Option<String>,
}

impl ActionFlags {
    /// Flags with only `kind` set. User management kinds take the target account.
    pub fn only(kind: ActionKind, target: Option<&str>) -> Self {
        let mut f = Self::default();
        match kind {
            ActionKind::Shell => f.shell = true,
            ActionKind::Ls => f.ls = true,
            ActionKind::Get => f.get = true,
            ActionKind::Put => f.put = true,
            ActionKind::Mkdir => f.mkdir = true,
            ActionKind::Delete => f.delete = true,
            ActionKind::LocalLs => f.local_ls = true,
            ActionKind::LocalDelete => f.local_delete = true,
            ActionKind::LocalMkdir => f.local_mkdir = true,
            ActionKind::CreateUser => f.create_user = target.map(Into::into),
            ActionKind::DeleteUser => f.delete_user = target.map(Into::into),
            ActionKind::NoOp | ActionKind::UserOp | ActionKind::LocalOp => (),
        }
        f
    }

    /// Returns the single selected kind, and the target account for
    /// user management.
    pub fn select(&self) -> Result<(ActionKind, Option<&str>)> {
        fn user(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.is_empty())
        }

        let candidates = [
            (self.shell, ActionKind::Shell, None),
            (self.ls, ActionKind::Ls, None),
            (self.get, ActionKind::Get, None),
            (self.put, ActionKind::Put, None),
            (self.mkdir, ActionKind::Mkdir, None),
            (self.delete, ActionKind::Delete, None),
            (self.local_ls, ActionKind::LocalLs, None),
            (self.local_delete, ActionKind::LocalDelete, None),
            (self.local_mkdir, ActionKind::LocalMkdir, None),
            (user(&self.create_user).is_some(), ActionKind::CreateUser, user(&self.create_user)),
            (user(&self.delete_user).is_some(), ActionKind::DeleteUser, user(&self.delete_user)),
        ];

        let mut chosen = None;
        for (set, kind, target) in candidates {
            if !set {
                continue;
            }
            if chosen.is_some() {
                return Err(Error::MultipleActions);
            }
            chosen = Some((kind, target));
        }
        chosen.ok_or(Error::NoAction)
    }
}

/// Caller supplied fields that actions depend on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFields {
    pub src: Option<PathBuf>,
    pub dst: Option<String>,
    pub perm: Option<UserPermission>,
}

/// Resolves the selected action against the supplied fields.
///
/// Fails if not exactly one action is selected or a field the action
/// depends on is missing.
pub fn resolve(flags: &ActionFlags, fields: &ActionFields) -> Result<Action> {
    let (kind, _target) = flags.select()?;
    resolve_kind(kind, fields)
}

/// Like [`resolve()`] for an already chosen kind
pub fn resolve_kind(kind: ActionKind, fields: &ActionFields) -> Result<Action> {
    let action = Action::from_kind(kind)?;
    action.dependency().check(kind, fields)?;
    debug!("resolved {kind} to opcode {} flag {}", action.opcode(), action.user_flag());
    Ok(action)
}

#[cfg(test)]
mod tests {
    use crate::action::*;
    use crate::rfmlog::init_test_log;

    fn all_fields() -> ActionFields {
        ActionFields {
            src: Some("/tmp".into()),
            dst: Some("remote/file".into()),
            perm: Some(UserPermission::ReadWrite),
        }
    }

    #[test]
    /// check round trip of action codes
    fn action_codes() {
        for i in 0..=255u8 {
            if let Ok(k) = ActionKind::try_from(i) {
                assert_eq!(i, k as u8);
                assert_eq!(k.name().parse::<ActionKind>().unwrap(), k);
            }
        }
        assert_eq!(ActionKind::ALL.len(), 14);
        assert_eq!(ActionKind::Shell as u8, 21);
        assert_eq!(ActionKind::LocalLs as u8, 22);
        assert_eq!(ActionKind::LocalDelete as u8, 23);
        assert_eq!(ActionKind::LocalMkdir as u8, 24);
        assert!(matches!(ActionKind::try_from(8), Err(Error::UnknownAction { number: 8 })));
    }

    #[test]
    fn parse_names() {
        assert_eq!("GET".parse::<ActionKind>().unwrap(), ActionKind::Get);
        assert_eq!("L_Mkdir".parse::<ActionKind>().unwrap(), ActionKind::LocalMkdir);
        assert!(matches!("fetch".parse::<ActionKind>(), Err(Error::UnknownCommand { .. })));
    }

    #[test]
    fn permission_names() {
        assert_eq!("read_write".parse::<UserPermission>().unwrap(), UserPermission::ReadWrite);
        assert_eq!("Admin".parse::<UserPermission>().unwrap(), UserPermission::Admin);
        assert!(matches!("root".parse::<UserPermission>(), Err(Error::BadPermission { .. })));
        assert_eq!(UserPermission::ReadWrite.to_string(), "READ_WRITE");
        assert_eq!(UserPermission::default(), UserPermission::Read);
        assert!(UserPermission::Admin > UserPermission::Read);
    }

    #[test]
    fn no_action() {
        init_test_log();
        let r = resolve(&ActionFlags::default(), &all_fields());
        assert!(matches!(r, Err(Error::NoAction)));

        // empty account name counts as unset
        let f = ActionFlags { delete_user: Some("".into()), ..Default::default() };
        assert!(matches!(resolve(&f, &all_fields()), Err(Error::NoAction)));
    }

    #[test]
    fn multiple_actions() {
        init_test_log();
        let f = ActionFlags { ls: true, mkdir: true, ..Default::default() };
        assert!(matches!(resolve(&f, &all_fields()), Err(Error::MultipleActions)));

        let f = ActionFlags {
            put: true,
            create_user: Some("bob".into()),
            ..Default::default()
        };
        assert!(matches!(resolve(&f, &all_fields()), Err(Error::MultipleActions)));
    }

    #[test]
    /// every kind that needs a field fails without it and succeeds with it
    fn dependencies_enforced() {
        init_test_log();
        for &kind in ActionKind::ALL {
            if matches!(kind, ActionKind::NoOp | ActionKind::UserOp | ActionKind::LocalOp) {
                continue;
            }
            let flags = ActionFlags::only(kind, Some("carol"));
            assert_eq!(flags.select().unwrap().0, kind);

            let ok = resolve(&flags, &all_fields()).unwrap();
            assert_eq!(ok.kind(), kind);

            let missing = match kind.dependency() {
                Dependency::None => {
                    assert!(resolve(&flags, &ActionFields::default()).is_ok());
                    continue;
                }
                Dependency::Source => ActionFields { src: None, ..all_fields() },
                Dependency::Destination => ActionFields { dst: None, ..all_fields() },
                Dependency::Both => ActionFields { src: None, ..all_fields() },
                Dependency::Permission => ActionFields { perm: None, ..all_fields() },
            };
            let e = resolve(&flags, &missing).unwrap_err();
            assert!(matches!(e, Error::MissingField { .. }), "{kind}: {e:?}");
        }

        let e = resolve(&ActionFlags::only(ActionKind::Put, None),
            &ActionFields { dst: None, ..all_fields() }).unwrap_err();
        assert_eq!(e.to_string(), "Command \"--put\" requires \"--src\" and \"--dst\" argument");
    }

    #[test]
    fn wrapper_collapsing() {
        let a = resolve_kind(ActionKind::CreateUser, &all_fields()).unwrap();
        assert_eq!(a, Action::User(UserSubAction::Create));
        assert_eq!(a.opcode(), ActionKind::UserOp);
        assert_eq!(a.user_flag(), ActionKind::CreateUser);

        let a = resolve_kind(ActionKind::LocalLs, &all_fields()).unwrap();
        assert_eq!(a.opcode(), ActionKind::LocalOp);
        assert_eq!(a.user_flag(), ActionKind::LocalLs);

        let a = resolve_kind(ActionKind::Get, &all_fields()).unwrap();
        assert_eq!(a.opcode(), ActionKind::Get);
        assert_eq!(a.user_flag(), ActionKind::NoOp);

        assert_eq!(Action::Authenticate.opcode(), ActionKind::LocalOp);
        assert_eq!(Action::Authenticate.user_flag(), ActionKind::NoOp);
    }

    #[test]
    fn resolution_idempotent() {
        for &kind in ActionKind::ALL {
            let flags = ActionFlags::only(kind, Some("dave"));
            let a = resolve(&flags, &all_fields()).ok();
            let b = resolve(&flags, &all_fields()).ok();
            assert_eq!(a, b);
        }
    }
}
