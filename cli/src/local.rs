//! Client side filesystem actions, run once the server has accepted the login.

#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use anyhow::{bail, Result};

use std::io::ErrorKind;
use std::path::Path;

use rfm::LocalSubAction;

use crate::listing;

/// Performs `action` on `path`, returning the text to show
pub fn run(action: LocalSubAction, path: &Path) -> Result<String> {
    debug!("local {action:?} {}", path.display());
    match action {
        LocalSubAction::Ls => ls(path),
        LocalSubAction::Mkdir => mkdir(path).map(Into::into),
        LocalSubAction::Delete => delete(path).map(Into::into),
    }
}

pub fn ls(path: &Path) -> Result<String> {
    let records = listing::local_listing(path)?;
    let entries = listing::parse_listing(&records)?;
    Ok(listing::format_listing(&entries))
}

/// Creates a single directory, parents must already exist
pub fn mkdir(path: &Path) -> Result<&'static str> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok("Created directory"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            bail!("Path is missing parent directories. Make those directories first")
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!("The directory you are attempting to create already exists")
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes a file or an empty directory
pub fn delete(path: &Path) -> Result<&'static str> {
    let r = if path.is_file() {
        std::fs::remove_file(path).map(|_| "Deleted file")
    } else {
        std::fs::remove_dir(path).map(|_| "Deleted directory")
    };
    match r {
        Ok(m) => Ok(m),
        Err(e) if e.kind() == ErrorKind::NotFound => bail!("File not found"),
        Err(e) => Err(e.into()),
    }
}
