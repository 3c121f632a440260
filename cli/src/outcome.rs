//! Presents responses to the user, finishing the work for actions
//! that need more than the server's reply.

#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use anyhow::{Context, Result};

use std::io::Write;

use rfm::{Action, Response};

use crate::{listing, local};

/// Writes the result of `resp` to `out`.
///
/// A listing is formatted, a download is saved, and a local action
/// is performed once the login succeeded.
pub fn show<W: Write>(resp: &Response, out: &mut W) -> Result<()> {
    if !resp.successful() {
        writeln!(out, "[!] {resp}")?;
        debug!("status {}", resp.status());
        return Ok(());
    }

    let req = resp.request();
    match req.action() {
        Action::Ls => {
            writeln!(out, "[+] {resp}")?;
            if let Some(text) = resp.payload_text() {
                let entries = listing::parse_listing(&text)?;
                write!(out, "{}", listing::format_listing(&entries))?;
            }
        }
        Action::Get => {
            let saved = resp.save_file()?;
            if saved.written() {
                writeln!(out, "[+] {saved}")?;
            } else {
                writeln!(out, "[!] {saved}")?;
            }
        }
        Action::Local(l) => {
            let path = req.src().context("Local action without a path")?;
            match local::run(l, path) {
                Ok(m) => write!(out, "{}", with_newline(m))?,
                Err(e) => writeln!(out, "[!] {e:#}")?,
            }
        }
        _ => writeln!(out, "[+] {resp}")?,
    }
    Ok(())
}

fn with_newline(mut s: String) -> String {
    if !s.ends_with('\n') {
        s.push('\n');
    }
    s
}
