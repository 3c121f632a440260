//! Interactive shell, entered after logging in with `--shell`.

#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use anyhow::{anyhow, bail, Result};

use std::io::{BufRead, Write};
use std::path::Path;

use rfm::{ActionKind, LocalSubAction, Response, Session};

use crate::local;
use crate::outcome;
use crate::transport::Exchange;

pub const PROMPT: &str = "rfm> ";

const HELP: &str = "\
Commands:
  ls [DIR]                 list a remote directory
  mkdir DIR                create a remote directory
  delete PATH              delete a remote file or empty directory
  get REMOTE LOCALDIR      download a file
  put LOCALFILE REMOTEDIR  upload a file
  l_ls [DIR]               list a local directory
  l_mkdir DIR              create a local directory
  l_delete PATH            delete a local file or empty directory
  help                     show this text
  exit, quit               leave the shell
";

#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Shell<T: Exchange> {
    session: Session,
    transport: T,
}

impl<T: Exchange> Shell<T> {
    pub fn new(session: Session, transport: T) -> Self {
        Self { session, transport }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Reads commands from `input` until exit, end of input, or the
    /// server ending the session.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, out: &mut W) -> Result<()> {
        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                writeln!(out)?;
                break;
            }
            match self.command(line.trim(), out) {
                Ok(Flow::Continue) => (),
                Ok(Flow::Exit) => break,
                Err(e) => writeln!(out, "[!] {e:#}")?,
            }
        }
        Ok(())
    }

    /// Runs a single command line
    pub fn command<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, args)) = words.split_first() else {
            return Ok(Flow::Continue);
        };

        match cmd {
            "help" | "?" => {
                write!(out, "{HELP}")?;
                return Ok(Flow::Continue);
            }
            "exit" | "quit" => return Ok(Flow::Exit),
            _ => (),
        }

        let kind: ActionKind = cmd.parse()?;
        let arg = |i: usize| {
            args.get(i).copied().ok_or_else(|| anyhow!("\"{cmd}\" is missing arguments, try \"help\""))
        };
        let first_or_cwd = args.first().copied().unwrap_or(".");

        let req = match kind {
            ActionKind::Ls => self.session.ls(first_or_cwd),
            ActionKind::Mkdir => self.session.mkdir(arg(0)?),
            ActionKind::Delete => self.session.delete(arg(0)?),
            ActionKind::Get => self.session.get(arg(0)?, Path::new(arg(1)?))?,
            ActionKind::Put => self.session.put(Path::new(arg(0)?), arg(1)?)?,
            ActionKind::LocalLs => {
                return self.local(LocalSubAction::Ls, Path::new(first_or_cwd), out);
            }
            ActionKind::LocalMkdir => {
                return self.local(LocalSubAction::Mkdir, Path::new(arg(0)?), out);
            }
            ActionKind::LocalDelete => {
                return self.local(LocalSubAction::Delete, Path::new(arg(0)?), out);
            }
            _ => bail!("\"{cmd}\" can't be used in the shell"),
        };

        let b = self.transport.exchange(&req)?;
        let resp = Response::parse(&req, &b)?;
        self.session.update_session(&resp);
        outcome::show(&resp, out)?;

        if resp.status().ends_session() {
            info!("server ended session {}", self.session.session_id());
            writeln!(out, "Session ended")?;
            return Ok(Flow::Exit);
        }
        Ok(Flow::Continue)
    }

    fn local<W: Write>(&self, action: LocalSubAction, path: &Path, out: &mut W) -> Result<Flow> {
        let mut m = local::run(action, path)?;
        if !m.ends_with('\n') {
            m.push('\n');
        }
        write!(out, "{m}")?;
        Ok(Flow::Continue)
    }
}
