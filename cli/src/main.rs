#[allow(unused_imports)]
use log::{debug, error, info, log, trace, warn};

use anyhow::{Context, Result};
use argh::FromArgs;

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use rfm::{action, ActionFields, ActionFlags, Request, RequestParams, Response, Session, UserPermission};

use zeroize::Zeroizing;

use simplelog::*;
use time::UtcOffset;

mod listing;
mod local;
mod outcome;
mod shell;
mod transport;

use transport::{Exchange, TcpTransport};

#[derive(argh::FromArgs, Debug)]
/** RFM remote file management client.
Exactly one command flag must be given.
 */
struct Args {
    #[argh(switch, short='v')]
    /// verbose debug logging
    debug: bool,

    #[argh(switch)]
    /// more verbose
    trace: bool,

    #[argh(option)]
    /// log to a file
    tracefile: Option<String>,

    #[argh(option, short='i')]
    /// server address
    host: String,

    #[argh(option, short='p')]
    /// server port
    port: u16,

    #[argh(option, short='u')]
    /// username
    username: String,

    #[argh(option)]
    /// local path
    src: Option<PathBuf>,

    #[argh(option)]
    /// remote path
    dst: Option<String>,

    #[argh(option)]
    /// permission for a new account: read, read_write or admin
    perm: Option<UserPermission>,

    #[argh(option, default="10")]
    /// network timeout in seconds
    timeout: u64,

    #[argh(switch)]
    /// list the remote directory --dst
    ls: bool,

    #[argh(switch)]
    /// download remote file --dst into local directory --src
    get: bool,

    #[argh(switch)]
    /// upload local file --src into remote directory --dst
    put: bool,

    #[argh(switch)]
    /// create the remote directory --dst
    mkdir: bool,

    #[argh(switch)]
    /// delete the remote file or directory --dst
    delete: bool,

    #[argh(option)]
    /// create an account with permission --perm
    create_user: Option<String>,

    #[argh(option)]
    /// delete an account
    delete_user: Option<String>,

    #[argh(switch)]
    /// log in and start an interactive shell
    shell: bool,

    #[argh(switch)]
    /// list the local directory --src
    l_ls: bool,

    #[argh(switch)]
    /// delete the local file or directory --src
    l_delete: bool,

    #[argh(switch)]
    /// create the local directory --src
    l_mkdir: bool,
}

impl Args {
    fn actions(&self) -> ActionFlags {
        ActionFlags {
            shell: self.shell,
            ls: self.ls,
            get: self.get,
            put: self.put,
            mkdir: self.mkdir,
            delete: self.delete,
            local_ls: self.l_ls,
            local_delete: self.l_delete,
            local_mkdir: self.l_mkdir,
            create_user: self.create_user.clone(),
            delete_user: self.delete_user.clone(),
        }
    }

    fn fields(&self) -> ActionFields {
        ActionFields {
            src: self.src.clone(),
            dst: self.dst.clone(),
            perm: self.perm,
        }
    }
}

fn main() {
    // read before any threads start
    let tz = UtcOffset::current_local_offset()
    .unwrap_or(UtcOffset::UTC);

    let args: Args = argh::from_env();

    if let Err(e) = run(args, tz) {
        error!("Exit with error: {e:?}");
        eprintln!("[!] {e:#}");
        std::process::exit(1)
    }
}

fn run(args: Args, tz: UtcOffset) -> Result<()> {
    setup_log(&args, tz)?;
    trace!("tracing rfmc. args {:?}", args);

    let actions = args.actions();
    let fields = args.fields();
    // reject bad flags before prompting
    let action = action::resolve(&actions, &fields)?;
    debug!("action {action:?}");

    let password = prompt(&format!("password for {}: ", args.username))?;
    let other_password = match &actions.create_user {
        Some(u) if !u.is_empty() => Some(prompt(&format!("password for new user {u}: "))?),
        _ => None,
    };

    let params = RequestParams {
        password,
        other_password,
        actions,
        fields,
        ..RequestParams::new(&args.host, args.port, &args.username)
    };
    let req = Request::new(params)?;

    let mut transport = TcpTransport::new(Duration::from_secs(args.timeout));
    let b = transport.exchange(&req)
        .with_context(|| format!("Request to {}:{}", args.host, args.port))?;
    let resp = Response::parse(&req, &b)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if req.shell_mode() && resp.successful() {
        writeln!(out, "[+] {resp}")?;
        let mut session = Session::from_request(&req);
        session.update_session(&resp);
        let mut sh = shell::Shell::new(session, transport);
        let stdin = std::io::stdin();
        sh.run(stdin.lock(), &mut out)?;
    } else {
        outcome::show(&resp, &mut out)?;
    }
    Ok(())
}

fn prompt(p: &str) -> Result<Zeroizing<String>> {
    let pw = rpassword::prompt_password(p).context("Reading password")?;
    Ok(Zeroizing::new(pw))
}

fn setup_log(args: &Args, tz: UtcOffset) -> Result<()> {
    let mut conf = simplelog::ConfigBuilder::new();
    let conf = conf
    .add_filter_allow_str("rfm")
    .add_filter_allow_str("rfmc")
    .set_time_offset(tz)
    .build();

    let level = if args.trace {
        LevelFilter::Trace
    } else if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let mut logs: Vec<Box<dyn SharedLogger>> = vec![
        TermLogger::new(level, conf.clone(), TerminalMode::Stderr, ColorChoice::Auto),
    ];

    if let Some(tf) = args.tracefile.as_ref() {
        let w = std::fs::File::create(tf).with_context(|| format!("Error opening {tf}"))?;
        logs.push(WriteLogger::new(LevelFilter::Trace, conf, w));
    }

    CombinedLogger::init(logs).context("Setting up logging")?;
    Ok(())
}
