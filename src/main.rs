//! Purpose: `memoport` CLI entry point.
//! Role: Binary crate root; parses args, resolves secrets, runs the server.
//! Invariants: Secrets come from flags or `MEMOPORT_*` environment variables
//! Invariants: and are never printed.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.

use std::net::SocketAddr;

use clap::{Args, Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde_json::json;

use memoport::core::error::{Error, ErrorKind, to_exit_code};
use memoport::upstream::DEFAULT_BASE_URL;

mod serve;

use serve::ServeConfig;

#[derive(Parser)]
#[command(
    name = "memoport",
    version,
    about = "Bridge authenticated text posts into a note service's import API"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge server.
    Serve(ServeArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to bind, as host:port.
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,
    /// Shared secret expected as `Authorization: Bearer <token>`.
    #[arg(long)]
    api_token: Option<String>,
    /// Target note-space (project) in the upstream service.
    #[arg(long)]
    project: Option<String>,
    /// Upstream session cookie value proving a logged-in session.
    #[arg(long)]
    session_id: Option<String>,
    /// Upstream base URL; override to point at a test double.
    #[arg(long)]
    upstream_base_url: Option<String>,
    /// Allow binding to a non-loopback address.
    #[arg(long)]
    allow_non_loopback: bool,
}

fn main() {
    let exit_code = match run() {
        Ok(code) => code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<i32, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(exit_code);
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage).with_message(err.to_string()));
            }
        },
    };

    match cli.command {
        Command::Serve(args) => {
            let config = serve_config(args)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve::serve(config))?;
            Ok(0)
        }
    }
}

fn serve_config(args: ServeArgs) -> Result<ServeConfig, Error> {
    let bind: SocketAddr = args.bind.parse().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid bind address")
            .with_hint("Use a host:port value like 127.0.0.1:8787.")
    })?;
    Ok(ServeConfig {
        bind,
        api_token: required(args.api_token, "--api-token", "MEMOPORT_API_TOKEN")?,
        project: required(args.project, "--project", "MEMOPORT_PROJECT")?,
        session_id: required(args.session_id, "--session-id", "MEMOPORT_SESSION_ID")?,
        upstream_base_url: args
            .upstream_base_url
            .or_else(|| std::env::var("MEMOPORT_UPSTREAM_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        allow_non_loopback: args.allow_non_loopback,
    })
}

fn required(flag: Option<String>, flag_name: &str, env_name: &str) -> Result<String, Error> {
    flag.or_else(|| std::env::var(env_name).ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("missing {flag_name}"))
                .with_hint(format!("Provide {flag_name} or set {env_name}."))
        })
}

fn emit_error(err: &Error) {
    let payload = json!({
        "error": {
            "kind": format!("{:?}", err.kind()),
            "message": err.message(),
            "hint": err.hint(),
        }
    });
    eprintln!("{payload}");
}
