//! Command-line parsing for `capctl`.
//!
//! The command line is parsed with clap into a [`CliInvocation`]; `run`
//! arguments become a [`RunRequest`]. Typed options come first. Everything
//! after the first workload parameter is a workload parameter, so a workload
//! type's parameters need no registration here and may reuse option names:
//!
//! ```text
//! capctl run webservice -n frontend -e dev --port=80 --image nginx --debug
//! ```

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::error::ErrorKind;
use crate::params::RawParam;
use crate::plane::RunRequest;

/// Environment used by `run` when `-e` is not given.
pub const DEFAULT_ENV: &str = "default";

/// Value given to a workload parameter written as a bare switch.
pub const SWITCH_VALUE: &str = "true";

/// Discover, inspect and run workload capabilities.
#[derive(Debug, Parser)]
#[command(name = "capctl", version, about = "Capability control-plane client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List traits, optionally for one workload type.
    #[command(alias = "trait")]
    Traits {
        /// Only traits that apply to this workload type.
        #[arg(short, long)]
        workload: Option<String>,
    },
    /// List workload types.
    #[command(alias = "workload")]
    Workloads,
    /// Show one workload type by name or short alias.
    Show {
        name: String,
    },
    /// Stage or apply a workload.
    Run(RunArgs),
    /// List environments.
    #[command(alias = "env")]
    Envs,
    /// Print the version.
    Version,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Workload type name or short alias.
    pub workload_type: String,

    /// Resource name (defaults to the app group, then the workload type).
    #[arg(short, long)]
    pub name: Option<String>,

    /// Target environment.
    #[arg(short, long, default_value = DEFAULT_ENV)]
    pub env: String,

    /// Application group.
    #[arg(short, long)]
    pub app: Option<String>,

    /// Render without writing to the store.
    #[arg(short, long)]
    pub staging: bool,

    /// Workload parameters: `--name=value`, `--name value` or `--switch`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "PARAMS")]
    pub params: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Usage(#[from] clap::Error),

    #[error("workload parameter `{0}` must be written as --name[=value]")]
    Parameter(String),
}

/// A fully parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliInvocation {
    Traits { workload: String },
    Workloads,
    Show { name: String },
    Run(RunRequest),
    Envs,
    Version,
}

/// Parse `args` (without the program name).
pub fn parse_args<S: AsRef<str>>(args: &[S]) -> Result<CliInvocation, CliError> {
    let cli = Cli::try_parse_from(std::iter::once("capctl").chain(args.iter().map(|a| a.as_ref())))?;
    Ok(match cli.command {
        Command::Traits { workload } => CliInvocation::Traits {
            workload: workload.unwrap_or_default(),
        },
        Command::Workloads => CliInvocation::Workloads,
        Command::Show { name } => CliInvocation::Show { name },
        Command::Run(run) => CliInvocation::Run(run.into_request()?),
        Command::Envs => CliInvocation::Envs,
        Command::Version => CliInvocation::Version,
    })
}

impl RunArgs {
    /// Map onto the request shape shared with the HTTP API.
    pub fn into_request(self) -> Result<RunRequest, CliError> {
        Ok(RunRequest {
            env_name: self.env,
            workload_name: self.name.unwrap_or_default(),
            workload_type: self.workload_type,
            app_group: self.app.unwrap_or_default(),
            staging: self.staging,
            parameters: parse_params(&self.params)?,
        })
    }
}

/// Turn trailing `--name=value`, `--name value` and `--switch` tokens into
/// raw parameters, in order.
fn parse_params(tokens: &[String]) -> Result<Vec<RawParam>, CliError> {
    let mut params = Vec::new();
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        let body = token
            .strip_prefix("--")
            .filter(|b| !b.is_empty() && !b.starts_with('='))
            .ok_or_else(|| CliError::Parameter(token.clone()))?;

        match body.split_once('=') {
            Some((name, value)) => params.push(RawParam::new(name, value)),
            None => {
                let value = iter
                    .next_if(|next| is_value(next))
                    .map(String::as_str)
                    .unwrap_or(SWITCH_VALUE);
                params.push(RawParam::new(body, value));
            }
        }
    }
    Ok(params)
}

/// A separate value token is neither `--long` nor a short option like `-e`.
/// Negative numbers such as `-1` are values.
fn is_value(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some('-'), Some(c)) => c.is_ascii_digit() || c == '.',
        _ => true,
    }
}

/// Process exit code for a failed request.
pub fn exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::ValidationError => 2,
        ErrorKind::NotFoundError => 3,
        ErrorKind::RegistryFetchError => 4,
        ErrorKind::KindMismatchError => 5,
        ErrorKind::ApplyError => 6,
        ErrorKind::CancelledError => 130,
    }
}

/// Exit code for a command line that did not parse.
pub const USAGE_EXIT_CODE: i32 = 64;
