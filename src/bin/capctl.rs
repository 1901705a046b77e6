//! capctl: command-line front end for the control plane.
//!
//! Prints JSON on stdout. Failures print an error body on stderr and exit
//! with a code per error kind; see [`capplane::cli::exit_code`].
//!
//! # Environment Variables
//!
//! - `CAPPLANE_CONFIG`: Configuration file (default: `capplane.yaml`)
//! - `RUST_LOG`: Log filter (default: "warn")

use std::process::ExitCode;

use anyhow::Context;
use serde::Serialize;

use capplane::cli::{self, CliError, CliInvocation};
use capplane::{CapabilityKind, ControlPlane, PlaneConfig, PlaneError};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match cli::parse_args(&args) {
        Ok(invocation) => invocation,
        Err(CliError::Usage(e)) => {
            let _ = e.print();
            return if e.use_stderr() {
                exit(cli::USAGE_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            };
        }
        Err(e) => {
            eprintln!("capctl: {}", e);
            return exit(cli::USAGE_EXIT_CODE);
        }
    };

    if invocation == CliInvocation::Version {
        println!("capctl {}", capplane::VERSION);
        return ExitCode::SUCCESS;
    }

    let plane = match load_plane() {
        Ok(plane) => plane,
        Err(e) => {
            eprintln!("capctl: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match dispatch(&plane, invocation).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = e.to_body();
            match serde_json::to_string_pretty(&body) {
                Ok(json) => eprintln!("{}", json),
                Err(_) => eprintln!("capctl: {}", e),
            }
            exit(cli::exit_code(body.kind))
        }
    }
}

fn load_plane() -> anyhow::Result<ControlPlane> {
    let config = PlaneConfig::from_env().context("Failed to load configuration")?;
    ControlPlane::from_config(&config).context("Failed to build control plane")
}

async fn dispatch(plane: &ControlPlane, invocation: CliInvocation) -> Result<(), PlaneError> {
    match invocation {
        CliInvocation::Traits { workload } => print_json(&plane.list_traits(&workload).await?),
        CliInvocation::Workloads => print_json(&plane.list_workloads().await?),
        CliInvocation::Show { name } => {
            print_json(&plane.get_capability(CapabilityKind::Workload, &name).await?)
        }
        CliInvocation::Envs => print_json(plane.environments()),
        CliInvocation::Run(request) => {
            let interrupted = async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            print_json(&plane.run_until(request, interrupted).await?)
        }
        CliInvocation::Version => {
            println!("capctl {}", capplane::VERSION);
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to encode output: {}", e),
    }
}

fn exit(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
