//! Wiretap driver — run a build command with the interception shim
//! installed and surface the build's exit code as our own.
//!
//! The driver's only jobs are to locate the shim and the relay, install
//! the session variables in the build's environment, spawn the build, and
//! wait. Everything the build does afterwards is observed in-process by
//! the shim and reported by the relay.

mod inject;
mod process;

use std::ffi::CString;
use std::path::PathBuf;
use std::process::exit;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};

#[derive(Parser)]
#[command(name = "wiretap")]
#[command(version, about = "Record every process a build creates")]
struct Cli {
    /// Forward verbose reporting to the relay
    #[arg(short, long)]
    verbose: bool,

    /// Report destination (defaults to a unique file in the temp directory)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Shim library to preload into the build
    #[arg(long, value_name = "PATH")]
    library: Option<PathBuf>,

    /// Relay program that receives intercepted calls
    #[arg(long, value_name = "PATH")]
    reporter: Option<PathBuf>,

    /// The build command to observe
    #[arg(required = true, trailing_var_arg = true, value_name = "COMMAND")]
    command: Vec<String>,
}

fn run(args: Cli) -> Result<i32> {
    let library = match args.library {
        Some(path) => path,
        None => inject::find_shim_library()?,
    };
    let reporter = match args.reporter {
        Some(path) => path,
        None => inject::find_relay()?,
    };
    let destination = match args.output {
        Some(path) if path.is_absolute() => path,
        Some(path) => process::get_cwd()
            .context("Cannot resolve relative output path")?
            .join(path),
        None => {
            let prefix = std::env::temp_dir().join("wiretap-");
            let unique = process::temp_file(
                prefix.to_str().context("temp directory is not UTF-8")?,
                ".report",
            )?;
            info!("report destination: {}", unique.path.display());
            unique.path
        }
    };

    debug!(
        "driver pid {} (parent {}), shim {}, relay {}",
        process::get_pid(),
        process::get_ppid(),
        library.display(),
        reporter.display()
    );

    let argv: Vec<CString> = args
        .command
        .iter()
        .map(|arg| CString::new(arg.as_str()))
        .collect::<std::result::Result<_, _>>()
        .context("Build command contains a nul byte")?;
    let envp = inject::session_environment(&destination, &library, &reporter, args.verbose);

    // A path-qualified command spawns directly; a bare name goes through
    // the platform's search path.
    let pid = if args.command[0].contains('/') {
        process::spawn(&argv, &envp)?
    } else {
        process::spawnp(&argv[0], &argv, &envp)?
    };
    debug!("build started, pid {pid}");

    let code = process::wait_pid(pid)?;
    debug!("build finished with exit code {code}");
    Ok(code)
}

fn main() {
    let args = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "warn" }),
    )
    .init();

    match run(args) {
        Ok(code) => exit(code),
        Err(err) => {
            error!("{err:#}");
            exit(1);
        }
    }
}
