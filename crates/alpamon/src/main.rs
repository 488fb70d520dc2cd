//! Entry point: `alpamon` with no arguments runs the daemon (the shape
//! systemd's `ExecStart` invokes it in); `install`/`uninstall`/`configure`
//! run the one-shot service-management subcommands.

mod cli;
mod handlers;
mod pidfile;
mod supervisor;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "alpamon", about = "Host-resident management agent")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Install and start the systemd service.
    Install,
    /// Stop and remove the systemd service.
    Uninstall,
    /// Write a default config if missing, then open it in an editor.
    Configure,
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();
}

fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Install) => {
            if let Err(e) = cli::install() {
                eprintln!("install failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Command::Uninstall) => {
            if let Err(e) = cli::uninstall() {
                eprintln!("uninstall failed: {e}");
                std::process::exit(1);
            }
        }
        Some(Command::Configure) => {
            if let Err(e) = cli::configure() {
                eprintln!("configure failed: {e}");
                std::process::exit(1);
            }
        }
        None => run_daemon(),
    }
}

/// Runs the supervisor's startup sequence and main loop, on a
/// multi-threaded Tokio runtime: parallel threads of execution, not a
/// single cooperative-scheduling loop.
fn run_daemon() {
    init_logging(std::env::var("ALPAMON_DEBUG").is_ok());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    let restart_requested = match runtime.block_on(supervisor::run()) {
        Ok(restart) => restart,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            std::process::exit(1);
        }
    };

    drop(runtime);

    if restart_requested {
        reexec();
    }
}

/// On `restart_requested`, re-execs the agent process with the original
/// argv rather than forking and exiting.
fn reexec() -> ! {
    let exe = std::env::current_exe().unwrap_or_else(|_| "alpamon".into());
    let args: Vec<String> = std::env::args().skip(1).collect();

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let err = std::process::Command::new(exe).args(&args).exec();
        eprintln!("re-exec failed: {err}");
        std::process::exit(1);
    }

    #[cfg(not(unix))]
    {
        let status = std::process::Command::new(exe).args(&args).status();
        std::process::exit(status.map(|s| s.code().unwrap_or(1)).unwrap_or(1));
    }
}
