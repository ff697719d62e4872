//! `hull run` — Create and start a container.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use clap::Args;
use hull_common::config::HullConfig;
use hull_common::types::ResourceConfig;
use hull_runtime::process::ContainerProcess;
use hull_runtime::{Engine, RunOptions};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Attach the container to this terminal and wait for it to exit.
    #[arg(short = 't', long, conflicts_with = "detach")]
    pub tty: bool,

    /// Run in the background and print the container id.
    #[arg(short = 'd', long)]
    pub detach: bool,

    /// Memory limit, e.g. `100m`.
    #[arg(short = 'm', long)]
    pub memory: Option<String>,

    /// CPUs the container may run on, e.g. `0-1`.
    #[arg(long)]
    pub cpuset: Option<String>,

    /// Relative CPU weight.
    #[arg(long)]
    pub cpushare: Option<String>,

    /// Container name; defaults to the generated id.
    #[arg(long)]
    pub name: Option<String>,

    /// Volume `hostPath:containerPath`.
    #[arg(short = 'v', long)]
    pub volume: Option<String>,

    /// Environment entry `KEY=VALUE`, repeatable.
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Network to attach to.
    #[arg(long = "net")]
    pub network: Option<String>,

    /// Port mapping `hostPort:containerPort`, repeatable.
    #[arg(short = 'p', long)]
    pub publish: Vec<String>,

    /// Image to build the container root from.
    pub image: String,

    /// Command to run.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub command: Vec<String>,
}

impl RunArgs {
    fn into_options(self) -> RunOptions {
        RunOptions {
            tty: self.tty,
            name: self.name,
            image: self.image,
            command: self.command,
            volume: self.volume,
            env: self.env,
            network: self.network,
            port_mappings: self.publish,
            resources: ResourceConfig {
                memory_limit: self.memory,
                cpu_share: self.cpushare,
                cpu_set: self.cpuset,
            },
        }
    }
}

/// Forwards terminal interrupts to a foreground container.
///
/// The first interrupt sends `SIGTERM`; any further one sends `SIGKILL`,
/// since a container init without handlers ignores `SIGTERM`. The engine
/// keeps waiting and tears the container down once it exits.
#[derive(Debug, Default)]
struct Interrupts {
    pid: AtomicI32,
    presses: AtomicU32,
}

impl Interrupts {
    fn attach(&self, process: ContainerProcess) {
        if let Ok(pid) = i32::try_from(process.pid()) {
            self.pid.store(pid, Ordering::SeqCst);
        }
    }

    fn on_interrupt(&self) {
        let pid = self.pid.load(Ordering::SeqCst);
        if pid <= 0 {
            return;
        }
        let process = ContainerProcess::from_pid(pid);
        let forwarded = if self.presses.fetch_add(1, Ordering::SeqCst) == 0 {
            process.terminate()
        } else {
            process.kill()
        };
        if let Err(e) = forwarded {
            tracing::warn!(pid, error = %e, "failed to forward interrupt");
        }
    }
}

/// Executes the `run` command.
///
/// Foreground containers exit the CLI with the container's exit code.
///
/// # Errors
///
/// Returns an error if the interrupt handler cannot be installed or the
/// container cannot be launched.
pub fn execute(args: RunArgs, config: &HullConfig) -> anyhow::Result<()> {
    let engine = Engine::new(config.clone());
    let opts = args.into_options();

    let outcome = if opts.tty {
        let interrupts = Arc::new(Interrupts::default());
        let handler = Arc::clone(&interrupts);
        ctrlc::set_handler(move || handler.on_interrupt())
            .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;
        engine.run_with(&opts, |process| interrupts.attach(process))?
    } else {
        engine.run(&opts)?
    };

    match outcome.exit_code {
        Some(code) => std::process::exit(code),
        None => {
            println!("{}", outcome.record.id);
            Ok(())
        }
    }
}
