//! Soft-core loader CLI.
//!
//! This binary drives the external core from the command line. It performs:
//! 1. **Run:** Load an image into the shared buffer, start the core, wait, and print
//!    the checkpoint dumps (or a JSON summary).
//! 2. **Inspect:** Decode an image file and print its words without touching hardware.
//! 3. **Config:** Print the default configuration as JSON, as a starting point.
//!
//! Logging goes to stderr and is filtered with `RVBOOT_LOG` (default `info`).

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use rvboot_core::config::{BufferBacking, Config};
use rvboot_core::core::WaitPolicy;
use rvboot_core::sim::{ImageFormat, InstructionImage, Session, SessionSummary};
use rvboot_core::soc::RegisterBus;
use rvboot_core::soc::builder;
use rvboot_core::{ControllerError, CoreController};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "RVBOOT_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "rvboot",
    author,
    version,
    about = "Load and run programs on a memory-mapped soft RISC-V core",
    long_about = "Copies an instruction image into a shared buffer, publishes its address to the core, \
asserts run-enable and reports the program counter and buffer contents.\n\nExamples:\n  \
rvboot run --image program.bin\n  \
rvboot run --image program.hex --loopback --wait-ms 100\n  \
rvboot run --image program.elf --config board.json --until-pc-changes 500 --json\n  \
rvboot inspect --image program.hex"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load an image, run it on the core and dump the results.
    Run {
        /// Instruction image (raw binary, hex word list or ELF).
        #[arg(short, long)]
        image: PathBuf,

        /// Image format; detected from contents and extension when omitted.
        #[arg(long)]
        format: Option<ImageFormat>,

        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Use the in-process loopback core instead of real hardware.
        #[arg(long)]
        loopback: bool,

        /// Memory device for register and buffer mappings (overrides the config).
        #[arg(long)]
        device: Option<String>,

        /// Fixed wait in milliseconds (overrides the config).
        #[arg(long, conflicts_with = "until_pc_changes")]
        wait_ms: Option<u64>,

        /// Poll until the PC moves, giving up after this many milliseconds.
        #[arg(long, value_name = "TIMEOUT_MS")]
        until_pc_changes: Option<u64>,

        /// Leave the core running after the wait.
        #[arg(long)]
        keep_running: bool,

        /// Print the session summary as JSON instead of text dumps.
        #[arg(long)]
        json: bool,
    },

    /// Decode an image and print its words.
    Inspect {
        /// Instruction image.
        #[arg(short, long)]
        image: PathBuf,

        /// Image format; detected when omitted.
        #[arg(long)]
        format: Option<ImageFormat>,
    },

    /// Print the default configuration as JSON.
    Config,
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            image,
            format,
            config,
            loopback,
            device,
            wait_ms,
            until_pc_changes,
            keep_running,
            json,
        } => {
            let options = RunOptions {
                loopback,
                device,
                wait_ms,
                until_pc_changes,
                keep_running,
                json,
            };
            cmd_run(&image, format, config, &options)
        }
        Commands::Inspect { image, format } => cmd_inspect(&image, format),
        Commands::Config => cmd_config(),
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Installs a compact stderr subscriber filtered by `RVBOOT_LOG`.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Command-line overrides for `run`.
struct RunOptions {
    loopback: bool,
    device: Option<String>,
    wait_ms: Option<u64>,
    until_pc_changes: Option<u64>,
    keep_running: bool,
    json: bool,
}

impl RunOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.registers.device.clone_from(device);
            if let BufferBacking::Physical { device: mem, .. } =
                &mut config.memory.backing
            {
                mem.clone_from(device);
            }
        }
        if let Some(ms) = self.wait_ms {
            config.run.wait = WaitPolicy::Fixed {
                duration: Duration::from_millis(ms),
            };
        }
        if let Some(ms) = self.until_pc_changes {
            config.run.wait = WaitPolicy::UntilPcChanges {
                timeout: Duration::from_millis(ms),
                poll_interval: Duration::from_millis(10),
            };
        }
        if self.keep_running {
            config.run.stop_after_wait = false;
        }
    }
}

fn cmd_run(
    image_path: &Path,
    format: Option<ImageFormat>,
    config_path: Option<PathBuf>,
    options: &RunOptions,
) -> Result<(), ControllerError> {
    let mut config = match config_path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    options.apply(&mut config);

    let image = InstructionImage::from_file(image_path, format)?;
    let session = Session::from_config(&config);

    let summary = if options.loopback {
        let mut controller = builder::loopback_controller(&config)?;
        run_session(&session, &mut controller, &image)?
    } else {
        run_hardware(&session, &config, &image)?
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Initial PC: {}", summary.initial_pc);
        for report in &summary.reports {
            println!();
            print!("{report}");
        }
        println!();
        println!(
            "Wait: {:?} after {} ms ({} samples), final state: {}",
            summary.outcome.reason,
            summary.outcome.elapsed.as_millis(),
            summary.outcome.samples,
            summary.final_state
        );
    }
    Ok(())
}

#[cfg(unix)]
fn run_hardware(
    session: &Session,
    config: &Config,
    image: &InstructionImage,
) -> Result<SessionSummary, ControllerError> {
    let mut controller = builder::hardware_controller(config)?;
    run_session(session, &mut controller, image)
}

#[cfg(not(unix))]
fn run_hardware(
    _session: &Session,
    _config: &Config,
    _image: &InstructionImage,
) -> Result<SessionSummary, ControllerError> {
    Err(ControllerError::Bus {
        register: "register block",
        reason: "hardware access requires a unix memory device; use --loopback".to_string(),
    })
}

/// Runs `session`, making sure the core is halted if the session fails after start.
fn run_session<B: RegisterBus>(
    session: &Session,
    controller: &mut CoreController<B>,
    image: &InstructionImage,
) -> Result<SessionSummary, ControllerError> {
    session.run(controller, image).inspect_err(|_| {
        if controller.state().is_halted() {
            return;
        }
        if let Err(e) = controller.stop() {
            error!(error = %e, "could not halt the core after a failed session");
        }
    })
}

fn cmd_inspect(image_path: &Path, format: Option<ImageFormat>) -> Result<(), ControllerError> {
    let image = InstructionImage::from_file(image_path, format)?;
    println!("{}: {} words", image_path.display(), image.len());
    if let Some(entry) = image.entry() {
        println!("origin: {:#010x}  entry: {entry:#010x}", image.origin());
    }
    for (index, chunk) in image.words().chunks(8).enumerate() {
        let line = chunk
            .iter()
            .map(|w| format!("{w:08x}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!("{:04x}: {line}", index * 8);
    }
    Ok(())
}

fn cmd_config() -> Result<(), ControllerError> {
    println!("{}", serde_json::to_string_pretty(&Config::default())?);
    Ok(())
}
