use clap::{ArgAction, Parser, Subcommand};
use rv32sim::db::{Debugger, SimConfig, Simulator, builtin_image};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

//===========================================================================//

#[derive(Parser)]
#[clap(author, about, long_about = None, version)]
struct Cli {
    /// Show debug messages on stderr.
    #[clap(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulates and debugs a raw RV32IM binary image.
    Db {
        /// The binary image to load at 0x80000000, or none for the built-in
        /// test program.
        image: Option<PathBuf>,
        /// The debugger script to run, or none for interactive mode.
        script: Option<PathBuf>,
        /// Run the program to completion without reading any commands.
        #[clap(short, long)]
        batch: bool,
        /// Write every log message, including the instruction trace, to
        /// this file.
        #[clap(short, long, value_name = "FILE")]
        log: Option<PathBuf>,
        /// Check every instruction against the built-in reference model.
        #[clap(short, long)]
        diff: bool,
        /// The amount of guest RAM, in MiB.
        #[clap(long, value_name = "MIB", default_value_t = 128)]
        mem_size: usize,
    },
}

//===========================================================================//

fn main() -> io::Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Command::Db { image, script, batch, log, diff, mem_size } => {
            rv32sim::logger::init(cli.verbose, log.as_deref())?;
            if mem_size == 0 || mem_size > 2048 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("memory size must be 1 to 2048 MiB, not {mem_size}"),
                ));
            }
            let config = SimConfig {
                mem_size: mem_size << 20,
                batch,
                difftest: diff,
            };
            let sim = match image {
                Some(ref path) => {
                    let file = File::open(path)?;
                    Simulator::new(&config, io::BufReader::new(file))?
                }
                None => {
                    log::info!("No image is given. Use the default build-in image.");
                    Simulator::new(&config, io::Cursor::new(builtin_image()))?
                }
            };
            let mut debugger = Debugger::new(sim);
            if config.batch {
                debugger.run_batch()?;
            } else if let Some(path) = script {
                let file = File::open(path)?;
                debugger.run_script(io::BufReader::new(file))?;
            } else {
                debugger.run_interactive()?;
            }
            log::logger().flush();
            if debugger.sim().is_exit_status_bad() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

//===========================================================================//
