use std::{io, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use ls8::{
    emu::emulator::Emulator,
    loader::{self, LoadError},
};

/// Exit code for fatal errors raised while the program runs.
const EXIT_RUNTIME: u8 = 1;
/// Exit code for a program path that doesn't exist.
const EXIT_FILE_NOT_FOUND: u8 = 2;
/// Exit code for a program file that can't be read or parsed.
const EXIT_LOAD: u8 = 3;
/// Exit code for a bad command line (`EX_USAGE`).
const EXIT_USAGE: u8 = 64;

#[derive(Parser, Debug)]
#[command(name = "ls8", author, version, about = "LS-8 emulator")]
struct Cli {
    /// Program to run, one binary literal per line.
    program: PathBuf,

    /// Raise the log level (-v info, -vv debug, -vvv trace). Logs go to stderr.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also come through here
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    init_logger(cli.verbose)?;
    let program = loader::load_file(&cli.program)?;
    let mut emu = Emulator::new(&program, io::stdout().lock())
        .context("failed to place program in memory")?;
    emu.run_until_halt().with_context(|| {
        format!(
            "execution aborted after {} instructions (pc={:#04x})",
            emu.steps(),
            emu.pc
        )
    })?;
    Ok(())
}

fn init_logger(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => simplelog::LevelFilter::Warn,
        1 => simplelog::LevelFilter::Info,
        2 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
    .context("failed to initialize logger")
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LoadError>() {
        Some(LoadError::NotFound { .. }) => EXIT_FILE_NOT_FOUND,
        Some(_) => EXIT_LOAD,
        None => EXIT_RUNTIME,
    }
}
