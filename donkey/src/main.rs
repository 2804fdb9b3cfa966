//! Command-line entry point for donkey.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use donkey::error::Error;
use donkey::exit_codes;
use donkey::orchestrator::{ExecuteOptions, RunRequest, execute};

/// Like "make" but for the 21st century.
///
/// command(s) are run from the specified definition file or the "closest"
/// definition file found. If no commands are passed the default command is
/// executed. The special command "check" looks for a definition file and
/// checks it is valid but does nothing more; if "check" is included all other
/// commands are skipped.
///
/// "closest" means current directory or nearest direct parent directory;
/// standard definition file names are "donkey.yml/yaml" or
/// "makefile.yml/yaml".
#[derive(Parser, Debug)]
#[command(name = "donkey", version)]
#[command(group(ArgGroup::new("mode").args(["parallel", "serial"])))]
struct Cli {
    /// Groups to run, in order.
    commands: Vec<String>,

    /// Run multiple commands in parallel (default: serial, or `.config`).
    #[arg(long)]
    parallel: bool,

    /// Run multiple commands one after another.
    #[arg(long)]
    serial: bool,

    /// Extra args appended to every command line; invalid in script mode.
    #[arg(short, long, allow_hyphen_values = true)]
    args: Option<String>,

    /// Definition file to use; if absent the closest definition file is used.
    #[arg(short, long, value_parser = existing_file)]
    definition_file: Option<PathBuf>,

    /// Show debug output.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn parallel_override(&self) -> Option<bool> {
        match (self.parallel, self.serial) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("file \"{value}\" does not exist"))
    }
}

fn main() {
    let cli = Cli::parse();
    donkey::logging::init(cli.verbose);
    std::process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("Error: unable to read current directory: {err}");
            return exit_codes::FATAL;
        }
    };
    let options = ExecuteOptions {
        request: RunRequest {
            parallel: cli.parallel_override(),
            commands: cli.commands,
            args: cli.args,
        },
        definition_file: cli.definition_file,
    };

    match execute(&options, &cwd) {
        Ok(_) => exit_codes::OK,
        Err(Error::Config(message)) => {
            eprintln!("Error: {message}");
            exit_codes::CONFIG
        }
        Err(Error::RunFailure {
            message, exit_code, ..
        }) => {
            eprintln!("Error: {message}");
            exit_code
        }
        Err(Error::Io(err)) => {
            eprintln!("Error: {err:#}");
            exit_codes::FATAL
        }
    }
}
