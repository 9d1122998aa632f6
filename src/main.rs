#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use log::*;
use structopt::StructOpt;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////

const EXIT_USAGE: i32 = 1;
const EXIT_FAILURE: i32 = 2;
const EXIT_TERMINAL: i32 = 3;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "gziptext",
    about = "Convert a gzip file into annotated text and back",
    after_help = "EXAMPLE:\n    gziptext -o example.txt example.gz\n    gziptext -R -o example.gz example.txt"
)]
struct Opts {
    /// Reverse operation: convert annotated text back to gzip binary
    #[structopt(short = "R", long)]
    reverse: bool,

    /// Output file path (default: stdout)
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[structopt(short, long, parse(from_occurrences))]
    verbose: usize,

    /// Silence all log output
    #[structopt(short, long)]
    quiet: bool,

    /// Input file (default: stdin)
    #[structopt(parse(from_os_str))]
    input: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no input file given and stdin is a terminal, see --help")]
    NoInput,
    #[error("refusing to write gzip binary to a terminal, use -o or redirect stdout")]
    BinaryToTerminal,
}

////////////////////////////////////////////////////////////////////////////////

fn open_input(path: &Option<PathBuf>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open input file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None if io::stdin().is_terminal() => Err(CliError::NoInput.into()),
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn open_output(path: &Option<PathBuf>, binary: bool) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None if binary && io::stdout().is_terminal() => Err(CliError::BinaryToTerminal.into()),
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn run(opts: &Opts) -> Result<()> {
    let input = open_input(&opts.input)?;
    let output = open_output(&opts.output, opts.reverse)?;

    if opts.reverse {
        info!("converting text to gzip");
        gziptext::decode(input, output).context("cannot convert text to gzip")
    } else {
        info!("converting gzip to text");
        gziptext::encode(input, output).context("cannot convert gzip to text")
    }
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::NoInput) => EXIT_USAGE,
        Some(CliError::BinaryToTerminal) => EXIT_TERMINAL,
        None => EXIT_FAILURE,
    }
}

/// Printed even under `-q`, which only silences the log.
fn failure_message(err: &anyhow::Error) -> String {
    format!("gziptext: {:#}", err)
}

fn main() {
    let opts = Opts::from_args();

    if let Err(err) = stderrlog::new()
        .module(module_path!())
        .quiet(opts.quiet)
        .verbosity(opts.verbose)
        .init()
    {
        eprintln!("gziptext: cannot set up logging: {}", err);
    }

    if let Err(err) = run(&opts) {
        eprintln!("{}", failure_message(&err));
        process::exit(exit_code(&err));
    }
}

////////////////////////////////////////////////////////////////////////////////
