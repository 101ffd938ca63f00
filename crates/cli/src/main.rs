//! Attest CLI: sign files with comment-embedded signature blocks and verify
//! them.
//!
//! ```text
//! attest -a signed,reviewed -f python -w build.py   # append a block
//! attest -c build.py                                # verify the last block
//! attest -k build.py                                # print the signer's key
//! ```
//!
//! Installed (or linked) as `acheck`, the tool verifies by default.

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use attest_common::error::EXIT_SUCCESS;
use attest_common::settings::Settings;
use clap::{ArgGroup, Parser};

mod commands;
mod error;
mod input;

use commands::OutputFormat;
use error::CliError;

/// Exit status for malformed command lines. Kept clear of the verification
/// statuses so scripts can tell the two apart.
const EXIT_USAGE: u8 = 64;

/// Program name that selects verify mode.
const CHECK_COMMAND: &str = "acheck";

#[derive(Parser, Debug)]
#[command(name = "attest")]
#[command(about = "Sign files with comment-embedded signatures and verify them")]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["check", "key", "list", "list_formats"])))]
struct Cli {
    /// File to sign or check ("-" for standard input)
    #[arg(conflicts_with = "input")]
    file: Option<PathBuf>,

    /// Input file, used when FILE is not given
    #[arg(short, long, default_value = input::STDIN)]
    input: PathBuf,

    /// Comma separated assertions to sign
    #[arg(short, long = "assert", value_name = "CSV")]
    assertions: Option<String>,

    /// Comment format of the file (see --list-formats)
    #[arg(short, long, value_name = "NAME")]
    format: Option<String>,

    /// RSA private key (PEM or OpenSSH)
    #[arg(short, long, value_name = "PATH")]
    private_key: Option<PathBuf>,

    /// Public key text embedded in the block
    #[arg(short = 'b', long, value_name = "PATH")]
    public_key: Option<PathBuf>,

    /// Trust store, one public key per line
    #[arg(short, long, value_name = "PATH")]
    trusted_keys: Option<PathBuf>,

    /// Settings file
    #[arg(long, value_name = "TOML", env = "ATTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Append the block to FILE instead of printing it
    #[arg(short = 'w', long, requires = "file", conflicts_with = "mode")]
    in_place: bool,

    /// Verify the last signature block
    #[arg(short, long)]
    check: bool,

    /// Print the public key of the last signature block
    #[arg(short, long)]
    key: bool,

    /// List every signature block without verifying
    #[arg(long)]
    list: bool,

    /// List the supported comment formats
    #[arg(long)]
    list_formats: bool,

    /// Output format for --check, --list and --list-formats
    #[arg(long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Sign,
    Check,
    Key,
    List,
    ListFormats,
}

impl Cli {
    fn mode(&self, check_by_default: bool) -> Mode {
        if self.list_formats {
            Mode::ListFormats
        } else if self.list {
            Mode::List
        } else if self.key {
            Mode::Key
        } else if self.check || (check_by_default && !self.in_place) {
            Mode::Check
        } else {
            Mode::Sign
        }
    }

    fn input_path(&self) -> &Path {
        self.file.as_deref().unwrap_or(&self.input)
    }

    /// Settings for the current user with command line flags applied last.
    fn settings(&self) -> Result<Settings, CliError> {
        let home = env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
        let mut settings = Settings::load(&home, self.config.as_deref())?;

        if let Some(path) = &self.private_key {
            settings.keys.private_key.clone_from(path);
        }
        if let Some(path) = &self.public_key {
            settings.keys.public_key.clone_from(path);
        }
        if let Some(path) = &self.trusted_keys {
            settings.keys.trusted_keys.clone_from(path);
        }
        if let Some(format) = &self.format {
            settings.signing.format.clone_from(format);
        }
        if let Some(assertions) = &self.assertions {
            settings.signing.assertions.clone_from(assertions);
        }

        Ok(settings)
    }
}

fn invoked_as_check(program: &Path) -> bool {
    program
        .file_stem()
        .is_some_and(|stem| stem == CHECK_COMMAND)
}

fn main() -> ExitCode {
    let args: Vec<_> = env::args_os().collect();
    let check_by_default = args
        .first()
        .is_some_and(|program| invoked_as_check(Path::new(program)));

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version also arrive here, on stdout.
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() {
                EXIT_USAGE
            } else {
                EXIT_SUCCESS
            });
        }
    };

    init_logger(cli.verbose);

    let mode = cli.mode(check_by_default);
    let mut out = io::stdout().lock();
    let result = run(&cli, mode, &mut out).and_then(|code| {
        out.flush()?;
        Ok(code)
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if let CliError::Attest(report) = &e {
                log::debug!("{report:?}");
            }
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli, mode: Mode, out: &mut impl Write) -> Result<u8, CliError> {
    let path = cli.input_path();

    match mode {
        Mode::Sign => {
            let settings = cli.settings()?;
            let content = input::read_input(path)?;
            let block = commands::sign(&content, &settings)?;
            if cli.in_place {
                input::append_block(path, &block)?;
            } else {
                out.write_all(block.as_bytes())?;
            }
            Ok(EXIT_SUCCESS)
        }
        Mode::Check => {
            let settings = cli.settings()?;
            let content = input::read_input(path)?;
            commands::check(&content, &settings.keys.trusted_keys, cli.output, out)
        }
        Mode::Key => commands::extract_key(&input::read_input(path)?, out),
        Mode::List => commands::list(&input::read_input(path)?, cli.output, out),
        Mode::ListFormats => commands::list_formats(cli.output, out),
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(io::stderr())
        .apply();

    if let Err(e) = result {
        eprintln!("Failed to initialize logger: {}", e);
    }
}
