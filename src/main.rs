// Entrypoint for the CLI application.
// - Keeps `main` small: parse arguments, build the API client, dispatch.
// - `run` works in `anyhow::Result`; `main` turns failures into `[!]` lines
//   and a non-zero exit status.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::builder::NonEmptyStringValueParser;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use jabbercracky_client::api::{check_id, ApiClient};
use jabbercracky_client::auto_submit::{cancel_token, AutoSubmitter};
use jabbercracky_client::config::{ClientConfig, DEFAULT_BASE_URL};
use jabbercracky_client::ledger::Ledger;
use jabbercracky_client::{logging, ui};

/// Flags historically spelled with a single dash (`-id 12`).
const LEGACY_FLAGS: [&str; 2] = ["id", "file"];

/// Longest accepted pause between auto-submit rounds: one week.
const MAX_INTERVAL_MINS: u64 = 7 * 24 * 60;

#[derive(Parser, Debug)]
#[command(
    name = "jabbercracky-client",
    version,
    about = "Command-line client for the Jabbercracky hash list game",
    after_help = "Credentials are read from JABBERCRACKY_API_KEY, or from ~/.jabbercracky when it is unset.",
    arg_required_else_help = true
)]
struct Cli {
    /// API base URL
    #[arg(long, global = true, env = "JABBERCRACKY_API_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Log requests and loop progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists all available hash lists.
    List,
    /// Downloads the hash list with the given ID to <ID>.left.
    Download {
        /// Hash List ID
        #[arg(long, value_parser = NonEmptyStringValueParser::new())]
        id: String,
    },
    /// Submits the results file to the hash list with the given ID.
    Submit {
        /// Hash List ID
        #[arg(long, value_parser = NonEmptyStringValueParser::new())]
        id: String,
        /// File path
        #[arg(long)]
        file: PathBuf,
    },
    /// Submits the results file every few minutes, recording sent lines in <ID>.submitted.
    AutoSubmit {
        /// Hash List ID
        #[arg(long, value_parser = NonEmptyStringValueParser::new())]
        id: String,
        /// File path
        #[arg(long)]
        file: PathBuf,
        /// Minutes between two submissions
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_MINS))]
        interval_mins: u64,
    },
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => return usage_exit(&err),
    };

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("warning: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("[!] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Usage and argument errors go to stdout; only help and version succeed.
fn usage_exit(err: &clap::Error) -> ExitCode {
    print!("{}", err.render());
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Rewrites `-id` / `-file` (and `-id=..`) to their double-dash form.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let rewritten = arg.to_str().and_then(legacy_flag);
            rewritten.map(OsString::from).unwrap_or(arg)
        })
        .collect()
}

fn legacy_flag(arg: &str) -> Option<String> {
    let rest = arg.strip_prefix('-')?;
    if rest.starts_with('-') {
        return None;
    }
    let name = rest.split('=').next()?;
    LEGACY_FLAGS.contains(&name).then(|| format!("-{}", arg))
}

fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::default()
        .with_base_url(cli.base_url)
        .with_timeout(Duration::from_secs(cli.timeout));
    let token = config.credentials().resolve()?;
    let api = ApiClient::new(&config, token)?;

    match cli.command {
        Command::List => {
            let spinner = ui::spinner("Fetching hash lists...");
            let lists = api.list_hash_lists();
            spinner.finish_and_clear();
            ui::print_hash_lists(&lists.context("Failed to list hash lists")?);
        }
        Command::Download { id } => {
            let spinner = ui::spinner("Downloading hash list...");
            let outcome = api.download_hash_list(&id, Path::new("."));
            spinner.finish_and_clear();
            let outcome = outcome.with_context(|| format!("Failed to download hash list {}", id))?;
            println!("{}", ui::format_download(&outcome));
        }
        Command::Submit { id, file } => {
            let spinner = ui::spinner("Submitting...");
            let report = api.submit(&id, &file);
            spinner.finish_and_clear();
            let report = report.with_context(|| format!("Failed to submit {}", file.display()))?;
            ui::print_report(&report);
        }
        Command::AutoSubmit {
            id,
            file,
            interval_mins,
        } => {
            let config = config.with_interval(Duration::from_secs(interval_mins * 60));

            let cancel = cancel_token();
            let handler_token = Arc::clone(&cancel);
            ctrlc::set_handler(move || handler_token.store(true, Ordering::SeqCst))
                .context("Failed to install Ctrl-C handler")?;

            let ledger = Ledger::for_id(Path::new("."), check_id(&id)?);
            let submitter = AutoSubmitter::new(&api, &id, file, ledger, config.interval)?;
            println!(
                "[*] Auto-submitting {} to hash list {} every {} minute(s), Ctrl-C to stop",
                submitter.results_path().display(),
                id,
                interval_mins
            );

            let summary = submitter
                .run(&cancel, ui::print_round)
                .context("Auto-submit stopped")?;
            ui::print_summary(&summary);
        }
    }
    Ok(())
}
