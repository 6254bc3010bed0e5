//! # CLI Module
//!
//! Command-line interface for the OpenDroneMap transformer.
//!
//! ## Usage
//! ```bash
//! # Process a folder of images, writing result.json into the working space
//! odm-transformer --metadata md.json --working_space /work /data/flight1
//!
//! # With engine overrides, printing the result only
//! odm-transformer --result print --metadata md.json --working_space /work \
//!     --odm_overrides odm.yaml /data/flight1 /data/gcp_list.txt
//! ```

use clap::{Args, Parser};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use odm_transformer::core::engine::{EngineConfig, ProcessEngine};
use odm_transformer::core::odm::{OdmOptions, OdmStage};
use odm_transformer::core::pipeline::{Pipeline, RunRequest};
use odm_transformer::core::reporter::{self, RunResult, RESULT_FILE};
use odm_transformer::events::{EngineEvent, Event, EventChannel, PipelineEvent, StageEvent};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;
use tracing::Level;

/// Name of the engine entry point looked for next to this executable
const DEFAULT_ENGINE: &str = "worker.py";

/// Argument the default engine expects to be started with
const DEFAULT_ENGINE_ARG: &str = "code";

/// Longest engine line shown next to the spinner
const MAX_LINE_WIDTH: usize = 100;

/// OpenDroneMap transformer - drone images in, orthomosaics out
#[derive(Parser, Debug)]
#[command(name = "odm-transformer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable info logging
    #[arg(short, long)]
    info: bool,

    /// Where to send the result: any of all, file, print, or none
    #[arg(long, default_value = "all")]
    result: String,

    /// Experiment metadata JSON file
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Folder to build the project in
    #[arg(long = "working_space")]
    working_space: Option<PathBuf>,

    #[command(flatten)]
    odm: OdmArgs,

    /// Engine executable [default: worker.py next to this program]
    #[arg(long, env = "ODM_ENGINE")]
    engine: Option<PathBuf>,

    /// Argument passed to the engine; repeat for more
    #[arg(
        long = "engine-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        default_value = DEFAULT_ENGINE_ARG
    )]
    engine_args: Vec<String>,

    /// Stop the engine after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Files and folders to process
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    files: Vec<String>,
}

/// Options added by the OpenDroneMap stage
#[derive(Args, Debug)]
struct OdmArgs {
    /// Path to a YAML file of OpenDroneMap setting overrides
    #[arg(long = "odm_overrides")]
    odm_overrides: Option<PathBuf>,
}

impl From<OdmArgs> for OdmOptions {
    fn from(args: OdmArgs) -> Self {
        OdmOptions {
            overrides: args.odm_overrides,
        }
    }
}

impl Cli {
    fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.info {
            Level::INFO
        } else {
            Level::WARN
        }
    }
}

/// Run the CLI
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    odm_transformer::init_tracing(cli.log_level());

    let engine = cli.engine.clone().unwrap_or_else(default_engine);
    let config = EngineConfig::new(engine)
        .args(cli.engine_args.clone())
        .timeout(cli.timeout.map(Duration::from_secs));

    let result_file = cli.working_space.as_ref().map(|w| w.join(RESULT_FILE));
    let request = RunRequest {
        metadata: cli.metadata,
        files: cli.files,
        working_space: cli.working_space,
    };
    let pipeline = Pipeline::new(OdmStage::new(cli.odm.into(), ProcessEngine::new(config)));

    // Set up event handling
    let (sender, receiver) = EventChannel::new();
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {wide_msg:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    let progress = spinner.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    progress.set_prefix(phase.to_string());
                    progress.set_message("");
                }
                Event::Stage(StageEvent::ProjectReady { images, .. }) => {
                    progress.set_message(format!("linked {} images", images));
                }
                Event::Engine(EngineEvent::Output { line }) => {
                    progress.set_message(truncate(&line, MAX_LINE_WIDTH));
                }
                Event::Engine(EngineEvent::Finished { exit_code }) => {
                    progress.set_message(format!("engine exited with {}", exit_code));
                }
                Event::Pipeline(PipelineEvent::Completed { .. }) => {
                    progress.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let result = pipeline.run_with_events(&request, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    spinner.finish_and_clear();

    let result = reporter::report(Some(&cli.result), result_file.as_deref(), result);
    print_summary(&Term::stderr(), &result);

    if result.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn default_engine() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_ENGINE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE))
}

fn print_summary(term: &Term, result: &RunResult) {
    if !term.is_term() {
        return;
    }
    let line = match result {
        RunResult::Success { files, code } if *code == 0 => format!(
            "{} OpenDroneMap finished, {} result files",
            style("✓").green().bold(),
            style(files.len()).cyan()
        ),
        RunResult::Success { files, code } => format!(
            "{} OpenDroneMap exited with code {}, {} result files",
            style("!").yellow().bold(),
            style(code).yellow(),
            style(files.len()).cyan()
        ),
        RunResult::Failure { error, code } => format!(
            "{} {} ({})",
            style("✗").red().bold(),
            error,
            style(code).dim()
        ),
    };
    term.write_line(&line).ok();
}

fn truncate(line: &str, max: usize) -> String {
    match line.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &line[..idx]),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trailing_files_accept_flags() {
        let cli = Cli::try_parse_from([
            "odm-transformer",
            "--metadata",
            "md.json",
            "--working_space",
            "/work",
            "--odm_overrides",
            "odm.yaml",
            "a.jpg",
            "-x",
            "gcp_list.txt",
        ])
        .unwrap();

        assert_eq!(cli.files, vec!["a.jpg", "-x", "gcp_list.txt"]);
        assert_eq!(cli.odm.odm_overrides, Some(PathBuf::from("odm.yaml")));
        assert_eq!(cli.result, "all");
        assert_eq!(cli.engine_args, vec![DEFAULT_ENGINE_ARG]);
        assert_eq!(cli.log_level(), Level::WARN);
    }

    #[test]
    fn engine_args_repeat() {
        let cli = Cli::try_parse_from([
            "odm-transformer",
            "-d",
            "--engine",
            "/opt/odm/run.sh",
            "--engine-arg",
            "--fast-orthophoto",
            "--engine-arg",
            "--dsm",
            "--timeout",
            "60",
        ])
        .unwrap();

        assert_eq!(cli.engine, Some(PathBuf::from("/opt/odm/run.sh")));
        assert_eq!(cli.engine_args, vec!["--fast-orthophoto", "--dsm"]);
        assert_eq!(cli.timeout, Some(60));
        assert_eq!(cli.log_level(), Level::DEBUG);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 3), "ééé…");
    }
}
