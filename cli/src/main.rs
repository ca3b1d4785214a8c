//! Intake - Command-line interface for the ingestion engine.
//!
//! Lists the source directory, runs the copy/archive/extract pipeline for a
//! batch of files, and edits the settings file. Progress goes to stderr.

use clap::{Args as ClapArgs, Parser, Subcommand};
use engine::{
    default_settings_path, list_files, load_settings, run_pipeline, save_settings, Destination,
    DirectoryConfig, FileOutcome, FileReport, FileStage, PipelineRequest, PipelineResult,
    ProgressCallback, Settings, Theme,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Intake - copy incoming files into a case folder and unpack archives
#[derive(Parser, Debug)]
#[command(name = "intake")]
#[command(version = "0.1.0")]
#[command(about = "Copy incoming files into a destination folder, archive originals, extract archives")]
struct Args {
    /// Settings file (defaults to settings.json next to the executable)
    #[arg(long, value_name = "PATH", global = true)]
    settings: Option<PathBuf>,

    /// Override the configured source directory for this invocation
    #[arg(long, value_name = "PATH", global = true)]
    source_dir: Option<PathBuf>,

    /// Override the configured output directory for this invocation
    #[arg(long, value_name = "PATH", global = true)]
    output_dir: Option<PathBuf>,

    /// Override the configured processed directory for this invocation
    #[arg(long, value_name = "PATH", global = true)]
    processed_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List files waiting in the source directory
    List,

    /// Copy, archive and extract selected files
    Run(RunArgs),

    /// Show or change the stored settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Destination folder name, created under the output directory
    #[arg(long, value_name = "LABEL")]
    name: String,

    /// Put files in a subfolder named after today's date
    #[arg(long)]
    date: bool,

    /// Do not extract .zip/.tar/.gz files
    #[arg(long)]
    no_extract: bool,

    /// Select every file in the source directory
    #[arg(long, conflicts_with = "files")]
    all: bool,

    /// Files to process (names inside the source directory). None: only create the folder
    #[arg(value_name = "FILE")]
    files: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the current settings
    Show,

    /// Update one or more settings
    Set {
        #[arg(long, value_name = "PATH")]
        source: Option<PathBuf>,

        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[arg(long, value_name = "PATH")]
        processed: Option<PathBuf>,

        /// light or dark
        #[arg(long, value_name = "THEME")]
        theme: Option<String>,
    },
}

/// CLI implementation of ProgressCallback for displaying run progress
struct CliProgress {
    verbose: bool,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress { verbose }
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let mins = secs / 60;
        let secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}.{:01}s", secs, elapsed.subsec_millis() / 100)
        }
    }

    fn status_label(outcome: &FileOutcome) -> &'static str {
        match outcome {
            FileOutcome::Copied => "Copied",
            FileOutcome::Moved => "Moved",
            FileOutcome::Extracted => "Extracted",
            FileOutcome::Failed(_) => "Failed",
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_run_started(&self, request: &PipelineRequest) {
        eprintln!("Preparing run...");
        eprintln!("  Source: {}", request.source_dir.display());
        eprintln!("  Destination: {}", request.destination_dir.display());
        eprintln!("  Processed: {}", request.processed_dir.display());
        eprintln!("  Extract archives: {}", if request.extract { "yes" } else { "no" });
        eprintln!("  Files: {}", request.selected_files.len());
        eprintln!();
    }

    fn on_file_started(&self, file_index: usize, name: &str) {
        if self.verbose {
            eprintln!("[{:3}] Starting: {}", file_index, name);
        }
    }

    fn on_file_stage(&self, file_index: usize, name: &str, stage: FileStage) {
        if self.verbose {
            eprintln!("[{:3}]   {}: {}", file_index, stage, name);
        }
    }

    fn on_file_completed(&self, file_index: usize, report: &FileReport) {
        match &report.outcome {
            FileOutcome::Failed(err) => {
                eprintln!("[{:3}] Failed: {} ({})", file_index, report.name, err)
            }
            outcome => eprintln!(
                "[{:3}] {}: {}",
                file_index,
                Self::status_label(outcome),
                report.name
            ),
        }
    }

    fn on_run_completed(&self, result: &PipelineResult) {
        eprintln!();
        eprintln!("Run complete!");
        eprintln!("Summary: {}", result.summary());
        eprintln!("Elapsed: {}", Self::format_duration(result.elapsed()));

        if result.has_failures() {
            eprintln!();
            eprintln!("Failed files:");
            for report in result.failed() {
                if let Some(reason) = report.outcome.reason() {
                    eprintln!("  {}: {}", report.name, reason);
                }
            }
        }
    }
}

/// Parse and validate command-line arguments, then run the command
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Exit code tracking
    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Install a stderr subscriber; RUST_LOG wins over --verbose.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let settings_path = args.settings.clone().unwrap_or_else(default_settings_path);
    let settings =
        load_settings(&settings_path).map_err(|e| format!("Settings unavailable: {}", e))?;

    match &args.command {
        Command::List => list_source(&effective_dirs(args, &settings)),
        Command::Run(run) => run_batch(args, &effective_dirs(args, &settings), run),
        Command::Config { action } => configure(&settings_path, settings, action),
    }
}

/// Stored directories with command-line overrides applied
fn effective_dirs(args: &Args, settings: &Settings) -> DirectoryConfig {
    let mut dirs = settings.directories();
    if let Some(source) = &args.source_dir {
        dirs.source_dir = source.clone();
    }
    if let Some(output) = &args.output_dir {
        dirs.output_dir = output.clone();
    }
    if let Some(processed) = &args.processed_dir {
        dirs.processed_dir = processed.clone();
    }
    dirs
}

fn require_dir_configured(path: &Path, what: &str) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err(format!(
            "{} directory is not configured; use 'intake config set' or --{}-dir",
            what,
            what.to_lowercase()
        ));
    }
    Ok(())
}

fn list_source(dirs: &DirectoryConfig) -> Result<(), String> {
    require_dir_configured(&dirs.source_dir, "Source")?;
    if !dirs.source_dir.is_dir() {
        return Err(format!(
            "Source directory does not exist: {}",
            dirs.source_dir.display()
        ));
    }

    let files = list_files(&dirs.source_dir);
    if files.is_empty() {
        eprintln!("No files in {}", dirs.source_dir.display());
        return Ok(());
    }

    let width = files.iter().map(|f| f.name.len()).max().unwrap_or(0).max(9);
    println!(
        "{:<width$}  {:<16}  {:>12}  {}",
        "File Name",
        "Date Modified",
        "Size",
        "Type",
        width = width
    );
    for file in &files {
        println!(
            "{:<width$}  {:<16}  {:>12}  {}",
            file.name,
            file.display_modified(),
            file.display_size(),
            file.extension,
            width = width
        );
    }
    Ok(())
}

fn run_batch(args: &Args, dirs: &DirectoryConfig, run: &RunArgs) -> Result<(), String> {
    require_dir_configured(&dirs.output_dir, "Output")?;
    require_dir_configured(&dirs.processed_dir, "Processed")?;

    let selected: Vec<String> = if run.all {
        require_dir_configured(&dirs.source_dir, "Source")?;
        if !dirs.source_dir.is_dir() {
            return Err(format!(
                "Source directory does not exist: {}",
                dirs.source_dir.display()
            ));
        }
        list_files(&dirs.source_dir)
            .into_iter()
            .map(|entry| entry.name)
            .collect()
    } else {
        if !run.files.is_empty() {
            require_dir_configured(&dirs.source_dir, "Source")?;
        }
        run.files.clone()
    };

    let mut destination = Destination::new(&dirs.output_dir, run.name.as_str());
    if run.date {
        destination = destination.with_today();
    }

    let request = PipelineRequest::from_config(dirs, &destination, selected, !run.no_extract)
        .map_err(|e| e.to_string())?;

    let progress = CliProgress::new(args.verbose);
    let result = run_pipeline(&request, Some(&progress)).map_err(|e| format!("Run failed: {}", e))?;

    println!("{}", result.destination_dir.display());

    if result.has_failures() {
        Err("One or more files failed to process".to_string())
    } else {
        Ok(())
    }
}

fn configure(settings_path: &Path, mut settings: Settings, action: &ConfigAction) -> Result<(), String> {
    match action {
        ConfigAction::Show => {
            println!("Settings file: {}", settings_path.display());
            println!("  source_dir:    {}", settings.source_dir.display());
            println!("  output_dir:    {}", settings.output_dir.display());
            println!("  processed_dir: {}", settings.processed_dir.display());
            println!("  theme:         {}", settings.theme);
            Ok(())
        }
        ConfigAction::Set {
            source,
            output,
            processed,
            theme,
        } => {
            if let Some(source) = source {
                settings.source_dir = source.clone();
            }
            if let Some(output) = output {
                settings.output_dir = output.clone();
            }
            if let Some(processed) = processed {
                settings.processed_dir = processed.clone();
            }
            if let Some(theme) = theme {
                settings.theme = theme.parse::<Theme>()?;
            }

            save_settings(settings_path, &settings).map_err(|e| e.to_string())?;
            eprintln!("Saved {}", settings_path.display());
            Ok(())
        }
    }
}
