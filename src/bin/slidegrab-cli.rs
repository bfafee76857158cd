use std::{path::PathBuf, sync::Arc};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use slidegrab::{
    AcquisitionPipeline, BatchRunner, BatchSummary, HysteresisBand, LabelRecord, ProgressCallback,
    ProgressInfo, Recorder, Settings, SlideshowPipeline, VlcRecorder, read_labels,
};

const CLI_AFTER_HELP: &str = "Examples:\n  slidegrab labels --sheet data/labels.xlsx\n  slidegrab acquire --label cs101 --progress\n  slidegrab slides --sampling-rate 5 --min-percent 0.3 --max-percent 4\n  slidegrab completions zsh > _slidegrab";

#[derive(Debug, Parser)]
#[command(
    name = "slidegrab",
    version,
    about = "Download lecture recordings and extract their slides to PDF",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show debug logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar for frame sampling and segment downloads.
    #[arg(long, global = true)]
    progress: bool,

    /// JSON settings file; command-line flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory holding one directory per label.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Label spreadsheet (xlsx, xls or ods).
    #[arg(long, global = true)]
    sheet: Option<PathBuf>,

    /// Failure log (JSON lines). Defaults to failures.jsonl in the data directory.
    #[arg(long, global = true)]
    failure_log: Option<PathBuf>,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true, default_value = "error")]
    ffmpeg_log_level: String,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the labels found in the spreadsheet.
    #[command(about = "List spreadsheet labels")]
    Labels {
        #[arg(long)]
        json: bool,
    },

    /// Extract slides from each label's video and assemble a PDF.
    #[command(about = "Extract slides to PDF")]
    Slides {
        /// Only process these labels (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Sampled frames per second of video.
        #[arg(long)]
        sampling_rate: Option<f64>,
        /// Capture when fewer than this percent of pixels move.
        #[arg(long)]
        min_percent: Option<f64>,
        /// Re-arm once at least this percent of pixels move.
        #[arg(long)]
        max_percent: Option<f64>,
        /// Seconds subtracted from each capture time.
        #[arg(long)]
        lag: Option<f64>,
    },

    /// Download each label's lecture stream and record it to a file.
    #[command(about = "Download and record lectures")]
    Acquire {
        /// Only process these labels (repeatable).
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Parallel segment downloads.
        #[arg(long)]
        workers: Option<usize>,
        /// Verification passes over missing segments.
        #[arg(long)]
        retries: Option<u32>,
        /// Recorder executable.
        #[arg(long)]
        recorder: Option<PathBuf>,
        /// Download only; do not run the recorder.
        #[arg(long)]
        skip_record: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {msg} {bar:40.cyan/blue} {pos}/{len}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_message(format!("{} {:?}", info.label, info.operation));
        self.bar.set_position(info.current);
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn load_settings(global: &GlobalOptions) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::load(global.config.as_deref())?;
    if let Some(data_dir) = &global.data_dir {
        settings.data_dir = data_dir.clone();
    }
    if let Some(sheet) = &global.sheet {
        settings.spreadsheet = sheet.clone();
    }
    if let Some(failure_log) = &global.failure_log {
        settings.failure_log = Some(failure_log.clone());
    }
    Ok(settings)
}

/// Spreadsheet records, narrowed to `labels` when any are given. Labels
/// missing from the spreadsheet (or all of them, without a spreadsheet) are
/// processed with no title and no manifest URL.
fn select_records(
    settings: &Settings,
    labels: &[String],
) -> Result<Vec<LabelRecord>, Box<dyn std::error::Error>> {
    if labels.is_empty() {
        return Ok(read_labels(&settings.spreadsheet)?);
    }

    let sheet = if settings.spreadsheet.exists() {
        read_labels(&settings.spreadsheet)?
    } else {
        Vec::new()
    };
    Ok(labels
        .iter()
        .map(|label| {
            sheet
                .iter()
                .find(|record| &record.label == label)
                .cloned()
                .unwrap_or_else(|| LabelRecord::from_label(label.as_str()))
        })
        .collect())
}

fn progress_callback(
    global: &GlobalOptions,
) -> Result<Option<Arc<dyn ProgressCallback>>, Box<dyn std::error::Error>> {
    if global.progress {
        Ok(Some(Arc::new(TerminalProgress::new()?)))
    } else {
        Ok(None)
    }
}

fn print_summary(summary: &BatchSummary, failure_log: &std::path::Path) {
    for label in &summary.skipped_recordings {
        eprintln!(
            "{} {}",
            "warning:".yellow().bold(),
            format!("{label}: recording skipped").yellow()
        );
    }
    for record in &summary.failures {
        eprintln!(
            "{} {}",
            "failed:".red().bold(),
            format!("{} [{}] {}", record.label, record.stage, record.message).red()
        );
    }

    println!(
        "{} {}",
        "success:".green().bold(),
        format!("{} label(s) completed", summary.succeeded.len()).green()
    );
    if !summary.is_success() {
        println!(
            "{} {}",
            "failures:".red().bold(),
            format!(
                "{} label(s) failed, see {}",
                summary.failed_labels().len(),
                failure_log.display()
            )
            .red()
        );
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    slidegrab::set_ffmpeg_log_level(&cli.global.ffmpeg_log_level)?;

    match cli.command {
        Commands::Labels { json } => {
            let settings = load_settings(&cli.global)?;
            let records = read_labels(&settings.spreadsheet)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!(
                        "{}\t{}\t{}",
                        record.label.bold(),
                        record.title.as_deref().unwrap_or("-"),
                        record.manifest_url.as_deref().unwrap_or("-").dimmed()
                    );
                }
            }
        }
        Commands::Slides {
            labels,
            sampling_rate,
            min_percent,
            max_percent,
            lag,
        } => {
            let mut settings = load_settings(&cli.global)?;
            let slideshow = &mut settings.slideshow;
            if let Some(rate) = sampling_rate {
                slideshow.sampling_rate = rate;
            }
            if min_percent.is_some() || max_percent.is_some() {
                slideshow.band = HysteresisBand::new(
                    min_percent.unwrap_or(slideshow.band.min_percent),
                    max_percent.unwrap_or(slideshow.band.max_percent),
                )?;
            }
            if let Some(lag) = lag {
                slideshow.lag_compensation = lag;
            }
            settings.validate()?;

            let records = select_records(&settings, &labels)?;
            let mut pipeline = SlideshowPipeline::new(settings.slideshow.clone())?;
            if let Some(callback) = progress_callback(&cli.global)? {
                pipeline = pipeline.with_progress(callback);
            }

            let runner = BatchRunner::from_settings(&settings);
            let summary = runner.run_slideshow(&pipeline, &records);
            print_summary(&summary, runner.failure_log().path());
        }
        Commands::Acquire {
            labels,
            workers,
            retries,
            recorder,
            skip_record,
        } => {
            let mut settings = load_settings(&cli.global)?;
            let acquisition = &mut settings.acquisition;
            if let Some(workers) = workers {
                acquisition.workers = workers.max(1);
            }
            if let Some(retries) = retries {
                acquisition.retry_rounds = retries;
            }
            if let Some(recorder) = recorder {
                acquisition.recorder_program = recorder;
            }
            settings.validate()?;

            let records = select_records(&settings, &labels)?;
            let mut pipeline = AcquisitionPipeline::new(settings.acquisition.clone())?;
            if let Some(callback) = progress_callback(&cli.global)? {
                pipeline = pipeline.with_progress(callback);
            }
            let vlc = VlcRecorder::new(settings.acquisition.recorder_program.clone());
            let recorder: Option<&dyn Recorder> = if skip_record { None } else { Some(&vlc) };

            let runner = BatchRunner::from_settings(&settings);
            let summary = runner.run_acquisition(&pipeline, recorder, &records);
            print_summary(&summary, runner.failure_log().path());
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "slidegrab", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}
