//! `voiceclone` command line — one subcommand per pipeline component.
//!
//! Usage:
//!   voiceclone preprocess data/ref/raw.m4a -o data/ref/direncan_ref.wav
//!   voiceclone prepare-text base.txt --create-multilingual fr de es -o data/texts
//!   voiceclone synthesize -l fr -l de --dry-run
//!   voiceclone post-process outputs --batch --normalize --fade
//!   voiceclone run -c config.json --report outputs/report.json
//!
//! Exit codes: 0 success (per-item failures included), 1 fatal error,
//! 2 with `--strict` when any item failed.
//!
//! Log lines go to stderr and, for `run` (or any command given `--log-dir`),
//! to `{log_dir}/voiceclone_{YYYYmmdd_HHMMSS}.log`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use log::{error, info, warn};

use voiceclone::batch::{BatchReport, Done, ItemOutcome, RunMode, Status};
use voiceclone::postprocess::{ConvertOptions, PostOptions, SilenceOptions};
use voiceclone::preprocess::DEFAULT_MAX_CHUNK_CHARS;
use voiceclone::{
    normalizer, postprocess, synthesis, text, CoquiTts, Pipeline, PipelineConfig, StageSelection,
    StandardAudio,
};

#[derive(Debug, Parser)]
#[command(name = "voiceclone", version)]
#[command(about = "Clone one reference voice into speech in several languages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging (RUST_LOG still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Exit with status 2 when any item failed.
    #[arg(long, global = true)]
    strict: bool,

    /// Also write a timestamped log file here (`run` defaults to `logs`).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

impl Cli {
    /// Dry runs leave no file behind unless a directory is asked for.
    fn log_dir(&self) -> Option<PathBuf> {
        match (&self.log_dir, &self.command) {
            (Some(dir), _) => Some(dir.clone()),
            (None, Commands::Run(args)) if !args.dry_run => Some(PathBuf::from(DEFAULT_LOG_DIR)),
            _ => None,
        }
    }
}

const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert reference audio to 16 kHz mono 16-bit WAV.
    Preprocess(PreprocessArgs),
    /// Clean text for a language, or fan one text out to several languages.
    PrepareText(PrepareTextArgs),
    /// Synthesize one file per language with the cloned voice.
    Synthesize(SynthesizeArgs),
    /// Normalize, fade, trim silence or convert synthesized audio.
    PostProcess(PostProcessArgs),
    /// Run the whole pipeline from a configuration file.
    Run(RunArgs),
    /// Write sample texts and a default configuration.
    InitExamples(InitExamplesArgs),
}

#[derive(Debug, Args)]
struct PreprocessArgs {
    /// Audio file, or a directory with --batch.
    input: PathBuf,
    /// Output file, or output directory with --batch.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    batch: bool,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct PrepareTextArgs {
    /// Text file, or a directory with --batch.
    input: PathBuf,
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(short, long)]
    language: Option<String>,
    #[arg(long)]
    batch: bool,
    /// Write `{lang}.txt` for each of these languages from the input text.
    #[arg(long, num_args = 1.., value_name = "LANG")]
    create_multilingual: Option<Vec<String>>,
    /// Longest chunk in characters.
    #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_CHARS)]
    max_length: usize,
    #[arg(long)]
    dry_run: bool,
}

/// Settings shared by `synthesize` and `run`; flags override the file.
#[derive(Debug, Args)]
struct ConfigArgs {
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
    #[arg(long)]
    reference_audio: Option<PathBuf>,
    #[arg(long)]
    texts_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    languages: Option<Vec<String>>,
    #[arg(long)]
    label: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<PipelineConfig> {
        let mut cfg = PipelineConfig::load_or_default(&self.config)?;
        if let Some(p) = &self.reference_audio {
            cfg.reference_audio = p.clone();
        }
        if let Some(p) = &self.texts_dir {
            cfg.texts_dir = p.clone();
        }
        if let Some(p) = &self.output_dir {
            cfg.output_dir = p.clone();
        }
        if let Some(l) = &self.languages {
            cfg.languages = l.clone();
        }
        if let Some(l) = &self.label {
            cfg.label = l.clone();
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Args)]
struct SynthesizeArgs {
    /// Reference voice; overrides the configuration.
    input: Option<PathBuf>,
    /// Output directory; overrides the configuration.
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Languages to synthesize (repeatable); defaults to the configuration.
    #[arg(short, long)]
    language: Vec<String>,
    #[command(flatten)]
    config: ConfigArgs,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct PostProcessArgs {
    /// Audio file, or a directory with --batch.
    input: PathBuf,
    /// Defaults to processing in place.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    batch: bool,
    #[arg(long)]
    normalize: bool,
    #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
    normalize_target: f32,
    #[arg(long)]
    fade: bool,
    /// Fade length in milliseconds.
    #[arg(long, default_value_t = 1000)]
    fade_duration: u32,
    #[arg(long)]
    remove_silence: bool,
    #[arg(long, default_value_t = -40.0, allow_hyphen_values = true)]
    silence_thresh: f32,
    /// Shortest silence removed, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    min_silence_len: u32,
    /// Re-encode to this format (e.g. mp3) with ffmpeg.
    #[arg(long)]
    convert_format: Option<String>,
    #[arg(long, default_value = "192k")]
    bitrate: String,
    #[arg(long)]
    dry_run: bool,
}

impl PostProcessArgs {
    fn options(&self) -> PostOptions {
        PostOptions {
            normalize: self.normalize.then_some(self.normalize_target),
            fade_ms: self.fade.then_some(self.fade_duration),
            silence: self.remove_silence.then(|| SilenceOptions {
                threshold_db: self.silence_thresh,
                min_silence_ms: self.min_silence_len,
            }),
            convert: self
                .convert_format
                .as_ref()
                .map(|format| ConvertOptions { format: format.clone(), bitrate: self.bitrate.clone() }),
        }
    }
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    #[arg(long)]
    skip_preprocessing: bool,
    #[arg(long)]
    skip_synthesis: bool,
    #[arg(long)]
    skip_post_processing: bool,
    /// Write the run report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct InitExamplesArgs {
    #[arg(long, default_value = "data/texts")]
    texts_dir: PathBuf,
    /// Written only when it does not exist yet.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

// ─────────────────────────────────────────────────────────────────────────────
// main
// ─────────────────────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_file = init_logger(cli.verbose, cli.log_dir().as_deref());

    let code = match dispatch(&cli.command) {
        Ok(failed) if failed && cli.strict => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    };
    if let Some(path) = log_file {
        println!("Log file: {}", path.display());
    }
    code
}

/// Every log line goes to stderr and to the run's log file.
struct Tee(File);

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.0.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.0.flush()
    }
}

fn open_log_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("voiceclone_{}.log", chrono::Local::now().format("%Y%m%d_%H%M%S")));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Returns the log file path when one is being written.
fn init_logger(verbose: bool, log_dir: Option<&Path>) -> Option<PathBuf> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(format!("warn,voiceclone={}", level)));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    let mut log_file = None;
    let mut open_error = None;
    if let Some(dir) = log_dir {
        match open_log_file(dir) {
            Ok((path, file)) => {
                builder.target(Target::Pipe(Box::new(Tee(file))));
                log_file = Some(path);
            }
            Err(e) => open_error = Some((dir, e)),
        }
    }
    builder.init();

    if let Some((dir, e)) = open_error {
        warn!("Cannot open a log file in {}: {}; logging to stderr only", dir.display(), e);
    }
    log_file
}

fn mode(dry_run: bool) -> RunMode {
    if dry_run {
        RunMode::DryRun
    } else {
        RunMode::Execute
    }
}

/// Returns whether any item failed.
fn dispatch(command: &Commands) -> Result<bool> {
    match command {
        Commands::Preprocess(args) => preprocess(args),
        Commands::PrepareText(args) => prepare_text(args),
        Commands::Synthesize(args) => synthesize(args),
        Commands::PostProcess(args) => post_process(args),
        Commands::Run(args) => run(args),
        Commands::InitExamples(args) => init_examples(args),
    }
}

fn single(input: &Path, done: Done) -> bool {
    let outcome = match done {
        Done::Written(path) => ItemOutcome { item: input.display().to_string(), output: Some(path), status: Status::Success },
        Done::Planned(action) => ItemOutcome { item: input.display().to_string(), output: None, status: Status::Planned { action } },
        Done::Skipped(reason) => ItemOutcome { item: input.display().to_string(), output: None, status: Status::Skipped { reason } },
    };
    print_batch("Result", &BatchReport { items: vec![outcome] })
}

/// Prints a batch summary; returns whether any item failed.
fn print_batch(title: &str, report: &BatchReport) -> bool {
    println!("\n{}", title);
    for outcome in &report.items {
        let detail = match &outcome.status {
            Status::Success => outcome.output.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
            Status::Planned { action } => action.clone(),
            Status::Skipped { reason } => reason.clone(),
            Status::Failed { kind, message } => format!("{}: {}", kind, message),
        };
        println!("  {:<8} {:<24} {}", outcome.status.label(), outcome.item, detail);
    }
    let failed = report.failures().count();
    println!("{} item(s), {} succeeded, {} failed", report.items.len(), report.succeeded(), failed);
    failed > 0
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

fn preprocess(args: &PreprocessArgs) -> Result<bool> {
    let tools = StandardAudio::default();
    let mode = mode(args.dry_run);
    if args.batch {
        let output = args.output.clone().unwrap_or_else(|| PathBuf::from("data/processed"));
        let report = normalizer::normalize_dir(&tools, &args.input, &output, mode)
            .with_context(|| format!("cannot convert {}", args.input.display()))?;
        return Ok(print_batch("Audio conversion", &report));
    }
    let output = match &args.output {
        Some(o) => o.clone(),
        None => normalizer::batch_output_path(&args.input, args.input.parent().unwrap_or(Path::new(""))),
    };
    let done = normalizer::normalize_file(&tools, &args.input, &output, mode)
        .with_context(|| format!("cannot convert {}", args.input.display()))?;
    Ok(single(&args.input, done))
}

fn prepare_text(args: &PrepareTextArgs) -> Result<bool> {
    let mode = mode(args.dry_run);
    if let Some(languages) = &args.create_multilingual {
        let output = args.output.clone().unwrap_or_else(|| PathBuf::from("data/texts"));
        let report = text::create_multilingual_from_file(&args.input, languages, &output, mode)?;
        return Ok(print_batch("Multilingual texts", &report));
    }

    let Some(lang) = args.language.as_deref() else {
        bail!("--language is required unless --create-multilingual is given");
    };
    if args.batch {
        let output = args.output.clone().unwrap_or_else(|| args.input.join("prepared"));
        let report = text::prepare_dir(&args.input, &output, lang, args.max_length, mode)?;
        return Ok(print_batch("Text preparation", &report));
    }
    let output = match &args.output {
        Some(o) => o.clone(),
        None => {
            let stem = args.input.file_stem().and_then(|s| s.to_str()).unwrap_or("text");
            args.input.with_file_name(format!("{}_prepared.txt", stem))
        }
    };
    let done = text::prepare_file(&args.input, &output, lang, args.max_length, mode)?;
    Ok(single(&args.input, done))
}

fn synthesize(args: &SynthesizeArgs) -> Result<bool> {
    let mut cfg = args.config.load()?;
    if let Some(reference) = &args.input {
        cfg.reference_audio = reference.clone();
    }
    if let Some(output) = &args.output {
        cfg.output_dir = output.clone();
    }
    let languages = if args.language.is_empty() { cfg.languages.clone() } else { args.language.clone() };

    let tts = CoquiTts::from_config(&cfg.engine);
    let report = synthesis::SynthesisDriver::from_config(&tts, &cfg)
        .run(&languages, mode(args.dry_run))
        .context("synthesis aborted")?;
    Ok(print_batch("Synthesis", &report))
}

fn post_process(args: &PostProcessArgs) -> Result<bool> {
    let tools = StandardAudio::default();
    let opts = args.options();
    let mode = mode(args.dry_run);
    if opts.is_noop() {
        warn!("No post-processing option given; files are copied unchanged");
    }
    if args.batch {
        let output = args.output.clone().unwrap_or_else(|| args.input.clone());
        let report = postprocess::process_dir(&tools, &args.input, &output, &opts, mode)?;
        return Ok(print_batch("Post-processing", &report));
    }
    let output = args.output.clone().unwrap_or_else(|| args.input.clone());
    let done = postprocess::process_file(&tools, &args.input, &output, &opts, mode)?;
    Ok(single(&args.input, done))
}

fn run(args: &RunArgs) -> Result<bool> {
    let cfg = args.config.load()?;
    let tts = CoquiTts::from_config(&cfg.engine);
    let tools = StandardAudio::from_config(&cfg.engine);
    let mode = mode(args.dry_run);

    if !mode.is_dry_run() && !tools.ffmpeg().is_available() {
        warn!(
            "{} not found; only 16 kHz mono WAV input and WAV output will work",
            tools.ffmpeg().program().display()
        );
    }
    let unsupported = cfg.unsupported_languages();
    if !unsupported.is_empty() {
        warn!("Not synthesizable, will be reported as failed: {}", unsupported.join(", "));
    }

    let stages = StageSelection {
        preprocessing: !args.skip_preprocessing,
        synthesis: !args.skip_synthesis,
        post_processing: !args.skip_post_processing,
    };
    let report = Pipeline::new(&cfg, &tts, &tools)
        .with_mode(mode)
        .with_stages(stages)
        .run()
        .context("pipeline aborted")?;
    report.print_summary();

    if let Some(path) = &args.report {
        if mode.is_dry_run() {
            info!("Dry run: report not written to {}", path.display());
        } else {
            report.write_json(path)?;
            info!("Report written to {}", path.display());
        }
    }
    Ok(report.has_failures())
}

fn init_examples(args: &InitExamplesArgs) -> Result<bool> {
    let report = text::write_examples(&args.texts_dir);
    if args.config.exists() {
        info!("{} already exists, leaving it untouched", args.config.display());
    } else {
        let cfg = PipelineConfig { texts_dir: args.texts_dir.clone(), ..PipelineConfig::default() };
        cfg.save(&args.config)?;
        info!("Wrote default configuration to {}", args.config.display());
    }
    Ok(print_batch("Example texts", &report))
}
