//! # voiceclone
//!
//! Batch orchestration around a voice-cloning text-to-speech model
//! ([Coqui XTTS v2](https://github.com/idiap/coqui-ai-TTS) through its `tts`
//! command line) and the `ffmpeg` audio toolchain: one reference voice, one
//! text per language, one cloned-voice WAV per language.
//!
//! ## Quick start
//!
//! ```no_run
//! use voiceclone::{CoquiTts, Pipeline, PipelineConfig, RunMode, StandardAudio};
//!
//! let config = PipelineConfig::load_or_default(std::path::Path::new("config.json")).unwrap();
//! let tts = CoquiTts::from_config(&config.engine);
//! let audio = StandardAudio::from_config(&config.engine);
//!
//! // Validate everything and print the plan without touching the disk
//! let plan = Pipeline::new(&config, &tts, &audio).with_mode(RunMode::DryRun).run().unwrap();
//! plan.print_summary();
//!
//! // Then do it for real
//! let report = Pipeline::new(&config, &tts, &audio).run().unwrap();
//! for outcome in &report.languages {
//!     println!("{}: {}", outcome.item, outcome.status.label());
//! }
//! ```
//!
//! ## Runtime requirements
//! | Tool      | Used for                                        |
//! |-----------|-------------------------------------------------|
//! | `ffmpeg`  | decoding/resampling non-WAV input, mp3 export   |
//! | `tts`     | `pip install coqui-tts`; downloads XTTS v2 on first use |
//!
//! ## Pipeline
//! 1. **Reference audio**: converted to 16 kHz mono 16-bit PCM WAV.
//! 2. **Text assets**: `{texts_dir}/{lang}.txt` checked per language;
//!    `prepare-text` cleans and chunks raw text per language rules.
//! 3. **Synthesis**: text cleaned per language, one model call per chunk,
//!    chunks concatenated into `{output_dir}/{lang}_{label}.wav`.
//! 4. **Post-processing**: level normalization, fades, silence removal,
//!    format conversion.
//!
//! Failures are isolated per language and collected in a [`RunReport`];
//! only a missing reference voice or a bad configuration stops a run.

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffmpeg;
pub mod language;
pub mod normalizer;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod report;
pub mod synthesis;
pub mod text;
pub mod wav;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use batch::{BatchReport, ItemOutcome, RunMode, Status};
pub use config::PipelineConfig;
pub use engine::{AudioTools, CoquiTts, StandardAudio, Synthesizer};
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Pipeline, StageSelection};
pub use report::RunReport;
