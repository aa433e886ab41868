//! Runs the `voiceclone` binary against temp fixtures with a stub `tts`
//! command, checking exit codes and the per-run log file.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use voiceclone::config::EngineConfig;
use voiceclone::wav::{self, AudioBuffer};
use voiceclone::PipelineConfig;

/// Answers `--version`; otherwise "speaks" by copying the reference voice.
const STUB_TTS: &str = "#!/bin/sh
while [ $# -gt 0 ]; do case \"$1\" in
  --version) echo 'stub tts 0.0'; exit 0;;
  --out_path) out=\"$2\"; shift;;
  --speaker_wav) ref=\"$2\"; shift;;
esac; shift; done
cp \"$ref\" \"$out\"
";

fn voiceclone_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_voiceclone"))
}

struct Project {
    dir: tempfile::TempDir,
    config: PipelineConfig,
}

impl Project {
    /// fr is synthesizable, sv is not.
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();

        let tts = base.join("bin").join("tts");
        fs::create_dir_all(tts.parent().unwrap()).unwrap();
        fs::write(&tts, STUB_TTS).unwrap();
        fs::set_permissions(&tts, fs::Permissions::from_mode(0o755)).unwrap();

        let reference = base.join("ref").join("voice.wav");
        let samples = (0..16_000).map(|i| 0.5 * (i as f32 * 0.1).sin()).collect();
        wav::write_wav(&AudioBuffer { samples, channels: 1, sample_rate: 16_000 }, &reference).unwrap();

        let texts_dir = base.join("texts");
        fs::create_dir_all(&texts_dir).unwrap();
        fs::write(texts_dir.join("fr.txt"), "Bonjour tout le monde.").unwrap();
        fs::write(texts_dir.join("sv.txt"), "Hej allihopa.").unwrap();

        let config = PipelineConfig {
            reference_audio: reference,
            texts_dir,
            output_dir: base.join("outputs"),
            languages: vec!["fr".into(), "sv".into()],
            label: "voice".into(),
            engine: EngineConfig {
                tts_command: tts.display().to_string(),
                ffmpeg_command: "/nonexistent/ffmpeg".into(),
                ..EngineConfig::default()
            },
            ..PipelineConfig::default()
        };
        config.save(&base.join("config.json")).unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn voiceclone(&self, args: &[&str]) -> Output {
        Command::new(voiceclone_bin())
            .args(args)
            .current_dir(self.path())
            .env_remove("RUST_LOG")
            .output()
            .unwrap()
    }

    fn log_files(&self, dir: &str) -> Vec<PathBuf> {
        match fs::read_dir(self.path().join(dir)) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn per_language_failure_still_exits_zero() {
    let project = Project::new();
    let out = project.voiceclone(&["run", "-c", "config.json"]);

    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
    assert!(project.config.output_path("fr").is_file());
    assert!(!project.config.output_path("sv").exists());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("FAILED"), "stdout: {}", stdout);
}

#[test]
fn strict_run_exits_two_on_item_failure() {
    let project = Project::new();
    let out = project.voiceclone(&["run", "-c", "config.json", "--strict"]);

    assert_eq!(out.status.code(), Some(2), "stderr: {}", stderr(&out));
    assert!(project.config.output_path("fr").is_file());
}

#[test]
fn strict_run_without_failures_exits_zero() {
    let project = Project::new();
    let out = project.voiceclone(&["run", "-c", "config.json", "--languages", "fr", "--strict"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", stderr(&out));
}

#[test]
fn missing_reference_exits_one() {
    let project = Project::new();
    fs::remove_file(&project.config.reference_audio).unwrap();
    let out = project.voiceclone(&["run", "-c", "config.json"]);

    assert_eq!(out.status.code(), Some(1), "stderr: {}", stderr(&out));
    assert!(stderr(&out).contains("not found"), "stderr: {}", stderr(&out));
    assert!(!project.config.output_dir.exists());
}

#[test]
fn run_writes_timestamped_log_file() {
    let project = Project::new();
    let out = project.voiceclone(&["run", "-c", "config.json"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));

    let logs = project.log_files("logs");
    assert_eq!(logs.len(), 1, "logs: {:?}", logs);
    let name = logs[0].file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("voiceclone_") && name.ends_with(".log"), "name: {}", name);

    let contents = fs::read_to_string(&logs[0]).unwrap();
    assert!(contents.contains("[sv]"), "log: {}", contents);
    assert!(String::from_utf8_lossy(&out.stdout).contains(&format!("Log file: logs/{}", name)));
}

#[test]
fn dry_run_leaves_no_log_unless_asked() {
    let project = Project::new();
    let out = project.voiceclone(&["run", "-c", "config.json", "--dry-run"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert!(project.log_files("logs").is_empty());
    assert!(!project.config.output_dir.exists());

    let out = project.voiceclone(&["run", "-c", "config.json", "--dry-run", "--log-dir", "audit"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(project.log_files("audit").len(), 1);
}
