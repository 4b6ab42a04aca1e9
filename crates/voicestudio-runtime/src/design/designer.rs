//! Subprocess-backed voice design.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voicestudio_core::install::error_tail;
use voicestudio_core::{
    ChannelMessage, DesignError, DesignedPreview, PreviewRequest, ProgressEmitter,
    VoiceDesignPort, VoiceModelInfo, find_voice_model, voice_model_catalog,
};

use super::protocol::{DesignEvent, parse_line};
use crate::python::run_streaming;

const HELPER_SOURCE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/scripts/parler_preview.py"
));

const HELPER_FILE_NAME: &str = "parler_preview.py";

/// Runs voice design in a helper process, one process per preview.
///
/// The helper reports progress on stdout (see [`super::protocol`]) and is
/// killed when the request's cancellation token fires.
#[derive(Debug, Clone)]
pub struct ProcessVoiceDesigner {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessVoiceDesigner {
    /// Run `program` with `args` before the per-request arguments.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Deploy the bundled Parler-TTS helper into `helpers_dir` and run it
    /// with `python`.
    pub fn bundled(python: impl Into<PathBuf>, helpers_dir: &Path) -> std::io::Result<Self> {
        let script = deploy_helper(helpers_dir)?;
        Ok(Self::new(
            python,
            vec![script.to_string_lossy().into_owned()],
        ))
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

/// Write the bundled helper unless an identical copy is already there.
fn deploy_helper(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(HELPER_FILE_NAME);
    let current = std::fs::read_to_string(&path).ok();
    if current.as_deref() != Some(HELPER_SOURCE) {
        std::fs::write(&path, HELPER_SOURCE)?;
        debug!(path = %path.display(), "Deployed voice design helper");
    }
    Ok(path)
}

/// What the helper said before exiting.
enum Outcome {
    Complete(f64),
    Failed(String),
}

#[async_trait]
impl VoiceDesignPort for ProcessVoiceDesigner {
    async fn is_available(&self) -> bool {
        let mut cmd = self.command();
        cmd.arg("--check")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        match cmd.status().await {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(program = %self.program.display(), error = %e, "Design helper not runnable");
                false
            }
        }
    }

    fn models(&self) -> Vec<VoiceModelInfo> {
        voice_model_catalog()
    }

    async fn generate_preview(
        &self,
        request: &PreviewRequest,
        output: &Path,
        progress: Arc<dyn ProgressEmitter>,
        cancel: CancellationToken,
    ) -> Result<DesignedPreview, DesignError> {
        let model = find_voice_model(&request.model_id)
            .ok_or_else(|| DesignError::UnknownModel(request.model_id.clone()))?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DesignError::Failed(format!("Cannot create {}: {e}", parent.display())))?;
        }

        progress.emit(ChannelMessage::progress(
            "loading_model",
            format!(
                "Loading {} (downloading on first run ~{}GB)...",
                model.name, model.download_gb
            ),
            10,
        ));

        let mut cmd = self.command();
        cmd.arg("--description")
            .arg(&request.description)
            .arg("--sample-text")
            .arg(&request.sample_text)
            .arg("--model")
            .arg(&model.hf_name)
            .arg("--model-name")
            .arg(&model.name)
            .arg("--temperature")
            .arg(request.temperature.to_string())
            .arg("--sample-rate")
            .arg(model.sample_rate.to_string())
            .arg("--output")
            .arg(output);

        info!(model = %model.id, temperature = request.temperature, "Starting voice design");

        let mut outcome = None;
        let run = run_streaming(cmd, |line| match parse_line(line) {
            Ok(DesignEvent::Progress {
                stage,
                message,
                percent,
            }) => progress.emit(ChannelMessage::progress(&stage, message, percent)),
            Ok(DesignEvent::Complete { duration_secs }) => {
                outcome = Some(Outcome::Complete(duration_secs));
            }
            Ok(DesignEvent::Error { message }) => outcome = Some(Outcome::Failed(message)),
            Err(_) => debug!(line, "[design helper]"),
        });

        // Dropping `run` kills the helper.
        let finished = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                info!(model = %model.id, "Voice design cancelled");
                return Err(DesignError::Cancelled);
            }
            finished = run => finished,
        };
        let finished = finished.map_err(|e| DesignError::Failed(e.to_string()))?;

        match outcome {
            Some(Outcome::Failed(message)) => {
                warn!(model = %model.id, %message, "Voice design failed");
                Err(DesignError::Failed(message))
            }
            Some(Outcome::Complete(duration_secs)) if finished.success() => {
                if tokio::fs::metadata(output).await.is_err() {
                    return Err(DesignError::Failed(
                        "Helper reported success but wrote no audio".to_string(),
                    ));
                }
                Ok(DesignedPreview {
                    path: output.to_path_buf(),
                    duration_secs,
                })
            }
            _ => {
                let tail = error_tail(&finished.lines);
                let reason = if tail.is_empty() {
                    format!("helper exited with {}", finished.status)
                } else {
                    tail
                };
                warn!(model = %model.id, %reason, "Voice design helper failed");
                Err(DesignError::Failed(reason))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingEmitter(Mutex<Vec<ChannelMessage>>);

    impl ProgressEmitter for RecordingEmitter {
        fn emit(&self, message: ChannelMessage) {
            self.0.lock().unwrap().push(message);
        }
    }

    fn helper(dir: &Path, body: &str) -> ProcessVoiceDesigner {
        let path = dir.join("helper.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ProcessVoiceDesigner::new(path, Vec::new())
    }

    /// Writes `$2` after `--output`.
    const WRITE_OUTPUT: &str = r#"while [ $# -gt 0 ]; do
  if [ "$1" = "--output" ]; then out="$2"; fi
  shift
done"#;

    #[tokio::test]
    async fn successful_run_forwards_progress() {
        let dir = tempfile::tempdir().unwrap();
        let designer = helper(
            dir.path(),
            &format!(
                r#"[ "$1" = "--check" ] && exit 0
{WRITE_OUTPUT}
echo '{{"status":"progress","stage":"loading_model","message":"Loading tokenizer...","percent":80}}'
echo 'Loading checkpoint shards: 100%' >&2
echo 'RIFF' > "$out"
echo '{{"status":"complete","duration":2.5}}'"#
            ),
        );
        assert!(designer.is_available().await);

        let emitter = Arc::new(RecordingEmitter::default());
        let output = dir.path().join("20260101").join("preview.wav");
        let preview = designer
            .generate_preview(
                &PreviewRequest::new("a calm narrator"),
                &output,
                emitter.clone(),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(preview.path, output);
        assert!((preview.duration_secs - 2.5).abs() < f64::EPSILON);
        let seen = emitter.0.lock().unwrap();
        let fractions: Vec<_> = seen
            .iter()
            .filter_map(|m| m.as_progress()?.fraction)
            .collect();
        assert_eq!(fractions, vec![0.1, 0.8]);
        assert!(
            seen[0]
                .str_field("message")
                .unwrap()
                .starts_with("Loading Parler Mini v1.1")
        );
    }

    #[tokio::test]
    async fn helper_error_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let designer = helper(
            dir.path(),
            r#"echo '{"status":"error","message":"CUDA out of memory"}'; exit 1"#,
        );

        let err = designer
            .generate_preview(
                &PreviewRequest::new("x"),
                &dir.path().join("out.wav"),
                Arc::new(RecordingEmitter::default()),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DesignError::Failed("CUDA out of memory".to_string()));
    }

    #[tokio::test]
    async fn unknown_model_is_rejected_before_spawning() {
        let designer = ProcessVoiceDesigner::new("/nonexistent/helper", Vec::new());
        let err = designer
            .generate_preview(
                &PreviewRequest::new("x").with_model("parler-huge"),
                Path::new("/tmp/never.wav"),
                Arc::new(RecordingEmitter::default()),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, DesignError::UnknownModel("parler-huge".to_string()));
        assert!(!designer.is_available().await);
    }

    #[tokio::test]
    async fn cancellation_kills_the_helper() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("finished");
        let designer = helper(
            dir.path(),
            &format!("sleep 5; touch {}", marker.display()),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = designer
            .generate_preview(
                &PreviewRequest::new("x"),
                &dir.path().join("out.wav"),
                Arc::new(RecordingEmitter::default()),
                cancel,
            )
            .await
            .unwrap_err();

        assert_eq!(err, DesignError::Cancelled);
        assert!(!marker.exists());
    }

    #[test]
    fn bundled_helper_is_deployed_once() {
        let dir = tempfile::tempdir().unwrap();
        let designer = ProcessVoiceDesigner::bundled("python3", dir.path()).unwrap();
        let script = dir.path().join(HELPER_FILE_NAME);
        assert_eq!(std::fs::read_to_string(&script).unwrap(), HELPER_SOURCE);
        assert_eq!(designer.args, vec![script.to_string_lossy().into_owned()]);

        // Redeploying leaves an identical file alone.
        let modified = std::fs::metadata(&script).unwrap().modified().unwrap();
        ProcessVoiceDesigner::bundled("python3", dir.path()).unwrap();
        assert_eq!(
            std::fs::metadata(&script).unwrap().modified().unwrap(),
            modified
        );
    }
}
