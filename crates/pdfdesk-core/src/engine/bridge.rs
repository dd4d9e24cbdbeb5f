//! BabelDOC reached through a Python subprocess.
//!
//! The request goes in as JSON on stdin, events come back as JSON lines on
//! stdout. Stderr carries the library's own logging and is only kept for
//! error reports.

use async_trait::async_trait;
use futures::channel::mpsc::{self, UnboundedSender};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

use super::{Engine, EngineEvent, EventStream, TranslationRequest};
use crate::error::{Error, Result};

const BRIDGE_SCRIPT: &str = include_str!("babeldoc_bridge.py");

/// Imports the bridge needs, used by [`Engine::check`]
const REQUIRED_MODULES: &[&str] = &[
    "babeldoc",
    "babeldoc.format.pdf.high_level",
    "babeldoc.format.pdf.translation_config",
    "babeldoc.translator.translator",
    "babeldoc.docvision.doclayout",
];

/// Stderr lines kept for error messages
const STDERR_TAIL_LINES: usize = 20;

/// Default interpreter
pub const DEFAULT_PYTHON: &str = "python3";

pub struct BabeldocBridge {
    python: PathBuf,
}

impl BabeldocBridge {
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
        }
    }

    pub fn python(&self) -> &Path {
        &self.python
    }
}

impl Default for BabeldocBridge {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

#[async_trait]
impl Engine for BabeldocBridge {
    fn name(&self) -> &'static str {
        "babeldoc"
    }

    fn translate(&self, request: TranslationRequest) -> EventStream {
        let (tx, rx) = mpsc::unbounded();
        let python = self.python.clone();

        tokio::spawn(async move {
            if let Err(e) = run_bridge(&python, &request, &tx).await {
                // Receiver may already be gone
                let _ = tx.unbounded_send(Err(e));
            }
        });

        Box::pin(rx)
    }

    async fn check(&self) -> Result<()> {
        let script = REQUIRED_MODULES
            .iter()
            .map(|m| format!("import {m}"))
            .collect::<Vec<_>>()
            .join("; ");

        let output = Command::new(&self.python)
            .arg("-c")
            .arg(&script)
            .output()
            .await
            .map_err(|e| Error::EngineSpawn(format!("{}: {}", self.python.display(), e)))?;

        if output.status.success() {
            info!("BabelDOC available via {}", self.python.display());
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::EngineUnavailable(last_line(&stderr).to_string()))
        }
    }
}

async fn run_bridge(
    python: &Path,
    request: &TranslationRequest,
    tx: &UnboundedSender<Result<EngineEvent>>,
) -> Result<()> {
    let payload = serde_json::to_vec(request)
        .map_err(|e| Error::EngineSpawn(format!("Failed to encode request: {e}")))?;

    debug!(
        "Starting bridge for {} with {}",
        request.input_file.display(),
        python.display()
    );

    let mut child = Command::new(python)
        .arg("-c")
        .arg(BRIDGE_SCRIPT)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::EngineSpawn(format!("{}: {}", python.display(), e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::EngineSpawn("bridge stdin unavailable".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::EngineSpawn("bridge stdout unavailable".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::EngineSpawn("bridge stderr unavailable".to_string()))?;

    let stderr_task = tokio::spawn(collect_stderr(stderr));

    stdin.write_all(&payload).await?;
    // Closing stdin lets the bridge finish json.load
    drop(stdin);

    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = parse_event_line(line)?;
        let terminal = event.is_terminal();
        if tx.unbounded_send(Ok(event)).is_err() {
            debug!("Event consumer went away, stopping bridge");
            return Ok(());
        }
        if terminal {
            break;
        }
    }

    let status = child.wait().await?;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        warn!("Bridge exited with {}", status);
        Err(Error::EngineFailed(format!("{status}: {stderr_tail}")))
    }
}

fn parse_event_line(line: &str) -> Result<EngineEvent> {
    serde_json::from_str(line).map_err(|e| Error::EngineProtocol(format!("{line} ({e})")))
}

async fn collect_stderr(stderr: ChildStderr) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut lines = BufReader::new(stderr).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "babeldoc", "{}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

fn last_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("unknown error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_line_rejects_noise() {
        let err = parse_event_line("Loading model...").unwrap_err();
        assert!(matches!(err, Error::EngineProtocol(_)));
    }

    #[test]
    fn test_last_line_skips_blank() {
        let stderr = "Traceback (most recent call last):\n  ...\nModuleNotFoundError: No module named 'babeldoc'\n\n";
        assert_eq!(last_line(stderr), "ModuleNotFoundError: No module named 'babeldoc'");
        assert_eq!(last_line(""), "unknown error");
    }

    #[test]
    fn test_default_interpreter() {
        assert_eq!(BabeldocBridge::default().python(), Path::new("python3"));
        assert_eq!(
            BabeldocBridge::new("/opt/venv/bin/python").python(),
            Path::new("/opt/venv/bin/python")
        );
    }

    /// Stand-in interpreter: ignores `-c <script>`, drains the request and
    /// runs `body` as shell.
    #[cfg(unix)]
    fn fake_interpreter(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-python");
        std::fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    async fn run_fake(body: &str) -> Vec<Result<EngineEvent>> {
        use futures::StreamExt;

        let dir = tempfile::tempdir().unwrap();
        let bridge = BabeldocBridge::new(fake_interpreter(dir.path(), body));
        let request = TranslationRequest::new(
            &crate::config::ConfigRecord::default(),
            Path::new("/tmp/a.pdf"),
            &crate::engine::LayoutModel::Bundled,
        );
        bridge.translate(request).collect().await
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bridge_stops_after_finish() {
        let events = run_fake(
            r#"echo '{"type":"progress_update","stage":"Parse PDF","overall_progress":10}'
echo ''
echo '{"type":"finish","translate_result":{"mono_pdf_path":"/tmp/a.zh.mono.pdf","dual_pdf_path":null}}'
echo 'trailing noise'"#,
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            Ok(EngineEvent::Progress { stage, .. }) if stage == "Parse PDF"
        ));
        assert!(matches!(
            &events[1],
            Ok(EngineEvent::Finish { result }) if result.mono_pdf_path == Some(PathBuf::from("/tmp/a.zh.mono.pdf"))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bridge_rejects_non_event_output() {
        let events = run_fake("echo 'Loading model...'").await;

        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Err(Error::EngineProtocol(line)) if line.contains("Loading model")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bridge_exit_status_carries_stderr_tail() {
        let events = run_fake(
            r#"echo '{"type":"progress_update","stage":"Parse PDF","overall_progress":1}'
echo boom >&2
exit 3"#,
        )
        .await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        match &events[1] {
            Err(Error::EngineFailed(message)) => {
                assert!(message.contains('3'), "{message}");
                assert!(message.ends_with("boom"), "{message}");
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_interpreter_surfaces_as_stream_error() {
        use futures::StreamExt;

        let bridge = BabeldocBridge::new("/nonexistent/python-for-pdfdesk");
        let request = TranslationRequest::new(
            &crate::config::ConfigRecord::default(),
            Path::new("/tmp/a.pdf"),
            &crate::engine::LayoutModel::Bundled,
        );

        let mut events = bridge.translate(request);
        let first = events.next().await.unwrap();
        assert!(matches!(first, Err(Error::EngineSpawn(_))));
    }
}
