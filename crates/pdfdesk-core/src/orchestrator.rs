//! Drives one engine call per selected file.
//!
//! A run works on owned snapshots of the selection and the record, executes
//! on its own tokio task, and reports through an unbounded channel so the
//! presentation loop never blocks on it. Files are processed strictly in
//! order. A clean `Error` event fails only its file; an engine failure aborts
//! the whole run.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::backend::OllamaClient;
use crate::config::ConfigRecord;
use crate::engine::{Engine, EngineEvent, LayoutModel, TranslateResult, TranslationRequest};
use crate::error::{Error, Result};
use crate::util::display_name;

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Translated { path: PathBuf, result: TranslateResult },
    Failed { path: PathBuf, message: String },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Translated { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Translated { .. })
    }
}

/// Per-file outcomes of a finished run, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Messages posted from the worker to the presentation loop
#[derive(Debug, Clone, PartialEq)]
pub enum RunUpdate {
    Started {
        run_id: Uuid,
        total: usize,
    },
    FileStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    /// Engine progress for the current file, forwarded verbatim
    FileProgress {
        path: PathBuf,
        stage: String,
        overall_progress: f64,
    },
    FileFinished(FileOutcome),
    /// Percent of files attempted so far
    OverallProgress(f64),
    Completed(RunSummary),
    /// The run stopped early; the guard has been released
    Aborted {
        message: String,
    },
}

/// Result of asking for a new run
#[derive(Debug)]
pub enum StartOutcome {
    Started(RunHandle),
    /// A run is active; nothing was changed
    AlreadyRunning,
}

/// Presentation-side handle of a spawned run
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: Uuid,
    pub updates: UnboundedReceiver<RunUpdate>,
    task: JoinHandle<Result<RunSummary>>,
}

impl RunHandle {
    /// Wait for the worker to end.
    pub async fn join(self) -> Result<RunSummary> {
        self.task
            .await
            .map_err(|e| Error::Worker(e.to_string()))?
    }
}

/// Holds the run flag; releases it when dropped
struct RunGuard {
    active: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(active: &Arc<AtomicBool>) -> Option<Self> {
        active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                active: Arc::clone(active),
            })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    backend: OllamaClient,
    layout: LayoutModel,
    active: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn Engine>, backend: OllamaClient) -> Self {
        Self {
            engine,
            backend,
            layout: LayoutModel::default(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_layout(mut self, layout: LayoutModel) -> Self {
        self.layout = layout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Validate, probe the backend, then spawn the worker.
    ///
    /// While a run is active this is a no-op returning
    /// [`StartOutcome::AlreadyRunning`]. Probe failures are returned and no
    /// run starts.
    pub async fn start(&self, files: &[PathBuf], config: &ConfigRecord) -> Result<StartOutcome> {
        let Some(guard) = RunGuard::acquire(&self.active) else {
            warn!("Translation already in progress, ignoring start request");
            return Ok(StartOutcome::AlreadyRunning);
        };

        if files.is_empty() {
            return Err(Error::NoFiles);
        }

        self.backend.probe(&config.base_url).await?;

        let run_id = Uuid::new_v4();
        let files = files.to_vec();
        let config = config.clone();
        let engine = Arc::clone(&self.engine);
        let layout = self.layout.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        let span = info_span!("run", %run_id);
        let task = tokio::spawn(
            async move {
                let _guard = guard;
                let outcome = run_files(engine.as_ref(), &layout, run_id, &files, &config, &tx).await;
                if let Err(ref e) = outcome {
                    error!("Translation run aborted: {}", e);
                    post(&tx, RunUpdate::Aborted {
                        message: e.to_string(),
                    });
                }
                outcome
            }
            .instrument(span),
        );

        Ok(StartOutcome::Started(RunHandle {
            run_id,
            updates: rx,
            task,
        }))
    }

    /// Translate `files` in order on the current task.
    ///
    /// Skips the guard and the backend probe; [`Orchestrator::start`] is the
    /// entry point for interactive use.
    pub async fn run(
        &self,
        files: &[PathBuf],
        config: &ConfigRecord,
        updates: &UnboundedSender<RunUpdate>,
    ) -> Result<RunSummary> {
        run_files(
            self.engine.as_ref(),
            &self.layout,
            Uuid::new_v4(),
            files,
            config,
            updates,
        )
        .await
    }
}

fn post(updates: &UnboundedSender<RunUpdate>, update: RunUpdate) {
    // A closed receiver means the presentation is gone; the run continues
    let _ = updates.send(update);
}

#[allow(clippy::cast_precision_loss)]
fn overall_percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    (done as f64 / total as f64) * 100.0
}

async fn run_files(
    engine: &dyn Engine,
    layout: &LayoutModel,
    run_id: Uuid,
    files: &[PathBuf],
    config: &ConfigRecord,
    updates: &UnboundedSender<RunUpdate>,
) -> Result<RunSummary> {
    let total = files.len();
    info!("Starting translation of {} file(s) with {}", total, engine.name());
    post(updates, RunUpdate::Started { run_id, total });

    let mut outcomes = Vec::with_capacity(total);

    for (index, path) in files.iter().enumerate() {
        info!("Starting translation of: {}", display_name(path));
        post(updates, RunUpdate::FileStarted {
            index,
            total,
            path: path.clone(),
        });

        let request = TranslationRequest::new(config, path, layout);
        let outcome = translate_file(engine, request, updates).await?;

        match &outcome {
            FileOutcome::Translated { result, .. } => {
                info!("Successfully translated: {}", display_name(path));
                if let Some(mono) = &result.mono_pdf_path {
                    info!("  Mono PDF: {}", mono.display());
                }
                if let Some(dual) = &result.dual_pdf_path {
                    info!("  Dual-language PDF: {}", dual.display());
                }
            }
            FileOutcome::Failed { message, .. } => {
                error!("Failed to translate {}: {}", display_name(path), message);
            }
        }

        post(updates, RunUpdate::FileFinished(outcome.clone()));
        post(updates, RunUpdate::OverallProgress(overall_percent(index + 1, total)));
        outcomes.push(outcome);
    }

    let summary = RunSummary { run_id, outcomes };
    info!(
        "Translation run finished: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    post(updates, RunUpdate::Completed(summary.clone()));
    Ok(summary)
}

/// Consume events for one file up to the first `Finish` or `Error`.
async fn translate_file(
    engine: &dyn Engine,
    request: TranslationRequest,
    updates: &UnboundedSender<RunUpdate>,
) -> Result<FileOutcome> {
    let path = request.input_file.clone();
    let mut events = engine.translate(request);

    while let Some(event) = events.next().await {
        match event? {
            EngineEvent::Progress {
                stage,
                overall_progress,
            } => post(updates, RunUpdate::FileProgress {
                path: path.clone(),
                stage,
                overall_progress,
            }),
            EngineEvent::Finish { result } => {
                return Ok(FileOutcome::Translated { path, result });
            }
            EngineEvent::Error { message } => {
                return Ok(FileOutcome::Failed { path, message });
            }
        }
    }

    Ok(FileOutcome::Failed {
        path,
        message: "engine finished without a result".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_percent() {
        assert!((overall_percent(1, 2) - 50.0).abs() < f64::EPSILON);
        assert!((overall_percent(3, 3) - 100.0).abs() < f64::EPSILON);
        assert!((overall_percent(0, 0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let active = Arc::new(AtomicBool::new(false));
        let guard = RunGuard::acquire(&active).unwrap();
        assert!(RunGuard::acquire(&active).is_none());
        drop(guard);
        assert!(!active.load(Ordering::SeqCst));
        assert!(RunGuard::acquire(&active).is_some());
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            run_id: Uuid::nil(),
            outcomes: vec![
                FileOutcome::Translated {
                    path: PathBuf::from("/a.pdf"),
                    result: TranslateResult::default(),
                },
                FileOutcome::Failed {
                    path: PathBuf::from("/b.pdf"),
                    message: "boom".to_string(),
                },
            ],
        };
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
    }
}
