//! Interactive shell.
//!
//! Terminals paste the paths of files dragged onto them, so a line that looks
//! like paths is handled as a drop. Run updates are drained on the same loop
//! that reads input; the run itself lives on its own task.

// The shell talks to the user on stdout
#![allow(clippy::print_stdout)]

use std::io::{IsTerminal, Stdin, Write};
use std::path::PathBuf;

use anyhow::Result;
use pdfdesk_core::dnd::{self, DropBatch, DropCallback, DropTarget};
use pdfdesk_core::form::FIELD_NAMES;
use pdfdesk_core::{
    ConfigStore, Error, FileSelection, FormState, MergeChoice, OllamaClient, Orchestrator,
    RunHandle, RunUpdate, SelectionChange, StartOutcome, source_languages, target_languages,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::progress::ProgressView;

const HELP: &str = "\
Commands:
  show                  current settings and selection
  set FIELD VALUE       change a setting (fields: see 'set')
  languages             list language codes
  open PATHS...         select files, replacing the selection
  add PATHS...          add files (same as dropping them here)
  files                 list selected files
  toggle-key            show or hide the API key
  check                 test the connection to Ollama
  models                list models on the Ollama server
  save                  write the configuration file
  export PATH           save, then copy the configuration to PATH
  reset                 delete the configuration file and restore defaults
  start                 translate the selected files
  quit                  leave the shell
Drag PDF files onto this terminal to select them.";

/// Receives drops as pasted lines on an interactive terminal.
#[derive(Default)]
pub struct TerminalDropTarget {
    callback: Option<DropCallback>,
}

impl TerminalDropTarget {
    fn attach(&mut self, callback: DropCallback) {
        self.callback = Some(callback);
    }

    /// Filter one pasted payload and hand it to the callback.
    ///
    /// Returns `false` when no callback is registered.
    pub fn deliver(&mut self, payload: &str) -> bool {
        match self.callback.as_mut() {
            Some(callback) => {
                callback(dnd::filter_payload(payload));
                true
            }
            None => false,
        }
    }
}

impl DropTarget for TerminalDropTarget {
    type Widget = Stdin;

    fn register(&mut self, widget: &Stdin, callback: DropCallback) -> pdfdesk_core::Result<()> {
        if !widget.is_terminal() {
            return Err(Error::DropUnavailable("stdin is not a terminal".to_string()));
        }
        self.attach(callback);
        Ok(())
    }
}

/// Pasted text that should be read as file paths
fn looks_like_paths(line: &str) -> bool {
    line.starts_with(['/', '~', '.', '\'', '"', '{'])
        || line.starts_with("file://")
        || line.to_ascii_lowercase().contains(".pdf")
}

fn parse_merge_choice(answer: &str) -> MergeChoice {
    match answer.trim().to_ascii_lowercase().as_str() {
        "a" | "add" => MergeChoice::Add,
        "r" | "replace" => MergeChoice::Replace,
        _ => MergeChoice::Cancel,
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

/// Question waiting for the next input line
enum Pending {
    Merge(Vec<PathBuf>),
    ConfirmQuit,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct ActiveRun {
    handle: RunHandle,
    view: ProgressView,
}

async fn next_update(run: Option<&mut ActiveRun>) -> Option<RunUpdate> {
    match run {
        Some(run) => run.handle.updates.recv().await,
        None => std::future::pending().await,
    }
}

pub struct Shell {
    store: ConfigStore,
    form: FormState,
    selection: FileSelection,
    orchestrator: Orchestrator,
    backend: OllamaClient,
    drops: TerminalDropTarget,
    dropped: mpsc::UnboundedReceiver<DropBatch>,
    drop_sender: mpsc::UnboundedSender<DropBatch>,
    pending: Option<Pending>,
    run: Option<ActiveRun>,
}

impl Shell {
    pub fn new(store: ConfigStore, form: FormState, orchestrator: Orchestrator) -> Self {
        let (drop_sender, dropped) = mpsc::unbounded_channel();
        Self {
            store,
            form,
            selection: FileSelection::new(),
            orchestrator,
            backend: OllamaClient::new(),
            drops: TerminalDropTarget::default(),
            dropped,
            drop_sender,
            pending: None,
            run: None,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let sender = self.drop_sender.clone();
        let callback: DropCallback = Box::new(move |batch| {
            let _ = sender.send(batch);
        });
        if let Err(e) = self.drops.register(&std::io::stdin(), callback) {
            warn!("Drag and drop disabled: {}", e);
        }

        println!("PDF Desk. Type 'help' for commands.");
        println!("{}", self.selection.summary());
        prompt();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut input_open = true;
        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    let Some(line) = line? else {
                        input_open = false;
                        if self.on_input_closed() == Flow::Quit {
                            break;
                        }
                        continue;
                    };
                    if self.handle_line(line.trim()).await == Flow::Quit {
                        break;
                    }
                    prompt();
                }
                Some(update) = next_update(self.run.as_mut()) => {
                    if self.on_update(update).await {
                        if !input_open {
                            break;
                        }
                        prompt();
                    }
                }
            }
        }

        self.save_quietly();
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        if let Some(pending) = self.pending.take() {
            return self.answer(pending, line);
        }
        if line.is_empty() {
            return Flow::Continue;
        }

        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(command, rest)| (command, rest.trim()));

        match command {
            "help" | "?" => println!("{HELP}"),
            "show" => self.show(),
            "set" => self.set(rest),
            "languages" => print_languages(),
            "open" => self.open(rest),
            "add" => self.on_drop(dnd::filter_payload(rest)),
            "files" => self.list_files(),
            "toggle-key" => self.toggle_key(),
            "check" => self.check().await,
            "models" => self.models().await,
            "save" => self.save(),
            "export" => self.export(rest),
            "reset" => self.reset(),
            "start" => self.start().await,
            "quit" | "exit" => return self.request_quit(),
            _ if looks_like_paths(line) && self.drops.deliver(line) => self.drain_drops(),
            _ => println!("Unknown command '{command}'. Type 'help' for commands."),
        }
        Flow::Continue
    }

    fn answer(&mut self, pending: Pending, line: &str) -> Flow {
        match pending {
            Pending::Merge(batch) => {
                self.merge(batch, parse_merge_choice(line));
                Flow::Continue
            }
            Pending::ConfirmQuit if is_yes(line) => Flow::Quit,
            Pending::ConfirmQuit => Flow::Continue,
        }
    }

    /// End of input. An active run is allowed to finish since nobody is
    /// left to confirm abandoning it.
    fn on_input_closed(&self) -> Flow {
        if self.run.is_some() {
            warn!("Input closed; waiting for the running translation to finish");
            Flow::Continue
        } else {
            Flow::Quit
        }
    }

    fn request_quit(&mut self) -> Flow {
        if self.run.is_some() {
            println!("A translation is in progress. Quit anyway? [y/N]");
            self.pending = Some(Pending::ConfirmQuit);
            Flow::Continue
        } else {
            Flow::Quit
        }
    }

    // =========================================================================
    // Selection
    // =========================================================================

    fn drain_drops(&mut self) {
        while let Ok(batch) = self.dropped.try_recv() {
            self.on_drop(batch);
        }
    }

    fn on_drop(&mut self, batch: DropBatch) {
        if batch.all_invalid() {
            warn!("Dropped {} item(s), none of them a PDF file", batch.rejected);
            println!("No valid PDF files were dropped. Only existing .pdf files are accepted.");
            return;
        }
        if batch.accepted.is_empty() {
            return;
        }
        if batch.rejected > 0 {
            debug!("Ignored {} dropped item(s) that are not PDF files", batch.rejected);
        }

        if self.selection.is_empty() {
            self.merge(batch.accepted, MergeChoice::Replace);
        } else {
            println!(
                "{} file(s) already selected. [a]dd, [r]eplace or [c]ancel?",
                self.selection.len()
            );
            self.pending = Some(Pending::Merge(batch.accepted));
        }
    }

    fn merge(&mut self, batch: Vec<PathBuf>, choice: MergeChoice) {
        match self.selection.merge(batch, choice) {
            SelectionChange::Added(n) => println!("Added {n} file(s)."),
            SelectionChange::Replaced(n) => println!("Selected {n} file(s)."),
            SelectionChange::NothingNew => println!("All dropped files are already selected."),
            SelectionChange::Unchanged => println!("Selection unchanged."),
        }
        println!("{}", self.selection.summary());
    }

    /// Picker semantics: replace whatever was selected.
    fn open(&mut self, paths: &str) {
        let batch = dnd::filter_paths(&dnd::split_payload(paths));
        if batch.accepted.is_empty() {
            println!("No PDF files found in '{paths}'.");
            return;
        }
        if batch.rejected > 0 {
            debug!("Ignored {} picked item(s) that are not PDF files", batch.rejected);
        }
        self.merge(batch.accepted, MergeChoice::Replace);
    }

    fn list_files(&self) {
        if self.selection.is_empty() {
            println!("{}", self.selection.summary());
        }
        for (i, path) in self.selection.paths().iter().enumerate() {
            println!("{:>3}. {}", i + 1, path.display());
        }
    }

    // =========================================================================
    // Settings
    // =========================================================================

    fn show(&self) {
        let form = &self.form;
        let output = form
            .output_dir
            .as_ref()
            .map_or_else(|| "(next to each input file)".to_string(), |p| p.display().to_string());

        println!("Source language : {}", form.source_lang);
        println!("Target language : {}", form.target_lang);
        println!("QPS             : {}", form.qps);
        println!("Model           : {}", form.model);
        println!("Ollama URL      : {}", form.ollama_url);
        println!("API key         : {}", form.displayed_api_key());
        println!("Bilingual PDF   : {}", on_off(form.dual_output));
        println!("Mono PDF        : {}", on_off(form.mono_output));
        println!("Output folder   : {output}");
        println!("Config file     : {}", self.store.path().display());
        println!("{}", self.selection.summary());
    }

    fn set(&mut self, args: &str) {
        let (field, value) = args
            .split_once(char::is_whitespace)
            .unwrap_or((args, ""));
        if field.is_empty() {
            println!("Usage: set FIELD VALUE, FIELD one of {}", FIELD_NAMES.join(", "));
            return;
        }
        match self.form.set(field, value) {
            Ok(()) => {
                debug!("Set {} = {}", field, value);
                self.save_quietly();
            }
            Err(e) => println!("{e}"),
        }
    }

    fn toggle_key(&mut self) {
        let shown = self.form.toggle_api_key_visibility();
        println!(
            "API key {}: {}",
            if shown { "shown" } else { "hidden" },
            self.form.displayed_api_key()
        );
        self.save_quietly();
    }

    fn save(&self) {
        match self.form.to_record() {
            Ok(record) => match self.store.write(&record, &self.form.interface) {
                Ok(()) => println!("Configuration saved to {}", self.store.path().display()),
                Err(e) => println!("{e}"),
            },
            Err(e) => println!("{e}"),
        }
    }

    fn save_quietly(&self) {
        match self.form.to_record() {
            Ok(record) => self.store.save(&record, &self.form.interface),
            Err(e) => warn!("Not saving configuration: {}", e),
        }
    }

    fn export(&self, dest: &str) {
        if dest.is_empty() {
            println!("Usage: export PATH");
            return;
        }
        let result = self
            .form
            .to_record()
            .and_then(|record| self.store.export(&record, &self.form.interface, dest));
        match result {
            Ok(()) => println!("Configuration exported to {dest}. Use it with: babeldoc --config {dest}"),
            Err(e) => println!("{e}"),
        }
    }

    fn reset(&mut self) {
        if let Err(e) = self.store.reset() {
            println!("{e}");
            return;
        }
        self.form.reset();
        println!("Settings restored to defaults.");
    }

    // =========================================================================
    // Backend
    // =========================================================================

    async fn check(&self) {
        let url = self.form.ollama_url.trim();
        match self.backend.probe(url).await {
            Ok(()) => println!("Ollama is reachable at {url}"),
            Err(e) => println!("Cannot reach Ollama at {url}: {e}"),
        }
    }

    async fn models(&self) {
        match self.backend.list_models(self.form.ollama_url.trim()).await {
            Ok(models) if models.is_empty() => println!("No models installed."),
            Ok(models) => {
                for model in models {
                    let marker = if model == self.form.model { "*" } else { " " };
                    println!("{marker} {model}");
                }
            }
            Err(e) => println!("{e}"),
        }
    }

    // =========================================================================
    // Runs
    // =========================================================================

    async fn start(&mut self) {
        let record = match self.form.to_record() {
            Ok(record) => record,
            Err(e) => {
                println!("{e}");
                return;
            }
        };
        self.store.save(&record, &self.form.interface);

        match self.orchestrator.start(&self.selection.snapshot(), &record).await {
            Ok(StartOutcome::Started(handle)) => {
                info!("Run {} started", handle.run_id);
                self.run = Some(ActiveRun {
                    handle,
                    view: ProgressView::new(),
                });
            }
            Ok(StartOutcome::AlreadyRunning) => println!("A translation is already running."),
            Err(Error::NoFiles) => println!("Please select at least one PDF file."),
            Err(e @ Error::BackendUnreachable(_)) => {
                println!("Cannot reach Ollama at {}: {e}", record.base_url);
            }
            Err(e) => println!("Cannot start translation: {e}"),
        }
    }

    /// Returns `true` once the run is over.
    async fn on_update(&mut self, update: RunUpdate) -> bool {
        if let Some(run) = &self.run {
            run.view.apply(&update);
        }
        if !matches!(update, RunUpdate::Completed(_) | RunUpdate::Aborted { .. }) {
            return false;
        }

        if let Some(run) = self.run.take()
            && let Err(e) = run.handle.join().await
        {
            debug!("Run ended with error: {}", e);
        }
        true
    }
}

fn prompt() {
    print!("pdfdesk> ");
    let _ = std::io::stdout().flush();
}

fn print_languages() {
    println!("Source languages:");
    for lang in source_languages() {
        println!("  {} {:<6} {}", lang.flag, lang.code, lang.name);
    }
    println!("Target languages:");
    for lang in target_languages() {
        println!("  {} {:<6} {}", lang.flag, lang.code, lang.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, routing::get};
    use futures::StreamExt;
    use pdfdesk_core::{Engine, EventStream, TranslationRequest};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Never reports anything, so a started run stays active.
    struct StalledEngine;

    #[async_trait::async_trait]
    impl Engine for StalledEngine {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn translate(&self, _request: TranslationRequest) -> EventStream {
            futures::stream::pending().boxed()
        }
    }

    fn shell_in(dir: &Path) -> Shell {
        let store = ConfigStore::new(dir.join("config.toml"));
        let orchestrator = Orchestrator::new(Arc::new(StalledEngine), OllamaClient::new());
        Shell::new(store, FormState::default(), orchestrator)
    }

    async fn healthy_backend() -> String {
        let app = Router::new().route("/api/tags", get(|| async { r#"{"models":[]}"# }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_field_edits_are_saved_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut shell = shell_in(dir.path());
        let config = dir.path().join("config.toml");

        shell.handle_line("set qps 4").await;
        let saved = std::fs::read_to_string(&config).unwrap();
        assert!(saved.contains("qps = 4"));
        assert!(saved.contains("pool-max-workers = 8"));

        shell.handle_line("toggle-key").await;
        let saved = std::fs::read_to_string(&config).unwrap();
        assert!(saved.contains("show_api_key = true"));

        // Invalid values stay in the form but never reach the file
        shell.handle_line("set qps fast").await;
        let saved = std::fs::read_to_string(&config).unwrap();
        assert!(saved.contains("qps = 4"));
    }

    #[tokio::test]
    async fn test_open_keeps_percent_in_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report%202024.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        let mut shell = shell_in(dir.path());

        shell.handle_line(&format!("open '{}'", pdf.display())).await;
        assert_eq!(shell.selection.paths(), [pdf]);
    }

    #[test]
    fn test_partial_drop_selects_the_pdfs() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"notes").unwrap();

        let mut shell = shell_in(dir.path());
        shell.on_drop(dnd::filter_paths(&[pdf.clone(), notes]));

        assert_eq!(shell.selection.paths(), [pdf]);
        assert!(shell.pending.is_none());
    }

    #[tokio::test]
    async fn test_input_closed_during_run_waits() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();

        let mut shell = shell_in(dir.path());
        assert_eq!(shell.on_input_closed(), Flow::Quit);

        shell.form.ollama_url = healthy_backend().await;
        shell.handle_line(&format!("open '{}'", pdf.display())).await;
        shell.handle_line("start").await;
        assert!(shell.run.is_some());

        assert_eq!(shell.on_input_closed(), Flow::Continue);

        assert_eq!(shell.handle_line("quit").await, Flow::Continue);
        assert!(matches!(shell.pending, Some(Pending::ConfirmQuit)));
        assert_eq!(shell.handle_line("n").await, Flow::Continue);
        assert!(shell.pending.is_none());
    }

    #[test]
    fn test_looks_like_paths() {
        assert!(looks_like_paths("/home/me/a.pdf"));
        assert!(looks_like_paths("'/home/me/my paper.pdf'"));
        assert!(looks_like_paths("file:///tmp/x.pdf"));
        assert!(looks_like_paths("Report.PDF"));
        assert!(!looks_like_paths("strat"));
    }

    #[test]
    fn test_parse_merge_choice() {
        assert_eq!(parse_merge_choice("a"), MergeChoice::Add);
        assert_eq!(parse_merge_choice(" Replace "), MergeChoice::Replace);
        assert_eq!(parse_merge_choice(""), MergeChoice::Cancel);
        assert_eq!(parse_merge_choice("whatever"), MergeChoice::Cancel);
    }

    #[test]
    fn test_unregistered_target_ignores_payload() {
        let mut target = TerminalDropTarget::default();
        assert!(!target.deliver("/tmp/a.pdf"));
    }

    #[test]
    fn test_delivered_payload_is_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("my paper.pdf");
        std::fs::write(&pdf, b"%PDF-1.7").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"notes").unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let mut target = TerminalDropTarget::default();
        target.attach(Box::new(move |batch| sink.lock().unwrap().push(batch)));

        let payload = format!(
            "'{}' {}",
            pdf.display(),
            dir.path().join("notes.txt").display()
        );
        assert!(target.deliver(&payload));

        let batches = received.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].accepted, vec![pdf]);
        assert_eq!(batches[0].rejected, 1);
    }
}
