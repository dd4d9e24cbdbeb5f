//! PDF Desk CLI - translate PDF documents with BabelDOC and a local Ollama server.

mod progress;
mod shell;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use pdfdesk_core::engine::DEFAULT_PYTHON;
use pdfdesk_core::{
    BabeldocBridge, ConfigStore, Engine, FormState, LayoutModel, OllamaClient, Orchestrator,
    StartOutcome, dnd,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::progress::ProgressView;
use crate::shell::Shell;

#[derive(Parser, Debug)]
#[command(name = "pdfdesk")]
#[command(author, version, about = "Translate PDF documents with BabelDOC and Ollama", long_about = None)]
struct Args {
    /// Config file path (default: ~/.pdf_translator_config.toml)
    #[arg(short, long, global = true, env = "PDFDESK_CONFIG")]
    config: Option<PathBuf>,

    /// Python interpreter with BabelDOC installed
    #[arg(long, global = true, env = "PDFDESK_PYTHON", default_value = DEFAULT_PYTHON)]
    python: PathBuf,

    /// Serve layout detection from this RPC host instead of the bundled model
    #[arg(long, global = true)]
    rpc_doclayout: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Defaults to the interactive shell
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate PDF files
    Translate {
        /// Input PDF files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        overrides: Overrides,

        /// Write the effective settings to the config file
        #[arg(long)]
        save: bool,
    },

    /// Check that the Ollama server is reachable
    Check {
        /// Ollama base URL
        #[arg(long, env = "OLLAMA_URL")]
        ollama_url: Option<String>,
    },

    /// List models installed on the Ollama server
    Models {
        /// Ollama base URL
        #[arg(long, env = "OLLAMA_URL")]
        ollama_url: Option<String>,
    },

    /// Inspect or manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Verify the Python environment and the Ollama server
    Doctor,

    /// Interactive shell; drag files onto the terminal to select them
    Shell,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the document that would be saved
    Show,
    /// Print the config file location
    Path,
    /// Save, then copy the config file for use with `babeldoc --config`
    Export { dest: PathBuf },
    /// Delete the config file
    Reset,
}

/// Per-invocation settings layered over the config file
#[derive(ClapArgs, Debug, Default)]
struct Overrides {
    /// Source language code
    #[arg(short = 's', long)]
    lang_in: Option<String>,

    /// Target language code
    #[arg(short = 't', long)]
    lang_out: Option<String>,

    /// Requests per second sent to the model
    #[arg(long)]
    qps: Option<String>,

    /// Ollama model name
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama base URL (without /v1)
    #[arg(long, env = "OLLAMA_URL")]
    ollama_url: Option<String>,

    /// API key passed to the OpenAI-compatible endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Skip the bilingual PDF
    #[arg(long)]
    no_dual: bool,

    /// Skip the translation-only PDF
    #[arg(long)]
    no_mono: bool,

    /// Output folder (default: next to each input file)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl Overrides {
    fn apply(&self, form: &mut FormState) {
        if let Some(lang) = &self.lang_in {
            form.source_lang.clone_from(lang);
        }
        if let Some(lang) = &self.lang_out {
            form.target_lang.clone_from(lang);
        }
        if let Some(qps) = &self.qps {
            form.qps.clone_from(qps);
        }
        if let Some(model) = &self.model {
            form.model.clone_from(model);
        }
        if let Some(url) = &self.ollama_url {
            form.ollama_url.clone_from(url);
        }
        if let Some(key) = &self.api_key {
            form.api_key.clone_from(key);
        }
        if self.no_dual {
            form.dual_output = false;
        }
        if self.no_mono {
            form.mono_output = false;
        }
        if let Some(output) = &self.output {
            form.output_dir = Some(output.clone());
        }
    }
}

fn open_store(path: Option<&Path>) -> Result<ConfigStore> {
    match path {
        Some(path) => Ok(ConfigStore::new(path)),
        None => ConfigStore::at_default_location().context("Failed to locate config file"),
    }
}

/// Defaults, overwritten by whatever the config file holds.
fn load_form(store: &ConfigStore) -> FormState {
    let mut form = FormState::default();
    if let Some(loaded) = store.load() {
        form.apply_loaded(&loaded);
    }
    form
}

fn layout_model(rpc_host: Option<&str>) -> LayoutModel {
    rpc_host
        .filter(|host| !host.trim().is_empty())
        .map_or(LayoutModel::Bundled, |host| LayoutModel::Rpc {
            host: host.trim().to_string(),
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    let store = open_store(args.config.as_deref())?;
    let mut form = load_form(&store);

    let bridge = Arc::new(BabeldocBridge::new(&args.python));
    let engine: Arc<dyn Engine> = bridge.clone();
    let orchestrator = Orchestrator::new(engine, OllamaClient::new())
        .with_layout(layout_model(args.rpc_doclayout.as_deref()));

    match args.command.unwrap_or(Command::Shell) {
        Command::Translate {
            files,
            overrides,
            save,
        } => {
            overrides.apply(&mut form);
            translate(&store, &form, &orchestrator, &files, save).await
        }
        Command::Check { ollama_url } => {
            let url = ollama_url.unwrap_or(form.ollama_url);
            OllamaClient::new()
                .probe(&url)
                .await
                .with_context(|| format!("Ollama is not reachable at {url}"))?;
            print_line(&format!("Ollama is reachable at {url}"));
            Ok(())
        }
        Command::Models { ollama_url } => {
            let url = ollama_url.unwrap_or(form.ollama_url);
            let models = OllamaClient::new()
                .list_models(&url)
                .await
                .with_context(|| format!("Failed to list models at {url}"))?;
            for model in models {
                print_line(&model);
            }
            Ok(())
        }
        Command::Config { action } => config_command(&store, &form, action),
        Command::Doctor => doctor(&bridge, &form).await,
        Command::Shell => Shell::new(store, form, orchestrator).run().await,
    }
}

async fn translate(
    store: &ConfigStore,
    form: &FormState,
    orchestrator: &Orchestrator,
    files: &[PathBuf],
    save: bool,
) -> Result<()> {
    let record = form.to_record().context("Invalid settings")?;
    if save {
        store
            .write(&record, &form.interface)
            .context("Failed to save config")?;
    }

    let batch = dnd::filter_paths(files);
    if batch.rejected > 0 {
        warn!("Skipping {} path(s) that are not existing PDF files", batch.rejected);
    }
    if batch.accepted.is_empty() {
        anyhow::bail!("No valid PDF files to translate");
    }

    info!(
        "Translating {} file(s) from {} to {} with {}",
        batch.accepted.len(),
        record.lang_in,
        record.lang_out,
        record.model
    );

    let StartOutcome::Started(mut handle) = orchestrator
        .start(&batch.accepted, &record)
        .await
        .context("Cannot start translation")?
    else {
        anyhow::bail!("A translation is already running");
    };

    let view = ProgressView::new();
    while let Some(update) = handle.updates.recv().await {
        view.apply(&update);
    }

    let summary = handle.join().await.context("Translation aborted")?;
    if summary.failed() > 0 {
        anyhow::bail!(
            "{} of {} file(s) failed to translate",
            summary.failed(),
            summary.outcomes.len()
        );
    }
    Ok(())
}

fn config_command(store: &ConfigStore, form: &FormState, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let record = form.to_record().context("Invalid settings")?;
            let rendered = ConfigStore::render(&record, &form.interface)?;
            print_line(&format!("# {}", store.path().display()));
            print_line(&rendered);
        }
        ConfigAction::Path => print_line(&store.path().display().to_string()),
        ConfigAction::Export { dest } => {
            let record = form.to_record().context("Invalid settings")?;
            store
                .export(&record, &form.interface, &dest)
                .context("Failed to export config")?;
            print_line(&format!(
                "Exported to {0}; run: babeldoc --config {0} --files <pdf>",
                dest.display()
            ));
        }
        ConfigAction::Reset => {
            store.reset().context("Failed to reset config")?;
            print_line("Configuration reset to defaults");
        }
    }
    Ok(())
}

async fn doctor(bridge: &BabeldocBridge, form: &FormState) -> Result<()> {
    let mut problems = 0;
    let python = bridge.python().display();

    match bridge.check().await {
        Ok(()) => print_line(&format!("ok   {} is importable from {python}", bridge.name())),
        Err(e) => {
            problems += 1;
            print_line(&format!("FAIL {} via {python}: {e}", bridge.name()));
        }
    }

    match OllamaClient::new().list_models(&form.ollama_url).await {
        Ok(models) if models.iter().any(|m| m == &form.model) => {
            print_line(&format!("ok   Ollama at {} serves {}", form.ollama_url, form.model));
        }
        Ok(_) => {
            problems += 1;
            print_line(&format!(
                "FAIL model {} is not installed; run: ollama pull {}",
                form.model, form.model
            ));
        }
        Err(e) => {
            problems += 1;
            print_line(&format!("FAIL Ollama at {}: {}", form.ollama_url, e));
        }
    }

    if problems > 0 {
        anyhow::bail!("{problems} problem(s) found");
    }
    Ok(())
}

fn print_line(line: &str) {
    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_layer_over_form() {
        let mut form = FormState::default();
        let overrides = Overrides {
            lang_out: Some("zh-TW".to_string()),
            qps: Some("4".to_string()),
            no_dual: true,
            output: Some(PathBuf::from("/out")),
            ..Default::default()
        };
        overrides.apply(&mut form);

        let record = form.to_record().unwrap();
        assert_eq!(record.lang_in.as_str(), "en");
        assert_eq!(record.lang_out.as_str(), "zh-TW");
        assert_eq!(record.qps, 4);
        assert!(!record.dual_output);
        assert!(record.mono_output);
        assert_eq!(record.output_dir, Some(PathBuf::from("/out")));
    }

    #[test]
    fn test_layout_model_selection() {
        assert_eq!(layout_model(None), LayoutModel::Bundled);
        assert_eq!(layout_model(Some("  ")), LayoutModel::Bundled);
        assert_eq!(
            layout_model(Some("http://layout:8000")),
            LayoutModel::Rpc {
                host: "http://layout:8000".to_string()
            }
        );
    }

    #[test]
    fn test_cli_parses_translate() {
        let args = Args::try_parse_from([
            "pdfdesk", "translate", "a.pdf", "b.pdf", "-t", "zh-CN", "--no-mono", "--save",
        ])
        .unwrap();
        let Some(Command::Translate {
            files,
            overrides,
            save,
        }) = args.command
        else {
            panic!("expected translate");
        };
        assert_eq!(files, vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")]);
        assert_eq!(overrides.lang_out.as_deref(), Some("zh-CN"));
        assert!(overrides.no_mono);
        assert!(save);
    }

    #[test]
    fn test_no_subcommand_means_shell() {
        let args = Args::try_parse_from(["pdfdesk"]).unwrap();
        assert!(args.command.is_none());
    }
}
