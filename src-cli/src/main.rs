//! docqa CLI: index documents, then ask questions about them.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use dqa_ai::index::{index_status, IndexStatus};
use dqa_ai::ollama::OllamaClient;
use dqa_ai::session::Session;
use dqa_ai::store::FsVectorStore;
use dqa_core::config::{PipelineConfig, Provider};
use dqa_core::error::{codes, AppError};
use dqa_core::extract::Document;

mod render;

#[derive(Parser)]
#[command(name = "docqa", version, about = "Ask questions about your PDFs")]
struct Cli {
    /// Configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "docqa.toml")]
    config: PathBuf,

    /// Override the index artifact name.
    #[arg(long, global = true)]
    artifact: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract, chunk and embed documents, replacing the index.
    Build {
        /// PDF or plain-text files, indexed in the given order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Also print the provider's raw response.
        #[arg(long)]
        show_raw: bool,
    },

    /// Show whether an index exists and what it was built with.
    Status,

    /// Send one prompt straight to the configured model, without retrieval.
    Prompt { text: String },

    /// Check that configured model providers are reachable.
    Health,

    /// Interactive session: `:build <files>`, `:status`, `:quit`, anything else is a question.
    Chat,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            render::error(&e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig, AppError> {
    let mut cfg = PipelineConfig::load(Some(cli.config.as_path()))?;
    cfg.apply_env(|k| std::env::var(k).ok());
    if let Some(artifact) = &cli.artifact {
        cfg.storage.artifact = artifact.clone();
    }
    // Provider credentials are checked when a session is built; `status` never needs them.
    cfg.validate_local()?;
    Ok(cfg)
}

fn run(cli: Cli) -> Result<(), AppError> {
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Health => return health(&cfg),
        Commands::Status => {
            render::status(&stored_status(&cfg)?);
            return Ok(());
        }
        _ => {}
    }

    let mut session = Session::from_config(cfg, Box::new(render::TerminalSink))?;
    match cli.command {
        Commands::Build { files } => {
            let docs = read_documents(&files)?;
            let st = session.build(&docs)?;
            render::status(&st);
        }
        Commands::Ask { question, show_raw } => {
            let outcome = session.ask(&question)?;
            render::answer(&outcome, show_raw);
        }
        Commands::Prompt { text } => {
            let cfg = session.config();
            let generation = session
                .generator()
                .generate(&cfg.generation.model, &text, cfg.generation.temperature)?;
            println!("{}", generation.text.trim());
        }
        Commands::Chat => chat(&mut session)?,
        Commands::Health | Commands::Status => {}
    }
    Ok(())
}

/// Index status straight from disk, without wiring any provider.
fn stored_status(cfg: &PipelineConfig) -> Result<IndexStatus, AppError> {
    let store = FsVectorStore::open(cfg.storage.root.clone()).with_io_retry(cfg.retry.into());
    index_status(&store, &cfg.storage.artifact)
}

fn read_documents(paths: &[PathBuf]) -> Result<Vec<Document>, AppError> {
    paths.iter().map(|p| read_document(p)).collect()
}

fn read_document(path: &Path) -> Result<Document, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new(codes::EXTRACTION_FAILED, "Failed to read document file")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Document::new(name, bytes))
}

fn health(cfg: &PipelineConfig) -> Result<(), AppError> {
    let uses_ollama = cfg.embedding.provider == Provider::Ollama || cfg.generation.provider == Provider::Ollama;
    let uses_gemini = cfg.embedding.provider == Provider::Gemini || cfg.generation.provider == Provider::Gemini;

    if uses_ollama {
        let client = OllamaClient::new(&cfg.ollama.base_url)?;
        client.health_check()?;
        println!("ollama: reachable at {}", client.base_url());
    }
    if uses_gemini {
        if cfg.gemini.api_key.is_none() {
            return Err(AppError::new(codes::CONFIG_INVALID, "Gemini provider selected but no API key configured")
                .with_details("set GOOGLE_API_KEY"));
        }
        println!("gemini: API key configured ({})", cfg.gemini.base_url);
    }
    Ok(())
}

/// Read-eval loop. Errors are rendered and the loop continues.
fn chat(session: &mut Session) -> Result<(), AppError> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let Some(line) = lines.next() else {
            return Ok(());
        };
        let line = line.map_err(|e| {
            AppError::new("STDIN_READ_FAILED", "Failed to read from stdin").with_details(e.to_string())
        })?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let res = match line.split_once(char::is_whitespace).unwrap_or((line, "")) {
            (":quit" | ":q", _) => return Ok(()),
            (":status", _) => session.status().map(|st| render::status(&st)),
            (":build", args) => {
                let files: Vec<PathBuf> = args.split_whitespace().map(PathBuf::from).collect();
                if files.is_empty() {
                    Err(AppError::new(codes::EXTRACTION_FAILED, "No documents supplied")
                        .with_details("usage: :build <file> [file...]"))
                } else {
                    read_documents(&files)
                        .and_then(|docs| session.build(&docs))
                        .map(|st| render::status(&st))
                }
            }
            _ => session.ask(line).map(|outcome| render::answer(&outcome, false)),
        };
        if let Err(e) = res {
            render::error(&e);
        }
    }
}
