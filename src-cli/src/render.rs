use std::io::{self, Write};

use dqa_ai::index::IndexStatus;
use dqa_ai::session::{AskOutcome, Phase, SessionEvent, StatusSink};
use dqa_core::error::AppError;

/// Progress lines on stderr so stdout carries only answers.
pub struct TerminalSink;

impl StatusSink for TerminalSink {
    fn on_event(&mut self, event: &SessionEvent) {
        let line = match event {
            SessionEvent::Phase { phase } => match phase {
                Phase::Idle => return,
                Phase::Extracting => "reading documents...".to_string(),
                Phase::Chunking => "splitting text...".to_string(),
                Phase::Indexing => "embedding chunks...".to_string(),
                Phase::Retrieving => "searching index...".to_string(),
                Phase::Answering => "asking the model...".to_string(),
            },
            SessionEvent::IndexReady { status } => format!("done: {} chunks indexed", status.chunk_count),
            // Errors are rendered once, by the command that failed.
            SessionEvent::Answered { .. } | SessionEvent::Failed { .. } => return,
        };
        let _ = writeln!(io::stderr(), "{line}");
    }
}

pub fn error(e: &AppError) {
    let _ = writeln!(io::stderr(), "{}", e.render());
}

pub fn status(st: &IndexStatus) {
    if !st.ready {
        println!("index '{}': not built (run `docqa build <files>`)", st.artifact);
        return;
    }
    println!("index '{}': ready", st.artifact);
    println!("  chunks:   {}", st.chunk_count);
    if let Some(model) = &st.model {
        println!("  model:    {model}");
    }
    if let Some(dims) = st.dims {
        println!("  dims:     {dims}");
    }
    if let Some(built_at) = &st.built_at {
        println!("  built at: {built_at}");
    }
    if let Some(sha) = &st.content_sha256 {
        println!("  content:  {}", &sha[..sha.len().min(12)]);
    }
}

pub fn answer(outcome: &AskOutcome, show_raw: bool) {
    println!("{}", outcome.answer.text);
    let sources = outcome
        .context
        .hits
        .iter()
        .map(|h| format!("#{} ({:.3})", h.ordinal, h.score))
        .collect::<Vec<_>>()
        .join(", ");
    println!("\nsources: {sources}");
    if show_raw {
        match serde_json::to_string_pretty(&outcome.answer.raw) {
            Ok(raw) => println!("\n{raw}"),
            Err(e) => tracing::warn!(err = %e, "failed to render raw response"),
        }
    }
}
