//! Interactive question loop.

use std::path::{Path, PathBuf};

use anyhow::Result;
use docrag::{RagError, RagService, SessionId};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::{ingest_file, print_answer};

const PROMPT: &str = "docrag> ";

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// `:load <path>` replaces the session's document.
    Load(PathBuf),
    /// `:sources` flips source display.
    ToggleSources,
    /// `:quit` or `:exit`.
    Quit,
    Ask(String),
    Empty,
    /// A `:` command that was not understood, with a hint for the user.
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        let Some(command) = line.strip_prefix(':') else {
            return Self::Ask(line.to_string());
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        match (name, arg) {
            ("load", "") => Self::Invalid("usage: :load <path>".into()),
            ("load", path) => Self::Load(PathBuf::from(path)),
            ("sources", _) => Self::ToggleSources,
            ("quit" | "exit" | "q", _) => Self::Quit,
            (other, _) => {
                Self::Invalid(format!("unknown command ':{other}' (try :load, :sources, :quit)"))
            }
        }
    }
}

/// Run the loop until `:quit`, Ctrl-D or Ctrl-C.
pub async fn run(service: &RagService, session: SessionId, file: Option<&Path>) -> Result<()> {
    if let Some(path) = file {
        load(service, session, path).await;
    } else {
        println!("No document loaded yet. Use :load <path>.");
    }

    let mut editor = DefaultEditor::new()?;
    let mut show_sources = false;

    loop {
        let line = match tokio::task::block_in_place(|| editor.readline(PROMPT)) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let _ = editor.add_history_entry(line.as_str());

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Quit => break,
            ReplCommand::Invalid(hint) => println!("{hint}"),
            ReplCommand::ToggleSources => {
                show_sources = !show_sources;
                println!("sources {}", if show_sources { "on" } else { "off" });
            }
            ReplCommand::Load(path) => load(service, session, &path).await,
            ReplCommand::Ask(question) => match service.answer(session, &question).await {
                Ok(answer) => print_answer(&answer, show_sources),
                Err(RagError::IndexNotReady { .. }) => {
                    println!("No document loaded yet. Use :load <path>.");
                }
                Err(e) => {
                    warn!(error = %e, "question failed");
                    println!("error: {e}");
                }
            },
        }
    }

    Ok(())
}

async fn load(service: &RagService, session: SessionId, path: &Path) {
    match ingest_file(service, session, path).await {
        Ok(report) => println!(
            "Loaded {} ({} segments, {} dimensions)",
            path.display(),
            report.segment_count,
            report.dimensions
        ),
        // The session keeps whatever document it had before.
        Err(e) => println!("could not load {}: {e:#}", path.display()),
    }
}
