//! # vicore - A Headless Vim-Style Engine
//!
//! Drives the engine from the command line: opens files into the buffer
//! list, feeds a key sequence through the mode stack and prints the result.
//!
//! ## Quick Start
//!
//! ```bash
//! # Open two files and list the buffers
//! cargo run -- a.txt b.txt
//!
//! # Type into the first file, then switch to the alternate buffer
//! cargo run -- a.txt b.txt --keys 'ihello<Esc>:b2<CR>'
//!
//! # Machine-readable report
//! cargo run -- a.txt --keys 'i<C-v>u20ac<Esc>' --json
//! ```

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vicore_core::{
    BufferSummary, Config, Editor, EditorEvent, EventHandler, MessageKind, ModeKind, OpenFlags,
    parse_keys,
};

/// vicore - drive a headless Vim-style engine
#[derive(Parser, Debug)]
#[command(name = "vicore")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files to open; the first becomes current, the rest are listed
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Keys to feed after opening, in `<C-v>`/`<Esc>` notation
    #[arg(short, long, value_name = "KEYS")]
    keys: Option<String>,

    /// Configuration file (defaults to the user config)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the final state as JSON
    #[arg(long)]
    json: bool,

    /// Print every engine event after the run
    #[arg(long)]
    events: bool,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Final state printed by `--json`.
#[derive(Serialize)]
struct Report {
    mode: ModeKind,
    current: u32,
    text: String,
    buffers: Vec<BufferSummary>,
    errors: Vec<String>,
    messages: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging on stderr so reports stay clean on stdout
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    tracing::info!("Starting vicore v{}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let mut editor = Editor::with_config(config);

    // Collect events off the engine thread; the task ends when the editor drops
    let collector = args.events.then(|| spawn_collector(&editor));

    open_files(&mut editor, &args.files)?;

    if let Some(keys) = &args.keys {
        let keys = parse_keys(keys)?;
        editor.feed_keys(&keys);
        editor.flush_keys();
    }

    if args.json {
        let report = report(&editor);
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for message in editor.messages().iter() {
            println!("{}", message.text);
        }
        for summary in editor.buffers().list_buffers(true) {
            println!("{summary}");
        }
    }

    drop(editor);
    if let Some(collector) = collector {
        for event in &collector.await? {
            println!("{}", describe(event));
        }
    }

    Ok(())
}

fn spawn_collector(editor: &Editor) -> tokio::task::JoinHandle<Vec<EditorEvent>> {
    let mut handler = EventHandler::new(editor.subscribe());
    tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(event) = handler.next().await {
            seen.push(event);
        }
        seen
    })
}

fn open_files(editor: &mut Editor, files: &[PathBuf]) -> anyhow::Result<()> {
    let Some((first, rest)) = files.split_first() else {
        return Ok(());
    };
    editor.edit(first, false)?;
    for path in rest {
        editor.open_or_reuse(Some(path.as_path()), 1, OpenFlags::LISTED)?;
    }
    Ok(())
}

fn report(editor: &Editor) -> Report {
    let (errors, messages) = editor
        .messages()
        .iter()
        .partition::<Vec<_>, _>(|m| m.kind == MessageKind::Error);
    Report {
        mode: editor.mode(),
        current: editor.current_buffer().id().get(),
        text: editor.current_text(),
        buffers: editor.buffers().list_buffers(true),
        errors: errors.into_iter().map(|m| m.text.clone()).collect(),
        messages: messages.into_iter().map(|m| m.text.clone()).collect(),
    }
}

fn describe(event: &EditorEvent) -> String {
    match event {
        EditorEvent::BufferCreated(buf) => format!("created {}", buf.id()),
        EditorEvent::BufferEntered(buf) => format!("entered {}", buf.id()),
        EditorEvent::BufferWiped(id) => format!("wiped {id}"),
        EditorEvent::WindowOpened(win) => format!("window opened {win}"),
        EditorEvent::WindowClosed(win) => format!("window closed {win}"),
        EditorEvent::ModeChanged(mode) => format!("mode {mode}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["vicore"]);
        assert!(args.files.is_empty());
        assert!(args.keys.is_none());
        assert!(!args.json);
    }

    #[test]
    fn test_args_with_files_and_keys() {
        let args = Args::parse_from(["vicore", "a.txt", "b.txt", "--keys", "ihi<Esc>", "-vv"]);
        assert_eq!(
            args.files,
            vec![PathBuf::from("a.txt"), PathBuf::from("b.txt")]
        );
        assert_eq!(args.keys.as_deref(), Some("ihi<Esc>"));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_events_flag_defaults_off() {
        let args = Args::parse_from(["vicore", "a.txt"]);
        assert!(!args.events);
        let args = Args::parse_from(["vicore", "a.txt", "--events"]);
        assert!(args.events);
    }

    #[tokio::test]
    async fn test_collector_ends_when_editor_drops() {
        let mut editor = Editor::new();
        let collector = spawn_collector(&editor);
        editor.open_or_reuse(None, 1, OpenFlags::LISTED).unwrap();
        drop(editor);

        let events = collector.await.unwrap();
        assert!(
            events
                .iter()
                .any(|e| matches!(e, EditorEvent::BufferCreated(_)))
        );
    }

    #[test]
    fn test_open_files_lists_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "alpha\n").unwrap();
        std::fs::write(&b, "beta\n").unwrap();

        let mut editor = Editor::new();
        open_files(&mut editor, &[a, b]).unwrap();

        assert_eq!(editor.current_text(), "alpha\n");
        let report = report(&editor);
        let named = report
            .buffers
            .iter()
            .filter(|s| s.name.ends_with(".txt"))
            .count();
        assert_eq!(named, 2);
        assert!(report.errors.is_empty());
    }
}
