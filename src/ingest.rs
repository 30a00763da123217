//! Trace ingestion: collect pasted diagnostic text until end-of-input or
//! Ctrl+C. Interruption ends collection and hands whatever was captured to
//! the extractor; it is not an error.

use anyhow::{Context, Result};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Read the whole trace from a file (`--input`).
pub fn collect_from_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading trace from {}", path.display()))
}

/// Accumulate stdin lines until end-of-stream or cancellation. No line or
/// byte limit is imposed. The blocking read runs on its own thread; lines
/// arrive over a channel so cancellation can interrupt the wait.
pub async fn collect_from_stdin(cancel: &CancellationToken) -> String {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        use std::io::BufRead;
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut text = String::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = rx.recv() => match line {
                Some(line) => {
                    text.push_str(&line);
                    text.push('\n');
                }
                None => break,
            },
        }
    }
    text
}

/// Whitespace-only input means there is nothing to extract.
pub fn is_empty_trace(text: &str) -> bool {
    text.trim().is_empty()
}
