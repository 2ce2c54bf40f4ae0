// ─── Collaborator Sinks ───
// Narrow interfaces the core reports through. Front ends (console, GUI)
// implement these; the core never knows which one it talks to.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::info;

/// Receives per-artifact download progress.
pub trait ProgressSink: Send + Sync {
    /// A new artifact is about to be fetched.
    fn on_file_changed(&self, label: &str);

    /// Bytes written so far for the current artifact. Only called when the
    /// server reported a content length. Transfers run concurrently, so calls
    /// for different artifacts interleave.
    fn on_progress(&self, done: u64, total: u64);

    /// The artifact announced by `on_file_changed` is done, fetched or failed.
    fn on_file_finished(&self, _label: &str) {}
}

/// Receives game output, one line at a time. Implementations must return
/// quickly: the process reader calls this inline.
pub trait LogSink: Send + Sync {
    fn append_line(&self, line: &str);
}

pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_file_changed(&self, _label: &str) {}
    fn on_progress(&self, _done: u64, _total: u64) {}
}

/// Forwards lines into an unbounded channel. Sending never blocks, so a slow
/// consumer cannot stall the child's output pipe.
pub struct ChannelLogSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelLogSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelLogSink {
    fn append_line(&self, line: &str) {
        // Receiver gone means nobody is watching anymore.
        let _ = self.tx.send(line.to_string());
    }
}

/// Mirrors game output into the launcher log.
pub struct TracingLogSink {
    pub tag: String,
}

impl LogSink for TracingLogSink {
    fn append_line(&self, line: &str) {
        info!("[{}] {}", self.tag, line);
    }
}

/// Console progress bar for the command-line front end. Counts finished
/// artifacts against the ones started so far; byte counts of concurrent
/// transfers are not shown.
pub struct ConsoleProgress {
    bar: ProgressBar,
    started: AtomicU64,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new(0))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} {msg:40!} [{bar:30.cyan/blue}] {pos}/{len} files",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        Self {
            bar,
            started: AtomicU64::new(0),
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgress {
    fn on_file_changed(&self, label: &str) {
        let started = self.started.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.set_length(started);
        self.bar.set_message(label.to_string());
    }

    fn on_progress(&self, _done: u64, _total: u64) {
        self.bar.tick();
    }

    fn on_file_finished(&self, _label: &str) {
        self.bar.inc(1);
    }
}

/// Prints game output to stdout.
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn append_line(&self, line: &str) {
        println!("{line}");
    }
}
