use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing_subscriber::EnvFilter;

/// Env var holding the `tracing` filter directive for the binary.
pub const LOG_FILTER_ENV: &str = "HUBCHAT_LOG";

/// Installs the stderr `tracing` subscriber. Stdout is reserved for tokens.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Appends chat turns to a plain-text transcript file.
pub struct TranscriptLog {
    file_path: PathBuf,
}

impl TranscriptLog {
    pub fn new(path: impl Into<PathBuf>) -> io::Result<Self> {
        let file_path = path.into();
        // Fail early if the file can't be created or appended to
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;
        Ok(Self { file_path })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn log_user(&self, user_display_name: &str, content: &str) -> io::Result<()> {
        self.log_message(&format!("{user_display_name}: {content}"))
    }

    pub fn log_message(&self, content: &str) -> io::Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        let mut writer = BufWriter::with_capacity(64 * 1024, file);

        for line in content.lines() {
            writeln!(writer, "{line}")?;
        }
        // Blank line between messages
        writeln!(writer)?;

        writer.flush()
    }
}
