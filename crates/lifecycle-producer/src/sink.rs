//! Line-oriented JSON record sink

use lifecycle_core::{Event, LifecycleError, Result};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Writes one JSON record per line and flushes after every record.
/// Concurrent writers never interleave within a line.
pub struct JsonSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonSink {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Append to a JSONL file, creating it and its parent directories
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(file))
    }

    /// Serialize `event` and write it as one line. Nothing is written when
    /// serialization fails.
    pub fn write_event(&self, event: &Event) -> Result<()> {
        let record = event.to_record()?;
        self.write_line(&record)
    }

    pub fn write_line(&self, line: &str) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .map_err(|e| LifecycleError::Sink {
                message: format!("failed to write event: {}", e),
            })
    }
}

impl fmt::Debug for JsonSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSink").finish_non_exhaustive()
    }
}
