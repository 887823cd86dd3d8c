//! Append-only log of every message processed by the server.
//!
//! Each record is tagged with a process-wide counter. The counter and the
//! writer sit behind one mutex, separate from the connection queue lock, so
//! records are totally ordered by the order in which appends take the lock.

use crate::protocol::Message;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, trace};

struct LogState<W> {
    writer: W,
    /// Counter value assigned to the next record.
    next: u64,
}

/// Serialized writer for processed messages.
pub struct MessageLog<W: Write = File> {
    state: Mutex<LogState<W>>,
}

impl MessageLog<File> {
    /// Create (or truncate) the log file.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        info!(path = %path.display(), "Opened message log");
        Ok(Self::new(file))
    }
}

impl<W: Write> MessageLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Mutex::new(LogState { writer, next: 0 }),
        }
    }

    // A panic while holding the lock can only come from the writer itself;
    // the counter is advanced after the write, so it stays consistent.
    fn lock(&self) -> MutexGuard<'_, LogState<W>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one record and flush it.
    ///
    /// Returns the counter value assigned to the record. The counter only
    /// advances once the record has been written and flushed, so the
    /// sequence in the file has no gaps.
    pub fn append(&self, message: &Message) -> io::Result<u64> {
        let mut state = self.lock();
        let count = state.next;
        let record = format_record(count, message);

        state.writer.write_all(record.as_bytes())?;
        state.writer.flush()?;
        state.next += 1;

        trace!(count, msg_id = message.id, "Message logged");
        Ok(count)
    }

    /// Number of records written so far.
    #[cfg(test)]
    pub fn records(&self) -> u64 {
        self.lock().next
    }

    /// Consume the log and return the underlying writer.
    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .writer
    }
}

fn format_record(count: u64, message: &Message) -> String {
    format!(
        "msg_count: {count}, msg_id: {}, msg: {}\n",
        message.id,
        escape_line_breaks(&message.payload)
    )
}

/// Keep each record on a single line.
fn escape_line_breaks(payload: &str) -> Cow<'_, str> {
    if !payload.contains(['\n', '\r']) {
        return Cow::Borrowed(payload);
    }
    Cow::Owned(payload.replace('\n', "\\n").replace('\r', "\\r"))
}
