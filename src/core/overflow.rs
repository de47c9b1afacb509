//! Overflow sinks
//!
//! Destinations for text evicted from the log buffer. The session file
//! lives under the platform temp directory and is only ever appended to.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::Local;

/// Receives plain text evicted from the log before it is dropped
pub trait OverflowSink {
    /// Append evicted text.
    ///
    /// `Ok` means the sink took all of `text` and the lines may be dropped.
    /// `Err` means it took none of it, so the caller keeps the lines and
    /// offers them again later.
    fn write_evicted(&mut self, text: &str) -> io::Result<()>;
}

impl OverflowSink for String {
    fn write_evicted(&mut self, text: &str) -> io::Result<()> {
        self.push_str(text);
        Ok(())
    }
}

impl<S: OverflowSink + ?Sized> OverflowSink for Rc<RefCell<S>> {
    fn write_evicted(&mut self, text: &str) -> io::Result<()> {
        self.borrow_mut().write_evicted(text)
    }
}

/// Append-only overflow file for one process session
#[derive(Debug)]
pub struct OverflowFile {
    path: PathBuf,
    file: Option<File>,
    spill: Spill,
}

impl OverflowFile {
    /// Create a sink writing to `path`. Nothing touches the disk until the
    /// first eviction.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            spill: Spill::default(),
        }
    }

    /// The session file under the per-platform trimmed-log directory:
    /// `trimmed_<YYYYmmdd_HHMMSS>_<pid>.log`
    pub fn for_session() -> Self {
        let session = Local::now().format("%Y%m%d_%H%M%S");
        let name = format!("trimmed_{}_{}.log", session, std::process::id());
        Self::new(session_dir().join(name))
    }

    /// Path of the file evicted text is written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_file(&self) -> io::Result<File> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        tracing::debug!("Opened overflow file {}", self.path.display());
        Ok(file)
    }
}

impl OverflowSink for OverflowFile {
    fn write_evicted(&mut self, text: &str) -> io::Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let mut file = match self.file.take() {
            Some(file) => file,
            None => self.open_file()?,
        };
        let result = self.spill.write(&mut file, text.as_bytes());
        self.file = Some(file);
        result
    }
}

impl Drop for OverflowFile {
    fn drop(&mut self) {
        if self.spill.is_empty() {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = self.spill.write(file, &[]) {
                tracing::warn!(
                    "Lost {} bytes of trimmed log for {}: {}",
                    self.spill.len(),
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Tail of a batch the writer stopped part way through.
///
/// Once any byte of a batch reached the file the batch counts as taken; the
/// rest waits here and goes out before the next batch. Offering the whole
/// batch again would write its head twice.
#[derive(Debug, Default)]
struct Spill {
    rest: Vec<u8>,
}

impl Spill {
    fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }

    fn len(&self) -> usize {
        self.rest.len()
    }

    /// Write the held tail, then `bytes`. `Err` means `bytes` was not taken.
    fn write(&mut self, out: &mut impl Write, bytes: &[u8]) -> io::Result<()> {
        if !self.rest.is_empty() {
            let (sent, result) = write_counted(out, &self.rest);
            self.rest.drain(..sent);
            result?;
        }

        let (sent, result) = write_counted(out, bytes);
        match result {
            Err(e) if sent == 0 => Err(e),
            Err(e) => {
                tracing::warn!(
                    "Overflow write stopped after {} of {} bytes: {}",
                    sent,
                    bytes.len(),
                    e
                );
                self.rest.extend_from_slice(&bytes[sent..]);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }
}

/// Write all of `bytes`, reporting how many went out before any error
fn write_counted(out: &mut impl Write, bytes: &[u8]) -> (usize, io::Result<()>) {
    let mut sent = 0;
    while sent < bytes.len() {
        match out.write(&bytes[sent..]) {
            Ok(0) => return (sent, Err(io::ErrorKind::WriteZero.into())),
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return (sent, Err(e)),
        }
    }
    (sent, out.flush())
}

/// Directory holding trimmed logs for this platform
pub fn session_dir() -> PathBuf {
    let suffix = if cfg!(windows) {
        "win"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "other"
    };
    std::env::temp_dir().join(format!("SerialMonitorTrimmedLogs_{suffix}"))
}
