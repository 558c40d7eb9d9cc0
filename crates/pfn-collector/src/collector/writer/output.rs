//! Append-only line streams.

use crate::collector::config::{OutputKind, OutputSelectors};
use crate::collector::error::{Error, Result};
use core::future::Future;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};

/// A destination for output lines, one stream per [`OutputKind`].
///
/// Each line is written newline-terminated. Appends to a kind that is not
/// open are ignored.
pub trait LineSink {
    fn append(
        &mut self,
        kind: OutputKind,
        lines: &[String],
    ) -> impl Future<Output = io::Result<()>> + Send;

    /// Persists everything appended so far.
    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// One buffered, append-mode text file per enabled [`OutputKind`] inside a
/// run directory.
#[derive(Debug)]
pub struct OutputFiles {
    dir: PathBuf,
    files: [Option<BufWriter<File>>; 4],
}

impl OutputFiles {
    /// Opens (creating if needed) `dir/<kind>.txt` for every enabled kind.
    ///
    /// The directory is only created when at least one kind is enabled.
    /// Existing files are appended to, never truncated.
    pub async fn open(dir: impl AsRef<Path>, outputs: &OutputSelectors) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: [Option<BufWriter<File>>; 4] = [None, None, None, None];

        if outputs.any() {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;
        }

        for kind in outputs.enabled() {
            let path = dir.join(kind.file_name());
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await
                .map_err(|e| Error::io(format!("opening {}", path.display()), e))?;
            files[kind.index()] = Some(BufWriter::new(file));
        }

        Ok(Self { dir, files })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LineSink for OutputFiles {
    async fn append(&mut self, kind: OutputKind, lines: &[String]) -> io::Result<()> {
        let Some(file) = self.files[kind.index()].as_mut() else {
            return Ok(());
        };
        for line in lines {
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        for file in self.files.iter_mut().flatten() {
            file.flush().await?;
        }
        Ok(())
    }
}

/// In-memory [`LineSink`] for tests and benchmarks.
///
/// Clones share the same buffers, so a clone kept by the caller can inspect
/// what the write queue appended. A sink built with [`MemorySink::failing`]
/// rejects every append to one kind.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<[Vec<String>; 4]>>,
    flushes: Arc<Mutex<u64>>,
    fail_on: Option<OutputKind>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(kind: OutputKind) -> Self {
        Self {
            fail_on: Some(kind),
            ..Self::default()
        }
    }

    pub fn lines(&self, kind: OutputKind) -> Vec<String> {
        self.lines.lock()[kind.index()].clone()
    }

    pub fn flushes(&self) -> u64 {
        *self.flushes.lock()
    }
}

impl LineSink for MemorySink {
    async fn append(&mut self, kind: OutputKind, lines: &[String]) -> io::Result<()> {
        if self.fail_on == Some(kind) {
            return Err(io::Error::other(format!("{kind} stream rejected append")));
        }
        self.lines.lock()[kind.index()].extend_from_slice(lines);
        Ok(())
    }

    async fn flush(&mut self) -> io::Result<()> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pfn-output-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn appends_newline_terminated_lines() {
        let dir = temp_dir("append");
        let _ = std::fs::remove_dir_all(&dir);

        let mut files = OutputFiles::open(&dir, &OutputSelectors::default())
            .await
            .unwrap();
        files
            .append(OutputKind::Scaled, &[String::from("1,2"), String::from("3,4")])
            .await
            .unwrap();
        files.flush().await.unwrap();
        files
            .append(OutputKind::Scaled, &[String::from("5,6")])
            .await
            .unwrap();
        files.flush().await.unwrap();

        let scaled = std::fs::read_to_string(dir.join("scaled.txt")).unwrap();
        assert_eq!(scaled, "1,2\n3,4\n5,6\n");
        assert!(dir.join("raw.txt").exists());
        assert!(!dir.join("undivided.txt").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn reopening_appends_instead_of_truncating() {
        let dir = temp_dir("reopen");
        let _ = std::fs::remove_dir_all(&dir);
        let outputs = OutputSelectors {
            scaled: false,
            unscaled: false,
            undivided: false,
            raw: true,
        };

        for line in ["a", "b"] {
            let mut files = OutputFiles::open(&dir, &outputs).await.unwrap();
            files
                .append(OutputKind::Raw, &[String::from(line)])
                .await
                .unwrap();
            files
                .append(OutputKind::Scaled, &[String::from("ignored")])
                .await
                .unwrap();
            files.flush().await.unwrap();
        }

        assert_eq!(std::fs::read_to_string(dir.join("raw.txt")).unwrap(), "a\nb\n");
        assert!(!dir.join("scaled.txt").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn nothing_enabled_creates_nothing() {
        let dir = temp_dir("none");
        let _ = std::fs::remove_dir_all(&dir);
        let outputs = OutputSelectors {
            scaled: false,
            unscaled: false,
            undivided: false,
            raw: false,
        };
        let mut files = OutputFiles::open(&dir, &outputs).await.unwrap();
        files.flush().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn memory_sink_shares_buffers_between_clones() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer
            .append(OutputKind::Unscaled, &[String::from("0.5")])
            .await
            .unwrap();
        writer.flush().await.unwrap();
        assert_eq!(sink.lines(OutputKind::Unscaled), ["0.5"]);
        assert_eq!(sink.flushes(), 1);

        let mut failing = MemorySink::failing(OutputKind::Raw);
        assert!(failing.append(OutputKind::Raw, &[]).await.is_err());
        assert!(failing.append(OutputKind::Scaled, &[]).await.is_ok());
    }
}
