//! File-backed record store for annotated bookmarks.
//!
//! Records are appended as JSON lines to `from_pocket.jsonl` inside the
//! data directory. The store is a handle: open it once, pass it to whatever
//! persists records, and [`RecordStore::close`] it at the end so the last
//! partial batch is written.
//!
//! Inserts are buffered and written in bulk once more than
//! [`FLUSH_THRESHOLD`] records are waiting.

use crate::error::Result;
use crate::models::AnnotatedBookmark;
use crate::utils::ensure_writable_dir;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

pub const RECORDS_FILE: &str = "from_pocket.jsonl";
pub const FLUSH_THRESHOLD: usize = 10;

/// Everything [`RecordStore::load`] could decode, plus how many lines it
/// had to skip.
#[derive(Debug, Default)]
pub struct StoredRecords {
    pub records: Vec<AnnotatedBookmark>,
    pub skipped: usize,
}

#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    buffer: Vec<AnnotatedBookmark>,
    written: usize,
}

impl RecordStore {
    /// Open (creating if needed) the store in `dir`.
    #[instrument(level = "info", skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        ensure_writable_dir(&dir).await?;
        Ok(Self {
            dir,
            buffer: Vec::new(),
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn records_path(&self) -> PathBuf {
        self.dir.join(RECORDS_FILE)
    }

    /// Buffer one record, flushing when the buffer grows past the threshold.
    pub async fn insert(&mut self, record: AnnotatedBookmark) -> Result<()> {
        self.buffer.push(record);
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.flush().await?;
        }
        Ok(())
    }

    /// Append every buffered record to the records file.
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let mut lines = Vec::new();
        for record in &self.buffer {
            serde_json::to_writer(&mut lines, record)?;
            lines.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.records_path())
            .await?;
        file.write_all(&lines).await?;
        file.flush().await?;

        self.written += self.buffer.len();
        debug!(count = self.buffer.len(), total = self.written, "Flushed records");
        self.buffer.clear();
        Ok(())
    }

    /// Flush what is left and release the handle. Returns how many records
    /// this handle wrote.
    pub async fn close(mut self) -> Result<usize> {
        self.flush().await?;
        info!(written = self.written, "Closed record store");
        Ok(self.written)
    }

    /// Read every stored record. A store that was never written is empty.
    ///
    /// Lines that fail to decode are logged, skipped and counted.
    #[instrument(level = "info", skip_all)]
    pub async fn load(&self) -> Result<StoredRecords> {
        let path = self.records_path();
        if !fs::try_exists(&path).await? {
            warn!(path = %path.display(), "No stored records");
            return Ok(StoredRecords::default());
        }

        let raw = fs::read_to_string(&path).await?;
        let mut stored = StoredRecords::default();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AnnotatedBookmark>(line) {
                Ok(record) => stored.records.push(record),
                Err(e) => {
                    stored.skipped += 1;
                    warn!(line = line_no + 1, error = %e, "Skipping undecodable record");
                }
            }
        }
        info!(count = stored.records.len(), skipped = stored.skipped, "Loaded stored records");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawBookmarkRecord;

    fn record(id: usize) -> AnnotatedBookmark {
        AnnotatedBookmark {
            bookmark: RawBookmarkRecord {
                resolved_id: Some(id.to_string()),
                ..Default::default()
            },
            analysis: None,
            extracted_links: Some(vec![format!("https://example.com/{id}")]),
        }
    }

    #[tokio::test]
    async fn test_buffer_flushes_past_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).await.unwrap();

        for i in 0..FLUSH_THRESHOLD {
            store.insert(record(i)).await.unwrap();
        }
        assert!(store.load().await.unwrap().records.is_empty());

        store.insert(record(FLUSH_THRESHOLD)).await.unwrap();
        assert_eq!(store.load().await.unwrap().records.len(), FLUSH_THRESHOLD + 1);
    }

    #[tokio::test]
    async fn test_close_writes_partial_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(dir.path()).await.unwrap();
        for i in 0..3 {
            store.insert(record(i)).await.unwrap();
        }
        assert_eq!(store.close().await.unwrap(), 3);

        let store = RecordStore::open(dir.path()).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.records, vec![record(0), record(1), record(2)]);
        assert_eq!(loaded.skipped, 0);
    }

    #[tokio::test]
    async fn test_load_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(RECORDS_FILE),
            "{\"resolved_id\": \"1\"}\nnot json\n\n{\"resolved_id\": \"2\"}\n",
        )
        .unwrap();

        let store = RecordStore::open(dir.path()).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.records.len(), 2);
        assert_eq!(loaded.skipped, 1);
        assert_eq!(loaded.records[1].bookmark.resolved_id.as_deref(), Some("2"));
    }
}
