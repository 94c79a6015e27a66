//! Local paper store.
//!
//! Each paper occupies two files under the store root:
//!
//! - `<stem>.md`: the converted markdown, byte for byte
//! - `<stem>.json`: the catalog record plus document metadata
//!
//! `<stem>` is [`PaperId::file_stem`]. Every write lands in a temp file in
//! the same directory and is renamed into place, so readers never observe a
//! partial file. Writes to one id are serialized; different ids proceed in
//! parallel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::models::{ErrorKind, PaperDocument, PaperId, PaperRecord, PaperStatus};
use crate::utils::KeyedLocks;

const RECORD_EXT: &str = "json";
const MARKDOWN_EXT: &str = "md";

/// Errors from the paper store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Paper {0} not found. Please download it first.")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt catalog entry {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to encode catalog entry: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Task(String),
}

/// On-disk catalog entry: the record plus metadata only a document carries
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogEntry {
    #[serde(flatten)]
    record: PaperRecord,

    #[serde(default, rename = "abstract", skip_serializing_if = "Option::is_none")]
    abstract_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    converted_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    fn new(record: PaperRecord) -> Self {
        Self {
            record,
            abstract_text: None,
            converted_at: None,
        }
    }
}

/// Filesystem-backed catalog of converted papers
#[derive(Debug, Clone)]
pub struct PaperStore {
    root: PathBuf,
    locks: KeyedLocks,
}

impl PaperStore {
    /// Open (creating if needed) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        let root = fs::canonicalize(&root).await?;
        tracing::debug!("Opened paper store at {}", root.display());

        Ok(Self {
            root,
            locks: KeyedLocks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of a paper's markdown
    pub fn markdown_path(&self, id: &PaperId) -> PathBuf {
        self.root
            .join(format!("{}.{}", id.file_stem(), MARKDOWN_EXT))
    }

    fn record_path(&self, id: &PaperId) -> PathBuf {
        self.root.join(format!("{}.{}", id.file_stem(), RECORD_EXT))
    }

    async fn load_entry(&self, id: &PaperId) -> Result<Option<CatalogEntry>, StoreError> {
        let path = self.record_path(id);
        match fs::read(&path).await {
            Ok(bytes) => parse_entry(&path, &bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_entry(&self, entry: &CatalogEntry) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entry)?;
        atomic_write(self.record_path(&entry.record.paper_id), bytes).await
    }

    /// Whether a successfully converted document is stored for `id`
    pub async fn exists(&self, id: &PaperId) -> bool {
        match self.get_record(id).await {
            Ok(Some(record)) if record.is_success() => {
                fs::try_exists(self.markdown_path(id)).await.unwrap_or(false)
            }
            _ => false,
        }
    }

    /// The catalog record for `id`, if one has ever been written
    pub async fn get_record(&self, id: &PaperId) -> Result<Option<PaperRecord>, StoreError> {
        Ok(self.load_entry(id).await?.map(|entry| entry.record))
    }

    /// All catalog records, sorted by id
    ///
    /// Temp files and foreign files are ignored; unreadable entries are
    /// skipped with a warning.
    pub async fn list(&self) -> Result<Vec<PaperRecord>, StoreError> {
        let mut records = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;

        while let Some(dirent) = dir.next_entry().await? {
            let path = dirent.path();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXT);
            let hidden = dirent.file_name().to_string_lossy().starts_with('.');
            if !is_record || hidden {
                continue;
            }

            let loaded = match fs::read(&path).await {
                Ok(bytes) => parse_entry(&path, &bytes),
                Err(e) => Err(e.into()),
            };
            match loaded {
                Ok(entry) => records.push(entry.record),
                Err(e) => tracing::warn!("Skipping catalog entry {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| a.paper_id.cmp(&b.paper_id));
        Ok(records)
    }

    /// Load the stored document for `id`
    ///
    /// Fails with [`StoreError::NotFound`] unless the record is `success`.
    pub async fn read(&self, id: &PaperId) -> Result<PaperDocument, StoreError> {
        let entry = self
            .load_entry(id)
            .await?
            .filter(|entry| entry.record.is_success())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let markdown = match fs::read_to_string(self.markdown_path(id)).await {
            Ok(markdown) => markdown,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let record = entry.record;
        Ok(PaperDocument {
            paper_id: record.paper_id,
            title: record.title,
            authors: record.authors,
            abstract_text: entry.abstract_text,
            markdown,
            converted_at: entry.converted_at.unwrap_or(record.updated_at),
        })
    }

    /// Store a document and its record
    ///
    /// The markdown is written before the record, so a record never points
    /// at missing markdown.
    pub async fn write(
        &self,
        document: &PaperDocument,
        status: PaperStatus,
    ) -> Result<PaperRecord, StoreError> {
        let id = &document.paper_id;
        let _guard = self.locks.lock(id.as_str()).await;

        let markdown_path = self.markdown_path(id);
        atomic_write(markdown_path.clone(), document.markdown.clone().into_bytes()).await?;

        let mut record = PaperRecord::new(id.clone(), status, Utc::now());
        record.path = Some(markdown_path);
        record.title = document.title.clone();
        record.authors = document.authors.clone();

        let entry = CatalogEntry {
            record: record.clone(),
            abstract_text: document.abstract_text.clone(),
            converted_at: Some(document.converted_at),
        };
        self.save_entry(&entry).await?;

        tracing::debug!(paper_id = %id, status = %status, "Stored document");
        Ok(record)
    }

    /// Update the status of `id`, creating its record if absent
    ///
    /// Title, authors and markdown path of an existing record are kept.
    pub async fn set_status(
        &self,
        id: &PaperId,
        status: PaperStatus,
        error: Option<(ErrorKind, String)>,
    ) -> Result<PaperRecord, StoreError> {
        let _guard = self.locks.lock(id.as_str()).await;
        let now = Utc::now();

        let existing = match self.load_entry(id).await {
            Ok(entry) => entry,
            Err(e @ StoreError::Corrupt { .. }) => {
                tracing::warn!(paper_id = %id, "Replacing unreadable catalog entry: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let mut entry =
            existing.unwrap_or_else(|| CatalogEntry::new(PaperRecord::new(id.clone(), status, now)));
        entry.record.status = status;
        entry.record.updated_at = now;
        match error {
            Some((kind, reason)) => {
                entry.record.error = Some(reason);
                entry.record.error_kind = Some(kind);
            }
            None => {
                entry.record.error = None;
                entry.record.error_kind = None;
            }
        }

        self.save_entry(&entry).await?;
        Ok(entry.record)
    }
}

fn parse_entry(path: &Path, bytes: &[u8]) -> Result<CatalogEntry, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `contents` to `path` through a temp file in the same directory
async fn atomic_write(path: PathBuf, contents: Vec<u8>) -> Result<(), StoreError> {
    tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp-")
            .suffix(".partial")
            .tempfile_in(dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn id(raw: &str) -> PaperId {
        PaperId::parse(raw).unwrap()
    }

    async fn store() -> (TempDir, PaperStore) {
        let dir = TempDir::new().unwrap();
        let store = PaperStore::open(dir.path().join("papers")).await.unwrap();
        (dir, store)
    }

    fn document(raw: &str, markdown: &str) -> PaperDocument {
        PaperDocument::new(id(raw), markdown, Utc::now())
            .title("A Title")
            .authors(vec!["Ada Lovelace".to_string()])
            .abstract_text("An abstract.")
    }

    #[tokio::test]
    async fn test_write_then_read_is_byte_identical() {
        let (_dir, store) = store().await;
        let markdown = "# Title\n\nUnicode: αβγ — ∑\n\n| a | b |\n| --- | --- |\n";
        let doc = document("2401.12345", markdown);

        let record = store.write(&doc, PaperStatus::Success).await.unwrap();
        assert!(record.is_success());
        assert_eq!(record.path.as_deref(), Some(store.markdown_path(&doc.paper_id).as_path()));

        let read = store.read(&doc.paper_id).await.unwrap();
        assert_eq!(read.markdown.as_bytes(), markdown.as_bytes());
        assert_eq!(read.title.as_deref(), Some("A Title"));
        assert_eq!(read.authors, vec!["Ada Lovelace"]);
        assert_eq!(read.abstract_text.as_deref(), Some("An abstract."));
        assert_eq!(read.converted_at, doc.converted_at);

        let on_disk = std::fs::read(store.markdown_path(&doc.paper_id)).unwrap();
        assert_eq!(on_disk, markdown.as_bytes());
        assert!(store.exists(&doc.paper_id).await);
    }

    #[tokio::test]
    async fn test_read_requires_success() {
        let (_dir, store) = store().await;
        let paper = id("2401.00001");

        assert!(matches!(store.read(&paper).await, Err(StoreError::NotFound(_))));

        store
            .set_status(&paper, PaperStatus::Pending, None)
            .await
            .unwrap();
        assert!(matches!(store.read(&paper).await, Err(StoreError::NotFound(_))));
        assert!(!store.exists(&paper).await);
    }

    #[tokio::test]
    async fn test_set_status_keeps_metadata() {
        let (_dir, store) = store().await;
        let doc = document("2401.12345", "body\n");
        store.write(&doc, PaperStatus::Success).await.unwrap();

        let failed = store
            .set_status(
                &doc.paper_id,
                PaperStatus::Failed,
                Some((ErrorKind::Unavailable, "timed out".to_string())),
            )
            .await
            .unwrap();
        assert!(failed.is_failed());
        assert_eq!(failed.title.as_deref(), Some("A Title"));
        assert_eq!(failed.error.as_deref(), Some("timed out"));
        assert_eq!(failed.error_kind, Some(ErrorKind::Unavailable));
        assert!(!store.exists(&doc.paper_id).await);

        let pending = store
            .set_status(&doc.paper_id, PaperStatus::Pending, None)
            .await
            .unwrap();
        assert!(pending.error.is_none());
        assert!(pending.error_kind.is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_and_skips_foreign_files() {
        let (_dir, store) = store().await;
        store
            .write(&document("2402.00002", "b\n"), PaperStatus::Success)
            .await
            .unwrap();
        store
            .write(&document("hep-th/9901001", "old\n"), PaperStatus::Success)
            .await
            .unwrap();
        store
            .set_status(&id("2401.00001"), PaperStatus::Failed, Some((ErrorKind::NotFound, "404".into())))
            .await
            .unwrap();

        std::fs::write(store.root().join(".tmp-abc.partial"), b"junk").unwrap();
        std::fs::write(store.root().join("notes.txt"), b"hello").unwrap();
        std::fs::write(store.root().join("broken.json"), b"{not json").unwrap();

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.paper_id.to_string())
            .collect();
        assert_eq!(ids, vec!["2401.00001", "2402.00002", "hep-th/9901001"]);
    }

    #[tokio::test]
    async fn test_old_style_ids_use_safe_file_names() {
        let (_dir, store) = store().await;
        let doc = document("math.GT/0104020", "x\n");
        store.write(&doc, PaperStatus::Success).await.unwrap();

        assert!(store.root().join("math.GT_0104020.md").exists());
        assert!(store.root().join("math.GT_0104020.json").exists());
        assert_eq!(store.read(&doc.paper_id).await.unwrap().markdown, "x\n");
    }

    #[tokio::test]
    async fn test_corrupt_record_is_storage_error() {
        let (_dir, store) = store().await;
        let paper = id("2401.12345");
        std::fs::write(store.root().join("2401.12345.json"), b"[]").unwrap();

        assert!(matches!(
            store.get_record(&paper).await,
            Err(StoreError::Corrupt { .. })
        ));

        let record = store
            .set_status(&paper, PaperStatus::Pending, None)
            .await
            .unwrap();
        assert!(record.is_pending());
        assert!(store.get_record(&paper).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let (_dir, store) = store().await;
        store
            .write(&document("2401.12345", "x\n"), PaperStatus::Success)
            .await
            .unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
