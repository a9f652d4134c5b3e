//! File System Conversation Log
//!
//! Information Hiding:
//! - The log is one CSV sheet (header `name,phone,message,reply,time`),
//!   rewritten in full on every append
//! - Rewrites are staged to a sibling file and renamed over the primary
//! - When the primary cannot be read or rewritten, the full record set goes
//!   to a timestamped side file instead

use super::lock::{file_identity, lock_for};
use super::{ConversationLog, ConversationRecord};
use crate::error::RelayError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

/// Durable conversation log backed by a single file.
///
/// Every handle for the same file shares one process-wide lock, held for the
/// whole read, merge and rewrite cycle of an append.
pub struct FileConversationLog {
    path: PathBuf,
    lock: Arc<AsyncMutex<()>>,
}

enum PrimaryState {
    Missing,
    Loaded(Vec<ConversationRecord>),
    Unparseable(csv::Error),
    Unavailable(std::io::Error),
}

impl FileConversationLog {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(format!("Failed to create log directory: {:?}", parent))?;
        }

        let path = file_identity(&path);
        let lock = lock_for(&path);
        Ok(Self { path, lock })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConversationLog for FileConversationLog {
    async fn append(&self, record: ConversationRecord) {
        let path = self.path.clone();
        let lock = Arc::clone(&self.lock);

        // The exclusive section runs detached so a dropped caller cannot
        // interrupt it halfway through a rewrite.
        let task = tokio::spawn(async move {
            let _guard = lock.lock_owned().await;
            append_locked(&path, record).await;
        });

        if let Err(e) = task.await {
            tracing::error!("[ConversationLog] Append task failed for {:?}: {}", self.path, e);
        }
    }

    async fn records(&self) -> Result<Vec<ConversationRecord>> {
        let _guard = self.lock.lock().await;

        match read_primary(&self.path).await {
            PrimaryState::Missing => Ok(Vec::new()),
            PrimaryState::Loaded(records) => Ok(records),
            PrimaryState::Unparseable(e) => {
                Err(e).context(format!("Failed to parse conversation log: {:?}", self.path))
            }
            PrimaryState::Unavailable(e) => {
                Err(e).context(format!("Failed to read conversation log: {:?}", self.path))
            }
        }
    }
}

async fn append_locked(path: &Path, record: ConversationRecord) {
    let (mut records, primary_writable) = match read_primary(path).await {
        PrimaryState::Missing => (Vec::new(), true),
        PrimaryState::Loaded(records) => (records, true),
        PrimaryState::Unparseable(e) => {
            tracing::warn!("[ConversationLog] Unreadable log {:?}: {}", path, e);
            // If the bad bytes cannot be moved out of the way, leave them in
            // place and divert to a side file.
            let kept = set_aside(path).await;
            (Vec::new(), kept)
        }
        PrimaryState::Unavailable(e) => {
            tracing::warn!("[ConversationLog] Log {:?} is unavailable: {}", path, e);
            (Vec::new(), false)
        }
    };

    records.push(record);

    let contents = match encode_records(&records) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("[ConversationLog] Failed to serialize records: {}", e);
            return;
        }
    };

    if primary_writable {
        match rewrite_primary(path, &contents).await {
            Ok(()) => {
                tracing::debug!(
                    "[ConversationLog] Logged conversation ({} records) to {:?}",
                    records.len(),
                    path
                );
                return;
            }
            Err(e) => tracing::warn!("[ConversationLog] {}", e),
        }
    }

    match write_side_file(path, &contents).await {
        Ok(side_path) => tracing::warn!(
            "[ConversationLog] Log {:?} locked, saved {} records to {:?} instead",
            path,
            records.len(),
            side_path
        ),
        Err(e) => tracing::error!("[ConversationLog] Conversation could not be saved: {}", e),
    }
}

async fn read_primary(path: &Path) -> PrimaryState {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return PrimaryState::Missing,
        Err(e) => return PrimaryState::Unavailable(e),
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return PrimaryState::Loaded(Vec::new());
    }

    match decode_records(&bytes) {
        Ok(records) => PrimaryState::Loaded(records),
        Err(e) => PrimaryState::Unparseable(e),
    }
}

/// Written first so spreadsheet tools open the file as UTF-8.
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn decode_records(bytes: &[u8]) -> Result<Vec<ConversationRecord>, csv::Error> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    csv::Reader::from_reader(bytes).deserialize().collect()
}

fn encode_records(records: &[ConversationRecord]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

async fn rewrite_primary(path: &Path, contents: &[u8]) -> Result<(), RelayError> {
    let to_error = |source: std::io::Error| RelayError::LogWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(to_error)?;
    }

    // A rename would replace a read-only primary, so check it is writable.
    match fs::OpenOptions::new().write(true).open(path).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(to_error(e)),
    }

    let staging = sibling(path, |stem, ext| format!(".{}{}.tmp", stem, ext));
    if let Err(e) = write_new(&staging, contents, false).await {
        let _ = fs::remove_file(&staging).await;
        return Err(to_error(e));
    }

    if let Err(e) = fs::rename(&staging, path).await {
        let _ = fs::remove_file(&staging).await;
        return Err(to_error(e));
    }

    Ok(())
}

/// Write the full record set to `<stem>_temp_<millis><ext>`, bumping the
/// suffix until an unused name is found.
async fn write_side_file(path: &Path, contents: &[u8]) -> Result<PathBuf, RelayError> {
    let mut millis = chrono::Utc::now().timestamp_millis();

    loop {
        let side_path = sibling(path, |stem, ext| format!("{}_temp_{}{}", stem, millis, ext));
        match write_new(&side_path, contents, true).await {
            Ok(()) => return Ok(side_path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
            Err(source) => {
                return Err(RelayError::LogWrite {
                    path: side_path,
                    source,
                })
            }
        }
    }
}

/// Move an unparseable log out of the way so its bytes are kept. Returns
/// whether the primary path is now free to rewrite.
async fn set_aside(path: &Path) -> bool {
    let millis = chrono::Utc::now().timestamp_millis();
    let aside = sibling(path, |stem, ext| format!("{}_unreadable_{}{}", stem, millis, ext));

    match fs::rename(path, &aside).await {
        Ok(()) => {
            tracing::warn!("[ConversationLog] Moved unreadable log to {:?}", aside);
            true
        }
        Err(e) => {
            tracing::warn!("[ConversationLog] Could not move unreadable log aside: {}", e);
            false
        }
    }
}

async fn write_new(path: &Path, contents: &[u8], create_new: bool) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true);
    if create_new {
        options.create_new(true);
    } else {
        options.create(true).truncate(true);
    }

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

/// Path next to `path` named by `name(stem, ".ext")`.
fn sibling(path: &Path, name: impl Fn(&str, &str) -> String) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    path.with_file_name(name(&stem, &ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn record(n: usize) -> ConversationRecord {
        ConversationRecord::new(
            Some(format!("caller-{}", n).as_str()),
            Some("0500000000"),
            format!("message {}", n),
            format!("reply {}", n),
        )
    }

    async fn side_files(dir: &Path) -> Vec<PathBuf> {
        let mut found = Vec::new();
        let mut entries = fs::read_dir(dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("conversations_temp_") {
                found.push(entry.path());
            }
        }
        found
    }

    async fn read_records(path: &Path) -> Vec<ConversationRecord> {
        let bytes = fs::read(path).await.unwrap();
        decode_records(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_file_created_lazily_on_first_append() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("conversations.csv");
        let log = FileConversationLog::new(&path).await.unwrap();

        assert!(!path.exists());
        assert!(log.records().await.unwrap().is_empty());

        log.append(record(1)).await;

        assert!(path.exists());
        let records = log.records().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "message 1");
    }

    #[tokio::test]
    async fn test_appends_preserve_previous_records_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let log = FileConversationLog::new(temp_dir.path().join("conversations.csv"))
            .await
            .unwrap();

        for n in 0..5 {
            log.append(record(n)).await;
        }

        let messages: Vec<_> = log
            .records()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(
            messages,
            (0..5).map(|n| format!("message {}", n)).collect::<Vec<_>>()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_lose_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        let log = Arc::new(FileConversationLog::new(&path).await.unwrap());
        // A second handle on the same file must serialize with the first.
        let other = Arc::new(FileConversationLog::new(&path).await.unwrap());

        let handles: Vec<_> = (0..40)
            .map(|n| {
                let log = if n % 2 == 0 {
                    Arc::clone(&log)
                } else {
                    Arc::clone(&other)
                };
                tokio::spawn(async move { log.append(record(n)).await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let mut messages: Vec<_> = read_records(&path)
            .await
            .into_iter()
            .map(|r| r.message)
            .collect();
        messages.sort();
        let mut expected: Vec<_> = (0..40).map(|n| format!("message {}", n)).collect();
        expected.sort();

        assert_eq!(messages, expected);
        assert!(side_files(temp_dir.path()).await.is_empty());
    }

    #[tokio::test]
    async fn test_falls_back_to_side_file_when_primary_cannot_be_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        let log = FileConversationLog::new(&path).await.unwrap();

        log.append(record(1)).await;
        log.append(record(2)).await;

        // Occupy the staging name so the rewrite cannot be completed.
        fs::create_dir(temp_dir.path().join(".conversations.csv.tmp"))
            .await
            .unwrap();

        log.append(record(3)).await;

        assert_eq!(read_records(&path).await.len(), 2);

        let side = side_files(temp_dir.path()).await;
        assert_eq!(side.len(), 1);
        let saved: Vec<_> = read_records(&side[0])
            .await
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(saved, vec!["message 1", "message 2", "message 3"]);
    }

    #[tokio::test]
    async fn test_unreadable_primary_goes_to_side_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        fs::create_dir(&path).await.unwrap();
        let log = FileConversationLog::new(&path).await.unwrap();

        log.append(record(7)).await;
        log.append(record(8)).await;

        let side = side_files(temp_dir.path()).await;
        assert_eq!(side.len(), 2);
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_unparseable_primary_is_set_aside() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        fs::write(&path, b"name,phone\na,b\n").await.unwrap();
        let log = FileConversationLog::new(&path).await.unwrap();

        log.append(record(1)).await;

        assert_eq!(log.records().await.unwrap().len(), 1);

        let mut entries = fs::read_dir(temp_dir.path()).await.unwrap();
        let mut kept = None;
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("conversations_unreadable_") {
                kept = Some(entry.path());
            }
        }
        let kept = kept.expect("unreadable log should be kept");
        assert_eq!(fs::read(kept).await.unwrap(), b"name,phone\na,b\n");
    }

    #[tokio::test]
    async fn test_read_only_primary_goes_to_side_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        let log = FileConversationLog::new(&path).await.unwrap();

        log.append(record(1)).await;

        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&path, permissions).unwrap();
        if std::fs::OpenOptions::new().write(true).open(&path).is_ok() {
            // Privileged users write through read-only permissions.
            return;
        }

        log.append(record(2)).await;

        assert_eq!(read_records(&path).await.len(), 1);
        let side = side_files(temp_dir.path()).await;
        assert_eq!(side.len(), 1);
        assert_eq!(read_records(&side[0]).await.len(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_primary_is_kept_when_it_cannot_be_moved() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        fs::write(&path, b"name,phone\na,b\n").await.unwrap();
        let log = FileConversationLog::new(&path).await.unwrap();

        // Occupy every set-aside name the append could pick.
        let now = chrono::Utc::now().timestamp_millis();
        for millis in now..now + 3_000 {
            std::fs::create_dir(
                temp_dir
                    .path()
                    .join(format!("conversations_unreadable_{}.csv", millis)),
            )
            .unwrap();
        }

        log.append(record(1)).await;

        assert_eq!(fs::read(&path).await.unwrap(), b"name,phone\na,b\n");
        let side = side_files(temp_dir.path()).await;
        assert_eq!(side.len(), 1);
        assert_eq!(read_records(&side[0]).await[0].message, "message 1");
    }

    #[tokio::test]
    async fn test_file_is_csv_with_fixed_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conversations.csv");
        let log = FileConversationLog::new(&path).await.unwrap();

        log.append(ConversationRecord {
            name: "דנה".to_string(),
            phone: "0500000000".to_string(),
            message: "שלום, מה קורה?".to_string(),
            reply: "הכול טוב".to_string(),
            timestamp: "1.1.2024, 10:00:00".to_string(),
        })
        .await;

        let bytes = fs::read(&path).await.unwrap();
        let text = String::from_utf8(bytes.strip_prefix(UTF8_BOM).unwrap().to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("name,phone,message,reply,time"));
        assert_eq!(
            lines.next(),
            Some("דנה,0500000000,\"שלום, מה קורה?\",הכול טוב,\"1.1.2024, 10:00:00\"")
        );
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_abort_append() {
        let temp_dir = TempDir::new().unwrap();
        let log = FileConversationLog::new(temp_dir.path().join("conversations.csv"))
            .await
            .unwrap();

        let _ = tokio::time::timeout(Duration::from_nanos(1), log.append(record(1))).await;

        let mut count = 0;
        for _ in 0..100 {
            count = log.records().await.unwrap().len();
            if count == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sibling_names() {
        let path = Path::new("/logs/conversations.csv");

        assert_eq!(
            sibling(path, |stem, ext| format!("{}_temp_42{}", stem, ext)),
            PathBuf::from("/logs/conversations_temp_42.csv")
        );
    }
}
