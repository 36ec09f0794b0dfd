use crate::error::SinkError;
use crate::models::detection::DetectionRecord;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receiver of finished detection records (persistence and/or fan-out)
pub trait DetectionSink: Send + Sync {
    fn accept(&self, record: &DetectionRecord) -> Result<(), SinkError>;
}

impl<T: DetectionSink + ?Sized> DetectionSink for Arc<T> {
    fn accept(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        (**self).accept(record)
    }
}

/// Append-only store reading back its history
pub trait DetectionStore: DetectionSink {
    /// All records in append order
    fn load_all(&self) -> Result<Vec<DetectionRecord>, SinkError>;
}

impl<T: DetectionStore + ?Sized> DetectionStore for Arc<T> {
    fn load_all(&self) -> Result<Vec<DetectionRecord>, SinkError> {
        (**self).load_all()
    }
}

/// Append-only JSON-lines file, one record per line.
///
/// Each record is serialized up front and written with a single `write_all`
/// under the lock, so concurrent appends never interleave. A torn last line
/// (crash or failed write) is newline-terminated before the next append.
pub struct JsonlStore {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JsonlStore {
    /// Open (or lazily create) the store at `path`, creating parent directories
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| SinkError::DirectoryCreationFailed {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        Ok(Self {
            path,
            file: Mutex::new(None),
        })
    }

    /// Default location under the platform data directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("combat-scan").join("detections.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Open for appending; a last line without `\n` is terminated first
    fn open_for_append(&self) -> Result<File, SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if len > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))
                .and_then(|_| file.read_exact(&mut last))
                .map_err(|e| self.io_error(e))?;

            if last[0] != b'\n' {
                tracing::warn!(path = %self.path.display(), "Store ends in a partial record, terminating it");
                file.write_all(b"\n").map_err(|e| self.io_error(e))?;
            }
        }
        Ok(file)
    }
}

impl DetectionSink for JsonlStore {
    fn accept(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.file.lock();
        let mut file = match guard.take() {
            Some(file) => file,
            None => self.open_for_append()?,
        };

        // On failure the handle is dropped, so the next append re-checks the tail
        file.write_all(&line)
            .and_then(|()| file.flush())
            .map_err(|e| self.io_error(e))?;

        *guard = Some(file);
        Ok(())
    }
}

impl DetectionStore for JsonlStore {
    fn load_all(&self) -> Result<Vec<DetectionRecord>, SinkError> {
        // Hold the lock so no append lands half-read
        let _guard = self.file.lock();

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DetectionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        line = number + 1,
                        error = %e,
                        "Skipping unreadable detection record"
                    );
                }
            }
        }
        Ok(records)
    }
}

/// In-memory append-only store
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<DetectionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DetectionSink for MemoryStore {
    fn accept(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

impl DetectionStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<DetectionRecord>, SinkError> {
        Ok(self.records.lock().clone())
    }
}

/// Fans records out to real-time subscribers.
///
/// Having no subscribers is fine; slow subscribers lag and miss old records.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<DetectionRecord>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DetectionRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl DetectionSink for BroadcastHub {
    fn accept(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        let delivered = self.sender.send(record.clone()).unwrap_or(0);
        tracing::debug!(id = %record.id, delivered, "record broadcast");
        Ok(())
    }
}

/// Persist first, then broadcast; nothing is broadcast if persistence fails
pub struct PersistAndBroadcast<S> {
    store: S,
    hub: BroadcastHub,
}

impl<S: DetectionStore> PersistAndBroadcast<S> {
    pub fn new(store: S, hub: BroadcastHub) -> Self {
        Self { store, hub }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}

impl<S: DetectionStore> DetectionSink for PersistAndBroadcast<S> {
    fn accept(&self, record: &DetectionRecord) -> Result<(), SinkError> {
        self.store.accept(record)?;
        self.hub.accept(record)
    }
}

impl<S: DetectionStore> DetectionStore for PersistAndBroadcast<S> {
    fn load_all(&self) -> Result<Vec<DetectionRecord>, SinkError> {
        self.store.load_all()
    }
}
