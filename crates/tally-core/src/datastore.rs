use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::TallyError;
use crate::task::Task;

pub const TASKS_KEY: &str = "todos";

/// Blob store keyed by name. Every `set` replaces the whole value.
pub trait KvStore: Send {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()>;
}

/// One file per key under a data directory, replaced atomically on write.
#[derive(Debug)]
pub struct FileKvStore {
    pub data_dir: PathBuf,
}

impl FileKvStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(anyhow!("invalid store key: {key:?}"));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KvStore for FileKvStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }
        let bytes =
            fs::read(&path).with_context(|| format!("failed reading {}", path.display()))?;
        debug!(file = %path.display(), bytes = bytes.len(), "read stored value");
        Ok(Some(bytes))
    }

    #[tracing::instrument(skip(self, value), fields(bytes = value.len()))]
    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value)?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// What a read of the task key produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hydration {
    Missing,
    Loaded(Vec<Task>),
    Corrupt(TallyError),
}

impl Hydration {
    /// Tasks to start from: a corrupt or missing value means an empty list.
    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            Self::Loaded(tasks) => tasks,
            Self::Missing | Self::Corrupt(_) => Vec::new(),
        }
    }
}

/// Serializes the whole task list under a single key.
pub struct TaskStore {
    kv: Box<dyn KvStore>,
    key: String,
}

impl TaskStore {
    pub fn new(kv: Box<dyn KvStore>) -> Self {
        Self::with_key(kv, TASKS_KEY)
    }

    pub fn with_key(kv: Box<dyn KvStore>, key: &str) -> Self {
        Self {
            kv,
            key: key.to_string(),
        }
    }

    #[tracing::instrument(skip(self), fields(key = %self.key))]
    pub fn load(&self) -> anyhow::Result<Hydration> {
        let Some(raw) = self.kv.get(&self.key).context("failed to read task list")? else {
            return Ok(Hydration::Missing);
        };

        match serde_json::from_slice::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                Ok(Hydration::Loaded(tasks))
            }
            Err(err) => {
                warn!(error = %err, "stored task list is corrupt");
                Ok(Hydration::Corrupt(TallyError::StorageParse(err.to_string())))
            }
        }
    }

    #[tracing::instrument(skip(self, tasks), fields(key = %self.key, count = tasks.len()))]
    pub fn save(&self, tasks: &[Task]) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(tasks)?;
        self.kv
            .set(&self.key, &payload)
            .context("failed to save task list")
    }
}
