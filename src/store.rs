use crate::error::{Result, ScraperError};
use crate::models::{CourseColorSetting, CourseRef};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

/// Storage keys shared with the UI layer.
pub mod keys {
    pub const COURSES: &str = "courses";
    pub const VODS: &str = "vod";
    pub const ASSIGNS: &str = "assign";
    pub const QUIZZES: &str = "quiz";
    pub const LAST_REFRESH: &str = "lastRequestTime";
    pub const COURSE_COLORS: &str = "courseColors";
}

/// Trait for key-value persistence backends. Values are JSON text.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Retrieve a value, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Store a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Reads and deserializes a JSON value.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn Storage,
    key: &str,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serializes and writes a JSON value.
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn Storage,
    key: &str,
    value: &T,
) -> Result<()> {
    let json = serde_json::to_string(value)?;
    store.set(key, &json).await
}

/// Writes several values as one unit. When a write fails, the keys already
/// written are put back to what they held before and the error is returned.
pub async fn set_all(store: &dyn Storage, entries: &[(&str, String)]) -> Result<()> {
    let mut previous = Vec::with_capacity(entries.len());
    for (key, _) in entries {
        previous.push(store.get(key).await?);
    }

    for (written, (key, value)) in entries.iter().enumerate() {
        if let Err(e) = store.set(key, value).await {
            warn!(key = *key, error = %e, "write failed, restoring previous values");
            for ((key, _), old) in entries[..written].iter().zip(&previous) {
                let restored = match old {
                    Some(old) => store.set(key, old).await,
                    None => store.remove(key).await,
                };
                if let Err(restore_error) = restored {
                    warn!(key = *key, error = %restore_error, "could not restore value");
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Simple file-based store: one `<key>.json` file per key.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

fn storage_error(action: &str, path: &Path, error: std::io::Error) -> ScraperError {
    ScraperError::StorageError(format!("{} {}: {}", action, path.display(), error))
}

#[async_trait]
impl Storage for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.get_path(key);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("cannot read", &path, e)),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error("cannot create", &self.dir, e))?;

        let path = self.get_path(key);
        let tmp_path = path.with_extension("tmp");

        // Atomic write: write to tmp then rename
        fs::write(&tmp_path, value)
            .await
            .map_err(|e| storage_error("cannot write", &tmp_path, e))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| storage_error("cannot replace", &path, e))?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.get_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("cannot remove", &path, e)),
        }
    }
}

/// In-process store, for tests and embedders that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Color settings for `courses`: stored settings where they exist, the
/// default color for every course without one.
pub async fn load_course_colors(
    store: &dyn Storage,
    courses: &[CourseRef],
) -> Result<Vec<CourseColorSetting>> {
    let stored: Vec<CourseColorSetting> = load_json(store, keys::COURSE_COLORS)
        .await?
        .unwrap_or_default();

    let mut settings = stored;
    for course in courses {
        if !settings.iter().any(|s| s.course_id == course.course_id) {
            settings.push(CourseColorSetting::default_for(&course.course_id));
        }
    }
    Ok(settings)
}

/// Replaces the stored setting of `setting.course_id`, or appends it.
pub async fn save_course_color(store: &dyn Storage, setting: CourseColorSetting) -> Result<()> {
    let mut settings: Vec<CourseColorSetting> = load_json(store, keys::COURSE_COLORS)
        .await?
        .unwrap_or_default();

    match settings.iter_mut().find(|s| s.course_id == setting.course_id) {
        Some(existing) => {
            let opacity = setting.opacity.or(existing.opacity);
            *existing = CourseColorSetting { opacity, ..setting };
        }
        None => settings.push(setting),
    }

    save_json(store, keys::COURSE_COLORS, &settings).await
}
