use std::{
    collections::BTreeMap,
    fs,
    path::PathBuf,
    sync::RwLock,
};

use log::warn;

use super::{KeyValueStorage, Result, StorageError};

/// Local storage backed by a single JSON object file of `key -> string` pairs.
///
/// The whole map is read once on open and written back on every change.
pub struct JsonFileStorage {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl JsonFileStorage {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(err) => {
                    warn!(
                        "Local storage file {} is unreadable, starting empty: {err}",
                        path.display()
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }
}

impl KeyValueStorage for JsonFileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        guard.insert(key.to_string(), value.to_string());
        self.flush(&guard)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".into()))?;
        if guard.remove(key).is_some() {
            self.flush(&guard)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("local_storage.json");

        let storage = JsonFileStorage::open(path.clone()).unwrap();
        storage.set_item("stories", "[1,2,3]").unwrap();
        drop(storage);

        let reopened = JsonFileStorage::open(path).unwrap();
        assert_eq!(reopened.get_item("stories").unwrap().as_deref(), Some("[1,2,3]"));
        assert_eq!(reopened.get_item("missing").unwrap(), None);
    }

    #[test]
    fn corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");
        fs::write(&path, "{not json").unwrap();

        let storage = JsonFileStorage::open(path).unwrap();
        assert_eq!(storage.get_item("stories").unwrap(), None);

        storage.set_item("stories", "[]").unwrap();
        assert_eq!(storage.get_item("stories").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn remove_deletes_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::open(dir.path().join("ls.json")).unwrap();
        storage.set_item("a", "1").unwrap();
        storage.remove_item("a").unwrap();
        assert_eq!(storage.get_item("a").unwrap(), None);
    }
}
