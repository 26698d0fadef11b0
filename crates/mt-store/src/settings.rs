//! SQLite-backed tracker settings.
//!
//! Each key is stored as a JSON value. Anything not stored falls back to
//! [`TrackerSettings::default`]. Writes are validated against the full
//! merged settings before they commit.

use std::path::{Path, PathBuf};
use std::{env, fs};

use rusqlite::{Connection, params};
use serde_json::{Map, Value};

use mt_core::TrackerSettings;

use crate::error::{Result, StoreError};
use crate::schema;

const DB_FILE: &str = "settings.db";

/// Default data directory when `MT_DATA_DIR` is not set.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".motion-tracker")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

type Listener = Box<dyn FnMut(&TrackerSettings)>;

/// One row of `list()`.
#[derive(Clone, Debug, PartialEq)]
pub struct SettingEntry {
    pub key: &'static str,
    pub value: Value,
    /// Stored explicitly rather than taken from the defaults.
    pub stored: bool,
}

pub struct SettingsStore {
    conn: Connection,
    listeners: Vec<(String, Listener)>,
}

impl SettingsStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            listeners: Vec::new(),
        })
    }

    /// Open `settings.db` under `base_dir`, creating the directory.
    pub fn open_in(base_dir: Option<&Path>) -> Result<Self> {
        let base = base_dir.map(PathBuf::from).unwrap_or_else(default_base_dir);
        fs::create_dir_all(&base).map_err(|e| {
            StoreError::InvalidData(format!("failed to create {}: {e}", base.display()))
        })?;
        Self::open(&base.join(DB_FILE))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self {
            conn,
            listeners: Vec::new(),
        })
    }

    /// Effective value for `key`: stored if present, else the default.
    pub fn get(&self, key: &str) -> Result<Value> {
        check_key(key)?;
        let merged = self.merged()?;
        merged
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))
    }

    /// Validate and store one key. Returns the settings now in effect.
    pub fn set(&mut self, key: &str, value: Value) -> Result<TrackerSettings> {
        check_key(key)?;
        let mut merged = self.merged()?;
        merged.insert(key.to_string(), value.clone());
        let settings: TrackerSettings = serde_json::from_value(Value::Object(merged))?;
        settings.validate()?;

        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))",
            params![key, serde_json::to_string(&value)?],
        )?;
        tracing::info!("setting {key} = {value}");
        self.notify(key, &settings);
        Ok(settings)
    }

    /// Drop the stored value so the default applies again.
    pub fn reset(&mut self, key: &str) -> Result<TrackerSettings> {
        check_key(key)?;
        let removed = self
            .conn
            .execute("DELETE FROM settings WHERE key = ?1", [key])?;
        let settings = self.load()?;
        if removed > 0 {
            tracing::info!("setting {key} reset");
            self.notify(key, &settings);
        }
        Ok(settings)
    }

    pub fn list(&self) -> Result<Vec<SettingEntry>> {
        let stored = self.stored()?;
        let mut merged = self.merged()?;
        Ok(TrackerSettings::KEYS
            .iter()
            .map(|&key| SettingEntry {
                key,
                value: merged.remove(key).unwrap_or(Value::Null),
                stored: stored.contains_key(key),
            })
            .collect())
    }

    /// Stored values merged over the defaults.
    pub fn load(&self) -> Result<TrackerSettings> {
        let settings: TrackerSettings = serde_json::from_value(Value::Object(self.merged()?))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Call `callback` with the new settings after every successful
    /// `set`/`reset` of `key`.
    pub fn on_change(
        &mut self,
        key: &str,
        callback: impl FnMut(&TrackerSettings) + 'static,
    ) -> Result<()> {
        check_key(key)?;
        self.listeners.push((key.to_string(), Box::new(callback)));
        Ok(())
    }

    fn notify(&mut self, key: &str, settings: &TrackerSettings) {
        for (_, listener) in self.listeners.iter_mut().filter(|(k, _)| k == key) {
            listener(settings);
        }
    }

    fn stored(&self) -> Result<Map<String, Value>> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let mut map = Map::new();
        for (key, raw) in rows {
            if !TrackerSettings::is_known_key(&key) {
                tracing::warn!("ignoring unknown stored setting {key}");
                continue;
            }
            map.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(map)
    }

    fn merged(&self) -> Result<Map<String, Value>> {
        let Value::Object(mut base) = serde_json::to_value(TrackerSettings::default())? else {
            return Err(StoreError::InvalidData(
                "settings did not serialize to an object".into(),
            ));
        };
        base.extend(self.stored()?);
        Ok(base)
    }
}

fn check_key(key: &str) -> Result<()> {
    if TrackerSettings::is_known_key(key) {
        Ok(())
    } else {
        Err(StoreError::UnknownKey(key.to_string()))
    }
}
