pub mod error;
pub mod schema;
pub mod settings;
pub mod world;

pub use error::{Result, StoreError};
pub use settings::{SettingEntry, SettingsStore, default_base_dir};
pub use world::{UserRecord, World};
