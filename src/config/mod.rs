pub mod sight_config;

pub use self::sight_config::{SettingsError, SettingsOverrides, SightSettings};
