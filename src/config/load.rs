use std::{env, path::PathBuf};

use super::schema::Settings;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `STACCATO__`),
/// then an optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("STACCATO")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.slicer.slice_secs <= 0.0 {
            return Err("slicer.slice_secs must be > 0".to_string());
        }
        if self.slicer.spacing_factor < 1.0 {
            return Err("slicer.spacing_factor must be >= 1.0".to_string());
        }
        if self.slicer.placement_retries == 0 {
            return Err("slicer.placement_retries must be >= 1".to_string());
        }
        if self.slicer.bitrate_kbps == 0 {
            return Err("slicer.bitrate_kbps must be >= 1".to_string());
        }
        if self.sequence.min_blocks_per_channel == 0 {
            return Err("sequence.min_blocks_per_channel must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Resolve the config path from `STACCATO_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("STACCATO_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/staccato/config.toml`
/// or `~/.config/staccato/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else if let Some(home) = env::var_os("HOME") {
        Some(PathBuf::from(home).join(".config"))
    } else {
        None
    };

    config_home.map(|d| d.join("staccato").join("config.toml"))
}
