use serde::Deserialize;

/// Top-level settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/staccato/config.toml` or
/// `~/.config/staccato/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `STACCATO__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub slicer: SlicerSettings,
    pub sequence: SequenceSettings,
    pub library: LibrarySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlicerSettings {
    /// Length of every extracted block, in seconds.
    pub slice_secs: f64,
    /// Spacing between randomly placed climax points, as a multiple of
    /// `slice_secs`.
    pub spacing_factor: f64,
    /// Density target for random generation: roughly one slice per this
    /// many seconds of source material.
    pub density_window_secs: f64,
    /// How many random placements to attempt per slot before dropping it.
    pub placement_retries: u32,
    /// Target bitrate of exported blocks, in kbps.
    pub bitrate_kbps: u32,
}

impl SlicerSettings {
    /// Fade-in/fade-out length: half the slice.
    pub fn fade_secs(&self) -> f64 {
        self.slice_secs / 2.0
    }

    /// Minimum distance between two placed climax points.
    pub fn min_spacing_secs(&self) -> f64 {
        self.slice_secs * self.spacing_factor
    }
}

impl Default for SlicerSettings {
    fn default() -> Self {
        Self {
            slice_secs: 30.0,
            spacing_factor: 1.5,
            density_window_secs: 120.0,
            placement_retries: 100,
            bitrate_kbps: 192,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequenceSettings {
    /// Leading silence on the music channel, in seconds. The voice/jingle
    /// channel always starts at zero.
    pub music_lead_secs: f64,
    /// Minimum number of blocks required on each channel before a
    /// sequence is attempted.
    pub min_blocks_per_channel: usize,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            music_lead_secs: 15.0,
            min_blocks_per_channel: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibrarySettings {
    /// File extensions recognized as block artifacts (case-insensitive,
    /// without dot).
    pub extensions: Vec<String>,
    /// Catalog file name, created inside the blocks directory.
    pub catalog_file: String,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            extensions: vec!["mp3".into(), "wav".into(), "flac".into(), "ogg".into()],
            catalog_file: "blocks_list.toml".to_string(),
        }
    }
}
