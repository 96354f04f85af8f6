//! Core domain types: block type partition, slice specifications and
//! exported block records.
//!
//! A `SliceSpec` describes one window to cut out of a source recording;
//! a `Block` is the record of one exported artifact on disk.

use std::path::{Path, PathBuf};

/// The closed set of block types. Every artifact, catalog row and
/// sequencing decision is partitioned by one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockType {
    Music,
    Voice,
    Jingle,
}

impl BlockType {
    pub const ALL: [BlockType; 3] = [BlockType::Music, BlockType::Voice, BlockType::Jingle];

    /// One-letter code used as filename prefix, label type token and
    /// catalog column name.
    pub fn code(self) -> char {
        match self {
            BlockType::Music => 'm',
            BlockType::Voice => 'v',
            BlockType::Jingle => 'j',
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "m" => Some(BlockType::Music),
            "v" => Some(BlockType::Voice),
            "j" => Some(BlockType::Jingle),
            _ => None,
        }
    }

    /// Human-readable name used in reports and the timeline manifest.
    pub fn label(self) -> &'static str {
        match self {
            BlockType::Music => "music",
            BlockType::Voice => "voice",
            BlockType::Jingle => "jingle",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a requested slice window cannot be cut from the source.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowError {
    /// The window would start before the recording does; `shortfall_secs`
    /// more lead-in would be needed.
    BeforeStart { shortfall_secs: f64 },
    /// The window would run past the end of the recording.
    PastEnd { shortfall_secs: f64 },
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::BeforeStart { shortfall_secs } => {
                write!(f, "window starts {shortfall_secs:.1}s before the recording")
            }
            WindowError::PastEnd { shortfall_secs } => {
                write!(f, "window runs {shortfall_secs:.1}s past the end of the recording")
            }
        }
    }
}

/// A validated description of one window to extract: the climax point,
/// the derived begin/end bounds, and what the resulting block is.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceSpec {
    pub climax_secs: f64,
    pub block_type: BlockType,
    pub description: String,
    pub window_begin: f64,
    pub window_end: f64,
}

impl SliceSpec {
    /// Build a spec centered on `climax_secs`, rejecting windows that fall
    /// outside `[0, source_duration]`. The window is `climax ± slice/2`;
    /// bounds are derived here and nowhere else.
    pub fn new(
        climax_secs: f64,
        block_type: BlockType,
        description: impl Into<String>,
        slice_secs: f64,
        source_duration: Option<f64>,
    ) -> Result<Self, WindowError> {
        let half = slice_secs / 2.0;
        let window_begin = climax_secs - half;
        let window_end = climax_secs + half;

        if window_begin < 0.0 {
            return Err(WindowError::BeforeStart {
                shortfall_secs: -window_begin,
            });
        }
        if let Some(duration) = source_duration {
            if window_end > duration {
                return Err(WindowError::PastEnd {
                    shortfall_secs: window_end - duration,
                });
            }
        }

        Ok(Self {
            climax_secs,
            block_type,
            description: description.into(),
            window_begin,
            window_end,
        })
    }
}

/// One exported artifact: where it came from, what it is, where it lives.
#[derive(Debug, Clone)]
pub struct Block {
    /// Unique within the type partition; timestamp-derived, monotonic.
    pub id: String,
    pub block_type: BlockType,
    pub origin: PathBuf,
    pub description: String,
    pub duration_ms: u64,
    pub path: PathBuf,
}

/// Split an artifact filename into its type prefix and id, if it follows
/// the `<code><id>.<ext>` convention with an all-digit id.
pub fn parse_block_filename(path: &Path) -> Option<(BlockType, String)> {
    let stem = path.file_stem()?.to_str()?;
    let mut chars = stem.chars();
    let code = chars.next()?;
    let id: String = chars.collect();
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let block_type = BlockType::from_code(&code.to_string())?;
    Some((block_type, id))
}
