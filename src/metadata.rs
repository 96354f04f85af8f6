//! Embedded provenance tags.
//!
//! Every exported block carries a small structured key set (origin,
//! description, type, climax time, slice size) in an ID3v2 tag, plus the
//! generic artist/album/title/comment fields so ordinary players show
//! something sensible. Writing is best-effort; reading tolerates files
//! where some or all keys are missing.

use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemValue, Tag, TagItem, TagType};
use thiserror::Error;

use crate::block::BlockType;

pub const KEY_ORIGIN_FILE: &str = "ORIGIN_FILE";
pub const KEY_DESCRIPTION: &str = "DESCRIPTION";
pub const KEY_AUDIO_TYPE: &str = "AUDIO_TYPE";
pub const KEY_CLIMAX_TIME: &str = "CLIMAX_TIME";
pub const KEY_SLICE_SIZE: &str = "SLICE_SIZE";

const ALBUM_NAME: &str = "staccato blocks";

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("cannot read tags from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("cannot write tags to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: lofty::error::LoftyError,
    },

    #[error("{path} does not accept an ID3v2 tag")]
    Unsupported { path: PathBuf },
}

/// The provenance embedded into one block at export time.
#[derive(Debug, Clone)]
pub struct BlockTags {
    pub id: String,
    pub block_type: BlockType,
    pub origin: PathBuf,
    pub description: String,
    pub climax_secs: f64,
    pub slice_secs: f64,
}

/// Provenance recovered from a file's tags. Any field may be absent when
/// the file predates the structured keys or came from another tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveredMeta {
    pub origin: Option<String>,
    pub description: Option<String>,
    pub block_type: Option<BlockType>,
    pub climax_secs: Option<f64>,
    pub slice_secs: Option<f64>,
}

fn custom_key(name: &str) -> ItemKey {
    ItemKey::Unknown(name.to_string())
}

/// Write the structured key set plus the generic display fields.
pub fn embed(path: &Path, tags: &BlockTags) -> Result<(), MetaError> {
    let mut tagged = Probe::open(path)
        .and_then(|p| p.read())
        .map_err(|source| MetaError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    // Always use ID3v2: it takes arbitrary TXXX keys and is supported by
    // both the mp3 and wav artifacts this tool produces.
    if tagged.tag(TagType::Id3v2).is_none() {
        tagged.insert_tag(Tag::new(TagType::Id3v2));
    }
    let Some(tag) = tagged.tag_mut(TagType::Id3v2) else {
        return Err(MetaError::Unsupported {
            path: path.to_path_buf(),
        });
    };

    let origin = tags.origin.to_string_lossy().to_string();
    for (key, value) in [
        (KEY_ORIGIN_FILE, origin.clone()),
        (KEY_DESCRIPTION, tags.description.clone()),
        (KEY_AUDIO_TYPE, tags.block_type.code().to_string()),
        (KEY_CLIMAX_TIME, format!("{}", tags.climax_secs)),
        (KEY_SLICE_SIZE, format!("{}", tags.slice_secs)),
    ] {
        tag.insert_unchecked(TagItem::new(custom_key(key), ItemValue::Text(value)));
    }

    tag.set_title(format!("{}{}", tags.block_type.code(), tags.id));
    tag.set_artist(
        tags.origin
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown source")
            .to_string(),
    );
    tag.set_album(ALBUM_NAME.to_string());
    tag.set_comment(format!("from: {} | {}", origin, tags.description));

    tag.save_to_path(path, WriteOptions::default())
        .map_err(|source| MetaError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Read back whatever provenance the file carries. Structured keys win;
/// origin/description fall back to the `from: <origin> | <description>`
/// comment pattern when absent.
pub fn recover(path: &Path) -> Result<RecoveredMeta, MetaError> {
    let tagged = lofty::read_from_path(path).map_err(|source| MetaError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) else {
        return Ok(RecoveredMeta::default());
    };

    let get = |key: &str| -> Option<String> {
        tag.get_string(&custom_key(key))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut meta = RecoveredMeta {
        origin: get(KEY_ORIGIN_FILE),
        description: get(KEY_DESCRIPTION),
        block_type: get(KEY_AUDIO_TYPE).and_then(|c| BlockType::from_code(&c)),
        climax_secs: get(KEY_CLIMAX_TIME).and_then(|v| v.parse().ok()),
        slice_secs: get(KEY_SLICE_SIZE).and_then(|v| v.parse().ok()),
    };

    if meta.origin.is_none() || meta.description.is_none() {
        if let Some((origin, description)) = tag
            .get_string(&ItemKey::Comment)
            .and_then(parse_legacy_comment)
        {
            meta.origin.get_or_insert(origin);
            meta.description.get_or_insert(description);
        }
    }

    Ok(meta)
}

fn parse_legacy_comment(comment: &str) -> Option<(String, String)> {
    let rest = comment.trim().strip_prefix("from: ")?;
    let (origin, description) = rest.split_once(" | ")?;
    Some((origin.trim().to_string(), description.trim().to_string()))
}
