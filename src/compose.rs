//! Sequence composition: pick blocks from a folder, lay them out on two
//! channels (music vs. voice/jingle), mix them into one output file and
//! write a timeline manifest next to it.
//!
//! The music channel starts after a fixed lead of silence; the
//! voice/jingle channel starts at zero, so speech always opens the
//! programme and music fades in underneath.

mod timeline;

pub use timeline::{ManifestHeader, TimelineEntry, format_offset, render_manifest};


use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;

use crate::audio::{AudioBuffer, AudioCodec, AudioError};
use crate::block::BlockType;
use crate::catalog::{Catalog, CatalogError, ScannedBlock, scan_blocks};
use crate::config::Settings;
use crate::metadata;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(
        "not enough blocks: {music} music and {speech} voice/jingle available, \
         at least {required} of each channel required"
    )]
    InsufficientBlocks {
        music: usize,
        speech: usize,
        required: usize,
    },

    #[error("nothing left to sequence after the corruption check")]
    EmptyMix,

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("cannot write timeline {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a composition run produced.
#[derive(Debug)]
pub struct ComposeReport {
    pub output: PathBuf,
    pub manifest: PathBuf,
    /// Blocks used per channel (both channels are trimmed to this).
    pub blocks_per_channel: usize,
    pub total_ms: u64,
    pub timeline: Vec<TimelineEntry>,
    /// Candidates set aside by the corruption filter.
    pub problematic: Vec<String>,
}

/// A candidate that decoded cleanly, with its provenance resolved.
struct LoadedBlock {
    scanned: ScannedBlock,
    buffer: AudioBuffer,
    description: String,
    origin: String,
}

pub struct Composer<'a, C: AudioCodec> {
    codec: &'a C,
    settings: &'a Settings,
}

impl<'a, C: AudioCodec> Composer<'a, C> {
    pub fn new(codec: &'a C, settings: &'a Settings) -> Self {
        Self { codec, settings }
    }

    /// Build one mixed sequence from the blocks in `blocks_dir`.
    ///
    /// `target_minutes` caps the selection; with `None`, as many blocks
    /// as fit on both channels are used.
    pub fn compose(
        &self,
        blocks_dir: &Path,
        output: &Path,
        target_minutes: Option<f64>,
        rng: &mut impl Rng,
    ) -> Result<ComposeReport, ComposeError> {
        let slice_ms = (self.settings.slicer.slice_secs * 1000.0) as u64;
        let lead_ms = (self.settings.sequence.music_lead_secs * 1000.0) as u64;

        let scanned = scan_blocks(blocks_dir, &self.settings.library.extensions);
        let music_count = scanned
            .iter()
            .filter(|b| b.block_type == BlockType::Music)
            .count();
        let speech_count = scanned.len() - music_count;

        let required = self.settings.sequence.min_blocks_per_channel;
        if music_count < required || speech_count < required {
            return Err(ComposeError::InsufficientBlocks {
                music: music_count,
                speech: speech_count,
                required,
            });
        }

        let catalog = Catalog::load(&blocks_dir.join(&self.settings.library.catalog_file))?;

        let mut problematic = Vec::new();
        let mut music: Vec<LoadedBlock> = Vec::new();
        let mut speech: Vec<LoadedBlock> = Vec::new();
        for block in scanned {
            match self.load_candidate(block, &catalog, &mut problematic) {
                Some(loaded) if loaded.scanned.block_type == BlockType::Music => {
                    music.push(loaded);
                }
                Some(loaded) => speech.push(loaded),
                None => {}
            }
        }

        // Cap at the requested length and at the smaller channel.
        let requested = target_minutes
            .map(|m| (m * 60.0 / self.settings.slicer.slice_secs).ceil() as usize)
            .unwrap_or(usize::MAX);
        let selected = requested.min(music.len()).min(speech.len());
        if selected == 0 {
            return Err(ComposeError::EmptyMix);
        }

        music.shuffle(rng);
        music.truncate(selected);
        shuffle_speech_jingle_first(&mut speech, rng);
        speech.truncate(selected);

        // Both channels share the first music block's format.
        let (channels, sample_rate) = {
            let b = &music[0].buffer;
            (b.channels(), b.sample_rate())
        };
        let mut music_track = AudioBuffer::silence(lead_ms, channels, sample_rate);
        for block in &music {
            music_track.append(&block.buffer);
        }
        let mut speech_track = AudioBuffer::silence(0, channels, sample_rate);
        for block in &speech {
            speech_track.append(&block.buffer);
        }

        let total_ms = music_track.len_ms().max(speech_track.len_ms());
        music_track.pad_to_ms(total_ms);
        speech_track.pad_to_ms(total_ms);

        let mixed = music_track.overlay(&speech_track);
        if mixed.is_empty() {
            return Err(ComposeError::EmptyMix);
        }
        self.codec
            .encode(&mixed, output, self.settings.slicer.bitrate_kbps)?;

        let mut entries: Vec<TimelineEntry> = Vec::new();
        for (i, block) in music.iter().enumerate() {
            entries.push(entry_at(lead_ms + i as u64 * slice_ms, block));
        }
        for (i, block) in speech.iter().enumerate() {
            entries.push(entry_at(i as u64 * slice_ms, block));
        }
        entries.sort_by_key(|e| e.offset_ms);

        let manifest = output.with_extension("txt");
        let header = ManifestHeader {
            name: output
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("sequence")
                .to_string(),
            created: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            directory: blocks_dir.display().to_string(),
            total_ms,
            used: BlockType::ALL.map(|ty| {
                let count = music
                    .iter()
                    .chain(speech.iter())
                    .filter(|b| b.scanned.block_type == ty)
                    .count();
                (ty, count)
            }),
        };
        std::fs::write(&manifest, render_manifest(&header, &entries)).map_err(|source| {
            ComposeError::Manifest {
                path: manifest.clone(),
                source,
            }
        })?;

        Ok(ComposeReport {
            output: output.to_path_buf(),
            manifest,
            blocks_per_channel: selected,
            total_ms,
            timeline: entries,
            problematic,
        })
    }

    /// Decode one candidate, trying a single repair pass when it fails;
    /// resolve its provenance from the catalog, falling back to embedded
    /// tags. Returns `None` (and records a diagnostic) for files that
    /// stay unreadable.
    fn load_candidate(
        &self,
        block: ScannedBlock,
        catalog: &Catalog,
        problematic: &mut Vec<String>,
    ) -> Option<LoadedBlock> {
        let buffer = match self.codec.decode(&block.path) {
            Ok(buffer) => buffer,
            Err(first) => match self
                .codec
                .repair(&block.path)
                .and_then(|()| self.codec.decode(&block.path))
            {
                Ok(buffer) => buffer,
                Err(_) => {
                    problematic.push(format!(
                        "{}{}: set aside, cannot decode even after repair: {first}",
                        block.block_type.code(),
                        block.id
                    ));
                    return None;
                }
            },
        };

        let row = catalog
            .rows(block.block_type)
            .iter()
            .find(|r| r.id == block.id);
        let (description, origin) = match row {
            Some(row) => (row.description.clone(), row.origin.clone()),
            None => {
                let meta = metadata::recover(&block.path).unwrap_or_default();
                (
                    meta.description.unwrap_or_default(),
                    meta.origin.unwrap_or_else(|| "unknown".to_string()),
                )
            }
        };

        Some(LoadedBlock {
            scanned: block,
            buffer,
            description,
            origin,
        })
    }
}

/// Speech-channel ordering: when any jingle is present, one random
/// jingle opens the channel and the rest is shuffled behind it.
fn shuffle_speech_jingle_first(speech: &mut Vec<LoadedBlock>, rng: &mut impl Rng) {
    let jingles: Vec<usize> = speech
        .iter()
        .enumerate()
        .filter(|(_, b)| b.scanned.block_type == BlockType::Jingle)
        .map(|(i, _)| i)
        .collect();

    if let Some(&first) = jingles.choose(rng) {
        let lead = speech.remove(first);
        speech.shuffle(rng);
        speech.insert(0, lead);
    } else {
        speech.shuffle(rng);
    }
}

fn entry_at(offset_ms: u64, block: &LoadedBlock) -> TimelineEntry {
    TimelineEntry {
        offset_ms,
        name: format!("{}{}", block.scanned.block_type.code(), block.scanned.id),
        description: block.description.clone(),
        origin: block.origin.clone(),
        channel: block.scanned.block_type,
    }
}
