//! Slice extraction: cut a spec's window out of the decoded source,
//! shape it (fade in/out, normalize), give it a unique timestamp id and
//! export it through the codec, embedding provenance tags on the way out.
//!
//! Batch processing is per-slice isolated: one bad slice produces a
//! diagnostic and the rest of the batch continues.

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::audio::{AudioBuffer, AudioCodec, AudioError};
use crate::block::{Block, SliceSpec};
use crate::catalog::Catalog;
use crate::config::SlicerSettings;
use crate::metadata::{self, BlockTags};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("slice window [{begin:.1}s, {end:.1}s] lies outside the source")]
    EmptyWindow { begin: f64, end: f64 },

    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// One exported block, plus whether the tag embed degraded.
#[derive(Debug)]
pub struct ExtractOutcome {
    pub block: Block,
    /// `Some` when the artifact was created but its tags could not be
    /// written. Never fatal.
    pub metadata_error: Option<String>,
}

/// Everything one batch run produced, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub created: Vec<ExtractOutcome>,
    pub diagnostics: Vec<String>,
}

pub struct Extractor<'a, C: AudioCodec> {
    codec: &'a C,
    settings: &'a SlicerSettings,
    /// Numeric form of the last issued id, to keep ids strictly
    /// increasing across rapid successive calls.
    last_id: u64,
}

impl<'a, C: AudioCodec> Extractor<'a, C> {
    pub fn new(codec: &'a C, settings: &'a SlicerSettings) -> Self {
        Self {
            codec,
            settings,
            last_id: 0,
        }
    }

    /// Fixed-width timestamp id with millisecond precision, bumped past
    /// the previous one on collision.
    fn next_id(&mut self) -> String {
        let stamp: u64 = Utc::now()
            .format("%Y%m%d%H%M%S%3f")
            .to_string()
            .parse()
            .unwrap_or(self.last_id + 1);
        let id = stamp.max(self.last_id + 1);
        self.last_id = id;
        format!("{id:017}")
    }

    /// Cut, shape and export one block from `source`.
    ///
    /// Window bounds are clamped to the source here; rejecting
    /// out-of-bounds specs is the parser's job, but drift must not crash
    /// the extractor.
    pub fn extract(
        &mut self,
        source: &AudioBuffer,
        origin: &Path,
        spec: &SliceSpec,
        out_dir: &Path,
    ) -> Result<ExtractOutcome, ExtractError> {
        let begin_ms = (spec.window_begin.max(0.0) * 1000.0) as u64;
        let end_ms = (spec.window_end.max(0.0) * 1000.0) as u64;

        let mut cut = source.slice_ms(begin_ms, end_ms);
        if cut.is_empty() {
            return Err(ExtractError::EmptyWindow {
                begin: spec.window_begin,
                end: spec.window_end,
            });
        }

        let fade_ms = (self.settings.fade_secs() * 1000.0) as u64;
        cut.fade_in(fade_ms);
        cut.fade_out(fade_ms);
        cut.normalize();

        let id = self.next_id();
        let path = out_dir.join(format!("{}{}.mp3", spec.block_type.code(), id));
        self.codec.encode(&cut, &path, self.settings.bitrate_kbps)?;

        let metadata_error = metadata::embed(
            &path,
            &BlockTags {
                id: id.clone(),
                block_type: spec.block_type,
                origin: origin.to_path_buf(),
                description: spec.description.clone(),
                climax_secs: spec.climax_secs,
                slice_secs: self.settings.slice_secs,
            },
        )
        .err()
        .map(|e| e.to_string());

        Ok(ExtractOutcome {
            block: Block {
                id,
                block_type: spec.block_type,
                origin: origin.to_path_buf(),
                description: spec.description.clone(),
                duration_ms: cut.len_ms(),
                path,
            },
            metadata_error,
        })
    }

    /// Run a whole batch of specs, registering each exported block in
    /// the catalog. The catalog file is rewritten after every append.
    pub fn extract_batch(
        &mut self,
        source: &AudioBuffer,
        origin: &Path,
        specs: &[SliceSpec],
        out_dir: &Path,
        catalog: &mut Catalog,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for spec in specs {
            match self.extract(source, origin, spec, out_dir) {
                Ok(outcome) => {
                    if let Some(reason) = &outcome.metadata_error {
                        report.diagnostics.push(format!(
                            "{}: created, metadata failed: {reason}",
                            display_name(&outcome.block.path)
                        ));
                    }
                    let registered = catalog
                        .append(
                            outcome.block.block_type,
                            &outcome.block.id,
                            &outcome.block.origin.to_string_lossy(),
                            &outcome.block.description,
                        )
                        .and_then(|()| catalog.save());
                    if let Err(e) = registered {
                        report.diagnostics.push(format!(
                            "{}: exported but not cataloged: {e}",
                            display_name(&outcome.block.path)
                        ));
                    }
                    report.created.push(outcome);
                }
                Err(e) => report.diagnostics.push(format!(
                    "{} slice at {:.1}s skipped: {e}",
                    spec.block_type, spec.climax_secs
                )),
            }
        }

        report
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
