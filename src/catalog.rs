//! Persistent per-type catalog of block provenance.
//!
//! The catalog is a single TOML document with one array-of-tables per
//! block type; each row has the type's own code as id column, plus
//! `origin` and `description`. The whole file is read and rewritten on
//! every mutating operation, so a catalog must have a single writer at a
//! time. A missing file or missing sub-table just means "no entries yet".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::block::{BlockType, parse_block_filename};
use crate::metadata;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("catalog {path}: row {row} of table {table:?} is malformed")]
    Malformed {
        path: PathBuf,
        table: String,
        row: usize,
    },

    #[error("cannot encode catalog: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("duplicate {block_type} block id {id:?} in catalog")]
    DuplicateId { block_type: BlockType, id: String },
}

/// One catalog row: block id plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub id: String,
    pub origin: String,
    pub description: String,
}

/// One artifact found on disk following the `<code><id>.<ext>` convention.
#[derive(Debug, Clone)]
pub struct ScannedBlock {
    pub path: PathBuf,
    pub block_type: BlockType,
    pub id: String,
}

impl ScannedBlock {
    /// Numeric ordinal embedded in the id, used for deterministic
    /// pre-shuffle ordering. Covers both legacy sequence numbers and
    /// timestamp ids.
    pub fn ordinal(&self) -> u128 {
        self.id.parse().unwrap_or(0)
    }
}

/// List the block artifacts in `dir` (non-recursive), sorted by ordinal
/// then id.
pub fn scan_blocks(dir: &Path, extensions: &[String]) -> Vec<ScannedBlock> {
    let mut blocks: Vec<ScannedBlock> = Vec::new();
    for entry in WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if !path.is_file() || !has_recognized_extension(path, extensions) {
            continue;
        }
        if let Some((block_type, id)) = parse_block_filename(path) {
            blocks.push(ScannedBlock {
                path: path.to_path_buf(),
                block_type,
                id,
            });
        }
    }
    blocks.sort_by(|a, b| a.ordinal().cmp(&b.ordinal()).then(a.id.cmp(&b.id)));
    blocks
}

fn has_recognized_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            extensions.iter().any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(&ext))
        })
        .unwrap_or(false)
}

/// The persistent catalog, all types loaded at once.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    tables: BTreeMap<BlockType, Vec<CatalogRow>>,
}

impl Catalog {
    /// Load the catalog at `path`; a missing file is an empty catalog.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let mut tables: BTreeMap<BlockType, Vec<CatalogRow>> =
            BlockType::ALL.iter().map(|&ty| (ty, Vec::new())).collect();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path: path.to_path_buf(),
                    tables,
                });
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let root: toml::Table = text.parse().map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        for ty in BlockType::ALL {
            let code = ty.code().to_string();
            let Some(value) = root.get(&code) else {
                continue;
            };
            let rows = value.as_array().ok_or_else(|| CatalogError::Malformed {
                path: path.to_path_buf(),
                table: code.clone(),
                row: 0,
            })?;
            for (i, row) in rows.iter().enumerate() {
                let parsed = row.as_table().and_then(|t| {
                    Some(CatalogRow {
                        id: t.get(&code)?.as_str()?.to_string(),
                        origin: t.get("origin")?.as_str()?.to_string(),
                        description: t.get("description")?.as_str()?.to_string(),
                    })
                });
                match parsed {
                    Some(row) => tables.entry(ty).or_default().push(row),
                    None => {
                        return Err(CatalogError::Malformed {
                            path: path.to_path_buf(),
                            table: code,
                            row: i + 1,
                        });
                    }
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            tables,
        })
    }

    /// Rewrite the whole catalog file.
    pub fn save(&self) -> Result<(), CatalogError> {
        let mut root = toml::Table::new();
        for ty in BlockType::ALL {
            let code = ty.code().to_string();
            let rows: Vec<toml::Value> = self.rows(ty)
                .iter()
                .map(|r| {
                    let mut t = toml::Table::new();
                    t.insert(code.clone(), toml::Value::String(r.id.clone()));
                    t.insert("origin".to_string(), toml::Value::String(r.origin.clone()));
                    t.insert(
                        "description".to_string(),
                        toml::Value::String(r.description.clone()),
                    );
                    toml::Value::Table(t)
                })
                .collect();
            root.insert(code, toml::Value::Array(rows));
        }
        let text = toml::to_string(&root)?;
        std::fs::write(&self.path, text).map_err(|source| CatalogError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self, block_type: BlockType) -> &[CatalogRow] {
        self.tables.get(&block_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, block_type: BlockType, id: &str) -> bool {
        self.rows(block_type).iter().any(|r| r.id == id)
    }

    /// Register one block. Ids are unique within their type partition;
    /// appending an existing id is a conflict, never a silent duplicate.
    pub fn append(
        &mut self,
        block_type: BlockType,
        id: &str,
        origin: &str,
        description: &str,
    ) -> Result<(), CatalogError> {
        if self.contains(block_type, id) {
            return Err(CatalogError::DuplicateId {
                block_type,
                id: id.to_string(),
            });
        }
        self.tables.entry(block_type).or_default().push(CatalogRow {
            id: id.to_string(),
            origin: origin.to_string(),
            description: description.to_string(),
        });
        Ok(())
    }

    /// Legacy ordinal scheme: the next `m<N>`-style sequence number.
    /// Superseded by timestamp ids but kept for old block sets.
    pub fn next_sequence_number(&self, block_type: BlockType) -> usize {
        self.rows(block_type).len() + 1
    }

    /// Compare catalog rows against the artifacts actually present in
    /// `dir`. Differences are reported, never fixed here.
    pub fn reconcile(&self, dir: &Path, extensions: &[String]) -> ReconcileReport {
        let scanned = scan_blocks(dir, extensions);
        let mut diffs = Vec::new();

        for ty in BlockType::ALL {
            let on_disk: Vec<&ScannedBlock> =
                scanned.iter().filter(|b| b.block_type == ty).collect();

            let mut missing_in_folder: Vec<String> = self
                .rows(ty)
                .iter()
                .filter(|r| !on_disk.iter().any(|b| b.id == r.id))
                .map(|r| format!("{}{}", ty.code(), r.id))
                .collect();
            let mut missing_in_catalog: Vec<String> = on_disk
                .iter()
                .filter(|b| !self.contains(ty, &b.id))
                .map(|b| format!("{}{}", ty.code(), b.id))
                .collect();
            missing_in_folder.sort();
            missing_in_catalog.sort();

            diffs.push(TypeDiff {
                block_type: ty,
                catalog_total: self.rows(ty).len(),
                folder_total: on_disk.len(),
                missing_in_folder,
                missing_in_catalog,
            });
        }

        ReconcileReport { diffs }
    }

    /// Rebuild the catalog from the folder: drop rows whose file is gone,
    /// then adopt every unregistered artifact, recovering provenance from
    /// its embedded tags when possible. The file is rewritten only when
    /// something actually changed.
    pub fn rebuild_from_folder(
        &mut self,
        dir: &Path,
        extensions: &[String],
    ) -> Result<RebuildReport, CatalogError> {
        let scanned = scan_blocks(dir, extensions);
        let mut report = RebuildReport::default();

        for ty in BlockType::ALL {
            let present: Vec<&str> = scanned
                .iter()
                .filter(|b| b.block_type == ty)
                .map(|b| b.id.as_str())
                .collect();
            if let Some(rows) = self.tables.get_mut(&ty) {
                rows.retain(|r| {
                    let keep = present.contains(&r.id.as_str());
                    if !keep {
                        report.removed.push(format!("{}{}", ty.code(), r.id));
                    }
                    keep
                });
            }
        }

        for block in &scanned {
            if self.contains(block.block_type, &block.id) {
                continue;
            }
            let meta = metadata::recover(&block.path).unwrap_or_default();
            let origin = meta.origin.unwrap_or_else(|| "unknown origin".to_string());
            let description = meta
                .description
                .unwrap_or_else(|| "recovered from file".to_string());
            self.append(block.block_type, &block.id, &origin, &description)?;
            report
                .adopted
                .push(format!("{}{}", block.block_type.code(), block.id));
        }

        if !report.removed.is_empty() || !report.adopted.is_empty() {
            self.save()?;
            report.saved = true;
        }
        Ok(report)
    }
}

/// Per-type difference between catalog and folder.
#[derive(Debug)]
pub struct TypeDiff {
    pub block_type: BlockType,
    pub missing_in_folder: Vec<String>,
    pub missing_in_catalog: Vec<String>,
    pub catalog_total: usize,
    pub folder_total: usize,
}

impl TypeDiff {
    pub fn clean(&self) -> bool {
        self.missing_in_folder.is_empty() && self.missing_in_catalog.is_empty()
    }
}

/// Full reconciliation result, one diff per block type.
#[derive(Debug)]
pub struct ReconcileReport {
    pub diffs: Vec<TypeDiff>,
}

impl ReconcileReport {
    pub fn synchronized(&self) -> bool {
        self.diffs.iter().all(TypeDiff::clean)
            && self.catalog_total() == self.folder_total()
    }

    pub fn catalog_total(&self) -> usize {
        self.diffs.iter().map(|d| d.catalog_total).sum()
    }

    pub fn folder_total(&self) -> usize {
        self.diffs.iter().map(|d| d.folder_total).sum()
    }
}

impl std::fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diff in &self.diffs {
            writeln!(f, "--- {} blocks ({}) ---", diff.block_type, diff.block_type.code())?;
            if diff.clean() {
                writeln!(f, "all catalog rows have matching files")?;
            } else {
                for name in &diff.missing_in_folder {
                    writeln!(f, "in catalog but file missing: {name}")?;
                }
                for name in &diff.missing_in_catalog {
                    writeln!(f, "file present but not in catalog: {name}")?;
                }
            }
            writeln!(
                f,
                "total in catalog: {}, total in folder: {}",
                diff.catalog_total, diff.folder_total
            )?;
        }
        if self.synchronized() {
            writeln!(f, "catalog and folder are synchronized")
        } else {
            writeln!(f, "catalog and folder are NOT synchronized")
        }
    }
}

/// What a rebuild changed.
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub removed: Vec<String>,
    pub adopted: Vec<String>,
    pub saved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["mp3".into(), "wav".into()]
    }

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"not real audio").unwrap();
    }

    #[test]
    fn missing_file_loads_as_empty_catalog() {
        let dir = tempdir().unwrap();
        let cat = Catalog::load(&dir.path().join("blocks_list.toml")).unwrap();
        for ty in BlockType::ALL {
            assert!(cat.rows(ty).is_empty());
            assert_eq!(cat.next_sequence_number(ty), 1);
        }
    }

    #[test]
    fn append_save_load_round_trips_per_type_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks_list.toml");

        let mut cat = Catalog::load(&path).unwrap();
        cat.append(BlockType::Music, "1", "/src/a.wav", "first").unwrap();
        cat.append(BlockType::Music, "2", "/src/a.wav", "second").unwrap();
        cat.append(BlockType::Voice, "1", "/src/b.wav", "a voice").unwrap();
        cat.save().unwrap();

        let cat = Catalog::load(&path).unwrap();
        assert_eq!(cat.rows(BlockType::Music).len(), 2);
        assert_eq!(cat.rows(BlockType::Music)[1].description, "second");
        assert_eq!(cat.rows(BlockType::Voice).len(), 1);
        assert_eq!(cat.rows(BlockType::Jingle).len(), 0);
        assert_eq!(cat.next_sequence_number(BlockType::Music), 3);
    }

    #[test]
    fn append_rejects_duplicate_id_within_type() {
        let dir = tempdir().unwrap();
        let mut cat = Catalog::load(&dir.path().join("c.toml")).unwrap();
        cat.append(BlockType::Music, "7", "/a", "x").unwrap();
        // The same id in another type partition is fine.
        cat.append(BlockType::Voice, "7", "/a", "x").unwrap();

        let err = cat.append(BlockType::Music, "7", "/a", "again").unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId { .. }));
        assert_eq!(cat.rows(BlockType::Music).len(), 1);
    }

    #[test]
    fn scan_blocks_recognizes_prefixes_and_sorts_by_ordinal() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "m10.mp3");
        touch(dir.path(), "m2.mp3");
        touch(dir.path(), "v1.wav");
        touch(dir.path(), "j3.mp3");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "mix.mp3");

        let blocks = scan_blocks(dir.path(), &exts());
        let names: Vec<String> = blocks
            .iter()
            .map(|b| format!("{}{}", b.block_type.code(), b.id))
            .collect();
        assert_eq!(names, vec!["v1", "m2", "j3", "m10"]);
    }

    #[test]
    fn reconcile_reports_zero_differences_when_in_sync() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "m1.mp3");
        touch(dir.path(), "v1.mp3");

        let mut cat = Catalog::load(&dir.path().join("c.toml")).unwrap();
        cat.append(BlockType::Music, "1", "/a", "x").unwrap();
        cat.append(BlockType::Voice, "1", "/a", "y").unwrap();

        let report = cat.reconcile(dir.path(), &exts());
        assert!(report.synchronized());
        assert_eq!(report.catalog_total(), 2);
        assert_eq!(report.folder_total(), 2);
    }

    #[test]
    fn reconcile_detects_one_orphan_after_file_deletion() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "m1.mp3");
        touch(dir.path(), "m2.mp3");

        let mut cat = Catalog::load(&dir.path().join("c.toml")).unwrap();
        cat.append(BlockType::Music, "1", "/a", "x").unwrap();
        cat.append(BlockType::Music, "2", "/a", "y").unwrap();

        std::fs::remove_file(dir.path().join("m2.mp3")).unwrap();

        let report = cat.reconcile(dir.path(), &exts());
        assert!(!report.synchronized());
        let music = &report.diffs[0];
        assert_eq!(music.missing_in_folder, vec!["m2".to_string()]);
        assert!(music.missing_in_catalog.is_empty());
    }

    #[test]
    fn reconcile_detects_unregistered_files() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "j5.mp3");

        let cat = Catalog::load(&dir.path().join("c.toml")).unwrap();
        let report = cat.reconcile(dir.path(), &exts());
        assert!(!report.synchronized());
        let jingle = report
            .diffs
            .iter()
            .find(|d| d.block_type == BlockType::Jingle)
            .unwrap();
        assert_eq!(jingle.missing_in_catalog, vec!["j5".to_string()]);
    }

    #[test]
    fn rebuild_drops_dead_rows_and_adopts_strays_with_placeholders() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.toml");
        touch(dir.path(), "v3.mp3");

        let mut cat = Catalog::load(&path).unwrap();
        cat.append(BlockType::Music, "1", "/gone", "orphan row").unwrap();
        cat.save().unwrap();

        let report = cat.rebuild_from_folder(dir.path(), &exts()).unwrap();
        assert_eq!(report.removed, vec!["m1".to_string()]);
        assert_eq!(report.adopted, vec!["v3".to_string()]);
        assert!(report.saved);

        // Stray has no readable tags, so it gets placeholder provenance.
        let reloaded = Catalog::load(&path).unwrap();
        assert!(reloaded.rows(BlockType::Music).is_empty());
        let row = &reloaded.rows(BlockType::Voice)[0];
        assert_eq!(row.id, "3");
        assert_eq!(row.origin, "unknown origin");
        assert_eq!(row.description, "recovered from file");
    }

    #[test]
    fn rebuild_without_changes_does_not_rewrite() {
        let dir = tempdir().unwrap();
        let mut cat = Catalog::load(&dir.path().join("c.toml")).unwrap();
        let report = cat.rebuild_from_folder(dir.path(), &exts()).unwrap();
        assert!(!report.saved);
        assert!(!cat.path().exists());
    }
}
