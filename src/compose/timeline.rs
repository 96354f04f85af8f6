//! The human-readable timeline manifest written next to each mix.

use crate::block::BlockType;

/// One block placement in the finished sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub offset_ms: u64,
    /// Artifact name: type code plus id, e.g. `m20250101120000123`.
    pub name: String,
    pub description: String,
    pub origin: String,
    pub channel: BlockType,
}

impl TimelineEntry {
    pub fn render(&self) -> String {
        format!(
            "{} [{}] {} - {} (from: {})",
            format_offset(self.offset_ms),
            self.channel.label().to_ascii_uppercase(),
            self.name,
            self.description,
            self.origin
        )
    }
}

/// Header block at the top of the manifest.
#[derive(Debug)]
pub struct ManifestHeader {
    pub name: String,
    pub created: String,
    pub directory: String,
    pub total_ms: u64,
    pub used: [(BlockType, usize); 3],
}

/// `MM:SS`, minutes running past 59 if the sequence does.
pub fn format_offset(ms: u64) -> String {
    let secs = ms / 1000;
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn render_manifest(header: &ManifestHeader, entries: &[TimelineEntry]) -> String {
    let mut out = String::new();
    out.push_str(&format!("sequence: {}\n", header.name));
    out.push_str(&format!("created: {}\n", header.created));
    out.push_str(&format!("blocks from: {}\n", header.directory));
    out.push_str(&format!("total length: {}\n", format_offset(header.total_ms)));
    let counts = header
        .used
        .iter()
        .map(|(ty, n)| format!("{ty} {n}"))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("blocks used: {counts}\n\n"));
    for entry in entries {
        out.push_str(&entry.render());
        out.push('\n');
    }
    out
}
