//! Parser for Audacity-style label exports.
//!
//! Each non-comment line is `<climax_time><TAB><ignored><TAB><type> <description>`.
//! Bad lines are skipped with a per-line diagnostic; parsing never aborts
//! early, and an empty result is a valid outcome.

use crate::block::{BlockType, SliceSpec};

/// Result of parsing one label file: the accepted specs, in input order,
/// plus one diagnostic per skipped line.
#[derive(Debug, Default)]
pub struct ParsedLabels {
    pub specs: Vec<SliceSpec>,
    pub diagnostics: Vec<String>,
}

/// Parse raw label text into slice specs.
///
/// `source_duration` bounds the window check when known; with `None` only
/// the leading bound is enforced.
pub fn parse_labels(text: &str, slice_secs: f64, source_duration: Option<f64>) -> ParsedLabels {
    let mut out = ParsedLabels::default();

    for (idx, raw) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            out.diagnostics
                .push(format!("line {line_num}: expected 3 tab-separated fields: {line}"));
            continue;
        }

        let climax_secs: f64 = match fields[0].trim().parse() {
            Ok(v) => v,
            Err(_) => {
                out.diagnostics.push(format!(
                    "line {line_num}: climax time {:?} is not a number",
                    fields[0].trim()
                ));
                continue;
            }
        };

        // Third field is "<type code> <free-text description>".
        let mut tokens = fields[2].split_whitespace();
        let code = tokens.next().unwrap_or("");
        let block_type = match BlockType::from_code(code) {
            Some(ty) => ty,
            None => {
                out.diagnostics
                    .push(format!("line {line_num}: unknown type code {code:?}"));
                continue;
            }
        };
        let description = tokens.collect::<Vec<_>>().join(" ");

        match SliceSpec::new(climax_secs, block_type, description, slice_secs, source_duration) {
            Ok(spec) => out.specs.push(spec),
            Err(err) => {
                out.diagnostics
                    .push(format!("line {line_num}: climax at {climax_secs}s skipped: {err}"));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_line_into_spec() {
        let parsed = parse_labels("100.0\tX\tm intro theme", 30.0, None);
        assert!(parsed.diagnostics.is_empty());
        assert_eq!(parsed.specs.len(), 1);
        let spec = &parsed.specs[0];
        assert_eq!(spec.block_type, BlockType::Music);
        assert_eq!(spec.window_begin, 85.0);
        assert_eq!(spec.window_end, 115.0);
        assert_eq!(spec.description, "intro theme");
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let text = "# comment\n\n100.0\t100.0\tv a voice line\n";
        let parsed = parse_labels(text, 30.0, None);
        assert_eq!(parsed.specs.len(), 1);
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn rejects_window_before_start_regardless_of_duration() {
        let parsed = parse_labels("5.0\tX\tv early", 30.0, None);
        assert!(parsed.specs.is_empty());
        assert_eq!(parsed.diagnostics.len(), 1);
        assert!(parsed.diagnostics[0].contains("line 1"));
    }

    #[test]
    fn rejects_window_past_known_duration() {
        let parsed = parse_labels("190.0\tX\tm late", 30.0, Some(200.0));
        assert!(parsed.specs.is_empty());
        assert!(parsed.diagnostics[0].contains("past the end"));
    }

    #[test]
    fn malformed_lines_do_not_abort_parsing() {
        let text = "abc\tX\tm nope\n60.0\tX\tq unknown\n60.0\n100.0\tX\tm good one\n";
        let parsed = parse_labels(text, 30.0, Some(600.0));
        assert_eq!(parsed.specs.len(), 1);
        assert_eq!(parsed.specs[0].description, "good one");
        assert_eq!(parsed.diagnostics.len(), 3);
        assert!(parsed.diagnostics[0].contains("not a number"));
        assert!(parsed.diagnostics[1].contains("unknown type code"));
        assert!(parsed.diagnostics[2].contains("tab-separated"));
    }

    #[test]
    fn empty_input_is_a_valid_empty_result() {
        let parsed = parse_labels("", 30.0, None);
        assert!(parsed.specs.is_empty());
        assert!(parsed.diagnostics.is_empty());
    }
}
