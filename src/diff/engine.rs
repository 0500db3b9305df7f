use crate::model::diff::Significance;
use serde::{Deserialize, Serialize};
use similar::{capture_diff_slices, Algorithm, DiffOp};

/// Lines of context kept on either side of a hunk's first and last change.
const CONTEXT: usize = 3;
/// An `equal` run longer than this splits the surrounding hunk in two.
const MAX_EQUAL_RUN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkChangeType {
    Context,
    Delete,
    Insert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HunkChange {
    #[serde(rename = "type")]
    pub change_type: HunkChangeType,
    pub content: String,
    #[serde(rename = "oldLine")]
    pub old_line: Option<usize>,
    #[serde(rename = "newLine")]
    pub new_line: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunk {
    pub content: String,
    #[serde(rename = "oldStart")]
    pub old_start: usize,
    #[serde(rename = "oldLines")]
    pub old_line_count: usize,
    #[serde(rename = "newStart")]
    pub new_start: usize,
    #[serde(rename = "newLines")]
    pub new_line_count: usize,
    pub changes: Vec<HunkChange>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
    /// Always 0 today: the opcode projection below decomposes `replace` spans into a matched
    /// delete+insert pair rather than emitting a distinct `replace` tag.
    pub changes: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffDocument {
    pub hunks: Vec<Hunk>,
}

/// Computes the structured line-level delta between two contents and its significance, given a
/// size threshold. This is the core, side-effect-free algorithm; callers own persistence.
pub fn generate(old_content: &str, new_content: &str, size_threshold: usize) -> (DiffDocument, DiffStats, Significance) {
    let old_lines: Vec<&str> = old_content.lines().collect();
    let new_lines: Vec<&str> = new_content.lines().collect();

    let ops = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines);
    let (hunks, stats) = build_hunks(&old_lines, &new_lines, &ops);
    let significance = Significance::classify(stats.total, size_threshold);

    (DiffDocument { hunks }, stats, significance)
}

struct HunkBuilder {
    old_start: usize,
    new_start: usize,
    changes: Vec<HunkChange>,
}

impl HunkBuilder {
    fn new(old_start_idx: usize, new_start_idx: usize) -> Self {
        Self { old_start: old_start_idx + 1, new_start: new_start_idx + 1, changes: Vec::new() }
    }

    fn push_context(&mut self, line: &str, old_idx: usize, new_idx: usize) {
        self.changes.push(HunkChange {
            change_type: HunkChangeType::Context,
            content: format!(" {line}"),
            old_line: Some(old_idx + 1),
            new_line: Some(new_idx + 1),
        });
    }

    fn push_delete(&mut self, line: &str, old_idx: usize) {
        self.changes.push(HunkChange {
            change_type: HunkChangeType::Delete,
            content: format!("-{line}"),
            old_line: Some(old_idx + 1),
            new_line: None,
        });
    }

    fn push_insert(&mut self, line: &str, new_idx: usize) {
        self.changes.push(HunkChange {
            change_type: HunkChangeType::Insert,
            content: format!("+{line}"),
            old_line: None,
            new_line: Some(new_idx + 1),
        });
    }

    /// Trims leading/trailing runs of pure context down to `CONTEXT` lines (internal context
    /// between two changes within the same hunk is left untouched) and derives the header.
    fn build(mut self) -> Hunk {
        let leading = self.changes.iter().take_while(|c| c.change_type == HunkChangeType::Context).count();
        if leading > CONTEXT {
            self.changes.drain(0..leading - CONTEXT);
        }

        let trailing = self.changes.iter().rev().take_while(|c| c.change_type == HunkChangeType::Context).count();
        if trailing > CONTEXT {
            let new_len = self.changes.len() - (trailing - CONTEXT);
            self.changes.truncate(new_len);
        }

        let old_start = self.changes.iter().find_map(|c| c.old_line).unwrap_or(self.old_start);
        let new_start = self.changes.iter().find_map(|c| c.new_line).unwrap_or(self.new_start);
        let old_line_count = self.changes.iter().filter(|c| c.old_line.is_some()).count();
        let new_line_count = self.changes.iter().filter(|c| c.new_line.is_some()).count();

        let content = format!("@@ -{old_start},{old_line_count} +{new_start},{new_line_count} @@");
        Hunk { content, old_start, old_line_count, new_start, new_line_count, changes: self.changes }
    }
}

fn build_hunks(old_lines: &[&str], new_lines: &[&str], ops: &[DiffOp]) -> (Vec<Hunk>, DiffStats) {
    let mut hunks = Vec::new();
    let mut stats = DiffStats::default();
    let mut current: Option<HunkBuilder> = None;

    for op in ops {
        match *op {
            DiffOp::Equal { old_index, new_index, len } => {
                if len > MAX_EQUAL_RUN {
                    if let Some(mut hb) = current.take() {
                        for k in 0..CONTEXT.min(len) {
                            hb.push_context(old_lines[old_index + k], old_index + k, new_index + k);
                        }
                        hunks.push(hb.build());
                    }
                } else if let Some(hb) = current.as_mut() {
                    for k in 0..len {
                        hb.push_context(old_lines[old_index + k], old_index + k, new_index + k);
                    }
                }
            }
            DiffOp::Delete { old_index, old_len, new_index } => {
                open_hunk(&mut current, old_lines, new_lines, old_index, new_index);
                let hb = current.as_mut().unwrap();
                for k in 0..old_len {
                    hb.push_delete(old_lines[old_index + k], old_index + k);
                }
                stats.deletions += old_len;
            }
            DiffOp::Insert { old_index, new_index, new_len } => {
                open_hunk(&mut current, old_lines, new_lines, old_index, new_index);
                let hb = current.as_mut().unwrap();
                for k in 0..new_len {
                    hb.push_insert(new_lines[new_index + k], new_index + k);
                }
                stats.additions += new_len;
            }
            DiffOp::Replace { old_index, old_len, new_index, new_len } => {
                open_hunk(&mut current, old_lines, new_lines, old_index, new_index);
                let hb = current.as_mut().unwrap();
                for k in 0..old_len {
                    hb.push_delete(old_lines[old_index + k], old_index + k);
                }
                for k in 0..new_len {
                    hb.push_insert(new_lines[new_index + k], new_index + k);
                }
                stats.deletions += old_len;
                stats.additions += new_len;
            }
        }
    }

    if let Some(hb) = current.take() {
        hunks.push(hb.build());
    }

    stats.total = stats.additions + stats.deletions + stats.changes;
    (hunks, stats)
}

/// Opens a new hunk seeded with up to `CONTEXT` lines of context immediately preceding the
/// change at `(old_index, new_index)`, if no hunk is currently open.
fn open_hunk(current: &mut Option<HunkBuilder>, old_lines: &[&str], new_lines: &[&str], old_index: usize, new_index: usize) {
    if current.is_some() {
        return;
    }
    let context_len = CONTEXT.min(old_index).min(new_index);
    let old_from = old_index - context_len;
    let new_from = new_index - context_len;
    let mut hb = HunkBuilder::new(old_from, new_from);
    for k in 0..context_len {
        hb.push_context(old_lines[old_from + k], old_from + k, new_from + k);
    }
    *current = Some(hb);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn identical_content_produces_no_hunks() {
        let (doc, stats, sig) = generate("a\nb\nc\n", "a\nb\nc\n", 10);
        assert!(doc.hunks.is_empty());
        assert_eq!(stats.total, 0);
        assert!(matches!(sig, Significance::Minor));
    }

    #[test]
    fn single_line_change_produces_one_hunk_with_context() {
        let old = "one\ntwo\nthree\nfour\nfive\n";
        let new = "one\ntwo\nTHREE\nfour\nfive\n";
        let (doc, stats, _) = generate(old, new, 10);

        assert_eq!(doc.hunks.len(), 1);
        assert_eq!(stats.additions, 1);
        assert_eq!(stats.deletions, 1);
        let hunk = &doc.hunks[0];
        let leading_context = hunk.changes.iter().take_while(|c| c.change_type == HunkChangeType::Context).count();
        assert_eq!(leading_context, 2);
    }

    #[test]
    fn equal_run_of_exactly_ten_is_not_split() {
        let shared: String = (0..10).map(|i| format!("line{i}\n")).collect();
        let old = format!("CHANGE\n{shared}tail\n");
        let new = format!("changed\n{shared}tail-new\n");
        let (doc, _, _) = generate(&old, &new, 10);
        assert_eq!(doc.hunks.len(), 1);
    }

    #[test]
    fn equal_run_of_eleven_is_split() {
        let shared: String = (0..11).map(|i| format!("line{i}\n")).collect();
        let old = format!("CHANGE\n{shared}tail\n");
        let new = format!("changed\n{shared}tail-new\n");
        let (doc, _, _) = generate(&old, &new, 10);
        assert_eq!(doc.hunks.len(), 2);
    }

    #[test]
    fn hunks_never_exceed_three_lines_of_boundary_context() {
        let old = "a\nb\nc\nd\ne\nf\ng\nOLD\nh\ni\nj\nk\nl\nm\n";
        let new = "a\nb\nc\nd\ne\nf\ng\nNEW\nh\ni\nj\nk\nl\nm\n";
        let (doc, _, _) = generate(old, new, 10);
        let hunk = &doc.hunks[0];
        let leading = hunk.changes.iter().take_while(|c| c.change_type == HunkChangeType::Context).count();
        let trailing = hunk.changes.iter().rev().take_while(|c| c.change_type == HunkChangeType::Context).count();
        assert!(leading <= 3);
        assert!(trailing <= 3);
    }

    #[test]
    fn significance_boundary_at_threshold() {
        let threshold = 5;
        assert!(matches!(Significance::classify(threshold - 1, threshold), Significance::Minor));
        assert!(matches!(Significance::classify(threshold, threshold), Significance::Moderate));
        assert!(matches!(Significance::classify(threshold * 5 - 1, threshold), Significance::Moderate));
        assert!(matches!(Significance::classify(threshold * 5, threshold), Significance::Major));
    }
}
