//! Diff composition analysis: code vs docs, whitespace, triviality.
//!
//! Works on unified diff text only; no source-language parsing. Hunk lines
//! are classified by the path of the file they touch, which is all the
//! trigger filter needs.

use session_store::DiffSummary;

/// Changes of at most this many lines are trivial regardless of what they
/// touch (the "one-liner" rule).
pub const MINIMAL_TRIVIAL_LINES: usize = 2;

/// Composition snapshot of one unified diff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffAnalysis {
    pub total_changed: usize,
    pub code_lines: usize,
    pub doc_lines: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub files_changed: usize,
    pub whitespace_only: bool,
    pub docs_only: bool,
}

impl DiffAnalysis {
    /// The persisted projection of this analysis.
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            lines_added: self.lines_added,
            lines_removed: self.lines_removed,
            files_changed: self.files_changed,
            docs_only: self.docs_only,
        }
    }

    /// Returns the skip reason when the diff qualifies as trivial:
    /// empty, whitespace-only, at most [`MINIMAL_TRIVIAL_LINES`] lines, or
    /// doc-only within `max_lines`.
    pub fn trivial_reason(&self, max_lines: usize) -> Option<String> {
        if self.total_changed == 0 {
            return Some("Empty diff".to_string());
        }
        if self.whitespace_only {
            return Some("Trivial change: whitespace only".to_string());
        }
        if self.total_changed <= MINIMAL_TRIVIAL_LINES {
            return Some(format!(
                "Trivial change: only {} line(s) changed",
                self.total_changed
            ));
        }
        if self.docs_only && self.total_changed <= max_lines {
            return Some(format!(
                "Trivial change: {} doc-only line(s) within threshold {}",
                self.total_changed, max_lines
            ));
        }
        None
    }
}

/// Paths treated as documentation rather than code.
pub fn is_doc_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.starts_with("docs/") || lower.contains("/docs/") {
        return true;
    }
    [".md", ".markdown", ".rst", ".adoc", ".txt"]
        .iter()
        .any(|ext| lower.ends_with(ext))
        || lower.ends_with("license")
        || lower.ends_with("changelog")
}

/// Analyzes unified diff text.
///
/// Deterministic: the same text always yields the same analysis.
pub fn analyze_diff(diff: &str) -> DiffAnalysis {
    let mut out = DiffAnalysis {
        whitespace_only: true,
        ..DiffAnalysis::default()
    };
    let mut current_is_doc = false;

    for line in diff.lines() {
        if line.starts_with("diff --git") {
            out.files_changed += 1;
            continue;
        }
        // Path of the post-image side; deleted files fall back to pre-image.
        if let Some(rest) = line.strip_prefix("+++ ") {
            if rest != "/dev/null" {
                current_is_doc = is_doc_path(strip_diff_prefix(rest));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("--- ") {
            if rest != "/dev/null" {
                current_is_doc = is_doc_path(strip_diff_prefix(rest));
            }
            continue;
        }

        let (changed, content) = if let Some(c) = line.strip_prefix('+') {
            out.lines_added += 1;
            (true, c)
        } else if let Some(c) = line.strip_prefix('-') {
            out.lines_removed += 1;
            (true, c)
        } else {
            (false, "")
        };
        if !changed {
            continue;
        }

        out.total_changed += 1;
        if current_is_doc {
            out.doc_lines += 1;
        } else {
            out.code_lines += 1;
        }
        if !content.trim().is_empty() {
            out.whitespace_only = false;
        }
    }

    if out.total_changed == 0 {
        out.whitespace_only = false;
    }
    out.docs_only = out.total_changed > 0 && out.code_lines == 0;
    out
}

fn strip_diff_prefix(path: &str) -> &str {
    path.strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path)
}

/// Post-image paths touched by the diff, in order of first appearance.
pub fn changed_paths(diff: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            if rest == "/dev/null" {
                continue;
            }
            let path = strip_diff_prefix(rest).to_string();
            if !out.contains(&path) {
                out.push(path);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_diff(lines: usize) -> String {
        let mut s = String::from("diff --git a/README.md b/README.md\n--- a/README.md\n+++ b/README.md\n@@ -1,1 +1,10 @@\n");
        for i in 0..lines {
            s.push_str(&format!("+doc line {i}\n"));
        }
        s
    }

    fn code_diff(lines: usize) -> String {
        let mut s = String::from("diff --git a/src/main.rs b/src/main.rs\n--- a/src/main.rs\n+++ b/src/main.rs\n@@ -1,1 +1,10 @@\n");
        for i in 0..lines {
            s.push_str(&format!("+let x{i} = {i};\n"));
        }
        s
    }

    #[test]
    fn empty_diff_is_trivial_with_exact_reason() {
        let a = analyze_diff("");
        assert_eq!(a.trivial_reason(10).as_deref(), Some("Empty diff"));
    }

    #[test]
    fn whitespace_only_diff_is_trivial() {
        let diff = "diff --git a/src/lib.rs b/src/lib.rs\n--- a/src/lib.rs\n+++ b/src/lib.rs\n@@ -1,2 +1,2 @@\n-   \n+\t\n";
        let a = analyze_diff(diff);
        assert!(a.whitespace_only);
        assert!(a.trivial_reason(10).unwrap().contains("whitespace"));
    }

    #[test]
    fn doc_only_at_threshold_is_trivial_and_above_is_not() {
        let at = analyze_diff(&doc_diff(10));
        assert!(at.docs_only);
        assert_eq!(at.total_changed, 10);
        assert!(at.trivial_reason(10).unwrap().contains("Trivial change"));

        let above = analyze_diff(&doc_diff(11));
        assert_eq!(above.total_changed, 11);
        assert_eq!(above.trivial_reason(10), None);
    }

    #[test]
    fn small_code_change_hits_the_minimal_rule() {
        let a = analyze_diff(&code_diff(2));
        assert!(!a.docs_only);
        assert!(a.trivial_reason(10).unwrap().contains("Trivial change"));

        let b = analyze_diff(&code_diff(3));
        assert_eq!(b.trivial_reason(10), None);
    }

    #[test]
    fn substantial_code_diff_is_not_doc_only() {
        let a = analyze_diff(&code_diff(200));
        assert_eq!(a.code_lines, 200);
        assert!(!a.docs_only);
        assert_eq!(a.trivial_reason(10), None);
    }

    #[test]
    fn mixed_diff_counts_both_sides() {
        let mut s = doc_diff(5);
        s.push_str(&code_diff(7));
        let a = analyze_diff(&s);
        assert_eq!(a.doc_lines, 5);
        assert_eq!(a.code_lines, 7);
        assert_eq!(a.files_changed, 2);
        assert!(!a.docs_only);
    }

    #[test]
    fn changed_paths_are_deduped_in_order() {
        let mut s = doc_diff(2);
        s.push_str(&code_diff(2));
        s.push_str(&doc_diff(1));
        assert_eq!(changed_paths(&s), ["README.md", "src/main.rs"]);
    }

    #[test]
    fn doc_path_classifier() {
        assert!(is_doc_path("README.md"));
        assert!(is_doc_path("docs/guide.rst"));
        assert!(is_doc_path("notes/overview.txt"));
        assert!(!is_doc_path("src/main.rs"));
        assert!(!is_doc_path("Cargo.toml"));
    }
}
