//! Drag-and-drop intake.
//!
//! Platforms deliver drops in different shapes (Tk-style `{brace groups}`,
//! shell-quoted terminal pastes, `file://` URIs). Everything is normalized to
//! plain paths here, then filtered down to PDFs that exist.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Only files with this extension are accepted
pub const ACCEPTED_EXTENSION: &str = "pdf";

/// Result of filtering one drop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropBatch {
    /// Existing PDF files, in drop order
    pub accepted: Vec<PathBuf>,
    /// How many candidates were discarded
    pub rejected: usize,
}

impl DropBatch {
    /// Something was dropped but none of it was usable.
    pub const fn all_invalid(&self) -> bool {
        self.accepted.is_empty() && self.rejected > 0
    }
}

/// Called with every filtered drop
pub type DropCallback = Box<dyn FnMut(DropBatch) + Send>;

/// Capability to receive file drops on some widget.
///
/// Implemented per platform and composed into the presentation layer.
pub trait DropTarget {
    type Widget: ?Sized;

    fn register(&mut self, widget: &Self::Widget, callback: DropCallback) -> Result<()>;
}

/// Split a raw drop payload into path candidates.
///
/// Whitespace separates entries; `{...}`, `'...'` and `"..."` group an entry
/// containing spaces. A backslash escapes a following space or quote and is
/// kept literally everywhere else, so Windows paths survive.
pub fn split_payload(data: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut closing: Option<char> = None;
    let mut chars = data.chars().peekable();

    while let Some(c) = chars.next() {
        match (closing, c) {
            (Some(end), c) if c == end => {
                closing = None;
            }
            (Some(_), c) => current.push(c),
            (None, '{') => closing = Some('}'),
            (None, '\'' | '"') => closing = Some(c),
            (None, '\\') => match chars.peek() {
                Some(&next) if next.is_whitespace() || matches!(next, '\'' | '"') => {
                    current.push(next);
                    chars.next();
                }
                _ => current.push('\\'),
            },
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    entries.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }

    if !current.is_empty() {
        entries.push(current);
    }
    entries
}

/// Turn a `file://` URI into a path. Anything else is already a path.
pub fn clean_path(raw: &str) -> PathBuf {
    let Some(uri_path) = raw.strip_prefix("file://") else {
        return PathBuf::from(raw);
    };
    let decoded = urlencoding::decode(uri_path)
        .map_or_else(|_| uri_path.to_string(), std::borrow::Cow::into_owned);
    PathBuf::from(decoded)
}

/// `.pdf`, any case
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ACCEPTED_EXTENSION))
}

/// Keep existing PDF files, taking paths as given.
///
/// For picker and command-line input; drops go through [`filter_candidates`].
pub fn filter_paths<P: AsRef<Path>>(paths: &[P]) -> DropBatch {
    let mut batch = DropBatch::default();

    for path in paths {
        let path = path.as_ref();
        if has_pdf_extension(path) && path.exists() {
            batch.accepted.push(path.to_path_buf());
        } else {
            debug!("Ignoring {}", path.display());
            batch.rejected += 1;
        }
    }

    batch
}

/// Normalize dropped candidates and keep existing PDF files.
pub fn filter_candidates<S: AsRef<str>>(candidates: &[S]) -> DropBatch {
    let paths: Vec<PathBuf> = candidates
        .iter()
        .map(|raw| clean_path(raw.as_ref()))
        .collect();
    filter_paths(&paths)
}

/// `split_payload` followed by `filter_candidates`
pub fn filter_payload(data: &str) -> DropBatch {
    filter_candidates(&split_payload(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_tk_braces() {
        assert_eq!(
            split_payload("/a.pdf {/my docs/b.pdf} /c.pdf"),
            vec!["/a.pdf", "/my docs/b.pdf", "/c.pdf"]
        );
    }

    #[test]
    fn test_split_terminal_quoting() {
        assert_eq!(
            split_payload("'/my docs/a.pdf' /other\\ dir/b.pdf \"/q d/c.pdf\"  "),
            vec!["/my docs/a.pdf", "/other dir/b.pdf", "/q d/c.pdf"]
        );
    }

    #[test]
    fn test_clean_path_decodes_uri() {
        assert_eq!(
            clean_path("file:///home/me/My%20Paper.pdf"),
            PathBuf::from("/home/me/My Paper.pdf")
        );
        assert_eq!(clean_path("/plain.pdf"), PathBuf::from("/plain.pdf"));
        assert_eq!(
            clean_path("/reports/report%202024.pdf"),
            PathBuf::from("/reports/report%202024.pdf")
        );
    }

    #[test]
    fn test_split_keeps_windows_backslashes() {
        assert_eq!(
            split_payload(r"C:\Users\me\paper.pdf D:\scans\b.pdf"),
            vec![r"C:\Users\me\paper.pdf", r"D:\scans\b.pdf"]
        );
        assert_eq!(
            split_payload(r"C:\my\ docs\a.pdf"),
            vec![r"C:\my docs\a.pdf"]
        );
    }

    #[test]
    fn test_percent_in_real_file_name_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("report%202024.pdf");
        std::fs::write(&pdf, b"%PDF-1.4").unwrap();

        let picked = filter_paths(&[&pdf]);
        assert_eq!(picked.accepted, vec![pdf.clone()]);

        let dropped = filter_candidates(&[pdf.display().to_string()]);
        assert_eq!(dropped.accepted, vec![pdf.clone()]);
        assert_eq!(dropped.rejected, 0);
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        assert!(has_pdf_extension(Path::new("/x/REPORT.PDF")));
        assert!(has_pdf_extension(Path::new("/x/report.pdf")));
        assert!(!has_pdf_extension(Path::new("/x/report.pdf.txt")));
        assert!(!has_pdf_extension(Path::new("/x/pdf")));
    }

    #[test]
    fn test_filter_keeps_existing_pdfs_only() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.pdf");
        let upper = dir.path().join("UPPER.PDF");
        let text = dir.path().join("notes.txt");
        std::fs::write(&good, b"%PDF-1.4").unwrap();
        std::fs::write(&upper, b"%PDF-1.4").unwrap();
        std::fs::write(&text, b"hello").unwrap();
        let missing = dir.path().join("missing.pdf");

        let candidates = vec![
            good.display().to_string(),
            text.display().to_string(),
            missing.display().to_string(),
            format!("file://{}", upper.display()),
        ];
        let batch = filter_candidates(&candidates);

        assert_eq!(batch.accepted, vec![good, upper]);
        assert_eq!(batch.rejected, 2);
        assert!(!batch.all_invalid());
    }

    #[test]
    fn test_all_invalid_batch() {
        let batch = filter_payload("/definitely/not/here.pdf /etc/hostname");
        assert!(batch.all_invalid());

        let empty = filter_payload("   ");
        assert!(!empty.all_invalid());
    }
}
