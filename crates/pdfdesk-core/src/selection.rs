//! The ordered set of input files chosen for the next run.

use std::path::{Path, PathBuf};

use crate::util::display_name;

/// What to do with a drop when files are already selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeChoice {
    Add,
    Replace,
    Cancel,
}

/// Effect of applying a batch to the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// Batch appended; count of paths that were new
    Added(usize),
    /// Selection replaced; new size
    Replaced(usize),
    /// Every path in the batch was already selected
    NothingNew,
    /// The user cancelled
    Unchanged,
}

/// Input paths, unique, in the order they were chosen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelection {
    paths: Vec<PathBuf>,
}

impl FileSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    /// Owned copy handed to a run
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.paths.clone()
    }

    /// Replace the selection (file picker semantics). Duplicates collapse.
    pub fn replace(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        self.paths.clear();
        self.add(paths);
        self.paths.len()
    }

    /// Append paths not already present; returns how many were new.
    pub fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        let before = self.paths.len();
        for path in paths {
            if !self.contains(&path) {
                self.paths.push(path);
            }
        }
        self.paths.len() - before
    }

    /// Apply a dropped batch.
    ///
    /// With nothing selected the batch simply becomes the selection and
    /// `choice` is ignored.
    pub fn merge(&mut self, batch: Vec<PathBuf>, choice: MergeChoice) -> SelectionChange {
        if self.is_empty() {
            return SelectionChange::Replaced(self.replace(batch));
        }

        match choice {
            MergeChoice::Cancel => SelectionChange::Unchanged,
            MergeChoice::Replace => SelectionChange::Replaced(self.replace(batch)),
            MergeChoice::Add => match self.add(batch) {
                0 => SelectionChange::NothingNew,
                n => SelectionChange::Added(n),
            },
        }
    }

    /// Label text: the file name for one file, the first three plus a count otherwise.
    pub fn summary(&self) -> String {
        match self.paths.as_slice() {
            [] => "No files selected".to_string(),
            [only] => format!("Selected: {}", display_name(only)),
            paths => {
                let names = paths
                    .iter()
                    .take(3)
                    .map(|p| display_name(p))
                    .collect::<Vec<_>>()
                    .join(", ");
                let more = if paths.len() > 3 {
                    format!(" and {} more...", paths.len() - 3)
                } else {
                    String::new()
                };
                format!("Selected {} files: {names}{more}", paths.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_add_keeps_order_and_uniqueness() {
        let mut selection = FileSelection::new();
        assert_eq!(selection.add(paths(&["/a.pdf", "/b.pdf", "/a.pdf"])), 2);
        assert_eq!(selection.add(paths(&["/c.pdf", "/b.pdf"])), 1);
        assert_eq!(selection.paths(), paths(&["/a.pdf", "/b.pdf", "/c.pdf"]).as_slice());
    }

    #[test]
    fn test_merge_into_empty_ignores_choice() {
        let mut selection = FileSelection::new();
        let change = selection.merge(paths(&["/a.pdf"]), MergeChoice::Cancel);
        assert_eq!(change, SelectionChange::Replaced(1));
        assert_eq!(selection.len(), 1);
    }

    #[test]
    fn test_merge_choices() {
        let mut selection = FileSelection::new();
        selection.replace(paths(&["/a.pdf"]));

        assert_eq!(
            selection.merge(paths(&["/b.pdf"]), MergeChoice::Cancel),
            SelectionChange::Unchanged
        );
        assert_eq!(
            selection.merge(paths(&["/a.pdf"]), MergeChoice::Add),
            SelectionChange::NothingNew
        );
        assert_eq!(
            selection.merge(paths(&["/a.pdf", "/b.pdf"]), MergeChoice::Add),
            SelectionChange::Added(1)
        );
        assert_eq!(
            selection.merge(paths(&["/z.pdf"]), MergeChoice::Replace),
            SelectionChange::Replaced(1)
        );
        assert_eq!(selection.paths(), paths(&["/z.pdf"]).as_slice());
    }

    #[test]
    fn test_summary() {
        let mut selection = FileSelection::new();
        assert_eq!(selection.summary(), "No files selected");

        selection.replace(paths(&["/docs/one.pdf"]));
        assert_eq!(selection.summary(), "Selected: one.pdf");

        selection.replace(paths(&["/1.pdf", "/2.pdf", "/3.pdf", "/4.pdf", "/5.pdf"]));
        assert_eq!(
            selection.summary(),
            "Selected 5 files: 1.pdf, 2.pdf, 3.pdf and 2 more..."
        );
    }
}
