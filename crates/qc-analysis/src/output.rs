//! Output directory layout of a run.
//!
//! ```text
//! {output_root}/{source}_{YYYYmmdd_HHMMSS}/
//! ├── single_distributions/
//! ├── {group_by}_{key}/
//! │   └── single_distributions/
//! └── {group_by}_comparison/
//! ```
//!
//! Every directory is created idempotently; an existing directory is reused.

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subdirectory holding one figure per measured column.
pub const SINGLE_DISTRIBUTIONS_DIR: &str = "single_distributions";

/// Directories of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    base: PathBuf,
}

impl OutputLayout {
    /// Create `{root}/{source_name}_{timestamp}` and its distribution folder.
    pub fn create(root: &Path, source_name: &str, started_at: DateTime<Local>) -> io::Result<Self> {
        let run_name = format!(
            "{}_{}",
            sanitize_component(source_name),
            started_at.format("%Y%m%d_%H%M%S")
        );
        Self::at(root.join(run_name))
    }

    /// Use `base` as the run directory, creating it if needed.
    pub fn at(base: impl Into<PathBuf>) -> io::Result<Self> {
        let layout = Self { base: base.into() };
        ensure_dir(&layout.base)?;
        ensure_dir(&layout.single_distributions_dir(&layout.base))?;
        Ok(layout)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `{dir}/single_distributions`.
    pub fn single_distributions_dir(&self, dir: &Path) -> PathBuf {
        dir.join(SINGLE_DISTRIBUTIONS_DIR)
    }

    /// Directory names for the groups of `group_by`, one per key in order.
    ///
    /// Names are sanitized and then made unique, so keys that sanitize to
    /// the same text (`A/B` and `A_B`) or to the comparison directory still
    /// get separate directories. Later keys receive a `_2`, `_3`... suffix.
    pub fn group_dir_names<S: AsRef<str>>(group_by: &str, keys: &[S]) -> Vec<String> {
        let mut names = ComponentNames::default();
        names.reserve(&Self::comparison_dir_name(group_by));
        names.reserve(SINGLE_DISTRIBUTIONS_DIR);
        keys.iter()
            .map(|key| names.claim(&format!("{}_{}", group_by, key.as_ref())))
            .collect()
    }

    /// Create and return `{base}/{name}` with its distribution folder.
    ///
    /// `name` comes from [`group_dir_names`](Self::group_dir_names).
    pub fn group_dir(&self, name: &str) -> io::Result<PathBuf> {
        let dir = self.base.join(name);
        ensure_dir(&dir)?;
        ensure_dir(&self.single_distributions_dir(&dir))?;
        Ok(dir)
    }

    fn comparison_dir_name(group_by: &str) -> String {
        sanitize_component(&format!("{group_by}_comparison"))
    }

    /// Create and return `{base}/{group_by}_comparison`.
    pub fn comparison_dir(&self, group_by: &str) -> io::Result<PathBuf> {
        let dir = self.base.join(Self::comparison_dir_name(group_by));
        ensure_dir(&dir)?;
        Ok(dir)
    }
}

/// Hands out sanitized path components that are unique within one directory.
#[derive(Debug, Default)]
pub struct ComponentNames {
    used: HashSet<String>,
}

impl ComponentNames {
    /// Mark a component as taken without handing it out.
    pub fn reserve(&mut self, component: &str) {
        self.used.insert(component.to_string());
    }

    /// Sanitize `value` and suffix it until it is unused.
    pub fn claim(&mut self, value: &str) -> String {
        let base = sanitize_component(value);
        let mut name = base.clone();
        let mut n = 2;
        while !self.used.insert(name.clone()) {
            name = format!("{base}_{n}");
            n += 1;
        }
        name
    }
}

/// Unique file stems for `values`, in order.
pub fn unique_components<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut names = ComponentNames::default();
    values.iter().map(|v| names.claim(v.as_ref())).collect()
}

/// Create a directory and its parents; an existing directory is not an error.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    debug!("Ensured directory: {}", path.display());
    Ok(())
}

/// Replace characters that cannot appear in a single path component.
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_run_directory_name() {
        let root = tempfile::tempdir().unwrap();
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let layout = OutputLayout::create(root.path(), "line_a", started).unwrap();

        assert_eq!(layout.base(), root.path().join("line_a_20240309_140507"));
        assert!(layout.base().join(SINGLE_DISTRIBUTIONS_DIR).is_dir());
    }

    #[test]
    fn test_group_and_comparison_dirs_are_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let layout = OutputLayout::at(root.path().join("run")).unwrap();

        let first = layout.group_dir("Batch_A").unwrap();
        let second = layout.group_dir("Batch_A").unwrap();
        assert_eq!(first, second);
        assert!(first.ends_with("Batch_A"));
        assert!(first.join(SINGLE_DISTRIBUTIONS_DIR).is_dir());

        let comparison = layout.comparison_dir("Batch").unwrap();
        assert!(comparison.ends_with("Batch_comparison"));
        assert!(layout.comparison_dir("Batch").is_ok());
    }

    #[test]
    fn test_group_dir_names_are_unique() {
        let names = OutputLayout::group_dir_names("Batch", &["A/B", "A_B", "comparison", "A_B_2"]);
        assert_eq!(
            names,
            vec!["Batch_A_B", "Batch_A_B_2", "Batch_comparison_2", "Batch_A_B_2_2"]
        );
    }

    #[test]
    fn test_unique_components_keep_distinct_names() {
        assert_eq!(
            unique_components(&["W/1", "W_1", "Height"]),
            vec!["W_1", "W_1_2", "Height"]
        );
    }

    #[test]
    fn test_sanitize_component() {
        assert_eq!(sanitize_component("A/B"), "A_B");
        assert_eq!(sanitize_component(" 42 "), "42");
        assert_eq!(sanitize_component(".."), "_");
        assert_eq!(sanitize_component("Lot-7"), "Lot-7");
    }
}
