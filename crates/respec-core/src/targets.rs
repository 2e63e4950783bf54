//! Set of source files the runner has already seen.

use std::collections::BTreeSet;
use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use crate::naming::NamingConvention;

/// Previously seen source paths, relative to the project root.
///
/// Only grows between session starts; a fresh scan replaces it on start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownTargets {
    paths: BTreeSet<String>,
}

impl KnownTargets {
    /// Collect every source file under `root`, skipping hidden directories
    /// and any directory named in `ignore`.
    pub fn scan(root: &Path, naming: &NamingConvention, ignore: &[String]) -> Self {
        let paths = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored(e, ignore))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let relative = e.path().strip_prefix(root).ok()?;
                let relative = relative.to_string_lossy().replace('\\', "/");
                naming.is_source_file(&relative).then_some(relative)
            })
            .collect();
        Self { paths }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Add every path; report whether any of them was new.
    pub fn absorb<S: AsRef<str>>(&mut self, paths: &[S]) -> bool {
        let unseen = paths.iter().any(|p| !self.contains(p.as_ref()));
        if unseen {
            self.paths
                .extend(paths.iter().map(|p| p.as_ref().to_string()));
        }
        unseen
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

fn is_ignored(entry: &DirEntry, ignore: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || ignore.iter().any(|i| *i == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn scan_finds_haskell_sources() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "src/Foo.hs");
        touch(tmp.path(), "src/Foo/Bar.lhs");
        touch(tmp.path(), "test/FooSpec.hs");
        touch(tmp.path(), "README.md");
        touch(tmp.path(), "dist/build/Gen.hs");
        touch(tmp.path(), ".cabal-sandbox/lib/Dep.hs");

        let targets = KnownTargets::scan(
            tmp.path(),
            &NamingConvention::default(),
            &["dist".to_string()],
        );
        let found: Vec<&str> = targets.iter().collect();
        assert_eq!(found, vec!["src/Foo.hs", "src/Foo/Bar.lhs", "test/FooSpec.hs"]);
    }

    #[test]
    fn scan_of_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let targets = KnownTargets::scan(
            &tmp.path().join("missing"),
            &NamingConvention::default(),
            &[],
        );
        assert!(targets.is_empty());
    }

    #[test]
    fn absorb_reports_new_paths_once() {
        let mut targets = KnownTargets::default();
        assert!(targets.absorb(&["a", "b"]));
        assert!(!targets.absorb(&["a", "b"]));
        assert!(!targets.absorb(&["b"]));
        assert!(targets.absorb(&["b", "c"]));
        assert_eq!(targets.len(), 3);
    }
}
