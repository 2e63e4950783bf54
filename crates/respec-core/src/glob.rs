//! Shell-style wildcards (`*` and `?`) for sandbox discovery and manifest
//! detection.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};
use wildmatch::WildMatch;

/// A single path-component pattern.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    matcher: WildMatch,
}

impl Pattern {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            matcher: WildMatch::new(raw),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Wildcards never cross a `/`.
    pub fn matches(&self, name: &str) -> bool {
        !name.contains('/') && self.matcher.matches(name)
    }

    /// Hidden entries only match components that themselves start with `.`.
    fn admits(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') && !self.raw.starts_with('.') {
            return false;
        }
        self.matches(&name)
    }
}

/// Expand `pattern` relative to `root`, one path component per directory
/// level. Results are relative to `root` and sorted.
pub fn expand(root: &Path, pattern: &str) -> Vec<PathBuf> {
    let components: Vec<Pattern> = pattern
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .map(Pattern::new)
        .collect();
    if components.is_empty() {
        return Vec::new();
    }

    let depth = components.len();
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .min_depth(depth)
        .max_depth(depth)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || components[entry.depth() - 1].admits(entry))
        .filter_map(Result::ok)
        .filter_map(|entry| entry.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .collect();
    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn star_matches_within_a_component() {
        let p = Pattern::new("*.cabal");
        assert!(p.matches("foo.cabal"));
        assert!(p.matches(".cabal"));
        assert!(!p.matches("foo.cabal.bak"));
        assert!(!p.matches("dir/foo.cabal"));
    }

    #[test]
    fn question_mark_matches_one_char() {
        let p = Pattern::new("v?.conf");
        assert!(p.matches("v1.conf"));
        assert!(!p.matches("v10.conf"));
    }

    #[test]
    fn dots_are_literal() {
        let p = Pattern::new("stack.yaml");
        assert!(p.matches("stack.yaml"));
        assert!(!p.matches("stackxyaml"));
    }

    #[test]
    fn expand_walks_components() {
        let tmp = TempDir::new().unwrap();
        let sandbox = tmp.path().join(".cabal-sandbox");
        std::fs::create_dir_all(sandbox.join("x86_64-linux-ghc-7.8.3-packages.conf.d")).unwrap();
        std::fs::create_dir_all(sandbox.join("lib")).unwrap();

        let found = expand(tmp.path(), ".cabal-sandbox/*packages.conf.d");
        assert_eq!(
            found,
            vec![PathBuf::from(".cabal-sandbox/x86_64-linux-ghc-7.8.3-packages.conf.d")]
        );
    }

    #[test]
    fn expand_missing_root_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(expand(tmp.path(), ".cabal-sandbox/*packages.conf.d").is_empty());
    }

    #[test]
    fn star_skips_hidden_entries() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".hidden")).unwrap();
        std::fs::create_dir_all(tmp.path().join("visible")).unwrap();
        assert_eq!(expand(tmp.path(), "*"), vec![PathBuf::from("visible")]);
    }

    #[test]
    fn expand_prunes_non_matching_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/one.d")).unwrap();
        std::fs::create_dir_all(tmp.path().join("b/two.d")).unwrap();
        std::fs::write(tmp.path().join("a/three.d"), "").unwrap();

        assert_eq!(
            expand(tmp.path(), "a/*.d"),
            vec![PathBuf::from("a/one.d"), PathBuf::from("a/three.d")]
        );
        assert_eq!(
            expand(tmp.path(), "?/*.d"),
            vec![
                PathBuf::from("a/one.d"),
                PathBuf::from("a/three.d"),
                PathBuf::from("b/two.d"),
            ]
        );
    }
}
