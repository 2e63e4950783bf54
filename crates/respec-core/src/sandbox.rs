//! Package-database discovery for sandboxed projects.
//!
//! Sandboxes may hold one package database per compiler version. The newest
//! one wins, compared component-wise as numbers so that `7.10` ranks above
//! `7.8`.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::glob;

static VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)*").unwrap());

/// Numeric version tuple parsed from a directory name. Missing trailing
/// components count as zero, so `7.8` and `7.8.0` are equal.
#[derive(Debug, Clone)]
pub struct Version(Vec<u64>);

impl Version {
    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        for i in 0..len {
            let a = self.0.get(i).copied().unwrap_or(0);
            let b = other.0.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Extract every embedded version number from `name`, in order of appearance.
///
/// Digits inside an architecture tag such as `x86_64` are skipped; only runs
/// containing a dot, or standing alone between separators, count.
pub fn embedded_versions(name: &str) -> Vec<Version> {
    VERSION
        .find_iter(name)
        .filter(|m| {
            let text = m.as_str();
            let bounded_before = name[..m.start()]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_ascii_alphanumeric() && c != '_');
            text.contains('.') || bounded_before
        })
        .map(|m| {
            Version(
                m.as_str()
                    .split('.')
                    .filter_map(|part| part.parse::<u64>().ok())
                    .collect(),
            )
        })
        .collect()
}

/// Pick the candidate whose embedded versions rank highest.
///
/// Candidates without any version sort below every versioned one.
pub fn select_best<P: AsRef<Path>>(candidates: &[P]) -> Option<&P> {
    candidates.iter().max_by(|a, b| {
        let va = embedded_versions(&file_name(a.as_ref()));
        let vb = embedded_versions(&file_name(b.as_ref()));
        va.cmp(&vb)
    })
}

/// Locate the package database to hand to the toolchain, if any.
pub fn find_package_db(root: &Path, sandbox_glob: &str) -> Option<PathBuf> {
    let candidates = glob::expand(root, sandbox_glob);
    let best = select_best(&candidates).cloned();
    debug!(
        pattern = sandbox_glob,
        candidates = candidates.len(),
        selected = ?best,
        "package database lookup"
    );
    best
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn db(version: &str) -> PathBuf {
        PathBuf::from(format!(".cabal-sandbox/x86_64-linux-ghc-{version}-packages.conf.d"))
    }

    #[test]
    fn parses_ghc_version_from_sandbox_name() {
        let versions = embedded_versions("x86_64-linux-ghc-7.8.3-packages.conf.d");
        assert_eq!(versions, vec![Version(vec![7, 8, 3])]);
    }

    #[test]
    fn numeric_comparison_beats_lexicographic() {
        let candidates = vec![db("1.0"), db("1.1"), db("1.2"), db("1.10")];
        assert_eq!(select_best(&candidates), Some(&db("1.10")));
    }

    #[test]
    fn order_of_candidates_does_not_matter() {
        let candidates = vec![db("1.10"), db("1.2"), db("1.0")];
        assert_eq!(select_best(&candidates), Some(&db("1.10")));
    }

    #[test]
    fn longer_version_wins_when_prefix_equal() {
        assert!(Version(vec![7, 8, 1]) > Version(vec![7, 8]));
        assert_eq!(Version(vec![7, 8, 0]).cmp(&Version(vec![7, 8])), Ordering::Equal);
    }

    #[test]
    fn equality_agrees_with_ordering() {
        let short = Version(vec![7, 8]);
        let padded = Version(vec![7, 8, 0]);
        assert_eq!(short, padded);
        assert_eq!(short.cmp(&padded), Ordering::Equal);
        assert_ne!(short, Version(vec![7, 8, 1]));
        assert_eq!(padded.components(), &[7, 8, 0]);
    }

    #[test]
    fn unversioned_candidate_loses() {
        let candidates = vec![PathBuf::from("packages.conf.d"), db("7.6.3")];
        assert_eq!(select_best(&candidates), Some(&db("7.6.3")));
    }

    #[test]
    fn no_candidates_selects_nothing() {
        let candidates: Vec<PathBuf> = Vec::new();
        assert_eq!(select_best(&candidates), None);
    }

    #[test]
    fn find_package_db_reads_the_file_system() {
        let tmp = TempDir::new().unwrap();
        for version in ["7.8.4", "7.10.2", "7.6.3"] {
            std::fs::create_dir_all(tmp.path().join(db(version))).unwrap();
        }

        let found = find_package_db(tmp.path(), ".cabal-sandbox/*packages.conf.d");
        assert_eq!(found, Some(db("7.10.2")));
    }

    #[test]
    fn find_package_db_without_sandbox() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(
            find_package_db(tmp.path(), ".cabal-sandbox/*packages.conf.d"),
            None
        );
    }
}
