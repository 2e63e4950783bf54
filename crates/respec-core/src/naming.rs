//! Mapping from watched file paths to test-module identifiers.

use std::fmt;

use crate::glob::Pattern;

/// Dotted module identifier, e.g. `Data.Map.Strict`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleName(String);

impl ModuleName {
    /// Derive a module name from a relative source path with the extension
    /// already removed.
    ///
    /// Leading lowercase directories (`src/`, `test/`, `lib/`) are treated as
    /// source roots and dropped; remaining separators become dots.
    pub fn from_relative_path(path: &str) -> Option<Self> {
        let stripped = strip_lowercase_directories(path);
        if stripped.is_empty() {
            return None;
        }
        Some(Self(stripped.replace('/', ".")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Drop every leading path segment that starts with a lowercase letter.
///
/// The final segment is kept even if lowercase: it is the module itself.
pub fn strip_lowercase_directories(path: &str) -> &str {
    let mut rest = path;
    while let Some((head, tail)) = rest.split_once('/') {
        let lowercase = head.chars().next().is_some_and(char::is_lowercase);
        if !lowercase || tail.is_empty() {
            break;
        }
        rest = tail;
    }
    rest
}

/// What a changed path means to the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchedPath {
    /// Project manifest; the session has to be rebuilt.
    Manifest,
    /// Test module. `None` for the top-level spec driver itself.
    Spec(Option<ModuleName>),
    /// Plain library module; its spec shares the module name.
    Source(ModuleName),
    /// Anything else.
    Other,
}

/// Naming convention for a project: source root, extensions, manifests.
#[derive(Debug, Clone)]
pub struct NamingConvention {
    source_root: Option<String>,
    extensions: Vec<String>,
    manifests: Vec<Pattern>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self::new(
            None,
            &["hs".to_string(), "lhs".to_string()],
            &[
                "*.cabal".to_string(),
                "cabal.project".to_string(),
                "stack.yaml".to_string(),
                "package.yaml".to_string(),
            ],
        )
    }
}

impl NamingConvention {
    pub fn new(source_root: Option<&str>, extensions: &[String], manifests: &[String]) -> Self {
        Self {
            source_root: source_root
                .map(|r| r.trim_matches('/').to_string())
                .filter(|r| !r.is_empty()),
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            manifests: manifests.iter().map(|m| Pattern::new(m)).collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether `path` carries one of the watched source extensions.
    pub fn is_source_file(&self, path: &str) -> bool {
        self.split_extension(&normalize(path)).is_some()
    }

    /// Classify a path relative to the project root.
    pub fn classify(&self, path: &str) -> WatchedPath {
        let path = normalize(path);
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        if self.manifests.iter().any(|m| m.matches(file_name)) {
            return WatchedPath::Manifest;
        }

        let Some(stem) = self.split_extension(&path) else {
            return WatchedPath::Other;
        };
        let stem = match &self.source_root {
            Some(root) => stem
                .strip_prefix(root.as_str())
                .and_then(|s| s.strip_prefix('/'))
                .unwrap_or(stem),
            None => stem,
        };

        match stem.strip_suffix("Spec") {
            Some(module) if module.is_empty() || module.ends_with('/') => WatchedPath::Spec(None),
            Some(module) => WatchedPath::Spec(ModuleName::from_relative_path(module)),
            None => match ModuleName::from_relative_path(stem) {
                Some(module) => WatchedPath::Source(module),
                None => WatchedPath::Other,
            },
        }
    }

    /// Module identifier to hand to `--match`, if the path names a module.
    pub fn module_for(&self, path: &str) -> Option<ModuleName> {
        match self.classify(path) {
            WatchedPath::Spec(module) => module,
            WatchedPath::Source(module) => Some(module),
            WatchedPath::Manifest | WatchedPath::Other => None,
        }
    }

    fn split_extension<'a>(&self, path: &'a str) -> Option<&'a str> {
        let (stem, ext) = path.rsplit_once('.')?;
        if stem.is_empty() || stem.ends_with('/') {
            return None;
        }
        self.extensions
            .iter()
            .any(|e| e == ext)
            .then_some(stem)
    }
}

fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.strip_prefix("./").map(str::to_string).unwrap_or(path)
}
