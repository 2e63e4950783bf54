//! Command spelling for a particular toolchain.
//!
//! The session only needs four logical commands plus quit; how they are
//! written is up to the dialect.

/// Directive spelling for an interactive toolchain.
pub trait Dialect: Send + Sync {
    /// Point the session at a top-level target.
    fn load(&self, target: &str) -> String;

    /// Recompile whatever changed since the last load.
    fn reload(&self) -> String;

    /// Run the whole suite.
    fn run_all(&self) -> String;

    /// Run only tests whose identifier matches `pattern`.
    fn run_matching(&self, pattern: &str) -> String;

    /// Run only the tests that failed in the previous run.
    fn rerun_failures(&self) -> String;

    /// Leave the session.
    fn quit(&self) -> String;

    /// Print `token` on a line of its own. Sent ahead of every command so
    /// that output from the previous command can be told apart.
    fn marker(&self, token: &str) -> String;
}

/// GHCi driving an hspec suite through its `main`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hspec;

impl Dialect for Hspec {
    fn load(&self, target: &str) -> String {
        format!(":load {target}")
    }

    fn reload(&self) -> String {
        ":reload".to_string()
    }

    fn run_all(&self) -> String {
        ":main --color".to_string()
    }

    fn run_matching(&self, pattern: &str) -> String {
        format!(":main --color --match {}", quote(pattern))
    }

    fn rerun_failures(&self) -> String {
        ":main --color --rerun".to_string()
    }

    fn quit(&self) -> String {
        ":quit".to_string()
    }

    fn marker(&self, token: &str) -> String {
        format!(":! echo {token}")
    }
}

fn quote(arg: &str) -> String {
    format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_names_the_target() {
        assert_eq!(Hspec.load("test/Spec.hs"), ":load test/Spec.hs");
    }

    #[test]
    fn run_matching_passes_the_pattern() {
        assert_eq!(
            Hspec.run_matching("FooBar"),
            ":main --color --match \"FooBar\""
        );
    }

    #[test]
    fn run_all_has_no_match_flag() {
        assert!(!Hspec.run_all().contains("--match"));
    }

    #[test]
    fn rerun_uses_rerun_flag() {
        assert!(Hspec.rerun_failures().contains("--rerun"));
    }

    #[test]
    fn marker_echoes_through_the_shell() {
        assert_eq!(Hspec.marker("respec-sync-1"), ":! echo respec-sync-1");
    }

    #[test]
    fn quotes_in_patterns_are_escaped() {
        assert_eq!(
            Hspec.run_matching("say \"hi\""),
            ":main --color --match \"say \\\"hi\\\"\""
        );
    }
}
