//! Prioritized classification of toolchain output lines.
//!
//! Banner texts overlap (an exception marker can show up inside an otherwise
//! successful load), so rules are tried strictly in declaration order and the
//! first match wins.

use std::sync::LazyLock;

use regex::Regex;

use crate::outcome::Outcome;

struct Rule {
    regex: Regex,
    outcome: Outcome,
    label: &'static str,
}

fn rule(pattern: &str, outcome: Outcome, label: &'static str) -> Rule {
    Rule {
        regex: Regex::new(pattern).unwrap(),
        outcome,
        label,
    }
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            r"\d+ examples?, 0 failures",
            Outcome::Success,
            "passing summary",
        ),
        rule(
            r"Ok, (?:.* )?modules? loaded",
            Outcome::Success,
            "modules loaded",
        ),
        rule(
            r"\d+ examples?, [1-9]\d* failures?",
            Outcome::RuntimeFailure,
            "failing summary",
        ),
        rule(
            r"Failed, (?:.* )?modules? loaded",
            Outcome::CompileFailure,
            "failed module load",
        ),
        rule(
            r"\*\*\* Exception:",
            Outcome::CompileFailure,
            "uncaught exception",
        ),
        rule(
            r"phase [`'‘](?:C|Haskell) pre-processor['’] failed",
            Outcome::CompileFailure,
            "pre-processor phase",
        ),
        rule(
            r"phase [`'‘]Linker['’] failed",
            Outcome::CompileFailure,
            "linker phase",
        ),
        rule(
            r"GHCi runtime linker: fatal error:",
            Outcome::CompileFailure,
            "runtime linker",
        ),
        rule(
            r"cannot find object file for module",
            Outcome::CompileFailure,
            "missing object file",
        ),
        rule(
            r"During interactive linking, GHCi couldn't find the following symbol:",
            Outcome::CompileFailure,
            "symbol not found",
        ),
        rule(
            r"could not execute:",
            Outcome::CompileFailure,
            "could not execute",
        ),
        rule(
            r"[Nn]ot in scope: [`'‘]?main\b",
            Outcome::CompileFailure,
            "missing main",
        ),
        rule(
            r"^(?:Error: )?(?:cabal|stack)(?:\.exe)?: ",
            Outcome::LoadingFailure,
            "project loader",
        ),
        rule(
            r"^<command line>: ",
            Outcome::LoadingFailure,
            "toolchain command line",
        ),
    ]
});

/// A status line and the rule that recognized it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub outcome: Outcome,
    pub rule: &'static str,
}

/// First rule matching `line`, in priority order.
pub fn match_rule(line: &str) -> Option<Classification> {
    let line = line.trim_end_matches(['\r', '\n']);
    RULES
        .iter()
        .find(|rule| rule.regex.is_match(line))
        .map(|rule| Classification {
            outcome: rule.outcome,
            rule: rule.label,
        })
}

/// Classify one line of toolchain output.
///
/// Returns `None` for lines that carry no status; those are forwarded as-is
/// and otherwise ignored.
pub fn classify(line: &str) -> Option<Outcome> {
    match_rule(line).map(|c| c.outcome)
}
