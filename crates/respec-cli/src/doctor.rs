use std::path::Path;
use std::process::ExitCode;

use serde::Serialize;

use respec_core::config::RespecConfig;
use respec_core::sandbox;
use respec_core::session::{build_command, SessionOptions};

/// Environment checks for running a session in `root`.
#[derive(Debug, Serialize)]
pub struct DoctorReport {
    pub program: String,
    pub program_path: Option<String>,
    pub top_spec: String,
    pub top_spec_found: bool,
    pub package_db: Option<String>,
    pub command_line: String,
    pub ready: bool,
}

impl DoctorReport {
    pub fn collect(root: &Path, config: &RespecConfig) -> Self {
        let options = SessionOptions::from_respec_config(config, root);
        let program = options.program.clone();
        let program_path = which::which(&program)
            .ok()
            .map(|p| p.display().to_string());
        let top_spec = config.runner.top_spec.clone();
        let top_spec_found = root.join(&top_spec).is_file();
        let package_db = sandbox::find_package_db(root, &config.session.sandbox_glob)
            .map(|p| p.display().to_string());
        let command_line = build_command(&options).display_line();
        let ready = program_path.is_some() && top_spec_found;

        Self {
            program,
            program_path,
            top_spec,
            top_spec_found,
            package_db,
            command_line,
            ready,
        }
    }
}

pub fn run(root: &Path, config: &RespecConfig, json_output: bool) -> ExitCode {
    let report = DoctorReport::collect(root, config);

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).expect("serialize DoctorReport")
        );
    } else {
        print_human_report(&report);
    }

    if report.ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn print_human_report(report: &DoctorReport) {
    println!("respec doctor");
    println!("=============");
    println!();

    match &report.program_path {
        Some(path) => println!("  \u{2713} {} found at {path}", report.program),
        None => println!("  \u{2717} {} not found on PATH", report.program),
    }

    if report.top_spec_found {
        println!("  \u{2713} top-level spec {}", report.top_spec);
    } else {
        println!("  \u{2717} top-level spec {} does not exist", report.top_spec);
    }

    match &report.package_db {
        Some(db) => println!("  \u{2713} sandbox package database {db}"),
        None => println!("  - no sandbox package database"),
    }

    println!();
    println!("Command: {}", report.command_line);
    println!();
    println!("Overall: {}", if report.ready { "READY" } else { "NOT READY" });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(program: &str) -> RespecConfig {
        let mut config = RespecConfig::default();
        config.session.program = program.to_string();
        config
    }

    #[test]
    fn ready_when_program_and_spec_exist() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("test")).unwrap();
        std::fs::write(dir.path().join("test/Spec.hs"), "").unwrap();

        let report = DoctorReport::collect(dir.path(), &config("sh"));
        assert!(report.program_path.is_some());
        assert!(report.top_spec_found);
        assert!(report.ready);
        assert!(report.command_line.starts_with("sh -itest"));
    }

    #[test]
    fn missing_program_is_not_ready() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("test")).unwrap();
        std::fs::write(dir.path().join("test/Spec.hs"), "").unwrap();

        let report = DoctorReport::collect(dir.path(), &config("respec-no-such-toolchain"));
        assert!(report.program_path.is_none());
        assert!(!report.ready);
    }

    #[test]
    fn reports_selected_package_db() {
        let dir = TempDir::new().unwrap();
        for name in [
            "x86_64-linux-ghc-7.8.4-packages.conf.d",
            "x86_64-linux-ghc-7.10.1-packages.conf.d",
        ] {
            std::fs::create_dir_all(dir.path().join(".cabal-sandbox").join(name)).unwrap();
        }

        let report = DoctorReport::collect(dir.path(), &config("sh"));
        let db = report.package_db.unwrap();
        assert!(db.ends_with("x86_64-linux-ghc-7.10.1-packages.conf.d"), "{db}");
        assert!(report.command_line.contains("-package-db="));
        assert!(!report.top_spec_found);
    }

    #[test]
    fn json_report_has_stable_fields() {
        let dir = TempDir::new().unwrap();
        let report = DoctorReport::collect(dir.path(), &config("sh"));
        let value = serde_json::to_value(&report).unwrap();
        for key in ["program", "program_path", "package_db", "command_line", "ready"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }
}
