mod doctor;
mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use respec_core::config::{self, RespecConfig, CONFIG_FILE};
use respec_core::controller::{Controller, ControllerConfig};
use respec_core::notifier::{DesktopNotifier, LogNotifier, Notifier};
use respec_core::session::{stdout_sink, Hspec, ReplLauncher, SessionOptions};
use respec_core::RunStatus;

pub type AppController = Controller<ReplLauncher, Box<dyn Notifier>>;

#[derive(Parser)]
#[command(name = "respec", version, about = "Rerun hspec suites in GHCi as files change")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the project and rerun tests on every change (default).
    Watch(RunnerArgs),
    /// Run the whole suite once and exit with its status.
    Run(RunnerArgs),
    /// Check that the toolchain and project layout are usable.
    Doctor {
        #[command(flatten)]
        runner: RunnerArgs,
        /// Output results as JSON instead of human-readable text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct RunnerArgs {
    /// Path to the config file (default: ./respec.toml).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Top-level spec to load.
    #[arg(long)]
    top_spec: Option<String>,
    /// Run the whole suite right after loading.
    #[arg(long)]
    all_on_start: bool,
    /// Run the whole suite after a previously failing run passes.
    #[arg(long)]
    all_on_pass: bool,
    /// Always run matching tests, even after a runtime failure.
    #[arg(long)]
    no_focus_on_fail: bool,
    /// Extra options for GHCi, after `--`.
    #[arg(last = true)]
    ghci_options: Vec<String>,
}

impl RunnerArgs {
    /// Load the config file and apply command-line overrides.
    fn resolve(&self, root: &Path) -> Result<RespecConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| root.join(CONFIG_FILE));
        let mut cfg = config::load_config(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?;
        self.apply(&mut cfg);
        config::validate(&cfg).context("invalid configuration")?;
        Ok(cfg)
    }

    fn apply(&self, cfg: &mut RespecConfig) {
        if let Some(top_spec) = &self.top_spec {
            cfg.runner.top_spec = top_spec.clone();
        }
        cfg.runner.all_on_start |= self.all_on_start;
        cfg.runner.all_on_pass |= self.all_on_pass;
        if self.no_focus_on_fail {
            cfg.runner.focus_on_fail = false;
        }
        cfg.runner
            .ghci_options
            .extend(self.ghci_options.iter().cloned());
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let root = std::env::current_dir().context("failed to determine working directory")?;

    match cli.command.unwrap_or_else(|| Command::Watch(RunnerArgs::default())) {
        Command::Watch(args) => {
            let cfg = args.resolve(&root)?;
            let controller = build_controller(&root, &cfg);
            watch::run(&root, &cfg, controller).await
        }
        Command::Run(args) => {
            let mut cfg = args.resolve(&root)?;
            cfg.runner.all_on_start = false;
            run_once(build_controller(&root, &cfg)).await
        }
        Command::Doctor { runner, json } => {
            let cfg = runner.resolve(&root)?;
            Ok(doctor::run(&root, &cfg, json))
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("respec=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_controller(root: &Path, cfg: &RespecConfig) -> AppController {
    let options = SessionOptions::from_respec_config(cfg, root);
    let launcher = ReplLauncher::new(options, Arc::new(Hspec), stdout_sink());
    let notifier: Box<dyn Notifier> = if cfg.notify.enabled {
        Box::new(DesktopNotifier::default())
    } else {
        Box::new(LogNotifier)
    };
    Controller::new(
        ControllerConfig::from_respec_config(cfg, root),
        launcher,
        notifier,
    )
}

async fn run_once(mut controller: AppController) -> Result<ExitCode> {
    let result = match controller.start().await {
        Ok(()) => controller.run_all().await,
        Err(e) => Err(e),
    };
    controller.stop().await;

    let status = result.context("test run failed")?;
    println!("respec: {status}");
    if status == RunStatus::Success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_watch() {
        let cli = Cli::try_parse_from(["respec"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.log_json);
    }

    #[test]
    fn trailing_arguments_go_to_ghci() {
        let cli = Cli::try_parse_from([
            "respec",
            "run",
            "--top-spec",
            "spec/Main.hs",
            "--",
            "-Wall",
            "-isrc",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.top_spec.as_deref(), Some("spec/Main.hs"));
        assert_eq!(args.ghci_options, vec!["-Wall", "-isrc"]);
    }

    #[test]
    fn flags_override_file_values() {
        let mut cfg = config::parse_config(
            r#"
[runner]
top_spec = "test/Main.hs"
ghci_options = ["-fno-warn-orphans"]
focus_on_fail = true
"#,
        )
        .unwrap();

        let args = RunnerArgs {
            top_spec: Some("test/Other.hs".to_string()),
            all_on_pass: true,
            no_focus_on_fail: true,
            ghci_options: vec!["-Wall".to_string()],
            ..RunnerArgs::default()
        };
        args.apply(&mut cfg);

        assert_eq!(cfg.runner.top_spec, "test/Other.hs");
        assert!(cfg.runner.all_on_pass);
        assert!(!cfg.runner.all_on_start);
        assert!(!cfg.runner.focus_on_fail);
        assert_eq!(cfg.runner.ghci_options, vec!["-fno-warn-orphans", "-Wall"]);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = RunnerArgs::default().resolve(dir.path()).unwrap();
        assert_eq!(cfg, RespecConfig::default());
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let args = RunnerArgs {
            top_spec: Some("  ".to_string()),
            ..RunnerArgs::default()
        };
        assert!(args.resolve(dir.path()).is_err());
    }

    #[test]
    fn doctor_takes_json_flag() {
        let cli = Cli::try_parse_from(["respec", "doctor", "--json", "--log-json"]).unwrap();
        assert!(cli.log_json);
        assert!(matches!(cli.command, Some(Command::Doctor { json: true, .. })));
    }
}
