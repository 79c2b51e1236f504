//! Console client for a Sentinel deployment.

mod config;
mod console;
mod http;
mod store;

use std::path::PathBuf;

use config::{ConfigError, Overrides, Settings};
use console::{ConsoleObserver, TokioSleeper};
use http::{LocalFile, ReqwestTransport};
use shared::http::TransportError;
use shared::metrics::MetricsStore;
use shared::predict::PredictError;
use shared::schedule::CancellationToken;
use shared::status::{RemoteStatusClient, StatusBoard, StatusSource, monitor_status};
use shared::storage::StorageError;
use shared::watcher::{ControlGate, JobKind, JobLauncher, WatchOutcome};
use store::FileStore;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("state file error: {0}")]
    Storage(#[from] StorageError),
    #[error("Failed to connect to API: {0}")]
    Transport(#[from] TransportError),
    #[error("Error: {0}")]
    Predict(#[from] PredictError),
    #[error("❌ {0}")]
    Job(String),
    #[error("{0}")]
    Usage(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Status,
    Monitor,
    Predict(PathBuf),
    Retrain(PathBuf),
    Continue { epochs: Option<u32> },
    RetrainExisting,
    Stats,
}

#[derive(Debug, Clone, PartialEq)]
struct Options {
    overrides: Overrides,
    command: Command,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let options = match parse_args(std::env::args().skip(1).collect()) {
        Ok(Some(options)) => options,
        Ok(None) => return,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(options).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(options: Options) -> Result<(), CliError> {
    let settings = Settings::load(&options.overrides)?;
    log::debug!("Using API at {}", settings.client.api_base_url);
    let transport = ReqwestTransport::new(settings.client.clone())?;

    match options.command {
        Command::Status => show_status(&transport).await,
        Command::Monitor => monitor(&transport).await,
        Command::Predict(path) => predict(&transport, &settings, path).await,
        Command::Retrain(path) => {
            let archive = LocalFile::new(path);
            run_job(&transport, JobKind::RetrainUpload, Some(&archive)).await
        }
        Command::Continue { epochs } => {
            let epochs = epochs.unwrap_or(settings.client.default_epochs);
            let kind = JobKind::continue_training(epochs)
                .map_err(|e| CliError::Job(JobKind::ContinueTraining { epochs }.start_failure_text(&e)))?;
            run_job(&transport, kind, None).await
        }
        Command::RetrainExisting => run_job(&transport, JobKind::RetrainExisting, None).await,
        Command::Stats => {
            let metrics = MetricsStore::load(FileStore::open(&settings.state_path)?);
            for line in console::stats_lines(&metrics.snapshot()) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

async fn show_status(transport: &ReqwestTransport) -> Result<(), CliError> {
    let snapshot = match RemoteStatusClient::new(transport).fetch_status().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            for line in console::board_lines(&StatusBoard::unreachable()) {
                println!("{line}");
            }
            return Err(e.into());
        }
    };

    let board = StatusBoard::from_snapshot(&snapshot);
    for line in console::board_lines(&board) {
        println!("{line}");
    }
    if let Some(history) = &board.history {
        println!();
        for line in console::history_lines(history) {
            println!("{line}");
        }
    }
    Ok(())
}

async fn monitor(transport: &ReqwestTransport) -> Result<(), CliError> {
    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let status = RemoteStatusClient::new(transport);
    let period = transport.config().status_poll();
    let boards = monitor_status(&status, &TokioSleeper, period, &token, |board| {
        println!("----");
        for line in console::board_lines(&board) {
            println!("{line}");
        }
    })
    .await;
    log::info!("Monitor stopped after {} polls", boards);
    Ok(())
}

async fn predict(
    transport: &ReqwestTransport,
    settings: &Settings,
    path: PathBuf,
) -> Result<(), CliError> {
    if !path.is_file() {
        return Err(CliError::Usage(format!("No such file: {}", path.display())));
    }
    let clip = LocalFile::new(path);
    let mut metrics = MetricsStore::load(FileStore::open(&settings.state_path)?);

    let outcome = shared::predict::predict(transport, &clip, &mut metrics).await?;
    for line in console::prediction_lines(&outcome) {
        println!("{line}");
    }
    Ok(())
}

async fn run_job(
    transport: &ReqwestTransport,
    kind: JobKind,
    archive: Option<&LocalFile>,
) -> Result<(), CliError> {
    if let Some(archive) = archive {
        if !archive.path().is_file() {
            return Err(CliError::Usage(format!(
                "No such file: {}",
                archive.path().display()
            )));
        }
    }

    let token = CancellationToken::new();
    cancel_on_ctrl_c(token.clone());

    let interval = transport.config().job_poll();
    let launcher = JobLauncher::new(transport, &TokioSleeper, interval);
    let gate = ControlGate::new();
    let mut observer = ConsoleObserver::new();

    let outcome = launcher
        .run(kind, archive, &gate, token, &mut observer)
        .await
        .map_err(|e| CliError::Job(kind.start_failure_text(&e)))?;

    match &outcome {
        WatchOutcome::Failed { .. } => Err(CliError::Job(outcome.describe(kind))),
        WatchOutcome::Detached => {
            println!("{} The server job keeps running.", outcome.describe(kind));
            Ok(())
        }
        WatchOutcome::Completed { .. } => {
            println!("✅ {}", outcome.describe(kind));
            if let Some(history) = observer.history() {
                for line in console::history_lines(history) {
                    println!("{line}");
                }
            }
            Ok(())
        }
    }
}

fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, stopping after the current poll");
            token.cancel();
        }
    });
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut overrides = Overrides::default();
    let mut positional = Vec::new();
    let mut epochs = None;
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                overrides.config_path = Some(PathBuf::from(value));
            }
            "--api-url" => {
                idx += 1;
                let value =
                    args.get(idx).ok_or_else(|| "--api-url requires a value".to_string())?;
                overrides.api_url = Some(value.to_string());
            }
            "--state" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--state requires a value".to_string())?;
                overrides.state_path = Some(PathBuf::from(value));
            }
            "--epochs" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--epochs requires a value".to_string())?;
                let parsed = value
                    .parse::<u32>()
                    .map_err(|_| format!("--epochs expects a number, got `{value}`"))?;
                epochs = Some(parsed);
            }
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument: {flag}\n\n{}", help_text()));
            }
            value => positional.push(value.to_string()),
        }
        idx += 1;
    }

    let mut positional = positional.into_iter();
    let Some(name) = positional.next() else {
        return Err(format!("A command is required\n\n{}", help_text()));
    };
    let mut file_arg = |command: &str| {
        positional
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| format!("{command} requires a file argument"))
    };

    let command = match name.as_str() {
        "status" => Command::Status,
        "monitor" => Command::Monitor,
        "predict" => Command::Predict(file_arg("predict")?),
        "retrain" => Command::Retrain(file_arg("retrain")?),
        "continue" => Command::Continue { epochs },
        "retrain-existing" => Command::RetrainExisting,
        "stats" => Command::Stats,
        unknown => return Err(format!("Unknown command: {unknown}\n\n{}", help_text())),
    };
    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {extra}"));
    }
    if epochs.is_some() && !matches!(command, Command::Continue { .. }) {
        return Err("--epochs only applies to `continue`".to_string());
    }

    Ok(Some(Options { overrides, command }))
}

fn help_text() -> String {
    [
        "sentinel",
        "",
        "Talks to a Sentinel audio classification server.",
        "",
        "Usage:",
        "  sentinel [options] status",
        "  sentinel [options] monitor",
        "  sentinel [options] predict <clip.wav|clip.mp3>",
        "  sentinel [options] retrain <dataset.zip>",
        "  sentinel [options] continue [--epochs N]",
        "  sentinel [options] retrain-existing",
        "  sentinel [options] stats",
        "",
        "Options:",
        "  --config <path>    YAML config (or SENTINEL_CONFIG).",
        "  --api-url <url>    Server base URL (or SENTINEL_API_URL).",
        "  --state <path>     Local statistics file (or SENTINEL_STATE).",
        "  --epochs <n>       Epochs for `continue`, 1 to 50 (default 3).",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn predict_takes_a_file() {
        let options = parse_args(args(&["predict", "clip.wav"])).unwrap().unwrap();
        assert_eq!(options.command, Command::Predict(PathBuf::from("clip.wav")));
        assert_eq!(options.overrides, Overrides::default());
    }

    #[test]
    fn global_flags_can_follow_the_command() {
        let options = parse_args(args(&[
            "continue",
            "--epochs",
            "7",
            "--api-url",
            "http://localhost:8000",
            "--state",
            "state.json",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(options.command, Command::Continue { epochs: Some(7) });
        assert_eq!(options.overrides.api_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(options.overrides.state_path, Some(PathBuf::from("state.json")));
    }

    #[test]
    fn continue_without_epochs_uses_config_default() {
        let options = parse_args(args(&["continue"])).unwrap().unwrap();
        assert_eq!(options.command, Command::Continue { epochs: None });
    }

    #[test]
    fn missing_file_argument_is_rejected() {
        let err = parse_args(args(&["retrain"])).unwrap_err();
        assert!(err.contains("retrain requires a file"));
    }

    #[test]
    fn epochs_must_be_numeric() {
        assert!(parse_args(args(&["continue", "--epochs", "many"])).is_err());
        assert!(parse_args(args(&["status", "--epochs", "3"])).is_err());
    }

    #[test]
    fn unknown_command_and_flag() {
        assert!(parse_args(args(&["train"])).unwrap_err().starts_with("Unknown command"));
        assert!(parse_args(args(&["status", "--verbose"])).unwrap_err().starts_with("Unknown argument"));
        assert!(parse_args(args(&[])).is_err());
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(parse_args(args(&["--help", "predict"])).unwrap(), None);
    }

    #[test]
    fn out_of_range_epochs_fail_before_any_request() {
        let err = JobKind::continue_training(51).unwrap_err();
        assert_eq!(
            JobKind::ContinueTraining { epochs: 51 }.start_failure_text(&err),
            "Training Failed: Epochs must be between 1 and 50, got 51"
        );
    }
}
