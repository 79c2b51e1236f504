//! Terminal rendering of watch events and status boards.

use std::time::Duration;

use shared::TrainingHistory;
use shared::http::TransportError;
use shared::metrics::MetricsSnapshot;
use shared::predict::PredictionOutcome;
use shared::schedule::Sleeper;
use shared::status::{StatusBoard, TrainingProgress};
use shared::watcher::{JobKind, JobStarted, WatchObserver, WatchOutcome};

pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, period: Duration) {
        tokio::time::sleep(period).await;
    }
}

/// Prints each distinct progress line once.
#[derive(Default)]
pub struct ConsoleObserver {
    last_progress: Option<String>,
    history: Option<TrainingHistory>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }
}

impl WatchObserver for ConsoleObserver {
    fn on_started(&mut self, kind: JobKind, started: &JobStarted) {
        log::info!("{} job started", kind);
        println!("✅ {}", started.message);
        if let Some(dataset) = &started.dataset {
            println!("Dataset: {}", dataset);
        }
    }

    fn on_progress(&mut self, kind: JobKind, progress: &TrainingProgress) {
        let line = kind.progress_text(progress);
        if self.last_progress.as_ref() != Some(&line) {
            println!("{}", line);
            self.last_progress = Some(line);
        }
    }

    fn on_history(&mut self, _kind: JobKind, history: &TrainingHistory) {
        self.history = Some(history.clone());
    }

    fn on_poll_error(&mut self, kind: JobKind, error: &TransportError) {
        log::warn!("Error checking {} training status: {}", kind, error);
    }

    fn on_terminal(&mut self, kind: JobKind, outcome: &WatchOutcome) {
        log::info!("{} job finished: {:?}", kind, outcome);
    }
}

pub fn board_lines(board: &StatusBoard) -> Vec<String> {
    let accuracy = board
        .accuracy_percent
        .map(|a| format!("{}%", a))
        .unwrap_or_else(|| "--".to_string());
    let mut lines = vec![
        format!("Model:    {}", board.availability),
        format!("Accuracy: {}", accuracy),
        format!("Training: {}", board.training_badge),
    ];
    if let Some(progress) = &board.progress_line {
        lines.push(format!("Progress: {}", progress));
    }
    lines.push(board.model_info.clone());
    lines
}

pub fn history_lines(history: &TrainingHistory) -> Vec<String> {
    history
        .epoch_labels()
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            let pct = |values: &[f64]| {
                values
                    .get(i)
                    .map(|v| format!("{:.1}%", v * 100.0))
                    .unwrap_or_else(|| "--".to_string())
            };
            let loss = history
                .loss
                .get(i)
                .map(|l| format!("{:.4}", l))
                .unwrap_or_else(|| "--".to_string());
            format!(
                "{:<9} accuracy {:>6}  validation {:>6}  loss {}",
                label,
                pct(&history.accuracy),
                pct(&history.val_accuracy),
                loss
            )
        })
        .collect()
}

pub fn prediction_lines(outcome: &PredictionOutcome) -> Vec<String> {
    vec![
        format!("{} ({})", outcome.headline(), outcome.confidence_text()),
        outcome.subtitle().to_string(),
    ]
}

pub fn stats_lines(snapshot: &MetricsSnapshot) -> Vec<String> {
    let mut lines = vec![
        format!("Total predictions:  {}", snapshot.total_predictions),
        format!("Average confidence: {}%", snapshot.average_percent()),
    ];
    lines.extend(
        snapshot
            .labelled_buckets()
            .map(|(label, count)| format!("  {:>7}  {}", label, count)),
    );
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::predict::Label;
    use shared::status::ModelStatusSnapshot;

    #[test]
    fn unreachable_board_renders_error_lines() {
        let lines = board_lines(&StatusBoard::unreachable());
        assert_eq!(lines[0], "Model:    Error");
        assert_eq!(lines.last().unwrap(), "Unable to load model information.");
    }

    #[test]
    fn loaded_model_without_training() {
        let snapshot = ModelStatusSnapshot {
            model_loaded: true,
            model_accuracy: Some(0.874),
            ..ModelStatusSnapshot::default()
        };
        let lines = board_lines(&StatusBoard::from_snapshot(&snapshot));
        assert_eq!(lines[1], "Accuracy: 87%");
        assert_eq!(lines[2], "Training: Idle");
        assert_eq!(lines[3], "Model loaded. Accuracy: 87%");
    }

    #[test]
    fn danger_prediction_headline() {
        let outcome = PredictionOutcome {
            label: Label::Danger,
            confidence_percent: 87,
        };
        assert_eq!(prediction_lines(&outcome)[0], "Danger Detected (87%)");
    }

    #[test]
    fn history_rows_follow_epochs() {
        let history = TrainingHistory {
            accuracy: vec![0.6, 0.75],
            val_accuracy: vec![0.55],
            loss: vec![0.8, 0.6],
        };
        let lines = history_lines(&history);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Epoch 1"));
        assert!(lines[1].contains("75.0%"));
        assert!(lines[1].contains("validation     --"));
    }

    #[test]
    fn repeated_progress_is_printed_once() {
        let mut observer = ConsoleObserver::new();
        let progress = TrainingProgress {
            phase: "training".into(),
            progress_percent: 40.0,
            current_epoch: 1,
            total_epochs: 3,
            message: String::new(),
        };
        observer.on_progress(JobKind::RetrainExisting, &progress);
        let first = observer.last_progress.clone();
        observer.on_progress(JobKind::RetrainExisting, &progress);
        assert_eq!(observer.last_progress, first);
        assert!(first.unwrap().starts_with("Training in progress..."));
    }
}
