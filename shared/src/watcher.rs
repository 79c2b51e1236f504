//! Poll-until-terminal tracking of server-side training jobs.
//!
//! The three ways of starting a job (retrain from an uploaded archive,
//! continue training, retrain on the stored dataset) share one state machine:
//! send the start request, then poll the status endpoint at a fixed interval
//! until the server reports that training has stopped.
//!
//! ```text
//! NotStarted -> Watching -> Completed | Failed
//! ```
//!
//! Failed status reads are logged and polling continues. Only
//! `is_training == false` ends a watch.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::StartJobResponse;
use crate::TrainingHistory;
use crate::http::{
    HttpReply, RETRAIN_EXISTING_PATH, RETRAIN_PATH, ReplyError, Transport, TransportError,
    UploadFile, continue_training_path, decode_reply, has_extension,
};
use crate::schedule::{CancellationToken, Sleeper};
use crate::status::{
    JobStatus, ModelStatusSnapshot, RemoteStatusClient, StatusSource, TrainingProgress,
};

pub const MIN_EPOCHS: u32 = 1;
pub const MAX_EPOCHS: u32 = 50;
pub const DEFAULT_EPOCHS: u32 = 3;
pub const ARCHIVE_EXTENSIONS: [&str; 1] = [".zip"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum JobKind {
    #[strum(serialize = "retrain-from-upload")]
    RetrainUpload,
    #[strum(serialize = "continue-training")]
    ContinueTraining { epochs: u32 },
    #[strum(serialize = "retrain-existing")]
    RetrainExisting,
}

impl JobKind {
    pub fn continue_training(epochs: u32) -> Result<Self, StartError> {
        if (MIN_EPOCHS..=MAX_EPOCHS).contains(&epochs) {
            Ok(JobKind::ContinueTraining { epochs })
        } else {
            Err(StartError::InvalidEpochs(epochs))
        }
    }

    pub fn path(&self) -> String {
        match self {
            JobKind::RetrainUpload => RETRAIN_PATH.to_string(),
            JobKind::ContinueTraining { epochs } => continue_training_path(*epochs),
            JobKind::RetrainExisting => RETRAIN_EXISTING_PATH.to_string(),
        }
    }

    pub fn uploads_archive(&self) -> bool {
        matches!(self, JobKind::RetrainUpload)
    }

    /// Used for progress text when the server leaves `total_epochs` out.
    pub fn fallback_total_epochs(&self) -> u32 {
        match self {
            JobKind::ContinueTraining { epochs } => *epochs,
            _ => DEFAULT_EPOCHS,
        }
    }

    pub fn progress_text(&self, progress: &TrainingProgress) -> String {
        format!("Training in progress... {}", progress.summary())
    }

    pub fn completion_text(&self) -> &'static str {
        match self {
            JobKind::ContinueTraining { .. } => "Training completed!",
            _ => "Retraining completed!",
        }
    }

    pub fn failure_text(&self, message: &str) -> String {
        match self {
            JobKind::RetrainUpload => format!("Retraining Failed: {}", message),
            _ => format!("Training Failed: {}", message),
        }
    }

    pub fn start_failure_text(&self, error: &StartError) -> String {
        match self {
            JobKind::RetrainUpload => format!("Upload Failed: {}", error),
            JobKind::ContinueTraining { .. } => format!("Training Failed: {}", error),
            JobKind::RetrainExisting => format!("Retraining Failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StartError {
    #[error("Please select a .zip file first!")]
    MissingArchive,
    #[error("Unsupported dataset `{file_name}`. Please upload a .zip archive.")]
    InvalidArchive { file_name: String },
    #[error("Epochs must be between 1 and 50, got {0}")]
    InvalidEpochs(u32),
    #[error("A {0} job is already in progress")]
    AlreadyRunning(JobKind),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Server(String),
    #[error("Invalid response from server: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[display(fmt = "{} files ({} safe, {} danger)", data_files, safe_count, danger_count)]
pub struct DatasetSummary {
    pub safe_count: u64,
    pub danger_count: u64,
    pub data_files: u64,
}

/// Acknowledgement of a start request.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStarted {
    pub message: String,
    pub dataset: Option<DatasetSummary>,
}

impl JobStarted {
    pub fn from_reply(reply: &HttpReply) -> Result<Self, StartError> {
        let body = decode_reply::<StartJobResponse>(reply).map_err(|e| match e {
            ReplyError::Server(detail) => StartError::Server(detail),
            ReplyError::Status(status) => TransportError::http_status(status).into(),
            ReplyError::Malformed(detail) => StartError::MalformedResponse(detail),
        })?;

        let dataset = match (body.safe_count, body.danger_count) {
            (Some(safe_count), Some(danger_count)) => Some(DatasetSummary {
                safe_count,
                danger_count,
                data_files: body.data_files.unwrap_or(safe_count + danger_count),
            }),
            _ => None,
        };

        Ok(Self {
            message: body.message.unwrap_or_default(),
            dataset,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchState {
    NotStarted,
    Watching { ticks: u32 },
    Completed,
    Failed,
    /// The loop was stopped through its token before the job finished.
    Detached,
}

impl WatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WatchState::Completed | WatchState::Failed | WatchState::Detached
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchOutcome {
    Completed { message: Option<String> },
    Failed { message: String },
    Detached,
}

impl WatchOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, WatchOutcome::Failed { .. })
    }

    pub fn describe(&self, kind: JobKind) -> String {
        match self {
            WatchOutcome::Completed { .. } => kind.completion_text().to_string(),
            WatchOutcome::Failed { message } => kind.failure_text(message),
            WatchOutcome::Detached => format!("Stopped watching the {} job.", kind),
        }
    }
}

/// Receives every UI-relevant event of one watch session.
pub trait WatchObserver {
    fn on_started(&mut self, kind: JobKind, started: &JobStarted) {
        log::info!("{} job started: {}", kind, started.message);
    }

    /// Raw snapshot of each successful tick, for surfaces outside the job panel.
    fn on_snapshot(&mut self, _kind: JobKind, _snapshot: &ModelStatusSnapshot) {}

    fn on_progress(&mut self, kind: JobKind, progress: &TrainingProgress);

    fn on_history(&mut self, _kind: JobKind, _history: &TrainingHistory) {}

    fn on_poll_error(&mut self, kind: JobKind, error: &TransportError) {
        log::warn!("Error checking {} training status: {}", kind, error);
    }

    fn on_terminal(&mut self, kind: JobKind, outcome: &WatchOutcome);
}

/// At-most-one-in-flight guard for the control that starts a job.
#[derive(Clone, Debug, Default)]
pub struct ControlGate {
    busy: Arc<AtomicBool>,
}

impl ControlGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn try_acquire(&self) -> Option<ControlPermit> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ControlPermit {
                busy: self.busy.clone(),
            })
    }
}

/// Held for the lifetime of one job; dropping it re-enables the control.
#[derive(Debug)]
pub struct ControlPermit {
    busy: Arc<AtomicBool>,
}

impl Drop for ControlPermit {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

pub struct JobWatcher<'a, S, Z> {
    kind: JobKind,
    source: &'a S,
    sleeper: &'a Z,
    interval: Duration,
    token: CancellationToken,
    state: WatchState,
    polls: u32,
    last_status: Option<JobStatus>,
    outcome: Option<WatchOutcome>,
}

impl<'a, S: StatusSource, Z: Sleeper> JobWatcher<'a, S, Z> {
    pub fn new(kind: JobKind, source: &'a S, sleeper: &'a Z, interval: Duration) -> Self {
        Self {
            kind,
            source,
            sleeper,
            interval,
            token: CancellationToken::new(),
            state: WatchState::NotStarted,
            polls: 0,
            last_status: None,
            outcome: None,
        }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn last_status(&self) -> Option<&JobStatus> {
        self.last_status.as_ref()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Sends the start request and, once it is acknowledged, watches the job
    /// to a terminal state. The gate stays closed from before the request
    /// until this returns, whatever the result.
    pub async fn launch<F, Fut, O>(
        &mut self,
        gate: &ControlGate,
        start: F,
        observer: &mut O,
    ) -> Result<WatchOutcome, StartError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HttpReply, TransportError>>,
        O: WatchObserver,
    {
        let _permit = gate
            .try_acquire()
            .ok_or(StartError::AlreadyRunning(self.kind))?;

        let reply = start().await?;
        let started = JobStarted::from_reply(&reply)?;
        observer.on_started(self.kind, &started);

        Ok(self.watch(observer).await)
    }

    /// Polls every `interval` until the job stops or the token is cancelled.
    /// The first poll happens one interval after entry.
    pub async fn watch<O: WatchObserver>(&mut self, observer: &mut O) -> WatchOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        self.state = WatchState::Watching { ticks: self.polls };

        loop {
            self.sleeper.sleep(self.interval).await;
            if self.token.is_cancelled() {
                log::debug!("{} watch detached after {} polls", self.kind, self.polls);
                self.state = WatchState::Detached;
                let outcome = WatchOutcome::Detached;
                self.outcome = Some(outcome.clone());
                return outcome;
            }
            if let Some(outcome) = self.tick(observer).await {
                return outcome;
            }
        }
    }

    /// One status read plus reconciliation. Returns the outcome once the job
    /// has stopped; after that no further reads are made.
    pub async fn tick<O: WatchObserver>(&mut self, observer: &mut O) -> Option<WatchOutcome> {
        if let Some(outcome) = &self.outcome {
            return Some(outcome.clone());
        }

        self.polls += 1;
        self.state = WatchState::Watching { ticks: self.polls };

        let snapshot = match self.source.fetch_status().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                observer.on_poll_error(self.kind, &e);
                return None;
            }
        };
        log::debug!(
            "{} tick {}: is_training={} status={:?}",
            self.kind,
            self.polls,
            snapshot.is_training,
            snapshot.job_status
        );

        observer.on_snapshot(self.kind, &snapshot);
        if let Some(history) = &snapshot.training_history {
            observer.on_history(self.kind, history);
        }

        if snapshot.is_training {
            if let Some(status) = &snapshot.job_status {
                let progress =
                    TrainingProgress::from_status(status, self.kind.fallback_total_epochs());
                observer.on_progress(self.kind, &progress);
            }
            self.last_status = snapshot.job_status;
            return None;
        }

        let outcome = match &snapshot.job_status {
            Some(JobStatus::Failed { message }) => WatchOutcome::Failed {
                message: message.clone(),
            },
            other => WatchOutcome::Completed {
                message: other
                    .as_ref()
                    .and_then(JobStatus::message)
                    .filter(|m| !m.is_empty())
                    .map(str::to_string),
            },
        };

        self.token.cancel();
        self.state = if outcome.is_failure() {
            WatchState::Failed
        } else {
            WatchState::Completed
        };
        self.last_status = snapshot.job_status;
        self.outcome = Some(outcome.clone());

        log::info!("{} job finished after {} polls: {:?}", self.kind, self.polls, outcome);
        observer.on_terminal(self.kind, &outcome);
        Some(outcome)
    }
}

/// Single entry point for all three job kinds over a real transport.
pub struct JobLauncher<'a, T, Z> {
    transport: &'a T,
    sleeper: &'a Z,
    interval: Duration,
}

impl<'a, T: Transport, Z: Sleeper> JobLauncher<'a, T, Z> {
    pub fn new(transport: &'a T, sleeper: &'a Z, interval: Duration) -> Self {
        Self {
            transport,
            sleeper,
            interval,
        }
    }

    /// Validates locally, then starts and watches one job. `archive` is only
    /// used by [`JobKind::RetrainUpload`].
    pub async fn run<O: WatchObserver>(
        &self,
        kind: JobKind,
        archive: Option<&T::File>,
        gate: &ControlGate,
        token: CancellationToken,
        observer: &mut O,
    ) -> Result<WatchOutcome, StartError> {
        let archive = if kind.uploads_archive() {
            let file = archive.ok_or(StartError::MissingArchive)?;
            let file_name = file.file_name();
            if !has_extension(&file_name, &ARCHIVE_EXTENSIONS) {
                return Err(StartError::InvalidArchive { file_name });
            }
            Some(file)
        } else {
            None
        };
        if let JobKind::ContinueTraining { epochs } = kind {
            JobKind::continue_training(epochs)?;
        }

        let path = kind.path();
        let status = RemoteStatusClient::new(self.transport);
        let mut watcher =
            JobWatcher::new(kind, &status, self.sleeper, self.interval).with_token(token);

        watcher
            .launch(gate, || self.transport.post(&path, archive), observer)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        FakeFile, MockTransport, NoDelay, RecordingObserver, ScriptedStatus, snapshot_finished,
        snapshot_training,
    };
    use futures::executor::block_on;

    fn training_then(k: usize, last: ModelStatusSnapshot) -> ScriptedStatus {
        let mut script: Vec<_> = (0..k)
            .map(|i| Ok(snapshot_training((i as f64 + 1.0) * 10.0, i as u32 + 1, 5)))
            .collect();
        script.push(Ok(last));
        ScriptedStatus::new(script)
    }

    #[test]
    fn error_status_fails_exactly_at_terminal_tick() {
        let source = training_then(4, snapshot_finished(Some("error"), "Out of memory"));
        let sleeper = NoDelay::new();
        let mut observer = RecordingObserver::default();
        let mut watcher = JobWatcher::new(
            JobKind::RetrainUpload,
            &source,
            &sleeper,
            Duration::from_secs(2),
        );

        let outcome = block_on(watcher.watch(&mut observer));

        assert_eq!(
            outcome,
            WatchOutcome::Failed {
                message: "Out of memory".into()
            }
        );
        assert_eq!(watcher.state(), &WatchState::Failed);
        assert_eq!(source.calls(), 5);
        assert_eq!(watcher.polls(), 5);
        assert_eq!(observer.progress.len(), 4);
        assert_eq!(observer.terminal.len(), 1);
        assert!(watcher.token().is_cancelled());

        // A terminal watcher never reads again.
        assert_eq!(block_on(watcher.tick(&mut observer)), Some(outcome));
        assert_eq!(source.calls(), 5);
        assert_eq!(observer.terminal.len(), 1);
    }

    #[test]
    fn non_error_status_completes() {
        for last in [
            snapshot_finished(Some("completed"), "Model saved"),
            snapshot_finished(Some("idle"), ""),
            snapshot_finished(None, ""),
        ] {
            let source = training_then(2, last);
            let sleeper = NoDelay::new();
            let mut observer = RecordingObserver::default();
            let mut watcher = JobWatcher::new(
                JobKind::RetrainExisting,
                &source,
                &sleeper,
                Duration::from_secs(2),
            );

            let outcome = block_on(watcher.watch(&mut observer));

            assert!(matches!(outcome, WatchOutcome::Completed { .. }));
            assert_eq!(watcher.state(), &WatchState::Completed);
            assert_eq!(source.calls(), 3);
        }
    }

    #[test]
    fn poll_errors_do_not_end_the_watch() {
        let source = ScriptedStatus::new(vec![
            Err(TransportError::network("timeout")),
            Ok(snapshot_training(50.0, 1, 2)),
            Err(TransportError::decode("bad json")),
            Ok(snapshot_finished(Some("completed"), "done")),
        ]);
        let sleeper = NoDelay::new();
        let mut observer = RecordingObserver::default();
        let mut watcher = JobWatcher::new(
            JobKind::RetrainUpload,
            &source,
            &sleeper,
            Duration::from_secs(2),
        );

        let outcome = block_on(watcher.watch(&mut observer));

        assert_eq!(
            outcome,
            WatchOutcome::Completed {
                message: Some("done".into())
            }
        );
        assert_eq!(observer.poll_errors, 2);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2); 4]);
    }

    #[test]
    fn progress_uses_requested_epochs_when_total_missing() {
        let mut running = snapshot_training(30.0, 1, 0);
        running.training_history = Some(TrainingHistory {
            accuracy: vec![0.7],
            val_accuracy: vec![0.6],
            loss: vec![0.5],
        });
        let mut finished = snapshot_finished(Some("completed"), "");
        finished.training_history = running.training_history.clone();
        let source = ScriptedStatus::new(vec![Ok(running), Ok(finished)]);
        let sleeper = NoDelay::new();
        let mut observer = RecordingObserver::default();
        let kind = JobKind::continue_training(7).unwrap();
        let mut watcher = JobWatcher::new(kind, &source, &sleeper, Duration::from_secs(2));

        block_on(watcher.watch(&mut observer));

        assert_eq!(
            kind.progress_text(&observer.progress[0]),
            "Training in progress... 30% (Epoch 1/7)"
        );
        // History is forwarded on the terminal tick as well.
        assert_eq!(observer.histories, 2);
        assert_eq!(observer.snapshots, 2);
    }

    #[test]
    fn cancelled_token_detaches_without_polling() {
        let source = training_then(3, snapshot_finished(Some("completed"), ""));
        let token = CancellationToken::new();
        let sleeper = NoDelay::cancelling_after(1, token.clone());
        let mut observer = RecordingObserver::default();
        let mut watcher = JobWatcher::new(
            JobKind::RetrainExisting,
            &source,
            &sleeper,
            Duration::from_secs(2),
        )
        .with_token(token);

        let outcome = block_on(watcher.watch(&mut observer));

        assert_eq!(outcome, WatchOutcome::Detached);
        assert_eq!(watcher.state(), &WatchState::Detached);
        assert_eq!(source.calls(), 0);
        assert!(observer.terminal.is_empty());
    }

    #[test]
    fn busy_gate_rejects_without_request() {
        let transport = MockTransport::replying(HttpReply::new(200, r#"{"message":"ok"}"#));
        let sleeper = NoDelay::new();
        let gate = ControlGate::new();
        let _held = gate.try_acquire().unwrap();
        let mut observer = RecordingObserver::default();

        let err = block_on(JobLauncher::new(&transport, &sleeper, Duration::from_secs(2)).run(
            JobKind::RetrainExisting,
            None,
            &gate,
            CancellationToken::new(),
            &mut observer,
        ))
        .unwrap_err();

        assert_eq!(err, StartError::AlreadyRunning(JobKind::RetrainExisting));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn launcher_starts_watches_and_releases_gate() {
        let transport = MockTransport::scripted(vec![
            Ok(HttpReply::new(
                200,
                r#"{"message":"Retraining started","safe_count":40,"danger_count":35,"data_files":75}"#,
            )),
            Ok(HttpReply::new(
                200,
                r#"{"model_loaded":true,"is_training":true,"training_status":{"status":"training","progress":50,"epoch":2,"total_epochs":3}}"#,
            )),
            Ok(HttpReply::new(
                200,
                r#"{"model_loaded":true,"is_training":false,"training_status":{"status":"completed","message":"Training completed successfully"}}"#,
            )),
        ]);
        let sleeper = NoDelay::new();
        let gate = ControlGate::new();
        let mut observer = RecordingObserver::default();

        let outcome = block_on(JobLauncher::new(&transport, &sleeper, Duration::from_secs(2)).run(
            JobKind::RetrainExisting,
            None,
            &gate,
            CancellationToken::new(),
            &mut observer,
        ))
        .unwrap();

        assert_eq!(outcome.describe(JobKind::RetrainExisting), "Retraining completed!");
        assert_eq!(
            transport.calls(),
            vec!["/retrain-existing", "/model/status", "/model/status"]
        );
        let started = &observer.started[0];
        assert_eq!(
            started.dataset.map(|d| d.to_string()).as_deref(),
            Some("75 files (40 safe, 35 danger)")
        );
        assert_eq!(observer.progress[0].summary(), "50% (Epoch 2/3)");
        assert!(!gate.is_busy());
    }

    #[test]
    fn start_rejection_releases_gate_and_skips_polling() {
        let transport = MockTransport::replying(HttpReply::new(
            409,
            r#"{"detail":"Model is already training. Please wait."}"#,
        ));
        let sleeper = NoDelay::new();
        let gate = ControlGate::new();
        let mut observer = RecordingObserver::default();

        let err = block_on(JobLauncher::new(&transport, &sleeper, Duration::from_secs(2)).run(
            JobKind::continue_training(3).unwrap(),
            None,
            &gate,
            CancellationToken::new(),
            &mut observer,
        ))
        .unwrap_err();

        assert_eq!(
            err,
            StartError::Server("Model is already training. Please wait.".into())
        );
        assert_eq!(transport.calls(), vec!["/continue-training?epochs=3"]);
        assert!(sleeper.sleeps().is_empty());
        assert!(!gate.is_busy());
    }

    #[test]
    fn retrain_upload_requires_zip() {
        let transport = MockTransport::replying(HttpReply::new(200, "{}"));
        let sleeper = NoDelay::new();
        let gate = ControlGate::new();
        let mut observer = RecordingObserver::default();
        let launcher = JobLauncher::new(&transport, &sleeper, Duration::from_secs(2));

        let missing = block_on(launcher.run(
            JobKind::RetrainUpload,
            None,
            &gate,
            CancellationToken::new(),
            &mut observer,
        ));
        assert_eq!(missing.unwrap_err(), StartError::MissingArchive);

        let wrong = block_on(launcher.run(
            JobKind::RetrainUpload,
            Some(&FakeFile::new("dataset.tar.gz")),
            &gate,
            CancellationToken::new(),
            &mut observer,
        ));
        assert!(matches!(wrong.unwrap_err(), StartError::InvalidArchive { .. }));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn epoch_bounds() {
        assert!(JobKind::continue_training(1).is_ok());
        assert!(JobKind::continue_training(50).is_ok());
        assert_eq!(
            JobKind::continue_training(0),
            Err(StartError::InvalidEpochs(0))
        );
        assert_eq!(
            JobKind::continue_training(51),
            Err(StartError::InvalidEpochs(51))
        );
    }

    #[test]
    fn user_facing_texts() {
        let upload = JobKind::RetrainUpload;
        assert_eq!(upload.failure_text("disk full"), "Retraining Failed: disk full");
        assert_eq!(
            JobKind::ContinueTraining { epochs: 3 }.completion_text(),
            "Training completed!"
        );
        assert_eq!(upload.to_string(), "retrain-from-upload");
        assert_eq!(
            upload.start_failure_text(&StartError::Server("Model not available".into())),
            "Upload Failed: Model not available"
        );
    }
}
