//! Scripted doubles for the core's seams.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use crate::TrainingHistory;
use crate::http::{HttpReply, Transport, TransportError, UploadFile};
use crate::schedule::{CancellationToken, Sleeper};
use crate::status::{JobStatus, ModelStatusSnapshot, StatusSource, TrainingProgress};
use crate::watcher::{JobKind, JobStarted, WatchObserver, WatchOutcome};

pub struct FakeFile {
    name: String,
}

impl FakeFile {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl UploadFile for FakeFile {
    fn file_name(&self) -> String {
        self.name.clone()
    }
}

/// Answers every request from a script; the last entry repeats.
pub struct MockTransport {
    script: RefCell<VecDeque<Result<HttpReply, TransportError>>>,
    calls: RefCell<Vec<String>>,
}

impl MockTransport {
    pub fn scripted(script: Vec<Result<HttpReply, TransportError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn replying(reply: HttpReply) -> Self {
        Self::scripted(vec![Ok(reply)])
    }

    pub fn failing(error: TransportError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn next(&self, path: &str) -> Result<HttpReply, TransportError> {
        self.calls.borrow_mut().push(path.to_string());
        let mut script = self.script.borrow_mut();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap()
        }
    }
}

impl Transport for MockTransport {
    type File = FakeFile;

    async fn get(&self, path: &str) -> Result<HttpReply, TransportError> {
        self.next(path)
    }

    async fn post(&self, path: &str, _file: Option<&FakeFile>) -> Result<HttpReply, TransportError> {
        self.next(path)
    }
}

pub struct ScriptedStatus {
    script: RefCell<VecDeque<Result<ModelStatusSnapshot, TransportError>>>,
    calls: Cell<u32>,
}

impl ScriptedStatus {
    pub fn new(script: Vec<Result<ModelStatusSnapshot, TransportError>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl StatusSource for ScriptedStatus {
    async fn fetch_status(&self) -> Result<ModelStatusSnapshot, TransportError> {
        self.calls.set(self.calls.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("script exhausted")))
    }
}

/// Returns immediately, recording requested periods. Optionally cancels a
/// token once a given number of sleeps have happened.
#[derive(Default)]
pub struct NoDelay {
    sleeps: RefCell<Vec<Duration>>,
    cancel: Option<(usize, CancellationToken)>,
}

impl NoDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(sleeps: usize, token: CancellationToken) -> Self {
        Self {
            sleeps: RefCell::new(Vec::new()),
            cancel: Some((sleeps, token)),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }
}

impl Sleeper for NoDelay {
    async fn sleep(&self, period: Duration) {
        let mut sleeps = self.sleeps.borrow_mut();
        sleeps.push(period);
        if let Some((after, token)) = &self.cancel {
            if sleeps.len() >= *after {
                token.cancel();
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub started: Vec<JobStarted>,
    pub snapshots: usize,
    pub progress: Vec<TrainingProgress>,
    pub histories: usize,
    pub poll_errors: usize,
    pub terminal: Vec<WatchOutcome>,
}

impl WatchObserver for RecordingObserver {
    fn on_started(&mut self, _kind: JobKind, started: &JobStarted) {
        self.started.push(started.clone());
    }

    fn on_snapshot(&mut self, _kind: JobKind, _snapshot: &ModelStatusSnapshot) {
        self.snapshots += 1;
    }

    fn on_progress(&mut self, _kind: JobKind, progress: &TrainingProgress) {
        self.progress.push(progress.clone());
    }

    fn on_history(&mut self, _kind: JobKind, _history: &TrainingHistory) {
        self.histories += 1;
    }

    fn on_poll_error(&mut self, _kind: JobKind, _error: &TransportError) {
        self.poll_errors += 1;
    }

    fn on_terminal(&mut self, _kind: JobKind, outcome: &WatchOutcome) {
        self.terminal.push(outcome.clone());
    }
}

pub fn snapshot_training(progress: f64, epoch: u32, total_epochs: u32) -> ModelStatusSnapshot {
    ModelStatusSnapshot {
        model_loaded: true,
        model_accuracy: Some(0.8),
        is_training: true,
        job_status: Some(JobStatus::Running {
            phase: "training".into(),
            progress_percent: progress,
            current_epoch: epoch,
            total_epochs: Some(total_epochs).filter(|t| *t > 0),
            message: format!("Epoch {}", epoch),
        }),
        training_history: None,
    }
}

pub fn snapshot_finished(status: Option<&str>, message: &str) -> ModelStatusSnapshot {
    let job_status = status.map(|s| match s {
        "error" => JobStatus::Failed {
            message: message.to_string(),
        },
        "completed" => JobStatus::Succeeded {
            message: message.to_string(),
        },
        _ => JobStatus::Idle,
    });
    ModelStatusSnapshot {
        model_loaded: true,
        model_accuracy: Some(0.82),
        is_training: false,
        job_status,
        training_history: None,
    }
}
