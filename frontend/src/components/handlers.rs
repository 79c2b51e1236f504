use super::super::{JobSlot, Model, Msg, PanelStatus, Tone};
use super::utils::first_file;
use crate::api::{PickedFile, TimerSleeper};
use shared::TrainingHistory;
use shared::http::TransportError;
use shared::predict::{PredictError, PredictionOutcome, submit_prediction, validate_audio_name};
use shared::schedule::CancellationToken;
use shared::status::{ModelStatusSnapshot, StatusBoard, TrainingProgress};
use shared::watcher::{
    JobKind, JobLauncher, JobStarted, StartError, WatchObserver, WatchOutcome,
};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::html::Scope;
use yew::prelude::*;

/// Forwards watch events of one job control into component messages.
pub struct PanelObserver {
    link: Scope<Model>,
    slot: JobSlot,
}

impl PanelObserver {
    pub fn new(link: Scope<Model>, slot: JobSlot) -> Self {
        Self { link, slot }
    }
}

impl WatchObserver for PanelObserver {
    fn on_started(&mut self, kind: JobKind, started: &JobStarted) {
        log::info!("{} job accepted: {}", kind, started.message);
        self.link
            .send_message(Msg::JobStarted(self.slot, started.clone()));
    }

    fn on_snapshot(&mut self, _kind: JobKind, snapshot: &ModelStatusSnapshot) {
        self.link
            .send_message(Msg::Board(StatusBoard::from_snapshot(snapshot)));
    }

    fn on_progress(&mut self, kind: JobKind, progress: &TrainingProgress) {
        self.link
            .send_message(Msg::JobProgress(self.slot, kind.progress_text(progress)));
    }

    fn on_history(&mut self, _kind: JobKind, history: &TrainingHistory) {
        self.link.send_message(Msg::History(history.clone()));
    }

    fn on_poll_error(&mut self, kind: JobKind, error: &TransportError) {
        log::error!("Error checking {} training status: {}", kind, error);
    }

    fn on_terminal(&mut self, kind: JobKind, outcome: &WatchOutcome) {
        log::info!("{} job finished: {:?}", kind, outcome);
    }
}

pub fn handle_board(model: &mut Model, board: StatusBoard) -> bool {
    if let Some(history) = &board.history {
        model.history = Some(history.clone());
    }
    if model.board.as_ref() == Some(&board) {
        return false;
    }
    model.board = Some(board);
    true
}

pub fn handle_audio_chosen(model: &mut Model, file: PickedFile) -> bool {
    model.prediction = None;
    match validate_audio_name(&file.name()) {
        Ok(()) => {
            model.format_error = None;
            model.audio_file = Some(file);
        }
        Err(e) => {
            log::warn!("Rejected audio file: {}", e);
            model.format_error = Some(e.to_string());
            model.audio_file = None;
        }
    }
    true
}

pub fn handle_predict(model: &mut Model, ctx: &Context<Model>) -> bool {
    if model.predicting {
        return false;
    }
    let Some(file) = model.audio_file.clone() else {
        model.format_error = Some("Please select an audio file first.".into());
        return true;
    };

    model.predicting = true;
    model.prediction = None;

    spawn_local({
        let link = ctx.link().clone();
        let transport = model.transport.clone();

        async move {
            let result = submit_prediction(&transport, &file).await;
            link.send_message(Msg::Predicted(result));
        }
    });

    true
}

pub fn handle_predicted(
    model: &mut Model,
    result: Result<PredictionOutcome, PredictError>,
) -> bool {
    model.predicting = false;
    match result {
        Ok(outcome) => {
            if let Err(e) = model.metrics.record_outcome(&outcome) {
                log::warn!("Prediction {} was not persisted: {}", outcome, e);
            }
            log::info!("Prediction: {}", outcome);
            model.prediction = Some(Ok(outcome));
        }
        Err(e) => {
            log::error!("Prediction failed: {}", e);
            model.prediction = Some(Err(e.to_string()));
        }
    }
    true
}

pub fn handle_drop(model: &mut Model, ctx: &Context<Model>, event: DragEvent) -> bool {
    event.prevent_default();
    model.is_dragging = false;

    let file = event
        .data_transfer()
        .and_then(|data_transfer| data_transfer.files())
        .and_then(|file_list| first_file(&file_list));
    if let Some(file) = file {
        ctx.link().send_message(Msg::AudioChosen(file));
    }
    true
}

pub fn handle_start_job(model: &mut Model, ctx: &Context<Model>, slot: JobSlot) -> bool {
    if model.panel(slot).is_none_or(|panel| panel.running) {
        return false;
    }

    let kind = match slot.kind(&model.epochs_input) {
        Ok(kind) => kind,
        Err(e) => {
            model.set_panel_status(slot, PanelStatus::new(Tone::Error, format!("❌ {}", e)));
            return true;
        }
    };

    let token = CancellationToken::new();
    let Some(panel) = model.jobs.get_mut(&slot) else {
        return false;
    };
    panel.running = true;
    panel.token = token.clone();
    panel.status = Some(PanelStatus::new(Tone::Info, slot.pending_text()));
    let gate = panel.gate.clone();

    spawn_local({
        let link = ctx.link().clone();
        let transport = model.transport.clone();
        let archive = model.archive_file.clone();

        async move {
            let interval = transport.config().job_poll();
            let launcher = JobLauncher::new(&transport, &TimerSleeper, interval);
            let mut observer = PanelObserver::new(link.clone(), slot);
            let result = launcher
                .run(kind, archive.as_ref(), &gate, token, &mut observer)
                .await;
            link.send_message(Msg::JobFinished(slot, kind, result));
        }
    });

    true
}

pub fn handle_job_started(model: &mut Model, slot: JobSlot, started: JobStarted) -> bool {
    if let Some(dataset) = started.dataset {
        model.dataset_info = Some(dataset.to_string());
    }
    let text = match slot {
        JobSlot::Upload => format!("✅ Success: {}", started.message),
        _ => format!("✅ {}", started.message),
    };
    model.set_panel_status(slot, PanelStatus::new(Tone::Success, text));
    true
}

pub fn handle_job_finished(
    model: &mut Model,
    slot: JobSlot,
    kind: JobKind,
    result: Result<WatchOutcome, StartError>,
) -> bool {
    let status = match &result {
        Ok(WatchOutcome::Detached) => None,
        Ok(outcome) if outcome.is_failure() => {
            Some(PanelStatus::new(Tone::Error, format!("❌ {}", outcome.describe(kind))))
        }
        Ok(outcome) => Some(PanelStatus::new(
            Tone::Success,
            format!("✅ {}", outcome.describe(kind)),
        )),
        // A second launch on a busy control leaves the running job's panel alone.
        Err(StartError::AlreadyRunning(_)) => return false,
        Err(e) => {
            log::error!("{} job could not start: {}", kind, e);
            Some(PanelStatus::new(
                Tone::Error,
                format!("❌ {}", kind.start_failure_text(e)),
            ))
        }
    };

    if let Some(panel) = model.jobs.get_mut(&slot) {
        panel.running = false;
        if status.is_some() {
            panel.status = status;
        }
    }
    true
}
