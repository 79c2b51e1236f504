mod api;
mod components;

use std::collections::HashMap;

use api::{BrowserStore, GlooTransport, PickedFile, TimerSleeper, load_config};
use components::handlers;
use shared::TrainingHistory;
use shared::metrics::MetricsStore;
use shared::predict::{PredictError, PredictionOutcome};
use shared::schedule::CancellationToken;
use shared::status::{RemoteStatusClient, StatusBoard, monitor_status};
use shared::watcher::{ControlGate, JobKind, JobStarted, StartError, WatchOutcome};
use wasm_bindgen_futures::spawn_local;
use web_sys::DragEvent;
use yew::prelude::*;

/// The three job controls on the training page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobSlot {
    Upload,
    Continue,
    Existing,
}

impl JobSlot {
    pub const ALL: [JobSlot; 3] = [JobSlot::Upload, JobSlot::Continue, JobSlot::Existing];

    /// Resolves the job this control would start with the current inputs.
    pub fn kind(self, epochs_input: &str) -> Result<JobKind, StartError> {
        match self {
            JobSlot::Upload => Ok(JobKind::RetrainUpload),
            JobSlot::Continue => {
                let epochs = epochs_input.trim().parse::<u32>().unwrap_or(0);
                JobKind::continue_training(epochs)
            }
            JobSlot::Existing => Ok(JobKind::RetrainExisting),
        }
    }

    pub fn pending_text(self) -> &'static str {
        match self {
            JobSlot::Upload => "Uploading to Database...",
            JobSlot::Continue => "Starting training...",
            JobSlot::Existing => "Starting retraining with existing datasets...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Error,
}

impl Tone {
    pub fn class(self) -> &'static str {
        match self {
            Tone::Info => "status-info",
            Tone::Success => "status-success",
            Tone::Error => "status-error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelStatus {
    pub tone: Tone,
    pub text: String,
}

impl PanelStatus {
    pub fn new(tone: Tone, text: impl Into<String>) -> Self {
        Self {
            tone,
            text: text.into(),
        }
    }
}

/// Per-control job state. `running` flips synchronously on click so the
/// button is disabled before the spawned launch acquires the gate.
#[derive(Default)]
pub struct JobPanel {
    gate: ControlGate,
    token: CancellationToken,
    running: bool,
    status: Option<PanelStatus>,
}

pub enum Msg {
    // Status
    Board(StatusBoard),
    History(TrainingHistory),

    // Prediction
    AudioChosen(PickedFile),
    Predict,
    Predicted(Result<PredictionOutcome, PredictError>),
    SetDragging(bool),
    HandleDrop(DragEvent),

    // Training jobs
    ArchiveChosen(PickedFile),
    EpochsChanged(String),
    StartJob(JobSlot),
    JobStarted(JobSlot, JobStarted),
    JobProgress(JobSlot, String),
    JobFinished(JobSlot, JobKind, Result<WatchOutcome, StartError>),
}

pub struct Model {
    transport: GlooTransport,
    metrics: MetricsStore<BrowserStore>,
    board: Option<StatusBoard>,
    monitor_token: CancellationToken,

    audio_file: Option<PickedFile>,
    format_error: Option<String>,
    predicting: bool,
    prediction: Option<Result<PredictionOutcome, String>>,
    is_dragging: bool,

    archive_file: Option<PickedFile>,
    epochs_input: String,
    jobs: HashMap<JobSlot, JobPanel>,
    history: Option<TrainingHistory>,
    dataset_info: Option<String>,
}

impl Component for Model {
    type Message = Msg;
    type Properties = ();

    fn create(ctx: &Context<Self>) -> Self {
        let config = load_config();
        log::info!("Using API at {}", config.api_base_url);

        let model = Self {
            epochs_input: config.default_epochs.to_string(),
            transport: GlooTransport::new(config),
            metrics: MetricsStore::load(BrowserStore),
            board: None,
            monitor_token: CancellationToken::new(),
            audio_file: None,
            format_error: None,
            predicting: false,
            prediction: None,
            is_dragging: false,
            archive_file: None,
            jobs: JobSlot::ALL
                .iter()
                .map(|slot| (*slot, JobPanel::default()))
                .collect(),
            history: None,
            dataset_info: None,
        };

        spawn_local({
            let link = ctx.link().clone();
            let transport = model.transport.clone();
            let token = model.monitor_token.clone();
            let period = transport.config().status_poll();

            async move {
                let status = RemoteStatusClient::new(&transport);
                let boards = monitor_status(&status, &TimerSleeper, period, &token, |board| {
                    link.send_message(Msg::Board(board))
                })
                .await;
                log::debug!("Status monitor stopped after {} polls", boards);
            }
        });

        model
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        match msg {
            Msg::Board(board) => handlers::handle_board(self, board),
            Msg::History(history) => {
                self.history = Some(history);
                true
            }

            Msg::AudioChosen(file) => handlers::handle_audio_chosen(self, file),
            Msg::Predict => handlers::handle_predict(self, ctx),
            Msg::Predicted(result) => handlers::handle_predicted(self, result),
            Msg::SetDragging(is_dragging) => {
                self.is_dragging = is_dragging;
                true
            }
            Msg::HandleDrop(event) => handlers::handle_drop(self, ctx, event),

            Msg::ArchiveChosen(file) => {
                self.archive_file = Some(file);
                true
            }
            Msg::EpochsChanged(value) => {
                self.epochs_input = value;
                false
            }
            Msg::StartJob(slot) => handlers::handle_start_job(self, ctx, slot),
            Msg::JobStarted(slot, started) => handlers::handle_job_started(self, slot, started),
            Msg::JobProgress(slot, text) => {
                self.set_panel_status(slot, PanelStatus::new(Tone::Info, text));
                true
            }
            Msg::JobFinished(slot, kind, result) => {
                handlers::handle_job_finished(self, slot, kind, result)
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        html! {
            <div class="container">
                <header class="app-header">
                    <h1>{"Sentinel"}</h1>
                    <p class="subtitle">{"Acoustic danger detection"}</p>
                </header>

                { components::status_bar::render_status_bar(self) }

                <main class="main-content">
                    { components::predict_panel::render_predict_panel(self, ctx) }
                    { components::predict_panel::render_stats(self) }
                    { components::training_panel::render_training(self, ctx) }
                </main>

                <footer class="app-footer">
                    <p>{"Sentinel | Rust WASM dashboard"}</p>
                </footer>
            </div>
        }
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        self.monitor_token.cancel();
        for panel in self.jobs.values() {
            panel.token.cancel();
        }
    }
}

impl Model {
    fn panel(&self, slot: JobSlot) -> Option<&JobPanel> {
        self.jobs.get(&slot)
    }

    fn set_panel_status(&mut self, slot: JobSlot, status: PanelStatus) {
        if let Some(panel) = self.jobs.get_mut(&slot) {
            panel.status = Some(status);
        }
    }
}

fn main() {
    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Sentinel dashboard starting...");
    yew::Renderer::<Model>::new().render();
}
