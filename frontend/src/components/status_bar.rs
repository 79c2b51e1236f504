use super::super::Model;
use shared::status::ModelAvailability;
use yew::prelude::*;

pub fn render_status_bar(model: &Model) -> Html {
    let Some(board) = &model.board else {
        return html! {
            <div class="status-bar">
                <span class="status-dot checking"></span>
                <span>{"Checking model status..."}</span>
            </div>
        };
    };

    let dot = match board.availability {
        ModelAvailability::Online => "online",
        ModelAvailability::Offline => "offline",
        ModelAvailability::Error => "error",
    };
    let accuracy = board
        .accuracy_percent
        .map(|a| format!("{}%", a))
        .unwrap_or_else(|| "--".to_string());

    html! {
        <div class="status-bar">
            <div class="status-item">
                <span class={classes!("status-dot", dot)}></span>
                <span class="status-label">{"Model:"}</span>
                <span class="status-value">{ board.availability.to_string() }</span>
            </div>
            <div class="status-item">
                <span class="status-label">{"Accuracy:"}</span>
                <span class="status-value">{ accuracy }</span>
            </div>
            <div class="status-item">
                <span class="status-label">{"Training:"}</span>
                <span class={classes!("status-value", board.is_training.then_some("training-active"))}>
                    { &board.training_badge }
                </span>
                if let Some(line) = &board.progress_line {
                    <span class="status-progress">{ line }</span>
                }
            </div>
            <div class="model-info">{ &board.model_info }</div>
        </div>
    }
}
