use super::super::{Model, Msg};
use super::utils::{file_from_input, trigger_file_input};
use shared::predict::AUDIO_EXTENSIONS;
use web_sys::DragEvent;
use yew::prelude::*;

pub fn render_predict_panel(model: &Model, ctx: &Context<Model>) -> Html {
    let link = ctx.link();

    let handle_change = link.batch_callback(|e: Event| file_from_input(&e).map(Msg::AudioChosen));
    let handle_drag_over = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(true)
    });
    let handle_drag_leave = link.callback(|e: DragEvent| {
        e.prevent_default();
        Msg::SetDragging(false)
    });
    let handle_drop = link.callback(Msg::HandleDrop);
    let on_predict = link.callback(|_: MouseEvent| Msg::Predict);

    let file_label = model
        .audio_file
        .as_ref()
        .map(|f| f.name())
        .unwrap_or_else(|| "Drop a WAV or MP3 file here, or click to browse".to_string());

    html! {
        <section class="predict-section">
            <h2>{"Analyze Audio"}</h2>
            <input
                type="file"
                id="audio-input"
                accept={AUDIO_EXTENSIONS.join(",")}
                style="display: none;"
                onchange={handle_change}
            />
            <div
                class={classes!("upload-area", model.is_dragging.then_some("dragging"))}
                onclick={trigger_file_input("audio-input")}
                ondragover={handle_drag_over}
                ondragleave={handle_drag_leave}
                ondrop={handle_drop}
            >
                <p class="file-name">{ file_label }</p>
            </div>
            if let Some(error) = &model.format_error {
                <div class="error-message"><p>{ error }</p></div>
            }
            <button
                class="predict-button"
                disabled={model.audio_file.is_none() || model.predicting}
                onclick={on_predict}
            >
                { if model.predicting { "Analyzing..." } else { "Analyze" } }
            </button>
            { render_prediction(model) }
        </section>
    }
}

fn render_prediction(model: &Model) -> Html {
    match &model.prediction {
        Some(Ok(outcome)) => html! {
            <div class={classes!("result-card", if outcome.is_danger() { "danger" } else { "safe" })}>
                <h3>{ outcome.headline() }</h3>
                <p class="result-subtitle">{ outcome.subtitle() }</p>
                <div class="confidence-meter">
                    <div class="meter-label">{"Confidence:"}</div>
                    <div class="meter">
                        <div class="meter-fill" style={format!("width: {}%", outcome.confidence_percent)}></div>
                    </div>
                    <div class="meter-value">{ outcome.confidence_text() }</div>
                </div>
            </div>
        },
        Some(Err(error)) => html! {
            <div class="error-message">
                <p>{ format!("Error: {}", error) }</p>
            </div>
        },
        None => html! {},
    }
}

pub fn render_stats(model: &Model) -> Html {
    let snapshot = model.metrics.snapshot();
    let peak = snapshot.confidence_buckets.iter().copied().max().unwrap_or(0).max(1);

    html! {
        <section class="stats-section">
            <h2>{"Prediction Statistics"}</h2>
            <div class="stat-cards">
                <div class="stat-card">
                    <div class="stat-value">{ snapshot.total_predictions }</div>
                    <div class="stat-label">{"Total Predictions"}</div>
                </div>
                <div class="stat-card">
                    <div class="stat-value">{ format!("{}%", snapshot.average_percent()) }</div>
                    <div class="stat-label">{"Average Confidence"}</div>
                </div>
            </div>
            <div class="bucket-chart">
                { for snapshot.labelled_buckets().map(|(label, count)| html! {
                    <div class="bucket-row">
                        <div class="bucket-label">{ label }</div>
                        <div class="bucket-bar-container">
                            <div class="bucket-bar" style={format!("width: {}%", count * 100 / peak)}></div>
                        </div>
                        <div class="bucket-count">{ count }</div>
                    </div>
                }) }
            </div>
        </section>
    }
}
