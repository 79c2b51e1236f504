use super::super::{JobSlot, Model, Msg};
use super::utils::{file_from_input, render_panel_status, trigger_file_input};
use shared::watcher::{ARCHIVE_EXTENSIONS, MAX_EPOCHS, MIN_EPOCHS};
use web_sys::HtmlInputElement;
use yew::prelude::*;

pub fn render_training(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <section class="training-section">
            <h2>{"Model Training"}</h2>
            if let Some(info) = &model.dataset_info {
                <p class="dataset-info">{ format!("Dataset: {}", info) }</p>
            }
            <div class="training-panels">
                { render_upload_panel(model, ctx) }
                { render_continue_panel(model, ctx) }
                { render_existing_panel(model, ctx) }
            </div>
            { render_history(model) }
        </section>
    }
}

fn start_button(model: &Model, ctx: &Context<Model>, slot: JobSlot, label: &str) -> Html {
    let running = model.panel(slot).is_some_and(|panel| panel.running);
    let onclick = ctx.link().callback(move |_: MouseEvent| Msg::StartJob(slot));
    html! {
        <button class="train-button" disabled={running} {onclick}>
            { if running { "Working..." } else { label } }
        </button>
    }
}

fn render_upload_panel(model: &Model, ctx: &Context<Model>) -> Html {
    let handle_change = ctx
        .link()
        .batch_callback(|e: Event| file_from_input(&e).map(Msg::ArchiveChosen));
    let file_label = model
        .archive_file
        .as_ref()
        .map(|f| f.name())
        .unwrap_or_else(|| "Select a .zip dataset".to_string());

    html! {
        <div class="training-panel">
            <h3>{"Retrain with New Data"}</h3>
            <input
                type="file"
                id="archive-input"
                accept={ARCHIVE_EXTENSIONS.join(",")}
                style="display: none;"
                onchange={handle_change}
            />
            <div class="upload-area small" onclick={trigger_file_input("archive-input")}>
                <p class="file-name">{ file_label }</p>
            </div>
            { start_button(model, ctx, JobSlot::Upload, "Upload & Retrain") }
            { render_panel_status(model.panel(JobSlot::Upload).and_then(|p| p.status.as_ref())) }
        </div>
    }
}

fn render_continue_panel(model: &Model, ctx: &Context<Model>) -> Html {
    let on_input = ctx.link().callback(|e: InputEvent| {
        let input: HtmlInputElement = e.target_unchecked_into();
        Msg::EpochsChanged(input.value())
    });

    html! {
        <div class="training-panel">
            <h3>{"Continue Training"}</h3>
            <label for="epochs-input">{"Epochs"}</label>
            <input
                type="number"
                id="epochs-input"
                min={MIN_EPOCHS.to_string()}
                max={MAX_EPOCHS.to_string()}
                value={model.epochs_input.clone()}
                oninput={on_input}
            />
            { start_button(model, ctx, JobSlot::Continue, "Continue Training") }
            { render_panel_status(model.panel(JobSlot::Continue).and_then(|p| p.status.as_ref())) }
        </div>
    }
}

fn render_existing_panel(model: &Model, ctx: &Context<Model>) -> Html {
    html! {
        <div class="training-panel">
            <h3>{"Retrain on Stored Data"}</h3>
            <p>{"Rebuild the model from every dataset already on the server."}</p>
            { start_button(model, ctx, JobSlot::Existing, "Retrain Existing") }
            { render_panel_status(model.panel(JobSlot::Existing).and_then(|p| p.status.as_ref())) }
        </div>
    }
}

fn render_history(model: &Model) -> Html {
    let Some(history) = model.history.as_ref().filter(|h| h.epochs() > 0) else {
        return html! {};
    };

    let percent = |values: &[f64], i: usize| {
        values
            .get(i)
            .map(|v| format!("{:.1}%", v * 100.0))
            .unwrap_or_else(|| "--".to_string())
    };

    html! {
        <div class="training-history">
            <h3>{"Training History"}</h3>
            <table>
                <thead>
                    <tr>
                        <th>{"Epoch"}</th>
                        <th>{"Accuracy"}</th>
                        <th>{"Validation"}</th>
                        <th>{"Loss"}</th>
                    </tr>
                </thead>
                <tbody>
                    { for history.epoch_labels().into_iter().enumerate().map(|(i, label)| html! {
                        <tr>
                            <td>{ label }</td>
                            <td>{ percent(&history.accuracy, i) }</td>
                            <td>{ percent(&history.val_accuracy, i) }</td>
                            <td>{ history.loss.get(i).map(|l| format!("{:.4}", l)).unwrap_or_else(|| "--".to_string()) }</td>
                        </tr>
                    }) }
                </tbody>
            </table>
        </div>
    }
}
