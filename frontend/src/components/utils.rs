use crate::api::PickedFile;
use wasm_bindgen::JsCast;
use web_sys::{FileList, HtmlInputElement};
use yew::prelude::*;

pub fn first_file(file_list: &FileList) -> Option<PickedFile> {
    file_list.item(0).map(PickedFile::from)
}

/// Reads the first file of an `<input type="file">` change event and resets
/// the input so picking the same file again still fires.
pub fn file_from_input(e: &Event) -> Option<PickedFile> {
    let input: HtmlInputElement = e.target_unchecked_into();
    let file = input.files().as_ref().and_then(first_file);
    input.set_value("");
    file
}

// Opens the hidden file input behind an upload area.
pub fn trigger_file_input(id: &'static str) -> Callback<MouseEvent> {
    Callback::from(move |_| {
        let input = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(id))
            .and_then(|element| element.dyn_into::<web_sys::HtmlElement>().ok());
        if let Some(input) = input {
            input.click();
        }
    })
}

pub fn render_panel_status(status: Option<&crate::PanelStatus>) -> Html {
    match status {
        Some(status) => html! {
            <div class={classes!("panel-status", status.tone.class())}>
                { &status.text }
            </div>
        },
        None => html! {},
    }
}
