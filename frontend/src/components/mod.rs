pub mod handlers;
pub mod predict_panel;
pub mod status_bar;
pub mod training_panel;
pub mod utils;
