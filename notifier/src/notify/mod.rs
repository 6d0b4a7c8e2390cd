pub mod reconciler;
pub mod render;
