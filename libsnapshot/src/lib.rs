pub mod api;
pub mod operation;
pub mod reconciler;
pub mod retention;
