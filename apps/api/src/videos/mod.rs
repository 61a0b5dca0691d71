pub mod format;
pub mod handlers;
