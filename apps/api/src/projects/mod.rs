//! Editing projects. Only the project record itself lives here; sharing
//! goes through `sharing`.

pub mod handlers;
