//! Collaboration: granting other users VIEWER or EDITOR access to projects,
//! videos and folders.

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod service;
pub mod store;
