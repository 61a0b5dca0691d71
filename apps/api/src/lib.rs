//! PrismVid API: sharing, saliency bookkeeping, users, folders, videos,
//! projects and search over Postgres, plus stem playback sync.

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod folders;
pub mod models;
pub mod playback;
pub mod projects;
pub mod routes;
pub mod saliency;
pub mod search;
pub mod sharing;
pub mod state;
pub mod storage;
pub mod users;
pub mod videos;
