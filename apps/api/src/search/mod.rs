//! Free-text video search, plus a thin proxy that lets desktop plugins
//! reach it through a fixed local endpoint.

pub mod handlers;
pub mod proxy;
