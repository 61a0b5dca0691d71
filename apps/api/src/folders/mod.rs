//! Hierarchical folders for organising videos. Each folder mirrors a
//! directory under the storage root.

pub mod breadcrumbs;
pub mod handlers;
