pub mod folder;
pub mod project;
pub mod saliency;
pub mod share;
pub mod user;
pub mod video;
