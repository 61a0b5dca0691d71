//! Bookkeeping for externally computed saliency analyses: records that tie a
//! video (and optionally one scene) to the analyzer's ROI file and heatmap.

pub mod files;
pub mod handlers;
pub mod service;
