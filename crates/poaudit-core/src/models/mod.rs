//! Data models shared across the pipeline.

pub mod config;
pub mod document;
pub mod line_item;
pub mod task;
