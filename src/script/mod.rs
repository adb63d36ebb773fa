//! Scene script handling: line classification, annotation and per-speaker grouping.

pub mod annotate;
pub mod dialogue;
pub mod parser;
