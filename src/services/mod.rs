// src/services/mod.rs

pub mod answer_key;
pub mod catalog;
pub mod scores;
pub mod submission;
