// src/models/mod.rs

pub mod question;
pub mod score_record;
pub mod user;
