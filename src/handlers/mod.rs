// src/handlers/mod.rs

pub mod marks;
