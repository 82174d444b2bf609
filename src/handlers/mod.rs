// src/handlers/mod.rs

pub mod admin;
pub mod progress;
pub mod quiz;
pub mod sessions;
pub mod subjects;
