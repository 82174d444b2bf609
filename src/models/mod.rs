// src/models/mod.rs

pub mod attempt;
pub mod dashboard;
pub mod fields;
pub mod progress;
pub mod quiz;
pub mod question;
pub mod schedule;
pub mod session;
pub mod subject;
