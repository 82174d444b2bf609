// src/services/mod.rs

pub mod assembler;
pub mod catalog;
pub mod dashboard;
pub mod eligibility;
pub mod progress;
pub mod schedules;
pub mod scoring;
pub mod session;

use serde::Serialize;

/// Where a read's value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Store,
    Fallback,
}

/// Result of a read that never fails: either the store's answer or the
/// operation's documented fallback value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched<T> {
    #[serde(rename = "data")]
    pub value: T,
    pub source: Source,
}

impl<T> Fetched<T> {
    pub fn store(value: T) -> Self {
        Self {
            value,
            source: Source::Store,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            source: Source::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == Source::Fallback
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            source: self.source,
        }
    }
}
