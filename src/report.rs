use crate::classify::Category;
use crate::job::Outcome;
use serde::{Deserialize, Serialize};

/// Running totals of classified log events, by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub errors: u64,
    pub corrections: u64,
    pub warnings: u64,
    pub successes: u64,
    pub infos: u64,
}

impl EventCounts {
    pub fn record(&mut self, category: Category) {
        match category {
            Category::Error => self.errors += 1,
            Category::Correction => self.corrections += 1,
            Category::Warning => self.warnings += 1,
            Category::Success => self.successes += 1,
            Category::Info => self.infos += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.errors + self.corrections + self.warnings + self.successes + self.infos
    }
}

/// Machine-readable summary of one finished job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub job_id: String,
    pub input: String,
    pub output: String,
    pub started: String,
    pub finished: String,
    pub rows_in: usize,
    pub rows_out: usize,
    pub output_bytes: Option<u64>,
    pub events: EventCounts,
    pub ok: bool,
    pub message: String,
    /// Stable error tag on failure (`engine_missing`, `input_decode`, ...).
    pub error_kind: Option<String>,
}

impl RunSummary {
    pub fn outcome(&self) -> Outcome {
        Outcome {
            ok: self.ok,
            message: self.message.clone(),
        }
    }
}
