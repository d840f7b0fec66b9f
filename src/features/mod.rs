pub mod authentication_analysis;
pub mod domain_reputation;
pub mod linguistic;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerCategory {
    Body,
    Subject,
}

/// One human-readable reason a message looked suspicious.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinguisticTrigger {
    pub text: String,
    pub explanation: String,
    pub category: TriggerCategory,
}

impl LinguisticTrigger {
    pub fn body(text: String, explanation: String) -> Self {
        Self {
            text,
            explanation,
            category: TriggerCategory::Body,
        }
    }

    pub fn subject(text: String, explanation: String) -> Self {
        Self {
            text,
            explanation,
            category: TriggerCategory::Subject,
        }
    }
}
