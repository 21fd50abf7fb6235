//! Lexicon-derived intent classification for a message or job prompt.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Category of a message, used by the trigger-policy gate (§4.2) and by the
/// job executor to select a tool-affinity bucket (§4.7 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Study,
    StateTracking,
    GoogleDocs,
    WebResearch,
    CodeExecution,
    FileOps,
    Automation,
    ModelMeta,
    Conversation,
    Advice,
    Other,
}

impl Intent {
    /// Intents treated as "cold" by the affinity phase machine: never
    /// warmup-explore even with zero observations, since sending every
    /// tool for a chatty/meta intent is wasteful (§4.8).
    pub fn is_cold(self) -> bool {
        matches!(
            self,
            Self::Study | Self::StateTracking | Self::Conversation | Self::ModelMeta
        )
    }

    /// The snake_case string stored in `AffinityObservation.intent` and
    /// used as the affinity snapshot's grouping key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::StateTracking => "state_tracking",
            Self::GoogleDocs => "google_docs",
            Self::WebResearch => "web_research",
            Self::CodeExecution => "code_execution",
            Self::FileOps => "file_ops",
            Self::Automation => "automation",
            Self::ModelMeta => "model_meta",
            Self::Conversation => "conversation",
            Self::Advice => "advice",
            Self::Other => "other",
        }
    }
}

fn study_quantity_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\d+\s*(h|hrs?|hours?|m|mins?|minutes?)\b").unwrap()
    })
}

fn study_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(study|studied|studying|homework)\b").unwrap())
}

fn advice_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(help me|what should i|how do i|can you advise|any advice)\b").unwrap()
    })
}

fn google_docs_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(google doc|gdoc|docs\.google\.com)\b").unwrap())
}

fn web_research_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(search the web|look up|google it|web search)\b").unwrap())
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(run this code|execute|compile|stack trace)\b").unwrap())
}

fn file_ops_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(read file|write file|list directory|delete file)\b").unwrap())
}

fn automation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(schedule|remind me|every day|cron)\b").unwrap())
}

fn model_meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(which model|what model are you|your version)\b").unwrap())
}

/// Classify free text into an [`Intent`]. `study` requires both a
/// time-quantity token and a study keyword; everything else is a single
/// keyword/phrase match, checked roughly in specificity order with
/// `other` as the default (§9 "Inheritance/duck typing → tagged variants").
pub fn classify(text: &str) -> Intent {
    if study_quantity_re().is_match(text) && study_keyword_re().is_match(text) {
        return Intent::Study;
    }
    if google_docs_re().is_match(text) {
        return Intent::GoogleDocs;
    }
    if web_research_re().is_match(text) {
        return Intent::WebResearch;
    }
    if code_re().is_match(text) {
        return Intent::CodeExecution;
    }
    if file_ops_re().is_match(text) {
        return Intent::FileOps;
    }
    if automation_re().is_match(text) {
        return Intent::Automation;
    }
    if model_meta_re().is_match(text) {
        return Intent::ModelMeta;
    }
    if advice_re().is_match(text) {
        return Intent::Advice;
    }
    Intent::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_study() {
        assert_eq!(classify("studied for 30 minutes today"), Intent::Study);
        assert_eq!(classify("study update: 30 minutes"), Intent::Study);
    }

    #[test]
    fn classifies_advice() {
        assert_eq!(classify("what should i do about this bug"), Intent::Advice);
    }

    #[test]
    fn defaults_to_other() {
        assert_eq!(classify("hello there"), Intent::Other);
    }

    #[test]
    fn cold_intents() {
        assert!(Intent::Study.is_cold());
        assert!(Intent::Conversation.is_cold());
        assert!(!Intent::FileOps.is_cold());
    }
}
