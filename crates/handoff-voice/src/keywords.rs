//! Passive keyword classification used while the silent persona monitors a
//! room. The signals are diagnostic only and never change the conversation.

const HELP_WORDS: &[&str] = &[
    "help", "assist", "assistance", "support", "problem", "issue", "stuck", "broken",
];

const URGENCY_WORDS: &[&str] = &[
    "urgent",
    "emergency",
    "asap",
    "immediately",
    "now",
    "hurry",
    "quickly",
];

const HUMAN_REQUEST_WORDS: &[&str] = &[
    "human",
    "person",
    "someone",
    "supervisor",
    "manager",
    "representative",
    "operator",
    "agent",
];

/// Which vocabularies an utterance touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordSignals {
    pub help: bool,
    pub urgency: bool,
    pub human_request: bool,
}

impl KeywordSignals {
    pub fn classify(text: &str) -> Self {
        let mut signals = Self::default();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let word = word.as_str();
            signals.help |= HELP_WORDS.contains(&word);
            signals.urgency |= URGENCY_WORDS.contains(&word);
            signals.human_request |= HUMAN_REQUEST_WORDS.contains(&word);
        }
        signals
    }

    pub fn any(&self) -> bool {
        self.help || self.urgency || self.human_request
    }
}
