use serde::{Deserialize, Serialize};

/// Which stage of the pipeline produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    EmptyInput,
    Command,
    NameMention,
    Greeting,
    Emotion,
    Question,
    Phrase,
    Frequency,
}

impl ReplySource {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::Command => "command",
            Self::NameMention => "name_mention",
            Self::Greeting => "greeting",
            Self::Emotion => "emotion",
            Self::Question => "question",
            Self::Phrase => "phrase",
            Self::Frequency => "frequency",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    StartsWith,
    Contains,
    EndsWith,
}

impl MatchKind {
    pub fn matches(self, text: &str, token: &str) -> bool {
        match self {
            Self::StartsWith => text.starts_with(token),
            Self::Contains => text.contains(token),
            Self::EndsWith => text.ends_with(token),
        }
    }
}

/// One entry of a data-driven rule table: any token matching under
/// `match_kind` selects `reply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    pub match_kind: MatchKind,
    pub tokens: Vec<String>,
    pub reply: String,
}

impl RuleGroup {
    pub fn new(name: &str, match_kind: MatchKind, tokens: &[&str], reply: &str) -> Self {
        Self {
            name: name.to_string(),
            match_kind,
            tokens: tokens.iter().map(|token| token.to_string()).collect(),
            reply: reply.to_string(),
        }
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| self.match_kind.matches(normalized, token))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandReply {
    Fixed { text: String },
    /// `{time}` in `template` is replaced with the clock's local time
    /// rendered through the chrono `format` string.
    LocalTime { template: String, format: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRule {
    pub token: String,
    pub reply: CommandReply,
}

impl CommandRule {
    pub fn fixed(token: &str, text: &str) -> Self {
        Self {
            token: token.to_string(),
            reply: CommandReply::Fixed {
                text: text.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyConfig {
    pub delimiters: Vec<char>,
    /// Tokens shorter than this many characters are discarded.
    pub min_token_chars: usize,
    pub top_n: usize,
    /// `{tokens}` is replaced with the formatted token list.
    pub template: String,
    pub empty_reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    pub token: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub source: ReplySource,
    pub rule: Option<String>,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    pub message_id: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub text: String,
}
