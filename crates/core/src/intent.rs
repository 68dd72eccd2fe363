use std::fmt::Write as _;
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::clock::{Clock, SystemClock};
use crate::frequency;
use crate::models::{
    Classification, CommandReply, CommandRule, FrequencyConfig, ReplySource, RuleGroup,
};
use crate::rules::{ClassifierConfig, RuleConfigError};

const FALLBACK_TIME_FORMAT: &str = "%H:%M";

/// Lower-cases and trims; every detector matches against this form only.
pub fn normalize_text(input: &str) -> String {
    input.to_lowercase().trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorHit {
    pub rule: String,
    pub reply: String,
}

/// One link of the detector chain. Returning `None` lets the next detector run.
pub trait Detector: Send + Sync {
    fn source(&self) -> ReplySource;
    fn try_match(&self, normalized: &str) -> Option<DetectorHit>;
}

pub struct CommandDetector {
    commands: Vec<CommandRule>,
    clock: Arc<dyn Clock>,
}

impl CommandDetector {
    pub fn new(commands: Vec<CommandRule>, clock: Arc<dyn Clock>) -> Self {
        let commands = commands
            .into_iter()
            .map(|command| CommandRule {
                token: normalize_text(&command.token),
                reply: command.reply,
            })
            .collect();
        Self { commands, clock }
    }
}

impl Detector for CommandDetector {
    fn source(&self) -> ReplySource {
        ReplySource::Command
    }

    fn try_match(&self, normalized: &str) -> Option<DetectorHit> {
        let command = self
            .commands
            .iter()
            .find(|command| normalized.starts_with(command.token.as_str()))?;

        let reply = match &command.reply {
            CommandReply::Fixed { text } => text.clone(),
            CommandReply::LocalTime { template, format } => {
                template.replace("{time}", &render_time(self.clock.now(), format))
            }
        };

        Some(DetectorHit {
            rule: command.token.clone(),
            reply,
        })
    }
}

fn render_time(now: NaiveDateTime, format: &str) -> String {
    let mut rendered = String::new();
    if write!(rendered, "{}", now.format(format)).is_err() {
        return now.format(FALLBACK_TIME_FORMAT).to_string();
    }
    rendered
}

pub struct NameMentionDetector {
    name: String,
    reply: String,
}

impl NameMentionDetector {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: normalize_text(name),
            reply: reply.to_string(),
        }
    }
}

impl Detector for NameMentionDetector {
    fn source(&self) -> ReplySource {
        ReplySource::NameMention
    }

    fn try_match(&self, normalized: &str) -> Option<DetectorHit> {
        if self.name.is_empty() || !normalized.contains(self.name.as_str()) {
            return None;
        }

        Some(DetectorHit {
            rule: self.name.clone(),
            reply: self.reply.clone(),
        })
    }
}

/// Ordered rule groups; the first group with any matching token wins.
/// Backs the greeting, emotion, question and phrase stages.
pub struct RuleSetDetector {
    source: ReplySource,
    groups: Vec<RuleGroup>,
}

impl RuleSetDetector {
    pub fn new(source: ReplySource, groups: Vec<RuleGroup>) -> Self {
        let groups = groups
            .into_iter()
            .map(|group| RuleGroup {
                tokens: group
                    .tokens
                    .iter()
                    .map(|token| token.to_lowercase())
                    .filter(|token| !token.is_empty())
                    .collect(),
                ..group
            })
            .collect();
        Self { source, groups }
    }
}

impl Detector for RuleSetDetector {
    fn source(&self) -> ReplySource {
        self.source
    }

    fn try_match(&self, normalized: &str) -> Option<DetectorHit> {
        self.groups
            .iter()
            .find(|group| group.matches(normalized))
            .map(|group| DetectorHit {
                rule: group.name.clone(),
                reply: group.reply.clone(),
            })
    }
}

/// Stateless text → reply pipeline. Safe to share across threads.
pub struct IntentClassifier {
    unintelligible_reply: String,
    chain: Vec<Box<dyn Detector>>,
    frequency: FrequencyConfig,
}

impl IntentClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, RuleConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Rejects tables that could produce an empty reply.
    pub fn with_clock(
        config: ClassifierConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, RuleConfigError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: ClassifierConfig, clock: Arc<dyn Clock>) -> Self {
        let chain: Vec<Box<dyn Detector>> = vec![
            Box::new(CommandDetector::new(config.commands, clock)),
            Box::new(NameMentionDetector::new(
                &config.bot_name,
                &config.name_mention_reply,
            )),
            Box::new(RuleSetDetector::new(ReplySource::Greeting, config.greetings)),
            Box::new(RuleSetDetector::new(ReplySource::Emotion, config.emotions)),
            Box::new(RuleSetDetector::new(ReplySource::Question, config.questions)),
            Box::new(RuleSetDetector::new(ReplySource::Phrase, config.phrases)),
        ];

        Self {
            unintelligible_reply: config.unintelligible_reply,
            chain,
            frequency: config.frequency,
        }
    }

    pub fn classify(&self, text: Option<&str>) -> String {
        self.classify_detailed(text).reply
    }

    pub fn classify_detailed(&self, text: Option<&str>) -> Classification {
        let Some(raw) = text.filter(|value| !value.trim().is_empty()) else {
            return Classification {
                source: ReplySource::EmptyInput,
                rule: None,
                reply: self.unintelligible_reply.clone(),
            };
        };

        let normalized = normalize_text(raw);

        for detector in &self.chain {
            if let Some(hit) = detector.try_match(&normalized) {
                return Classification {
                    source: detector.source(),
                    rule: Some(hit.rule),
                    reply: hit.reply,
                };
            }
        }

        Classification {
            source: ReplySource::Frequency,
            rule: None,
            reply: frequency::summarize(&normalized, &self.frequency),
        }
    }

    /// Stage order, ending with the frequency fallback.
    pub fn stages(&self) -> Vec<ReplySource> {
        self.chain
            .iter()
            .map(|detector| detector.source())
            .chain(std::iter::once(ReplySource::Frequency))
            .collect()
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::build(ClassifierConfig::default(), Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::clock::FixedClock;

    fn classifier() -> IntentClassifier {
        IntentClassifier::default()
    }

    fn source_of(text: &str) -> ReplySource {
        classifier().classify_detailed(Some(text)).source
    }

    #[test]
    fn empty_and_blank_input_get_unintelligible_reply() {
        let clf = classifier();
        let expected = ClassifierConfig::default().unintelligible_reply;
        assert_eq!(clf.classify(None), expected);
        assert_eq!(clf.classify(Some("")), expected);
        assert_eq!(clf.classify(Some("  \n\t ")), expected);
        assert_eq!(
            clf.classify_detailed(Some("   ")).source,
            ReplySource::EmptyInput
        );
    }

    #[test]
    fn every_input_gets_a_non_empty_reply() {
        let clf = classifier();
        for text in [
            "",
            " ",
            "?",
            "!!!",
            "a",
            "ok",
            "/",
            "🤖",
            "hola",
            "pan pan queso",
            "yo tú él",
            "¿?",
        ] {
            assert!(!clf.classify(Some(text)).is_empty(), "empty reply for {text:?}");
        }
    }

    #[test]
    fn name_mention_outranks_greeting() {
        let config = ClassifierConfig::default();
        assert_eq!(
            classifier().classify(Some("hola meydell")),
            config.name_mention_reply
        );
    }

    #[test]
    fn slash_menu_is_a_command_but_bare_menu_is_not() {
        let clf = classifier();
        let menu = clf.classify_detailed(Some("/menu"));
        assert_eq!(menu.source, ReplySource::Command);
        assert!(menu.reply.contains("Menú del Bot"));

        let bare = clf.classify_detailed(Some("menu"));
        assert_ne!(bare.source, ReplySource::Command);
        assert_eq!(
            bare.reply,
            "🤖 Procesé tu mensaje. Palabras más mencionadas: menu (1×)"
        );
    }

    #[test]
    fn commands_match_on_prefix_and_ignore_case() {
        let clf = classifier();
        let help = clf.classify_detailed(Some("  /AYUDA por favor"));
        assert_eq!(help.source, ReplySource::Command);
        assert_eq!(help.rule.as_deref(), Some("/ayuda"));
        assert!(clf.classify(Some("/saludo")).contains("Aquí estoy"));
        assert!(clf.classify(Some("/info")).contains("Meydell"));
    }

    #[test]
    fn time_command_reads_the_clock() {
        let now = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|date| date.and_hms_opt(15, 7, 0))
            .unwrap();
        let clf = IntentClassifier::with_clock(
            ClassifierConfig::default(),
            Arc::new(FixedClock(now)),
        )
        .unwrap();
        assert_eq!(clf.classify(Some("/hora")), "⏰ Hora actual: 03:07 PM");
    }

    #[test]
    fn sad_group_is_checked_before_happy() {
        let clf = classifier();
        let result = clf.classify_detailed(Some("estoy triste y feliz"));
        assert_eq!(result.source, ReplySource::Emotion);
        assert_eq!(result.rule.as_deref(), Some("sad"));
        assert_eq!(result.reply, ClassifierConfig::default().emotions[0].reply);
    }

    #[test]
    fn emotion_groups_match_anywhere() {
        let clf = classifier();
        assert_eq!(
            clf.classify_detailed(Some("hoy estoy muy contento")).rule.as_deref(),
            Some("happy")
        );
        assert_eq!(
            clf.classify_detailed(Some("sigo molesto con esto")).rule.as_deref(),
            Some("angry")
        );
    }

    #[test]
    fn frequency_fallback_reports_counts_in_order() {
        assert_eq!(
            classifier().classify(Some("pan pan queso queso pan")),
            "🤖 Procesé tu mensaje. Palabras más mencionadas: pan (3×), queso (2×)"
        );
    }

    #[test]
    fn frequency_fallback_without_tokens_uses_empty_reply() {
        let result = classifier().classify_detailed(Some("yo y tú"));
        assert_eq!(result.source, ReplySource::Frequency);
        assert_eq!(result.reply, ClassifierConfig::default().frequency.empty_reply);
    }

    #[test]
    fn question_detected_by_mark_or_interrogative() {
        let config = ClassifierConfig::default();
        let clf = classifier();
        assert_eq!(clf.classify(Some("cuando vuelves?")), config.questions[0].reply);
        assert_eq!(source_of("donde queda la oficina"), ReplySource::Question);
        assert_eq!(source_of("la reunión es hoy?"), ReplySource::Question);
    }

    #[test]
    fn greeting_requires_leading_token() {
        assert_eq!(source_of("buenas tardes"), ReplySource::Greeting);
        assert_eq!(source_of("holis a todos"), ReplySource::Greeting);
        assert_ne!(source_of("digo hola"), ReplySource::Greeting);
    }

    #[test]
    fn chain_priority_is_fixed() {
        assert_eq!(source_of("/ayuda hola"), ReplySource::Command);
        assert_eq!(source_of("hola, estoy triste"), ReplySource::Greeting);
        assert_eq!(source_of("estoy feliz?"), ReplySource::Emotion);
        assert_eq!(source_of("gracias por todo?"), ReplySource::Question);
        assert_eq!(source_of("me ayudas? gracias"), ReplySource::Phrase);
    }

    #[test]
    fn phrase_groups_follow_table_order() {
        let clf = classifier();
        assert_eq!(
            clf.classify_detailed(Some("muchas gracias, bye")).rule.as_deref(),
            Some("thanks")
        );
        assert_eq!(
            clf.classify_detailed(Some("bueno, adios")).rule.as_deref(),
            Some("farewell")
        );
        assert_eq!(
            clf.classify_detailed(Some("te quiero bot")).rule.as_deref(),
            Some("affection")
        );
    }

    #[test]
    fn normalization_is_idempotent_for_classification() {
        let clf = classifier();
        for text in [
            "  HOLA Meydell ",
            "Estoy TRISTE",
            "/MENU",
            "Cuando Vuelves?",
            "PAN pan Queso",
            "   Gracias   ",
        ] {
            let normalized = text.trim().to_lowercase();
            assert_eq!(clf.classify(Some(text)), clf.classify(Some(&normalized)));
        }
    }

    #[test]
    fn configured_name_is_matched_case_insensitively() {
        let clf =
            IntentClassifier::new(ClassifierConfig::default().with_bot_name("Rosita")).unwrap();
        assert_eq!(
            clf.classify_detailed(Some("Hola ROSITA")).source,
            ReplySource::NameMention
        );
        assert_eq!(
            clf.classify_detailed(Some("hola meydell")).source,
            ReplySource::Greeting
        );
    }

    #[test]
    fn tables_with_blank_replies_are_refused() {
        let mut config = ClassifierConfig::default();
        config.phrases[0].reply = "  ".to_string();
        assert_eq!(
            IntentClassifier::new(config).err(),
            Some(RuleConfigError::EmptyReply("thanks".to_string()))
        );

        let mut config = ClassifierConfig::default();
        config.unintelligible_reply.clear();
        assert!(IntentClassifier::new(config).is_err());
    }

    #[test]
    fn rule_set_detector_declines_without_match() {
        let detector = RuleSetDetector::new(
            ReplySource::Phrase,
            ClassifierConfig::default().phrases,
        );
        assert_eq!(detector.try_match("nada que ver"), None);
        assert_eq!(
            detector.try_match("bye").map(|hit| hit.rule),
            Some("farewell".to_string())
        );
    }

    #[test]
    fn stages_end_with_frequency_fallback() {
        assert_eq!(
            classifier().stages(),
            vec![
                ReplySource::Command,
                ReplySource::NameMention,
                ReplySource::Greeting,
                ReplySource::Emotion,
                ReplySource::Question,
                ReplySource::Phrase,
                ReplySource::Frequency,
            ]
        );
    }
}
