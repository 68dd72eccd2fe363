use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CommandReply, CommandRule, FrequencyConfig, MatchKind, RuleGroup};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub bot_name: String,
    pub unintelligible_reply: String,
    pub commands: Vec<CommandRule>,
    pub name_mention_reply: String,
    pub greetings: Vec<RuleGroup>,
    pub emotions: Vec<RuleGroup>,
    pub questions: Vec<RuleGroup>,
    pub phrases: Vec<RuleGroup>,
    pub frequency: FrequencyConfig,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleConfigError {
    #[error("bot name must not be empty")]
    EmptyBotName,
    #[error("reply for `{0}` must not be empty")]
    EmptyReply(String),
    #[error("rule `{0}` needs at least one token and no empty tokens")]
    NoTokens(String),
    #[error("command token `{0}` must not be empty")]
    EmptyCommandToken(String),
    #[error("time format for `{0}` is not a valid strftime pattern")]
    InvalidTimeFormat(String),
    #[error("frequency template must contain the {{tokens}} placeholder")]
    MissingTokensPlaceholder,
    #[error("frequency delimiters must not be empty")]
    NoDelimiters,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            bot_name: "meydell".to_string(),
            unintelligible_reply: "😅 No logré entender el mensaje. ¿Podés repetirlo?".to_string(),
            commands: vec![
                CommandRule::fixed(
                    "/ayuda",
                    "🆘 *Ayuda*\nComandos disponibles:\n/menu – Ver menú\n/hora – Hora actual\n/saludo – Saludo rápido\n/info – Información del bot",
                ),
                CommandRule::fixed(
                    "/menu",
                    "📋 *Menú del Bot*\n1️⃣ Información\n2️⃣ Consultas\n3️⃣ Ayuda\n4️⃣ Contacto",
                ),
                CommandRule {
                    token: "/hora".to_string(),
                    reply: CommandReply::LocalTime {
                        template: "⏰ Hora actual: {time}".to_string(),
                        format: "%I:%M %p".to_string(),
                    },
                },
                CommandRule::fixed("/saludo", "👋 ¡Hola! Aquí estoy para ayudarte."),
                CommandRule::fixed(
                    "/info",
                    "📘 Soy un chatbot creado por Meydell para automatizar WhatsApp.",
                ),
            ],
            name_mention_reply: "👀 Veo que mencionaste mi nombre. ¿En qué puedo ayudarte?"
                .to_string(),
            greetings: vec![RuleGroup::new(
                "greeting",
                MatchKind::StartsWith,
                &["hola", "buenas", "que tal", "hey", "holi", "saludos"],
                "👋 ¡Hola! ¿Cómo estás? ¿En qué puedo ayudarte hoy?",
            )],
            emotions: vec![
                RuleGroup::new(
                    "sad",
                    MatchKind::Contains,
                    &["triste", "mal", "deprimido"],
                    "😔 Lamento que te sientas así. Si querés hablar, estoy aquí.",
                ),
                RuleGroup::new(
                    "happy",
                    MatchKind::Contains,
                    &["feliz", "contento", "alegre"],
                    "😄 ¡Qué bueno! Me alegra escuchar eso.",
                ),
                RuleGroup::new(
                    "angry",
                    MatchKind::Contains,
                    &["enojado", "molesto"],
                    "😠 Entiendo tu molestia. ¿Querés contarme qué pasó?",
                ),
            ],
            questions: vec![
                RuleGroup::new(
                    "question_mark",
                    MatchKind::EndsWith,
                    &["?"],
                    "🤔 Buena pregunta. Estoy procesando tu consulta...",
                ),
                RuleGroup::new(
                    "interrogative",
                    MatchKind::StartsWith,
                    &["como", "qué", "donde", "cuando", "por qué"],
                    "🤔 Buena pregunta. Estoy procesando tu consulta...",
                ),
            ],
            phrases: vec![
                RuleGroup::new(
                    "thanks",
                    MatchKind::Contains,
                    &["gracias"],
                    "🙏 ¡Con gusto! Estoy aquí para ayudarte.",
                ),
                RuleGroup::new(
                    "farewell",
                    MatchKind::Contains,
                    &["adios", "bye"],
                    "👋 ¡Hasta luego! Que tengas un excelente día.",
                ),
                RuleGroup::new(
                    "affection",
                    MatchKind::Contains,
                    &["te quiero", "te amo"],
                    "🥰 Aprecio tus palabras, pero soy un bot jaja.",
                ),
            ],
            frequency: FrequencyConfig {
                delimiters: vec![' ', '.', ',', '!', '?', ';', ':'],
                min_token_chars: 3,
                top_n: 3,
                template: "🤖 Procesé tu mensaje. Palabras más mencionadas: {tokens}".to_string(),
                empty_reply: "🤖 Procesé tu mensaje, pero no encontré palabras destacables."
                    .to_string(),
            },
        }
    }
}

impl ClassifierConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).context("invalid rule configuration JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed reading rule file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("failed loading {}", path.display()))
    }

    /// Built-in tables, or the rule file at `path`, with an optional bot name
    /// override applied on top.
    pub fn load(path: Option<&Path>, bot_name: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };

        let config = match bot_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => config.with_bot_name(name),
            None => config,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_bot_name(mut self, bot_name: &str) -> Self {
        self.bot_name = bot_name.trim().to_string();
        self
    }

    /// Rejects tables that could produce an empty reply.
    pub fn validate(&self) -> Result<(), RuleConfigError> {
        if self.bot_name.trim().is_empty() {
            return Err(RuleConfigError::EmptyBotName);
        }

        require_reply("unintelligible_reply", &self.unintelligible_reply)?;
        require_reply("name_mention_reply", &self.name_mention_reply)?;

        for command in &self.commands {
            if command.token.trim().is_empty() {
                return Err(RuleConfigError::EmptyCommandToken(command.token.clone()));
            }
            let reply = match &command.reply {
                CommandReply::Fixed { text } => text,
                CommandReply::LocalTime { template, format } => {
                    if StrftimeItems::new(format).any(|item| item == Item::Error) {
                        return Err(RuleConfigError::InvalidTimeFormat(command.token.clone()));
                    }
                    template
                }
            };
            require_reply(&command.token, reply)?;
        }

        for group in self
            .greetings
            .iter()
            .chain(&self.emotions)
            .chain(&self.questions)
            .chain(&self.phrases)
        {
            if group.tokens.is_empty() || group.tokens.iter().any(|token| token.is_empty()) {
                return Err(RuleConfigError::NoTokens(group.name.clone()));
            }
            require_reply(&group.name, &group.reply)?;
        }

        if self.frequency.delimiters.is_empty() {
            return Err(RuleConfigError::NoDelimiters);
        }
        if !self.frequency.template.contains("{tokens}") {
            return Err(RuleConfigError::MissingTokensPlaceholder);
        }
        require_reply("frequency.empty_reply", &self.frequency.empty_reply)?;

        Ok(())
    }
}

fn require_reply(name: &str, reply: &str) -> Result<(), RuleConfigError> {
    if reply.trim().is_empty() {
        Err(RuleConfigError::EmptyReply(name.to_string()))
    } else {
        Ok(())
    }
}
