pub mod clock;
pub mod frequency;
pub mod intent;
pub mod models;
pub mod rules;

pub use clock::{Clock, FixedClock, SystemClock};
pub use intent::{normalize_text, Detector, DetectorHit, IntentClassifier};
pub use models::*;
pub use rules::{ClassifierConfig, RuleConfigError};
