//! Global decoder settings loaded from TOML.
//!
//! - `init_custom(toml_content)` sets a custom TOML before first `settings()` call
//! - `settings()` returns `&'static Settings` (lazy-init singleton)
//! - Default values are embedded via `include_str!("default_settings.toml")`
//!
//! Components never read the singleton themselves; callers turn the
//! sections into the config structs each component takes.

use std::sync::OnceLock;

use serde::Deserialize;

use crate::log_math::LogMath;
use crate::search::active_list::{ActiveListKind, BeamConfig, WordLimits};

pub const DEFAULT_SETTINGS_TOML: &str = include_str!("default_settings.toml");

static CUSTOM_TOML: OnceLock<String> = OnceLock::new();

/// Set custom TOML before first `settings()` call.
pub fn init_custom(toml_content: String) -> Result<(), SettingsError> {
    parse_settings_toml(&toml_content)?;
    CUSTOM_TOML
        .set(toml_content)
        .map_err(|_| SettingsError::AlreadyInitialized)
}

/// Get or initialize the global settings singleton.
pub fn settings() -> &'static Settings {
    static INSTANCE: OnceLock<Settings> = OnceLock::new();
    INSTANCE.get_or_init(|| {
        let toml_str = CUSTOM_TOML
            .get()
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_SETTINGS_TOML);
        // Custom TOML is validated by init_custom and the default by build.rs.
        parse_settings_toml(toml_str).expect("settings TOML must be valid")
    })
}

/// Returns the embedded default settings TOML content.
pub fn default_toml() -> &'static str {
    DEFAULT_SETTINGS_TOML
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("settings already initialized")]
    AlreadyInitialized,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log_math: LogMathSettings,
    pub active_list: ActiveListSettings,
    pub word_active_list: WordActiveListSettings,
    pub search: SearchSettings,
    pub lattice: LatticeSettings,
    /// Parsed `active_list.kind`.
    #[serde(skip)]
    kind_parsed: Option<ActiveListKind>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogMathSettings {
    pub log_base: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActiveListSettings {
    pub kind: String,
    pub absolute_beam_width: i64,
    pub relative_beam_width: f64,
    pub strict_pruning: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WordActiveListSettings {
    pub absolute_beam_width: i64,
    pub relative_beam_width: f64,
    pub max_paths_per_word: usize,
    pub max_filler_words: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub language_weight: f64,
    pub relative_word_beam_width: f64,
    pub want_entry_pruning: bool,
    pub grow_skip_interval: usize,
    pub check_state_order: bool,
    pub build_word_lattice: bool,
    pub max_lattice_edges: usize,
    pub acoustic_lookahead_frames: f64,
    pub keep_all_tokens: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatticeSettings {
    pub language_weight: f64,
    pub blank_epsilon: f64,
}

impl Settings {
    pub fn log_math(&self) -> LogMath {
        LogMath::new(self.log_math.log_base)
    }

    pub fn active_list_kind(&self) -> ActiveListKind {
        self.kind_parsed.unwrap_or_default()
    }

    /// Beam configuration for the main (or emitting) active list.
    pub fn beam(&self) -> BeamConfig {
        BeamConfig::from_linear(
            self.active_list.absolute_beam_width,
            self.active_list.relative_beam_width,
            &self.log_math(),
        )
        .with_strict_pruning(self.active_list.strict_pruning)
    }

    /// Beam configuration for the word-state bucket.
    pub fn word_beam(&self) -> BeamConfig {
        BeamConfig::from_linear(
            self.word_active_list.absolute_beam_width,
            self.word_active_list.relative_beam_width,
            &self.log_math(),
        )
    }

    pub fn word_limits(&self) -> WordLimits {
        WordLimits {
            max_paths_per_word: self.word_active_list.max_paths_per_word,
            max_filler_words: self.word_active_list.max_filler_words,
        }
    }
}

pub fn parse_settings_toml(toml_str: &str) -> Result<Settings, SettingsError> {
    let mut s: Settings =
        toml::from_str(toml_str).map_err(|e| SettingsError::Parse(e.to_string()))?;
    validate(&s)?;
    let kind = s
        .active_list
        .kind
        .parse::<ActiveListKind>()
        .map_err(|e| SettingsError::InvalidValue {
            field: "active_list.kind".to_string(),
            reason: e.to_string(),
        })?;
    s.kind_parsed = Some(kind);
    Ok(s)
}

fn validate(s: &Settings) -> Result<(), SettingsError> {
    macro_rules! check_non_negative {
        ($section:ident . $field:ident) => {
            if s.$section.$field < 0.0 {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be non-negative".to_string(),
                });
            }
        };
    }
    macro_rules! check_probability {
        ($section:ident . $field:ident) => {
            if !(0.0..=1.0).contains(&s.$section.$field) {
                return Err(SettingsError::InvalidValue {
                    field: concat!(stringify!($section), ".", stringify!($field)).to_string(),
                    reason: "must be a linear probability in [0, 1]".to_string(),
                });
            }
        };
    }

    if s.log_math.log_base <= 1.0 {
        return Err(SettingsError::InvalidValue {
            field: "log_math.log_base".to_string(),
            reason: "must be greater than 1".to_string(),
        });
    }

    check_probability!(active_list.relative_beam_width);
    check_probability!(word_active_list.relative_beam_width);
    check_probability!(search.relative_word_beam_width);

    check_non_negative!(search.language_weight);
    check_non_negative!(search.acoustic_lookahead_frames);
    check_non_negative!(lattice.language_weight);
    check_non_negative!(lattice.blank_epsilon);

    if s.lattice.language_weight == 0.0 {
        return Err(SettingsError::InvalidValue {
            field: "lattice.language_weight".to_string(),
            reason: "must be positive".to_string(),
        });
    }

    Ok(())
}
