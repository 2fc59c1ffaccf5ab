use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Discord caps a single message at 10 embeds.
pub const MAX_CARDS_PER_MESSAGE: usize = 10;
/// Embed description hard cap (characters).
pub const MAX_CARD_BODY_CHARS: usize = 4096;
/// Embed field value hard cap (characters).
pub const MAX_CARD_FIELD_CHARS: usize = 1024;

/// Top-level config (rollup.toml + ROLLUP_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollupConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub discord: Option<DiscordConfig>,
    #[serde(default)]
    pub rollup: DigestConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Register the `/rollup` command on ready.
    #[serde(default = "bool_true")]
    pub slash_commands: bool,
    /// Register commands on this guild only (instant), instead of globally.
    #[serde(default)]
    pub guild_id: Option<u64>,
}

/// Knobs for the digest pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Forum channel whose threads are summarised.
    #[serde(default)]
    pub forum_channel_id: Option<String>,
    /// Where scheduled digests are posted.
    #[serde(default)]
    pub default_channel_id: Option<String>,
    /// Reaction names that, from the thread owner, opt the thread out.
    #[serde(default = "default_opt_out_reactions")]
    pub opt_out_reactions: Vec<String>,
    #[serde(default = "default_cursor_batch")]
    pub cursor_batch: u8,
    #[serde(default = "default_bootstrap_batch")]
    pub bootstrap_batch: u8,
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u8,
    #[serde(default = "default_scan_max_pages")]
    pub scan_max_pages: u32,
    /// Per-message character budget inside the prompt.
    #[serde(default = "default_content_char_budget")]
    pub content_char_budget: usize,
    /// Upper bound for any single gateway or model call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Look-back window of the manual `/rollup` command.
    #[serde(default = "default_manual_window_hours")]
    pub manual_window_hours: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            forum_channel_id: None,
            default_channel_id: None,
            opt_out_reactions: default_opt_out_reactions(),
            cursor_batch: default_cursor_batch(),
            bootstrap_batch: default_bootstrap_batch(),
            scan_page_size: default_scan_page_size(),
            scan_max_pages: default_scan_max_pages(),
            content_char_budget: default_content_char_budget(),
            call_timeout_secs: default_call_timeout_secs(),
            manual_window_hours: default_manual_window_hours(),
        }
    }
}

impl DigestConfig {
    pub fn call_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

/// Daily trigger, expressed in local wall-clock time of `timezone`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_hour")]
    pub hour: u8,
    #[serde(default)]
    pub minute: u8,
    /// IANA zone name, e.g. "America/Chicago".
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour: default_hour(),
            minute: 0,
            timezone: default_timezone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl OpenAiConfig {
    pub fn with_key(api_key: String) -> Self {
        Self {
            api_key,
            base_url: default_openai_base_url(),
            model: default_model(),
            temperature: default_temperature(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_opt_out_reactions() -> Vec<String> {
    vec![
        "\u{1f4f5}".to_string(),         // 📵
        "\u{1f6ab}\u{1f4f1}".to_string(), // 🚫📱
        "no_mobile_phones".to_string(),
    ]
}
fn default_cursor_batch() -> u8 {
    100
}
fn default_bootstrap_batch() -> u8 {
    50
}
fn default_scan_page_size() -> u8 {
    100
}
fn default_scan_max_pages() -> u32 {
    10
}
fn default_content_char_budget() -> usize {
    1500
}
fn default_call_timeout_secs() -> u64 {
    30
}
fn default_manual_window_hours() -> u32 {
    24
}
fn default_hour() -> u8 {
    8
}
fn default_timezone() -> String {
    "America/Chicago".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.rollup/rollup.db", home)
}

impl RollupConfig {
    /// Load config from a TOML file with ROLLUP_* env var overrides.
    ///
    /// Nested keys use a double underscore: `ROLLUP_ROLLUP__FORUM_CHANNEL_ID`.
    /// Legacy deployment variables are applied afterwards for any value
    /// still unset (see [`RollupConfig::apply_legacy_env`]).
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let mut config: RollupConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ROLLUP_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config.apply_legacy_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reject batch sizes the platform would refuse (1..=100 messages).
    pub fn validate(&self) -> Result<()> {
        let batches = [
            ("rollup.cursor_batch", self.rollup.cursor_batch),
            ("rollup.bootstrap_batch", self.rollup.bootstrap_batch),
            ("rollup.scan_page_size", self.rollup.scan_page_size),
        ];
        for (key, value) in batches {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Invalid {
                    key,
                    reason: format!("{value} is outside 1..=100"),
                });
            }
        }
        if self.rollup.scan_max_pages == 0 {
            return Err(ConfigError::Invalid {
                key: "rollup.scan_max_pages",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Fill unset values from the variable names the bot historically used.
    pub fn apply_legacy_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.rollup.forum_channel_id.is_none() {
            self.rollup.forum_channel_id =
                non_empty("PROJECT_FORUM_CHANNEL_ID").or_else(|| non_empty("PROJECT_FORUM_ID"));
        }
        if self.rollup.default_channel_id.is_none() {
            self.rollup.default_channel_id = non_empty("GENERAL_CHANNEL_ID");
        }
        if self.openai.is_none() {
            self.openai = non_empty("OPENAI_API_KEY").map(OpenAiConfig::with_key);
        }
        if self.discord.is_none() {
            self.discord = non_empty("DISCORD_TOKEN").map(|bot_token| DiscordConfig {
                bot_token,
                slash_commands: true,
                guild_id: None,
            });
        }
    }

    /// The forum id, or a `Missing` error naming the key.
    pub fn forum_channel_id(&self) -> Result<&str> {
        self.rollup
            .forum_channel_id
            .as_deref()
            .ok_or(ConfigError::Missing {
                key: "rollup.forum_channel_id",
            })
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.rollup/rollup.toml", home)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_documented_limits() {
        let cfg = RollupConfig::default();
        assert_eq!(cfg.rollup.cursor_batch, 100);
        assert_eq!(cfg.rollup.bootstrap_batch, 50);
        assert_eq!(cfg.rollup.scan_max_pages, 10);
        assert_eq!(cfg.rollup.content_char_budget, 1500);
        assert_eq!(cfg.schedule.hour, 8);
        assert_eq!(cfg.schedule.timezone, "America/Chicago");
        assert!(cfg.openai.is_none());
        assert!(cfg.forum_channel_id().is_err());
    }

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rollup]
forum_channel_id = "111"
default_channel_id = "222"
call_timeout_secs = 5

[schedule]
hour = 9
timezone = "Europe/Berlin"

[openai]
api_key = "sk-test"
"#
        )
        .unwrap();

        let cfg = RollupConfig::load(file.path().to_str()).unwrap();
        assert_eq!(cfg.forum_channel_id().unwrap(), "111");
        assert_eq!(cfg.rollup.default_channel_id.as_deref(), Some("222"));
        assert_eq!(cfg.rollup.call_timeout(), std::time::Duration::from_secs(5));
        assert_eq!(cfg.schedule.hour, 9);
        let openai = cfg.openai.unwrap();
        assert_eq!(openai.model, "gpt-4o-mini");
        assert!((openai.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn oversized_batches_are_rejected() {
        let mut cfg = RollupConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.rollup.scan_page_size = 101;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "rollup.scan_page_size",
                ..
            }
        ));

        cfg.rollup.scan_page_size = 100;
        cfg.rollup.cursor_batch = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn legacy_env_only_fills_gaps() {
        let env: HashMap<&str, &str> = [
            ("PROJECT_FORUM_ID", "forum-legacy"),
            ("GENERAL_CHANNEL_ID", "general"),
            ("OPENAI_API_KEY", "sk-env"),
            ("DISCORD_TOKEN", ""),
        ]
        .into_iter()
        .collect();

        let mut cfg = RollupConfig::default();
        cfg.rollup.default_channel_id = Some("explicit".to_string());
        cfg.apply_legacy_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.rollup.forum_channel_id.as_deref(), Some("forum-legacy"));
        assert_eq!(cfg.rollup.default_channel_id.as_deref(), Some("explicit"));
        assert_eq!(cfg.openai.unwrap().api_key, "sk-env");
        assert!(cfg.discord.is_none(), "empty token must not configure discord");
    }
}
