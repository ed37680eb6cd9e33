//! Monitor configuration.
//!
//! [`MonitorConfig`] mirrors the plugin's JSON config section (PascalCase
//! keys). Every field has a default, so a partial file is valid. The monitor
//! reads the config once per tick and never mutates it; a reload is picked
//! up at the next tick, and a changed `Timer` restarts the tick driver.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use shared::{Team, DEFAULT_OVERLAY_MS, DEFAULT_RESTRICTED_ITEM};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Section name used when the config file wraps the values in an object.
pub const CONFIG_SECTION: &str = "AFKManager";
pub const DEFAULT_TIMER_SECS: f32 = 5.0;
/// Longest accepted detector period (one day).
pub const MAX_TIMER_SECS: f32 = 86_400.0;
const MIN_WARN_INTERVAL_SECS: f32 = 1.0;

/// What happens to a player who stays AFK past the last warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AfkPunishment {
    Kick,
    Kill,
    Spectator,
}

impl From<String> for AfkPunishment {
    /// Unknown modes fall back to moving the player to spectators.
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "kick" => AfkPunishment::Kick,
            "kill" => AfkPunishment::Kill,
            _ => AfkPunishment::Spectator,
        }
    }
}

impl From<AfkPunishment> for String {
    fn from(value: AfkPunishment) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AfkPunishment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AfkPunishment::Kick => "kick",
            AfkPunishment::Kill => "kill",
            AfkPunishment::Spectator => "spectator",
        };
        f.write_str(name)
    }
}

/// What happens to a player who keeps camping past the last warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CampPunishment {
    Slay,
    Slap,
}

impl From<String> for CampPunishment {
    /// Unknown modes fall back to a slap.
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "slay" => CampPunishment::Slay,
            _ => CampPunishment::Slap,
        }
    }
}

impl From<CampPunishment> for String {
    fn from(value: CampPunishment) -> Self {
        value.to_string()
    }
}

impl fmt::Display for CampPunishment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CampPunishment::Slay => "slay",
            CampPunishment::Slap => "slap",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct MonitorConfig {
    pub chat_prefix: String,
    pub chat_prefix_color: String,
    pub center_html_alerts: bool,
    pub center_html_duration_ms: u32,
    pub warning_sound: String,
    pub skip_warmup: bool,
    /// Seconds between detector passes.
    pub timer: f32,

    pub afk_punish_after_warnings: i32,
    pub afk_punishment: AfkPunishment,
    pub afk_warn_interval: f32,
    #[serde(rename = "AfkTransferC4AfterWarnings")]
    pub afk_transfer_after_warnings: i32,
    #[serde(rename = "AfkTransferC4OnlyFromBuyZone")]
    pub afk_transfer_only_from_buy_zone: bool,
    pub afk_transfer_item: String,
    pub afk_skip_flag: Vec<String>,

    pub anti_camp_radius: f32,
    pub anti_camp_punishment: CampPunishment,
    pub anti_camp_slap_damage: i32,
    pub anti_camp_warn_interval: f32,
    pub anti_camp_punish_after_warnings: i32,
    pub anti_camp_skip_bomb_planted: bool,
    /// Team number exempt from camping checks (3 = counter-terrorists).
    pub anti_camp_skip_team: u8,
    pub anti_camp_skip_flag: Vec<String>,

    pub spec_warn_interval: f32,
    pub spec_kick_after_warnings: i32,
    pub spec_kick_min_players: i32,
    pub spec_kick_only_moved_by_plugin: bool,
    pub spec_skip_flag: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let admin_flags = vec!["admin.root".to_string(), "admin.ban".to_string()];
        Self {
            chat_prefix: "AFKManager |".to_string(),
            chat_prefix_color: "Red".to_string(),
            center_html_alerts: false,
            center_html_duration_ms: DEFAULT_OVERLAY_MS,
            warning_sound: "UIPanorama.ui_custom_lobby_dialog_slide".to_string(),
            skip_warmup: true,
            timer: DEFAULT_TIMER_SECS,

            afk_punish_after_warnings: 3,
            afk_punishment: AfkPunishment::Spectator,
            afk_warn_interval: 5.0,
            afk_transfer_after_warnings: 1,
            afk_transfer_only_from_buy_zone: true,
            afk_transfer_item: DEFAULT_RESTRICTED_ITEM.to_string(),
            afk_skip_flag: admin_flags.clone(),

            anti_camp_radius: 130.0,
            anti_camp_punishment: CampPunishment::Slap,
            anti_camp_slap_damage: 0,
            anti_camp_warn_interval: 5.0,
            anti_camp_punish_after_warnings: 3,
            anti_camp_skip_bomb_planted: true,
            anti_camp_skip_team: Team::CounterTerrorist.number(),
            anti_camp_skip_flag: admin_flags.clone(),

            spec_warn_interval: 20.0,
            spec_kick_after_warnings: 5,
            spec_kick_min_players: 5,
            spec_kick_only_moved_by_plugin: false,
            spec_skip_flag: admin_flags,
        }
    }
}

impl MonitorConfig {
    /// Parses a config document.
    ///
    /// Accepts either the bare values or an object holding them under the
    /// `"AFKManager"` key.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let mut document: serde_json::Value = serde_json::from_str(text)?;
        if let Some(section) = document
            .get_mut(CONFIG_SECTION)
            .map(serde_json::Value::take)
        {
            document = section;
        }
        let config: MonitorConfig = serde_json::from_value(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Rejects values the detectors cannot interpret.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floats = [
            ("Timer", self.timer),
            ("AfkWarnInterval", self.afk_warn_interval),
            ("AntiCampRadius", self.anti_camp_radius),
            ("AntiCampWarnInterval", self.anti_camp_warn_interval),
            ("SpecWarnInterval", self.spec_warn_interval),
        ];
        for (field, value) in floats {
            if !value.is_finite() {
                return Err(ConfigError::invalid_value(field, "must be a finite number"));
            }
        }
        if self.timer > MAX_TIMER_SECS {
            return Err(ConfigError::invalid_value(
                "Timer",
                format!("must be at most {} seconds", MAX_TIMER_SECS),
            ));
        }
        if self.afk_transfer_item.trim().is_empty() {
            return Err(ConfigError::invalid_value("AfkTransferItem", "must not be empty"));
        }
        if Team::from_number(self.anti_camp_skip_team).is_none() {
            return Err(ConfigError::invalid_value(
                "AntiCampSkipTeam",
                format!("unknown team number {}", self.anti_camp_skip_team),
            ));
        }
        Ok(())
    }

    /// Detector period; non-positive values use the 5 second default and
    /// oversized ones are capped at one day.
    pub fn tick_period(&self) -> Duration {
        let secs = if self.timer.is_finite() && self.timer > 0.0 {
            self.timer.min(MAX_TIMER_SECS)
        } else {
            DEFAULT_TIMER_SECS
        };
        Duration::try_from_secs_f32(secs).unwrap_or(Duration::from_secs(5))
    }

    pub fn afk_warn_interval(&self) -> Duration {
        warn_interval(self.afk_warn_interval)
    }

    pub fn anti_camp_warn_interval(&self) -> Duration {
        warn_interval(self.anti_camp_warn_interval)
    }

    pub fn spec_warn_interval(&self) -> Duration {
        warn_interval(self.spec_warn_interval)
    }

    pub fn anti_camp_radius_squared(&self) -> f32 {
        let radius = self.anti_camp_radius.max(0.0);
        radius * radius
    }

    pub fn anti_camp_skip_team(&self) -> Option<Team> {
        Team::from_number(self.anti_camp_skip_team)
    }

    pub fn overlay_duration_ms(&self) -> u32 {
        if self.center_html_duration_ms == 0 {
            DEFAULT_OVERLAY_MS
        } else {
            self.center_html_duration_ms
        }
    }

    /// Whether a reload should restart the tick driver.
    pub fn timer_changed(&self, other: &MonitorConfig) -> bool {
        (self.timer - other.timer).abs() > 0.01
    }

    /// Prepends the configured chat prefix to a message.
    pub fn apply_prefix(&self, message: &str) -> String {
        let prefix = self.chat_prefix.trim();
        if prefix.is_empty() {
            return message.to_string();
        }

        let color = self.chat_prefix_color.trim();
        if color.is_empty() {
            format!("{} {}", self.chat_prefix, message)
        } else {
            format!(
                "[{}]{} [default]{}",
                color.to_ascii_lowercase(),
                self.chat_prefix,
                message
            )
        }
    }
}

fn warn_interval(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs.max(MIN_WARN_INTERVAL_SECS)).unwrap_or(Duration::MAX)
}
