//! Side-effect requests emitted by the detectors
//!
//! Detectors never talk to the host. They push [`Effect`] values while
//! walking the roster; the monitor hands them to [`apply`] once the pass is
//! done. Chat, overlay, sound and spectator kicks happen immediately. Item
//! transfers and punishments become [`DeferredTask`]s that run on the next
//! simulation step, after the host has settled the current one.

use crate::config::{AfkPunishment, CampPunishment, MonitorConfig};
use crate::host::Host;
use log::{error, info};
use shared::PlayerId;
use std::collections::VecDeque;

/// Which detector produced a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detector {
    Afk,
    AntiCamp,
    Spectator,
}

impl Detector {
    pub fn chat_key(self) -> &'static str {
        match self {
            Detector::Afk => "afk.warn",
            Detector::AntiCamp => "anticamp.warn",
            Detector::Spectator => "spec.warn",
        }
    }

    pub fn overlay_key(self) -> &'static str {
        match self {
            Detector::Afk => "afk.warn.center",
            Detector::AntiCamp => "anticamp.warn.center",
            Detector::Spectator => "spec.warn.center",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Chat line, optional overlay and warning sound.
    Warn {
        player: PlayerId,
        detector: Detector,
        warnings: u32,
        limit: i32,
    },
    /// Removes a previously shown overlay alert.
    ClearOverlay { player: PlayerId },
    /// Disconnects the player right away.
    Kick {
        player: PlayerId,
        reason_key: &'static str,
    },
    Defer(DeferredTask),
}

/// Work that must wait for the next simulation step.
///
/// Tasks carry identities only; the player is looked up again when the task
/// runs and the task is dropped if they are gone.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredTask {
    TransferItem {
        from: PlayerId,
        item: String,
        only_from_buy_zone: bool,
    },
    PunishIdle {
        player: PlayerId,
        punishment: AfkPunishment,
    },
    PunishCamper {
        player: PlayerId,
        punishment: CampPunishment,
        slap_damage: i32,
    },
}

impl DeferredTask {
    pub fn player(&self) -> PlayerId {
        match self {
            DeferredTask::TransferItem { from, .. } => *from,
            DeferredTask::PunishIdle { player, .. } => *player,
            DeferredTask::PunishCamper { player, .. } => *player,
        }
    }
}

/// FIFO of deferred tasks, drained once per simulation step.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    tasks: VecDeque<DeferredTask>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: DeferredTask) {
        self.tasks.push_back(task);
    }

    /// Takes every task queued so far. Tasks pushed while the returned batch
    /// runs wait for the next step.
    pub fn take_ready(&mut self) -> Vec<DeferredTask> {
        self.tasks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}

/// Delivers one effect, or queues it when it must be deferred.
pub fn apply<H: Host>(
    effect: Effect,
    host: &mut H,
    config: &MonitorConfig,
    deferred: &mut DeferredQueue,
) {
    match effect {
        Effect::Warn {
            player,
            detector,
            warnings,
            limit,
        } => send_warning(host, config, player, detector, warnings, limit),
        Effect::ClearOverlay { player } => clear_overlay(host, config, player),
        Effect::Kick { player, reason_key } => {
            let reason = host.render(None, reason_key, &[]);
            match host.kick(player, &reason) {
                Ok(()) => info!("Kicked player {} ({})", player, reason_key),
                Err(e) => error!("Failed to kick player {}: {}", player, e),
            }
        }
        Effect::Defer(task) => deferred.push(task),
    }
}

fn send_warning<H: Host>(
    host: &mut H,
    config: &MonitorConfig,
    player: PlayerId,
    detector: Detector,
    warnings: u32,
    limit: i32,
) {
    let args = [warnings.to_string(), limit.to_string()];

    if !config.warning_sound.trim().is_empty() {
        host.play_sound(player, &config.warning_sound);
    }

    let line = host.render(Some(player), detector.chat_key(), &args);
    host.send_chat(player, &config.apply_prefix(&line));

    if config.center_html_alerts {
        let overlay = host.render(Some(player), detector.overlay_key(), &args);
        host.send_overlay(player, &overlay, config.overlay_duration_ms());
    }

    info!(
        "{:?} warning {}/{} for player {}",
        detector, warnings, limit, player
    );
}

pub fn clear_overlay<H: Host>(host: &mut H, config: &MonitorConfig, player: PlayerId) {
    if config.center_html_alerts {
        host.send_overlay(player, "", 1);
    }
}

/// Sends a prefixed, server-localized line to every valid player.
pub fn broadcast<H: Host>(host: &mut H, config: &MonitorConfig, key: &str, args: &[String]) {
    let text = config.apply_prefix(&host.render(None, key, args));
    let recipients: Vec<PlayerId> = host
        .players()
        .into_iter()
        .filter(|player| player.is_valid)
        .map(|player| player.id)
        .collect();

    for id in recipients {
        host.send_chat(id, &text);
    }
}

/// Sends a prefixed line localized for `player`.
pub fn tell<H: Host>(
    host: &mut H,
    config: &MonitorConfig,
    player: PlayerId,
    key: &str,
    args: &[String],
) {
    let text = config.apply_prefix(&host.render(Some(player), key, args));
    host.send_chat(player, &text);
}
