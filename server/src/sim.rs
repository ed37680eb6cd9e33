//! In-memory match server
//!
//! [`SimulatedServer`] implements every host trait over a plain player list.
//! It records all chat, overlay, sound and kick traffic so tests can assert
//! on it, can be told to fail specific actions, and moves its players
//! according to a [`Behavior`] so the demo binary has something to watch.
//! [`MatchScript`] produces the round/freeze/bomb events a real server would
//! fire.

use crate::error::ActionError;
use crate::host::{Actions, Comms, Localizer, Permissions, Roster};
use log::{debug, info};
use rand::Rng;
use shared::{MatchEvent, PlayerId, PlayerSnapshot, QAngle, Team, Vector3, DEFAULT_RESTRICTED_ITEM};
use std::collections::HashSet;
use std::time::Duration;

const FIRST_STEAM_ID: u64 = 76561198000000000;
const GRAVITY: f32 = 800.0;
const RUN_SPEED: f32 = 250.0;
const VELOCITY_DECAY: f32 = 0.9;

/// How a simulated player moves between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Never touches the controls.
    Idle,
    /// Runs around and looks around.
    Active,
    /// Holds a spot but keeps aiming around.
    Camper,
}

#[derive(Debug, Clone)]
pub struct SimPlayer {
    pub snapshot: PlayerSnapshot,
    pub flags: Vec<String>,
    pub velocity: Vector3,
    pub behavior: Behavior,
    pub spawn: Vector3,
}

impl SimPlayer {
    pub fn new(snapshot: PlayerSnapshot, behavior: Behavior) -> Self {
        let spawn = snapshot.position.unwrap_or_default();
        Self {
            snapshot,
            flags: Vec::new(),
            velocity: Vector3::default(),
            behavior,
            spawn,
        }
    }

    fn respawn(&mut self) {
        if self.snapshot.team.map_or(true, |team| team.is_spectator()) {
            return;
        }
        self.snapshot.health = 100;
        self.snapshot.position = Some(self.spawn);
        self.snapshot.view_angle = Some(QAngle::default());
        self.velocity = Vector3::default();
    }

    fn remove_pawn(&mut self) {
        self.snapshot.health = 0;
        self.snapshot.position = None;
        self.snapshot.view_angle = None;
        self.velocity = Vector3::default();
    }
}

#[derive(Debug, Default)]
pub struct SimulatedServer {
    players: Vec<SimPlayer>,
    pub chat_log: Vec<(PlayerId, String)>,
    pub overlays: Vec<(PlayerId, String, u32)>,
    pub sounds: Vec<(PlayerId, String)>,
    pub kicked: Vec<(PlayerId, String)>,
    failing: HashSet<&'static str>,
}

impl SimulatedServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A lobby of `humans` players (the first `idle` of them never move) plus
    /// one bot. The first idle terrorist carries the bomb, one player camps
    /// and, with four or more humans, the last one spectates.
    pub fn populate<R: Rng>(humans: usize, idle: usize, rng: &mut R) -> Self {
        let mut server = Self::new();

        for index in 0..humans {
            let id = PlayerId(FIRST_STEAM_ID + index as u64 + 1);
            let spectating = humans >= 4 && index == humans - 1;
            let team = if spectating {
                Team::Spectator
            } else if index % 2 == 0 {
                Team::Terrorist
            } else {
                Team::CounterTerrorist
            };

            let mut snapshot = PlayerSnapshot::new(id, &format!("player{}", index + 1), team);
            let lane = if team == Team::CounterTerrorist { 3000.0 } else { 0.0 };
            snapshot.position = Some(Vector3::new(
                index as f32 * 100.0 + rng.gen_range(-20.0..20.0),
                lane,
                0.0,
            ));
            if index == 0 {
                snapshot.inventory.push(DEFAULT_RESTRICTED_ITEM.to_string());
            }

            let behavior = if index < idle {
                Behavior::Idle
            } else if index == idle {
                Behavior::Camper
            } else {
                Behavior::Active
            };

            let mut player = SimPlayer::new(snapshot, behavior);
            if spectating {
                player.remove_pawn();
            }
            server.players.push(player);
        }

        let mut bot = PlayerSnapshot::new(PlayerId(FIRST_STEAM_ID), "BOT Albert", Team::Terrorist);
        bot.is_fake_client = true;
        server.players.push(SimPlayer::new(bot, Behavior::Idle));

        server
    }

    pub fn add_player(&mut self, snapshot: PlayerSnapshot) {
        self.players.push(SimPlayer::new(snapshot, Behavior::Idle));
    }

    pub fn add_sim_player(&mut self, player: SimPlayer) {
        self.players.push(player);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<SimPlayer> {
        let index = self.players.iter().position(|p| p.snapshot.id == id)?;
        Some(self.players.remove(index))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut SimPlayer> {
        self.players.iter_mut().find(|p| p.snapshot.id == id)
    }

    fn player(&self, id: PlayerId) -> Option<&SimPlayer> {
        self.players.iter().find(|p| p.snapshot.id == id)
    }

    pub fn grant_flag(&mut self, id: PlayerId, flag: &str) {
        if let Some(player) = self.player_mut(id) {
            player.flags.push(flag.to_string());
        }
    }

    /// Makes the named action return an error from now on.
    pub fn fail_action(&mut self, action: &'static str) {
        self.failing.insert(action);
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn chat_for(&self, id: PlayerId) -> Vec<String> {
        self.chat_log
            .iter()
            .filter(|(recipient, _)| *recipient == id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn team_of(&self, id: PlayerId) -> Option<Team> {
        self.player(id).and_then(|p| p.snapshot.team)
    }

    pub fn health_of(&self, id: PlayerId) -> Option<i32> {
        self.player(id).map(|p| p.snapshot.health)
    }

    pub fn velocity_of(&self, id: PlayerId) -> Option<Vector3> {
        self.player(id).map(|p| p.velocity)
    }

    pub fn position_of(&self, id: PlayerId) -> Option<Vector3> {
        self.player(id).and_then(|p| p.snapshot.position)
    }

    pub fn holds(&self, id: PlayerId, item: &str) -> bool {
        self.player(id).is_some_and(|p| p.snapshot.holds_item(item))
    }

    /// Shifts the player slightly, enough to count as activity.
    pub fn nudge(&mut self, id: PlayerId) {
        if let Some(player) = self.player_mut(id) {
            if let Some(position) = player.snapshot.position.as_mut() {
                position.x += 1.0;
            }
            if let Some(angle) = player.snapshot.view_angle.as_mut() {
                angle.yaw += 1.0;
            }
        }
    }

    /// Advances movement by `dt` seconds.
    pub fn advance<R: Rng>(&mut self, dt: f32, rng: &mut R) {
        for player in &mut self.players {
            let (Some(position), Some(angle)) = (
                player.snapshot.position.as_mut(),
                player.snapshot.view_angle.as_mut(),
            ) else {
                continue;
            };

            match player.behavior {
                Behavior::Idle => {}
                Behavior::Active => {
                    position.x += rng.gen_range(-1.0..1.0) * RUN_SPEED * dt;
                    position.y += rng.gen_range(-1.0..1.0) * RUN_SPEED * dt;
                    angle.yaw = (angle.yaw + rng.gen_range(-30.0..30.0)).rem_euclid(360.0);
                }
                Behavior::Camper => {
                    position.x = player.spawn.x + rng.gen_range(-5.0..5.0);
                    position.y = player.spawn.y + rng.gen_range(-5.0..5.0);
                    angle.yaw = (angle.yaw + rng.gen_range(-10.0..10.0)).rem_euclid(360.0);
                    angle.pitch = rng.gen_range(-10.0..10.0);
                }
            }

            let velocity = &mut player.velocity;
            if velocity.x != 0.0 || velocity.y != 0.0 || velocity.z != 0.0 {
                position.x += velocity.x * dt;
                position.y += velocity.y * dt;
                position.z += velocity.z * dt;
                velocity.x *= VELOCITY_DECAY;
                velocity.y *= VELOCITY_DECAY;
                velocity.z -= GRAVITY * dt;
                if position.z <= 0.0 {
                    position.z = 0.0;
                    *velocity = Vector3::default();
                }
            }
        }
    }

    /// Host-side reaction to a scripted phase event. Returns the buy-zone
    /// notifications a real server would fire alongside it.
    pub fn on_phase(&mut self, event: &MatchEvent) -> Vec<MatchEvent> {
        match event {
            MatchEvent::RoundStarted => {
                for player in &mut self.players {
                    player.respawn();
                }
                self.players
                    .iter()
                    .filter(|p| p.snapshot.is_valid && p.snapshot.is_alive())
                    .map(|p| MatchEvent::EnteredBuyZone { player: p.snapshot.id })
                    .collect()
            }
            MatchEvent::FreezeTimeEnded => self
                .players
                .iter()
                .filter(|p| p.behavior != Behavior::Idle && p.snapshot.is_alive())
                .map(|p| MatchEvent::ExitedBuyZone { player: p.snapshot.id })
                .collect(),
            _ => Vec::new(),
        }
    }

    fn check(&self, action: &'static str, id: PlayerId) -> Result<(), ActionError> {
        if self.failing.contains(action) {
            return Err(ActionError::Rejected {
                action,
                player: id,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn live_player_mut(&mut self, id: PlayerId) -> Result<&mut SimPlayer, ActionError> {
        self.players
            .iter_mut()
            .find(|p| p.snapshot.id == id && p.snapshot.is_valid)
            .ok_or(ActionError::PlayerGone(id))
    }
}

impl Roster for SimulatedServer {
    fn players(&self) -> Vec<PlayerSnapshot> {
        self.players.iter().map(|p| p.snapshot.clone()).collect()
    }
}

impl Permissions for SimulatedServer {
    fn has_any(&self, id: PlayerId, flags: &[String]) -> bool {
        self.player(id)
            .is_some_and(|p| p.flags.iter().any(|held| flags.contains(held)))
    }
}

impl Localizer for SimulatedServer {
    fn render(&self, _recipient: Option<PlayerId>, key: &str, args: &[String]) -> String {
        let mut text = phrase(key).unwrap_or(key).to_string();
        for (index, arg) in args.iter().enumerate() {
            text = text.replace(&format!("{{{}}}", index), arg);
        }
        text
    }
}

impl Comms for SimulatedServer {
    fn send_chat(&mut self, id: PlayerId, text: &str) {
        debug!("chat -> {}: {}", id, text);
        self.chat_log.push((id, text.to_string()));
    }

    fn send_overlay(&mut self, id: PlayerId, text: &str, duration_ms: u32) {
        self.overlays.push((id, text.to_string(), duration_ms));
    }

    fn play_sound(&mut self, id: PlayerId, sound: &str) {
        self.sounds.push((id, sound.to_string()));
    }
}

impl Actions for SimulatedServer {
    fn kick(&mut self, id: PlayerId, reason: &str) -> Result<(), ActionError> {
        self.check("kick", id)?;
        self.live_player_mut(id)?;
        self.remove_player(id);
        info!("Player {} kicked: {}", id, reason);
        self.kicked.push((id, reason.to_string()));
        Ok(())
    }

    fn force_death(&mut self, id: PlayerId) -> Result<(), ActionError> {
        self.check("force_death", id)?;
        self.live_player_mut(id)?.remove_pawn();
        Ok(())
    }

    fn set_team(&mut self, id: PlayerId, team: Team) -> Result<(), ActionError> {
        self.check("set_team", id)?;
        let player = self.live_player_mut(id)?;
        player.snapshot.team = Some(team);
        if team.is_spectator() {
            player.remove_pawn();
        }
        Ok(())
    }

    fn transfer_item(&mut self, from: PlayerId, to: PlayerId, item: &str) -> Result<(), ActionError> {
        self.check("transfer_item", from)?;
        self.live_player_mut(to)?;

        let giver = self.live_player_mut(from)?;
        let Some(slot) = giver
            .snapshot
            .inventory
            .iter()
            .position(|held| held.eq_ignore_ascii_case(item))
        else {
            return Err(ActionError::Rejected {
                action: "transfer_item",
                player: from,
                reason: format!("{} not held", item),
            });
        };
        let taken = giver.snapshot.inventory.remove(slot);

        self.live_player_mut(to)?.snapshot.inventory.push(taken);
        Ok(())
    }

    fn apply_impulse(&mut self, id: PlayerId, delta: Vector3) -> Result<(), ActionError> {
        self.check("apply_impulse", id)?;
        let player = self.live_player_mut(id)?;
        if player.snapshot.position.is_none() {
            return Err(ActionError::NoPawn(id));
        }
        player.velocity.x += delta.x;
        player.velocity.y += delta.y;
        player.velocity.z += delta.z;
        Ok(())
    }

    fn set_health(&mut self, id: PlayerId, value: i32) -> Result<(), ActionError> {
        self.check("set_health", id)?;
        self.live_player_mut(id)?.snapshot.health = value;
        Ok(())
    }
}

/// English phrases for the keys the monitor renders.
fn phrase(key: &str) -> Option<&'static str> {
    let text = match key {
        "afk.warn" => "You seem to be AFK. Move or be punished ({0}/{1}).",
        "afk.warn.center" => "<font color='red'>AFK warning {0}/{1}</font>",
        "anticamp.warn" => "Stop camping! Warning {0}/{1}.",
        "anticamp.warn.center" => "<font color='orange'>Camping warning {0}/{1}</font>",
        "spec.warn" => "You have been spectating too long ({0}/{1}).",
        "spec.warn.center" => "<font color='yellow'>Spectator warning {0}/{1}</font>",
        "spec.kick.reason" => "Kicked for spectating too long",
        "afk.punish.kick.broadcast" => "{0} was kicked for being AFK.",
        "afk.punish.kick.reason" => "Kicked for being AFK",
        "afk.punish.kill.broadcast" => "{0} was slain for being AFK.",
        "afk.punish.spec.broadcast" => "{0} was moved to spectators for being AFK.",
        "bomb.transfer.broadcast" => "{0} received the bomb from AFK player {1}.",
        "bomb.transfer.receiver" => "You received the bomb from an AFK teammate.",
        "bomb.transfer.afk" => "Your bomb was handed to a teammate.",
        "anticamp.slay.self" => "You were slain for camping.",
        "anticamp.slap.self_damage" => "You were slapped for camping ({0} damage).",
        "anticamp.slap.self" => "You were slapped for camping.",
        _ => return None,
    };
    Some(text)
}

/// Round timeline used by the demo binary.
#[derive(Debug, Clone)]
pub struct MatchScript {
    pub warmup: Duration,
    pub round_length: Duration,
    pub freeze_time: Duration,
    /// Delay after freeze end before the bomb goes down, if at all.
    pub bomb_plant_after: Option<Duration>,
}

impl Default for MatchScript {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(10),
            round_length: Duration::from_secs(115),
            freeze_time: Duration::from_secs(15),
            bomb_plant_after: Some(Duration::from_secs(60)),
        }
    }
}

impl MatchScript {
    /// Events scheduled in `[from, to)`, in order.
    pub fn events_between(&self, from: Duration, to: Duration) -> Vec<MatchEvent> {
        let mut events = Vec::new();
        if from >= to {
            return events;
        }

        let in_window = |at: Duration| at >= from && at < to;
        if in_window(Duration::ZERO) {
            events.push(MatchEvent::WarmupStarted);
        }

        if to <= self.warmup || self.round_length.is_zero() {
            return events;
        }

        let first_round = from.saturating_sub(self.warmup).as_secs_f64() / self.round_length.as_secs_f64();
        let mut round = first_round.floor() as u32;
        loop {
            let start = self.warmup + self.round_length * round;
            if start >= to {
                break;
            }

            let mut timeline = vec![
                (start, MatchEvent::RoundStarted),
                (start + self.freeze_time, MatchEvent::FreezeTimeEnded),
            ];
            if let Some(delay) = self.bomb_plant_after {
                let planted = start + self.freeze_time + delay;
                let round_end = start + self.round_length;
                if planted < round_end {
                    timeline.push((planted, MatchEvent::BombPlanted));
                    timeline.push((round_end - Duration::from_secs(1), MatchEvent::BombExploded));
                }
            }

            events.extend(
                timeline
                    .into_iter()
                    .filter(|(at, _)| in_window(*at))
                    .map(|(_, event)| event),
            );
            round += 1;
        }

        events
    }
}
