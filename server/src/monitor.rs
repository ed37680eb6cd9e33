//! The monitor: three detectors, the match phase and the deferred queue
//!
//! [`Monitor::tick`] runs one detector pass against the host's roster.
//! [`Monitor::run_deferred`] is called once per simulation step and executes
//! the item transfers and punishments queued by earlier passes. Match events
//! only flip phase flags or buy-zone membership; they never trigger a pass
//! themselves.

use crate::afk::AfkDetector;
use crate::anticamp::AntiCampDetector;
use crate::config::{AfkPunishment, CampPunishment, MonitorConfig};
use crate::effects::{self, DeferredQueue, DeferredTask, Effect};
use crate::error::ActionError;
use crate::host::{Host, Permissions};
use crate::spectator::SpectatorDetector;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{MatchEvent, PlayerId, PlayerSnapshot, Team, Vector3};
use std::collections::HashSet;
use std::time::Instant;

/// Match-phase flags, updated only by [`MatchEvent`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchPhase {
    pub is_warmup: bool,
    pub in_freeze_time: bool,
    pub bomb_planted: bool,
}

impl MatchPhase {
    /// Whether AFK and anti-camp checks are paused this tick.
    pub fn suppresses_checks(&self, config: &MonitorConfig) -> bool {
        self.in_freeze_time || (config.skip_warmup && self.is_warmup)
    }
}

/// Read-only inputs shared by all detectors during one pass.
pub struct TickContext<'a> {
    pub roster: &'a [PlayerSnapshot],
    pub permissions: &'a dyn Permissions,
    pub config: &'a MonitorConfig,
    pub now: Instant,
}

impl TickContext<'_> {
    /// True when the player holds any of `flags`. An empty list exempts
    /// nobody.
    pub fn is_exempt(&self, id: PlayerId, flags: &[String]) -> bool {
        !flags.is_empty() && self.permissions.has_any(id, flags)
    }
}

/// Counts of what one pass produced, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub warnings: usize,
    pub deferred: usize,
    pub kicks: usize,
    pub suppressed: bool,
}

pub struct Monitor {
    phase: MatchPhase,
    buy_zone: HashSet<PlayerId>,
    afk: AfkDetector,
    anti_camp: AntiCampDetector,
    spectators: SpectatorDetector,
    deferred: DeferredQueue,
    rng: StdRng,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Monitor with a fixed seed for the slap impulse and transfer receiver.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            phase: MatchPhase::default(),
            buy_zone: HashSet::new(),
            afk: AfkDetector::new(),
            anti_camp: AntiCampDetector::new(),
            spectators: SpectatorDetector::new(),
            deferred: DeferredQueue::new(),
            rng,
        }
    }

    pub fn handle_event(&mut self, event: &MatchEvent) {
        match event {
            MatchEvent::WarmupStarted => self.phase.is_warmup = true,
            MatchEvent::RoundStarted => {
                self.phase.in_freeze_time = true;
                self.phase.is_warmup = false;
            }
            MatchEvent::FreezeTimeEnded => self.phase.in_freeze_time = false,
            MatchEvent::BombPlanted => self.phase.bomb_planted = true,
            MatchEvent::BombDefused | MatchEvent::BombExploded => {
                self.phase.bomb_planted = false
            }
            MatchEvent::EnteredBuyZone { player } => {
                self.buy_zone.insert(*player);
            }
            MatchEvent::ExitedBuyZone { player } => {
                self.buy_zone.remove(player);
            }
            MatchEvent::MapChanged => {}
        }
    }

    /// Runs AFK, then anti-camp (unless suppressed), then spectator checks,
    /// and delivers the resulting effects.
    pub fn tick<H: Host>(&mut self, host: &mut H, config: &MonitorConfig, now: Instant) -> TickSummary {
        let roster = host.players();
        let suppressed = self.phase.suppresses_checks(config);
        let mut out = Vec::new();

        {
            let ctx = TickContext {
                roster: &roster,
                permissions: &*host,
                config,
                now,
            };

            self.afk.evaluate(&ctx, suppressed, &self.buy_zone, &mut out);

            if suppressed {
                // Paused time never counts toward a dwell window.
                self.anti_camp.clear();
            } else {
                let afk = &self.afk;
                self.anti_camp.evaluate(
                    &ctx,
                    self.phase.bomb_planted,
                    |id| afk.has_warnings(id),
                    &mut out,
                );
            }

            self.spectators.evaluate(&ctx, &mut out);
        }

        let mut summary = TickSummary {
            suppressed,
            ..TickSummary::default()
        };
        for effect in out {
            match &effect {
                Effect::Warn { .. } => summary.warnings += 1,
                Effect::Defer(_) => summary.deferred += 1,
                Effect::Kick { .. } => summary.kicks += 1,
                Effect::ClearOverlay { .. } => {}
            }
            effects::apply(effect, host, config, &mut self.deferred);
        }

        debug!(
            "Monitor pass: {} players, {} warnings, {} deferred, {} kicks{}",
            roster.len(),
            summary.warnings,
            summary.deferred,
            summary.kicks,
            if suppressed { " (suppressed)" } else { "" }
        );
        summary
    }

    /// Executes the tasks queued before this call. Returns how many ran.
    pub fn run_deferred<H: Host>(&mut self, host: &mut H, config: &MonitorConfig) -> usize {
        let tasks = self.deferred.take_ready();
        let count = tasks.len();

        for task in tasks {
            match task {
                DeferredTask::TransferItem {
                    from,
                    item,
                    only_from_buy_zone,
                } => self.transfer_item(host, config, from, &item, only_from_buy_zone),
                DeferredTask::PunishIdle { player, punishment } => {
                    self.punish_idle(host, config, player, punishment)
                }
                DeferredTask::PunishCamper {
                    player,
                    punishment,
                    slap_damage,
                } => self.punish_camper(host, config, player, punishment, slap_damage),
            }
        }

        count
    }

    fn transfer_item<H: Host>(
        &mut self,
        host: &mut H,
        config: &MonitorConfig,
        from: PlayerId,
        item: &str,
        only_from_buy_zone: bool,
    ) {
        let roster = host.players();
        let Some(carrier) = roster.iter().find(|p| p.is_valid && p.id == from) else {
            debug!("Skipping item transfer: player {} is gone", from);
            return;
        };

        if carrier.position.is_none()
            || (only_from_buy_zone && !self.buy_zone.contains(&from))
            || !carrier.holds_item(item)
        {
            return;
        }

        let receivers: Vec<&PlayerSnapshot> = roster
            .iter()
            .filter(|p| {
                p.is_valid
                    && p.is_alive()
                    && p.id != from
                    && p.team.is_some()
                    && p.team == carrier.team
            })
            .collect();
        let Some(receiver) = receivers.choose(&mut self.rng).copied() else {
            return;
        };

        if let Err(e) = host.transfer_item(from, receiver.id, item) {
            error!("Failed to transfer {} from player {}: {}", item, from, e);
            return;
        }

        self.afk.mark_item_transferred(from);
        info!(
            "Transferred {} from idle player {} to {}",
            item, from, receiver.id
        );

        let names = [receiver.display_name(), carrier.display_name()];
        effects::broadcast(host, config, "bomb.transfer.broadcast", &names);
        effects::tell(host, config, receiver.id, "bomb.transfer.receiver", &[]);
        effects::tell(host, config, from, "bomb.transfer.afk", &[]);
    }

    fn punish_idle<H: Host>(
        &mut self,
        host: &mut H,
        config: &MonitorConfig,
        id: PlayerId,
        punishment: AfkPunishment,
    ) {
        let Some(player) = host.find(id) else {
            debug!("Skipping AFK punishment: player {} is gone", id);
            return;
        };
        let name = [player.display_name()];

        let result = match punishment {
            AfkPunishment::Kick => {
                effects::broadcast(host, config, "afk.punish.kick.broadcast", &name);
                let reason = host.render(None, "afk.punish.kick.reason", &[]);
                host.kick(id, &reason)
            }
            AfkPunishment::Kill => {
                effects::broadcast(host, config, "afk.punish.kill.broadcast", &name);
                host.force_death(id)
            }
            AfkPunishment::Spectator => {
                effects::broadcast(host, config, "afk.punish.spec.broadcast", &name);
                host.set_team(id, Team::Spectator).map(|()| {
                    self.spectators.mark_moved_by_plugin(id);
                })
            }
        };

        match result {
            Ok(()) => info!("Punished idle player {} ({})", id, punishment),
            Err(e) => error!("Failed to punish idle player {} ({}): {}", id, punishment, e),
        }
    }

    fn punish_camper<H: Host>(
        &mut self,
        host: &mut H,
        config: &MonitorConfig,
        id: PlayerId,
        punishment: CampPunishment,
        slap_damage: i32,
    ) {
        let Some(player) = host.find(id) else {
            debug!("Skipping anti-camp punishment: player {} is gone", id);
            return;
        };

        let result = match punishment {
            CampPunishment::Slay => host.force_death(id),
            CampPunishment::Slap => self.slap(host, config, &player, slap_damage),
        };

        match result {
            Ok(()) => info!("Punished camping player {} ({})", id, punishment),
            Err(e) => error!("Failed to {} player {}: {}", punishment, id, e),
        }
    }

    /// Damages the player (killing them if the damage is lethal) and knocks
    /// them in a random direction.
    fn slap<H: Host>(
        &mut self,
        host: &mut H,
        config: &MonitorConfig,
        player: &PlayerSnapshot,
        damage: i32,
    ) -> Result<(), ActionError> {
        let id = player.id;
        if !player.is_alive() {
            return Ok(());
        }

        if damage > 0 {
            let remaining = player.health.saturating_sub(damage);
            host.set_health(id, remaining)?;
            if remaining <= 0 {
                host.force_death(id)?;
                effects::tell(host, config, id, "anticamp.slay.self", &[]);
                return Ok(());
            }
        }

        if player.position.is_none() {
            warn!("Cannot slap player {}: no position", id);
            return Err(ActionError::NoPawn(id));
        }

        host.apply_impulse(id, slap_impulse(&mut self.rng))?;

        if damage > 0 {
            effects::tell(host, config, id, "anticamp.slap.self_damage", &[damage.to_string()]);
        } else {
            effects::tell(host, config, id, "anticamp.slap.self", &[]);
        }
        Ok(())
    }

    /// Forgets all per-player tracking. Queued tasks still run.
    pub fn reset_tracking(&mut self) {
        self.afk.clear();
        self.anti_camp.clear();
        self.spectators.clear();
    }

    /// Forgets all tracking and drops queued tasks.
    pub fn clear(&mut self) {
        self.reset_tracking();
        self.deferred.clear();
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn in_buy_zone(&self, id: PlayerId) -> bool {
        self.buy_zone.contains(&id)
    }

    pub fn afk(&self) -> &AfkDetector {
        &self.afk
    }

    pub fn anti_camp(&self) -> &AntiCampDetector {
        &self.anti_camp
    }

    pub fn spectators(&self) -> &SpectatorDetector {
        &self.spectators
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }
}

/// Random knock: 50..230 units/s each way horizontally, 100..300 up.
pub fn slap_impulse<R: Rng>(rng: &mut R) -> Vector3 {
    let horizontal = |rng: &mut R| {
        let magnitude = rng.gen_range(50..230) as f32;
        if rng.gen_bool(0.5) {
            -magnitude
        } else {
            magnitude
        }
    };
    let x = horizontal(rng);
    let y = horizontal(rng);
    let z = rng.gen_range(100..300) as f32;
    Vector3::new(x, y, z)
}
