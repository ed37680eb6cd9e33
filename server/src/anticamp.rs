//! Camping detection.
//!
//! A player camps while they stay within `AntiCampRadius` of the point where
//! their current dwell window began. Aim is irrelevant. After a grace period
//! of one warn interval the player is warned every interval; at the
//! configured count they are slain or slapped and the window starts over.

use crate::effects::{Detector, DeferredTask, Effect};
use crate::monitor::TickContext;
use crate::tracker::{should_warn, StateStore, Upsert};
use log::debug;
use shared::{PlayerId, QAngle, Vector3};
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AntiCampState {
    pub last_position: Vector3,
    /// Refreshed every pass; no decision reads it.
    pub last_angle: QAngle,
    pub camp_start: Instant,
    pub last_warn: Option<Instant>,
    pub warnings: u32,
}

impl AntiCampState {
    pub fn new(position: Vector3, angle: QAngle, now: Instant) -> Self {
        Self {
            last_position: position,
            last_angle: angle,
            camp_start: now,
            last_warn: None,
            warnings: 0,
        }
    }

    fn restart_window(&mut self, now: Instant) {
        self.camp_start = now;
        self.last_warn = None;
        self.warnings = 0;
    }
}

#[derive(Debug, Default)]
pub struct AntiCampDetector {
    states: StateStore<AntiCampState>,
}

impl AntiCampDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one pass. `has_afk_warnings` hands players with outstanding AFK
    /// warnings to the AFK detector alone.
    pub fn evaluate(
        &mut self,
        ctx: &TickContext<'_>,
        bomb_planted: bool,
        has_afk_warnings: impl Fn(PlayerId) -> bool,
        out: &mut Vec<Effect>,
    ) {
        let config = ctx.config;
        if config.anti_camp_punish_after_warnings <= 0
            || (config.anti_camp_skip_bomb_planted && bomb_planted)
        {
            self.states.clear();
            return;
        }

        let interval = config.anti_camp_warn_interval();
        let radius_sq = config.anti_camp_radius_squared();
        let skip_team = config.anti_camp_skip_team();
        let mut seen = HashSet::new();

        for player in ctx.roster {
            if !player.is_tracked_human() {
                continue;
            }

            let id = player.id;
            let excluded = match player.team {
                None => true,
                Some(team) => team.is_spectator() || Some(team) == skip_team,
            };
            if excluded
                || ctx.is_exempt(id, &config.anti_camp_skip_flag)
                || has_afk_warnings(id)
            {
                self.states.evict(id);
                continue;
            }

            let Some((position, angle)) = player.pose() else {
                self.states.evict(id);
                continue;
            };

            seen.insert(id);

            let state = match self
                .states
                .upsert(id, || AntiCampState::new(position, angle, ctx.now))
            {
                Upsert::Created => continue,
                Upsert::Existing(state) => state,
            };

            if position.distance_squared(&state.last_position) > radius_sq {
                let had_warnings = state.warnings > 0;
                state.last_position = position;
                state.last_angle = angle;
                state.restart_window(ctx.now);
                if had_warnings {
                    out.push(Effect::ClearOverlay { player: id });
                }
                continue;
            }

            state.last_angle = angle;

            // Grace: the dwell must outlast one full interval first.
            if ctx.now.saturating_duration_since(state.camp_start) <= interval {
                continue;
            }

            if !should_warn(state.last_warn, state.camp_start, interval, ctx.now) {
                continue;
            }

            state.last_warn = Some(ctx.now);
            state.warnings += 1;

            out.push(Effect::Warn {
                player: id,
                detector: Detector::AntiCamp,
                warnings: state.warnings,
                limit: config.anti_camp_punish_after_warnings,
            });

            if i64::from(state.warnings) < i64::from(config.anti_camp_punish_after_warnings) {
                continue;
            }

            out.push(Effect::Defer(DeferredTask::PunishCamper {
                player: id,
                punishment: config.anti_camp_punishment,
                slap_damage: config.anti_camp_slap_damage,
            }));
            state.restart_window(ctx.now);
        }

        let removed = self.states.sweep(&seen);
        if removed > 0 {
            debug!("Anti-camp tracking dropped {} players", removed);
        }
    }

    pub fn state(&self, id: PlayerId) -> Option<&AntiCampState> {
        self.states.get(id)
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
