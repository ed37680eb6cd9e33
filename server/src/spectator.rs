//! Spectator timeout.
//!
//! Once enough players are online, humans parked on the observer team are
//! warned every `SpecWarnInterval` and kicked after `SpecKickAfterWarnings`.
//! Optionally only players the monitor itself moved to spectators are
//! affected.

use crate::effects::{Detector, Effect};
use crate::monitor::TickContext;
use crate::tracker::{should_warn, StateStore, Upsert};
use log::debug;
use shared::PlayerId;
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SpecState {
    pub entered: Instant,
    pub last_warn: Option<Instant>,
    pub warnings: u32,
}

impl SpecState {
    pub fn new(now: Instant) -> Self {
        Self {
            entered: now,
            last_warn: None,
            warnings: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct SpectatorDetector {
    states: StateStore<SpecState>,
    moved_by_plugin: HashSet<PlayerId>,
}

impl SpectatorDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remembers that an AFK punishment put this player on the observer team.
    pub fn mark_moved_by_plugin(&mut self, id: PlayerId) {
        self.moved_by_plugin.insert(id);
    }

    pub fn was_moved_by_plugin(&self, id: PlayerId) -> bool {
        self.moved_by_plugin.contains(&id)
    }

    pub fn evaluate(&mut self, ctx: &TickContext<'_>, out: &mut Vec<Effect>) {
        let config = ctx.config;
        let online = ctx.roster.iter().filter(|player| player.is_valid).count();
        if (online as i64) < i64::from(config.spec_kick_min_players) {
            self.states.clear();
            return;
        }

        let interval = config.spec_warn_interval();
        let mut seen = HashSet::new();

        for player in ctx.roster {
            if !player.is_tracked_human() {
                continue;
            }

            let id = player.id;
            if ctx.is_exempt(id, &config.spec_skip_flag) {
                self.states.evict(id);
                continue;
            }

            if !player.team.is_some_and(|team| team.is_spectator()) {
                if self.states.evict(id).is_some() {
                    out.push(Effect::ClearOverlay { player: id });
                }
                self.moved_by_plugin.remove(&id);
                continue;
            }

            if config.spec_kick_only_moved_by_plugin && !self.moved_by_plugin.contains(&id) {
                if self.states.evict(id).is_some() {
                    out.push(Effect::ClearOverlay { player: id });
                }
                continue;
            }

            seen.insert(id);

            let state = match self.states.upsert(id, || SpecState::new(ctx.now)) {
                Upsert::Created => continue,
                Upsert::Existing(state) => state,
            };

            if !should_warn(state.last_warn, state.entered, interval, ctx.now) {
                continue;
            }

            state.last_warn = Some(ctx.now);
            state.warnings += 1;
            let warnings = state.warnings;

            out.push(Effect::Warn {
                player: id,
                detector: Detector::Spectator,
                warnings,
                limit: config.spec_kick_after_warnings,
            });

            if i64::from(warnings) < i64::from(config.spec_kick_after_warnings) {
                continue;
            }

            out.push(Effect::Kick {
                player: id,
                reason_key: "spec.kick.reason",
            });
            self.states.evict(id);
            self.moved_by_plugin.remove(&id);
        }

        let removed = self.states.sweep(&seen);
        if removed > 0 {
            debug!("Spectator tracking dropped {} players", removed);
        }
    }

    pub fn state(&self, id: PlayerId) -> Option<&SpecState> {
        self.states.get(id)
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.moved_by_plugin.clear();
    }
}
