//! Idle ("AFK") detection.
//!
//! A player is idle while their position (X/Y) and view angle (pitch/yaw)
//! stay bit-for-bit identical between passes. Any change at all counts as
//! activity. Idle players are warned once per warn interval; at the
//! configured count they are punished and forgotten.

use crate::effects::{Detector, DeferredTask, Effect};
use crate::monitor::TickContext;
use crate::tracker::{should_warn, StateStore, Upsert};
use log::debug;
use shared::{PlayerId, QAngle, Vector3};
use std::collections::HashSet;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AfkState {
    pub last_position: Vector3,
    pub last_angle: QAngle,
    pub last_move: Instant,
    pub last_look: Instant,
    pub last_activity: Instant,
    pub last_warn: Option<Instant>,
    pub warnings: u32,
    pub item_transferred: bool,
}

impl AfkState {
    pub fn new(position: Vector3, angle: QAngle, now: Instant) -> Self {
        Self {
            last_position: position,
            last_angle: angle,
            last_move: now,
            last_look: now,
            last_activity: now,
            last_warn: None,
            warnings: 0,
            item_transferred: false,
        }
    }

    pub fn is_still(&self, position: Vector3, angle: QAngle) -> bool {
        position.x == self.last_position.x
            && position.y == self.last_position.y
            && angle.pitch == self.last_angle.pitch
            && angle.yaw == self.last_angle.yaw
    }

    /// Moves the baseline to the current pose and forgets all warnings.
    pub fn rebaseline(&mut self, position: Vector3, angle: QAngle, now: Instant) {
        *self = AfkState::new(position, angle, now);
    }

    fn record_activity(&mut self, position: Vector3, angle: QAngle, now: Instant) {
        self.last_position = position;
        self.last_angle = angle;
        self.last_move = now;
        self.last_look = now;
        self.last_activity = self.last_move.max(self.last_look);
        self.last_warn = None;
        self.warnings = 0;
        self.item_transferred = false;
    }
}

#[derive(Debug, Default)]
pub struct AfkDetector {
    states: StateStore<AfkState>,
}

impl AfkDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one pass over the roster.
    ///
    /// While `suppressed` (freeze time, or warmup when configured) no
    /// warnings are issued; every eligible player is re-baselined instead,
    /// so time spent paused never counts toward idling.
    pub fn evaluate(
        &mut self,
        ctx: &TickContext<'_>,
        suppressed: bool,
        buy_zone: &HashSet<PlayerId>,
        out: &mut Vec<Effect>,
    ) {
        if suppressed {
            self.rebaseline_all(ctx);
            return;
        }

        let config = ctx.config;
        let interval = config.afk_warn_interval();
        let mut seen = HashSet::new();

        for player in ctx.roster {
            if !player.is_tracked_human() {
                continue;
            }

            let id = player.id;
            if player.team.is_some_and(|team| team.is_spectator()) {
                self.states.evict(id);
                continue;
            }

            seen.insert(id);

            if ctx.is_exempt(id, &config.afk_skip_flag) {
                self.states.evict(id);
                continue;
            }

            let Some((position, angle)) = player.pose() else {
                continue;
            };

            let state = match self
                .states
                .upsert(id, || AfkState::new(position, angle, ctx.now))
            {
                Upsert::Created => continue,
                Upsert::Existing(state) => state,
            };

            if !state.is_still(position, angle) {
                let had_warnings = state.warnings > 0;
                state.record_activity(position, angle, ctx.now);
                if had_warnings {
                    out.push(Effect::ClearOverlay { player: id });
                }
                continue;
            }

            if !should_warn(state.last_warn, state.last_activity, interval, ctx.now) {
                continue;
            }

            state.last_warn = Some(ctx.now);
            state.warnings += 1;
            let warnings = state.warnings;

            let transfer_due = !state.item_transferred
                && config.afk_transfer_after_warnings > 0
                && i64::from(warnings) >= i64::from(config.afk_transfer_after_warnings);
            if transfer_due
                && player.holds_item(&config.afk_transfer_item)
                && (!config.afk_transfer_only_from_buy_zone || buy_zone.contains(&id))
            {
                out.push(Effect::Defer(DeferredTask::TransferItem {
                    from: id,
                    item: config.afk_transfer_item.clone(),
                    only_from_buy_zone: config.afk_transfer_only_from_buy_zone,
                }));
            }

            out.push(Effect::Warn {
                player: id,
                detector: Detector::Afk,
                warnings,
                limit: config.afk_punish_after_warnings,
            });

            if i64::from(warnings) < i64::from(config.afk_punish_after_warnings) {
                continue;
            }

            out.push(Effect::Defer(DeferredTask::PunishIdle {
                player: id,
                punishment: config.afk_punishment,
            }));
            self.states.evict(id);
        }

        let removed = self.states.sweep(&seen);
        if removed > 0 {
            debug!("AFK tracking dropped {} departed players", removed);
        }
    }

    fn rebaseline_all(&mut self, ctx: &TickContext<'_>) {
        let mut seen = HashSet::new();

        for player in ctx.roster {
            if !player.is_tracked_human() {
                continue;
            }

            let id = player.id;
            if player.team.is_some_and(|team| team.is_spectator())
                || ctx.is_exempt(id, &ctx.config.afk_skip_flag)
            {
                self.states.evict(id);
                continue;
            }

            seen.insert(id);

            let Some((position, angle)) = player.pose() else {
                continue;
            };

            if let Upsert::Existing(state) = self
                .states
                .upsert(id, || AfkState::new(position, angle, ctx.now))
            {
                state.rebaseline(position, angle, ctx.now);
            }
        }

        self.states.sweep(&seen);
    }

    /// True while the player has at least one outstanding AFK warning.
    pub fn has_warnings(&self, id: PlayerId) -> bool {
        self.states.get(id).is_some_and(|state| state.warnings > 0)
    }

    /// Records a completed item transfer so it is not attempted again until
    /// the player becomes active.
    pub fn mark_item_transferred(&mut self, id: PlayerId) {
        if let Some(state) = self.states.get_mut(id) {
            state.item_transferred = true;
        }
    }

    pub fn state(&self, id: PlayerId) -> Option<&AfkState> {
        self.states.get(id)
    }

    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AfkPunishment, MonitorConfig};
    use crate::host::Permissions;
    use shared::{PlayerSnapshot, Team};
    use std::time::Duration;

    struct Flags(Vec<PlayerId>);

    impl Permissions for Flags {
        fn has_any(&self, id: PlayerId, _flags: &[String]) -> bool {
            self.0.contains(&id)
        }
    }

    fn player(raw: u64) -> PlayerSnapshot {
        let mut snapshot = PlayerSnapshot::new(PlayerId(raw), "idle", Team::Terrorist);
        snapshot.position = Some(Vector3::new(10.0, 20.0, 0.0));
        snapshot.view_angle = Some(QAngle::new(0.0, 90.0, 0.0));
        snapshot
    }

    fn secs(t0: Instant, s: u64) -> Instant {
        t0 + Duration::from_secs(s)
    }

    fn run(
        detector: &mut AfkDetector,
        roster: &[PlayerSnapshot],
        config: &MonitorConfig,
        now: Instant,
    ) -> Vec<Effect> {
        run_with(detector, roster, config, now, &Flags(vec![]), &HashSet::new())
    }

    fn run_with(
        detector: &mut AfkDetector,
        roster: &[PlayerSnapshot],
        config: &MonitorConfig,
        now: Instant,
        flags: &Flags,
        buy_zone: &HashSet<PlayerId>,
    ) -> Vec<Effect> {
        let ctx = TickContext {
            roster,
            permissions: flags,
            config,
            now,
        };
        let mut out = Vec::new();
        detector.evaluate(&ctx, false, buy_zone, &mut out);
        out
    }

    fn warnings(effects: &[Effect]) -> Vec<u32> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Warn { warnings, .. } => Some(*warnings),
                _ => None,
            })
            .collect()
    }

    fn punishments(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|effect| matches!(effect, Effect::Defer(DeferredTask::PunishIdle { .. })))
            .count()
    }

    #[test]
    fn test_first_sighting_only_creates_state() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();

        let out = run(&mut detector, &[player(1)], &config, t0);
        assert!(out.is_empty());
        assert_eq!(detector.tracked(), 1);
        assert!(!detector.has_warnings(PlayerId(1)));
    }

    #[test]
    fn test_warns_each_interval_then_punishes_once() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let roster = [player(1)];
        let t0 = Instant::now();

        run(&mut detector, &roster, &config, t0);
        assert!(run(&mut detector, &roster, &config, secs(t0, 4)).is_empty());

        let out = run(&mut detector, &roster, &config, secs(t0, 5));
        assert_eq!(warnings(&out), vec![1]);
        assert!(detector.has_warnings(PlayerId(1)));

        let out = run(&mut detector, &roster, &config, secs(t0, 10));
        assert_eq!(warnings(&out), vec![2]);
        assert_eq!(punishments(&out), 0);

        let out = run(&mut detector, &roster, &config, secs(t0, 15));
        assert_eq!(warnings(&out), vec![3]);
        assert_eq!(punishments(&out), 1);
        assert!(matches!(
            out.last(),
            Some(Effect::Defer(DeferredTask::PunishIdle {
                punishment: AfkPunishment::Spectator,
                ..
            }))
        ));
        assert!(detector.state(PlayerId(1)).is_none());
    }

    #[test]
    fn test_same_instant_twice_warns_once() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let roster = [player(1)];
        let t0 = Instant::now();

        run(&mut detector, &roster, &config, t0);
        assert_eq!(warnings(&run(&mut detector, &roster, &config, secs(t0, 5))), vec![1]);
        assert!(run(&mut detector, &roster, &config, secs(t0, 5)).is_empty());
        assert_eq!(detector.state(PlayerId(1)).unwrap().warnings, 1);
    }

    #[test]
    fn test_single_axis_change_resets_warnings() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();
        let mut roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        run(&mut detector, &roster, &config, secs(t0, 5));
        assert!(detector.has_warnings(PlayerId(1)));

        roster[0].view_angle = Some(QAngle::new(0.0, 90.001, 0.0));
        let out = run(&mut detector, &roster, &config, secs(t0, 6));
        assert_eq!(out, vec![Effect::ClearOverlay { player: PlayerId(1) }]);

        let state = detector.state(PlayerId(1)).unwrap();
        assert_eq!(state.warnings, 0);
        assert_eq!(state.last_warn, None);
        assert_eq!(state.last_activity, secs(t0, 6));

        roster[0].position = Some(Vector3::new(10.5, 20.0, 0.0));
        run(&mut detector, &roster, &config, secs(t0, 7));
        assert_eq!(detector.state(PlayerId(1)).unwrap().last_activity, secs(t0, 7));
    }

    #[test]
    fn test_height_and_roll_are_ignored() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();
        let mut roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        roster[0].position = Some(Vector3::new(10.0, 20.0, 64.0));
        roster[0].view_angle = Some(QAngle::new(0.0, 90.0, 15.0));

        let out = run(&mut detector, &roster, &config, secs(t0, 5));
        assert_eq!(warnings(&out), vec![1]);
    }

    #[test]
    fn test_spectators_bots_and_exempt_players_untracked() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();

        let mut spectator = player(1);
        spectator.team = Some(Team::Spectator);
        let mut bot = player(2);
        bot.is_fake_client = true;
        let admin = player(3);
        let roster = vec![spectator, bot, admin];
        let flags = Flags(vec![PlayerId(3)]);

        for s in [0, 5, 10, 15] {
            let out = run_with(&mut detector, &roster, &config, secs(t0, s), &flags, &HashSet::new());
            assert!(out.is_empty());
        }
        assert_eq!(detector.tracked(), 0);
    }

    #[test]
    fn test_switch_to_spectator_evicts() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();
        let mut roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        run(&mut detector, &roster, &config, secs(t0, 5));
        roster[0].team = Some(Team::Spectator);
        run(&mut detector, &roster, &config, secs(t0, 6));
        assert!(detector.state(PlayerId(1)).is_none());
    }

    #[test]
    fn test_missing_pose_keeps_state() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();
        let mut roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        run(&mut detector, &roster, &config, secs(t0, 5));
        roster[0].position = None;
        assert!(run(&mut detector, &roster, &config, secs(t0, 10)).is_empty());
        assert_eq!(detector.state(PlayerId(1)).unwrap().warnings, 1);
    }

    #[test]
    fn test_disconnected_player_swept() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();

        run(&mut detector, &[player(1), player(2)], &config, t0);
        assert_eq!(detector.tracked(), 2);
        run(&mut detector, &[player(2)], &config, secs(t0, 1));
        assert_eq!(detector.tracked(), 1);
        assert!(detector.state(PlayerId(1)).is_none());
    }

    #[test]
    fn test_suppression_rebaselines() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();
        let roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        run(&mut detector, &roster, &config, secs(t0, 5));
        assert!(detector.has_warnings(PlayerId(1)));

        let ctx = TickContext {
            roster: &roster,
            permissions: &Flags(vec![]),
            config: &config,
            now: secs(t0, 30),
        };
        let mut out = Vec::new();
        detector.evaluate(&ctx, true, &HashSet::new(), &mut out);
        assert!(out.is_empty());
        assert!(!detector.has_warnings(PlayerId(1)));
        assert_eq!(detector.state(PlayerId(1)).unwrap().last_activity, secs(t0, 30));

        // Time spent suppressed does not count.
        assert!(run(&mut detector, &roster, &config, secs(t0, 34)).is_empty());
        assert_eq!(warnings(&run(&mut detector, &roster, &config, secs(t0, 35))), vec![1]);
    }

    #[test]
    fn test_item_transfer_requested_in_buy_zone() {
        let mut detector = AfkDetector::new();
        let config = MonitorConfig::default();
        let t0 = Instant::now();
        let mut carrier = player(1);
        carrier.inventory.push("weapon_c4".to_string());
        let roster = vec![carrier];
        let buy_zone: HashSet<PlayerId> = [PlayerId(1)].into_iter().collect();
        let flags = Flags(vec![]);

        run_with(&mut detector, &roster, &config, t0, &flags, &buy_zone);
        let out = run_with(&mut detector, &roster, &config, secs(t0, 5), &flags, &buy_zone);
        assert!(matches!(
            out.first(),
            Some(Effect::Defer(DeferredTask::TransferItem { from: PlayerId(1), .. }))
        ));

        // Still requested on later warnings until the transfer is confirmed.
        let out = run_with(&mut detector, &roster, &config, secs(t0, 10), &flags, &buy_zone);
        assert!(matches!(out.first(), Some(Effect::Defer(DeferredTask::TransferItem { .. }))));

        detector.mark_item_transferred(PlayerId(1));
        let out = run_with(&mut detector, &roster, &config, secs(t0, 15), &flags, &buy_zone);
        assert!(!out
            .iter()
            .any(|effect| matches!(effect, Effect::Defer(DeferredTask::TransferItem { .. }))));
    }

    #[test]
    fn test_item_transfer_needs_buy_zone_when_configured() {
        let mut detector = AfkDetector::new();
        let mut config = MonitorConfig::default();
        config.afk_punish_after_warnings = 10;
        let t0 = Instant::now();
        let mut carrier = player(1);
        carrier.inventory.push("weapon_c4".to_string());
        let roster = vec![carrier];

        run(&mut detector, &roster, &config, t0);
        let out = run(&mut detector, &roster, &config, secs(t0, 5));
        assert_eq!(out.len(), 1);

        config.afk_transfer_only_from_buy_zone = false;
        let out = run(&mut detector, &roster, &config, secs(t0, 10));
        assert!(matches!(out.first(), Some(Effect::Defer(DeferredTask::TransferItem { .. }))));
    }

    #[test]
    fn test_no_transfer_without_item() {
        let mut detector = AfkDetector::new();
        let mut config = MonitorConfig::default();
        config.afk_transfer_only_from_buy_zone = false;
        let t0 = Instant::now();
        let roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        let out = run(&mut detector, &roster, &config, secs(t0, 5));
        assert_eq!(warnings(&out), vec![1]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_warn_interval_floor() {
        let mut detector = AfkDetector::new();
        let mut config = MonitorConfig::default();
        config.afk_warn_interval = 0.0;
        let t0 = Instant::now();
        let roster = vec![player(1)];

        run(&mut detector, &roster, &config, t0);
        assert!(run(&mut detector, &roster, &config, t0 + Duration::from_millis(500)).is_empty());
        assert_eq!(warnings(&run(&mut detector, &roster, &config, secs(t0, 1))), vec![1]);
    }
}
