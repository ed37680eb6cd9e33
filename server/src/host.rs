//! Interfaces to the match server hosting the monitor.
//!
//! The monitor never touches the game's entity model directly. It reads a
//! roster snapshot, asks about permissions, renders localized text and
//! requests actions through these traits. A real deployment implements them
//! over the game server's API; [`crate::sim`] implements them in memory.

use crate::error::ActionError;
use shared::{PlayerId, PlayerSnapshot, Team, Vector3};

pub trait Roster {
    /// Every connected player, including invalid and fake clients.
    ///
    /// The data may be stale or partial; missing position or angle is
    /// reported as `None` rather than as an error.
    fn players(&self) -> Vec<PlayerSnapshot>;

    fn find(&self, id: PlayerId) -> Option<PlayerSnapshot> {
        self.players()
            .into_iter()
            .find(|player| player.is_valid && player.id == id)
    }
}

pub trait Permissions {
    /// True when the player holds at least one of `flags`.
    fn has_any(&self, id: PlayerId, flags: &[String]) -> bool;
}

pub trait Localizer {
    /// Renders `key` for `recipient`, or in the server language when `None`.
    fn render(&self, recipient: Option<PlayerId>, key: &str, args: &[String]) -> String;
}

pub trait Comms {
    fn send_chat(&mut self, id: PlayerId, text: &str);
    fn send_overlay(&mut self, id: PlayerId, text: &str, duration_ms: u32);
    fn play_sound(&mut self, id: PlayerId, sound: &str);
}

pub trait Actions {
    fn kick(&mut self, id: PlayerId, reason: &str) -> Result<(), ActionError>;
    fn force_death(&mut self, id: PlayerId) -> Result<(), ActionError>;
    fn set_team(&mut self, id: PlayerId, team: Team) -> Result<(), ActionError>;
    fn transfer_item(&mut self, from: PlayerId, to: PlayerId, item: &str)
        -> Result<(), ActionError>;
    fn apply_impulse(&mut self, id: PlayerId, delta: Vector3) -> Result<(), ActionError>;
    fn set_health(&mut self, id: PlayerId, value: i32) -> Result<(), ActionError>;
}

/// Everything the monitor needs from the hosting server.
pub trait Host: Roster + Permissions + Localizer + Comms + Actions {}

impl<T: Roster + Permissions + Localizer + Comms + Actions> Host for T {}
