use serde::{Deserialize, Serialize};
use std::fmt;

/// Team number the host uses for observers.
pub const SPECTATOR_TEAM_NUMBER: u8 = 1;
pub const DEFAULT_RESTRICTED_ITEM: &str = "weapon_c4";
pub const DEFAULT_OVERLAY_MS: u32 = 1500;

/// Stable 64-bit player identity (Steam-style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    Unassigned,
    Spectator,
    Terrorist,
    CounterTerrorist,
}

impl Team {
    pub fn from_number(number: u8) -> Option<Team> {
        match number {
            0 => Some(Team::Unassigned),
            1 => Some(Team::Spectator),
            2 => Some(Team::Terrorist),
            3 => Some(Team::CounterTerrorist),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Team::Unassigned => 0,
            Team::Spectator => SPECTATOR_TEAM_NUMBER,
            Team::Terrorist => 2,
            Team::CounterTerrorist => 3,
        }
    }

    pub fn is_spectator(self) -> bool {
        self == Team::Spectator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Vector3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// View angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QAngle {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl QAngle {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }
}

/// One player as seen by the host at the moment the roster was read.
///
/// Position and view angle are optional because the host may not have a
/// pawn for the player this tick (dead, connecting, mid-respawn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub is_valid: bool,
    pub is_fake_client: bool,
    pub team: Option<Team>,
    pub position: Option<Vector3>,
    pub view_angle: Option<QAngle>,
    pub health: i32,
    pub inventory: Vec<String>,
}

impl PlayerSnapshot {
    pub fn new(id: PlayerId, name: &str, team: Team) -> Self {
        Self {
            id,
            name: name.to_string(),
            is_valid: true,
            is_fake_client: false,
            team: Some(team),
            position: Some(Vector3::default()),
            view_angle: Some(QAngle::default()),
            health: 100,
            inventory: Vec::new(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Whether this player is a connected human.
    pub fn is_tracked_human(&self) -> bool {
        self.is_valid && !self.is_fake_client
    }

    pub fn holds_item(&self, item: &str) -> bool {
        self.inventory.iter().any(|held| held.eq_ignore_ascii_case(item))
    }

    /// Name used in chat lines; falls back to the id when blank.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }

    pub fn pose(&self) -> Option<(Vector3, QAngle)> {
        match (self.position, self.view_angle) {
            (Some(position), Some(angle)) => Some((position, angle)),
            _ => None,
        }
    }
}

/// Fire-and-forget match notifications from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatchEvent {
    WarmupStarted,
    RoundStarted,
    FreezeTimeEnded,
    BombPlanted,
    BombDefused,
    BombExploded,
    EnteredBuyZone { player: PlayerId },
    ExitedBuyZone { player: PlayerId },
    MapChanged,
}
