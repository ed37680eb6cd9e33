//! # Player Behavior Monitor
//!
//! This library watches the players of a running match and enforces three
//! behavior rules: idle (AFK) players, players camping in one spot, and
//! humans who sit on the spectator team for too long. Every rule works the
//! same way: warn at a fixed interval, then punish once the warning count
//! reaches the configured limit.
//!
//! ## Core Responsibilities
//!
//! ### AFK Detection
//! Compares each player's position and view angle against the previous
//! pass. A player whose pose never changes is warned, can have the bomb
//! handed to a teammate, and is finally kicked, killed or moved to the
//! spectator team.
//!
//! ### Anti-Camp
//! Tracks how long a player stays within a radius of where their current
//! window started. Campers are warned and then slapped or slain, after
//! which a new window begins.
//!
//! ### Spectator Timeout
//! Once the server holds enough players, humans on the spectator team are
//! warned and eventually kicked. Optionally only players the monitor itself
//! moved to spectators are affected.
//!
//! ## Architecture Design
//!
//! ### Host Abstraction
//! Everything the monitor needs from the game server sits behind the traits
//! in [`host`]: reading the roster, checking permissions, rendering
//! localized text, sending chat and overlays, and performing punishments.
//! [`sim::SimulatedServer`] implements them in memory for the demo binary
//! and the tests.
//!
//! ### Effects Instead of Calls
//! Detectors never touch the host. A pass reads an immutable roster and
//! returns a list of [`effects::Effect`]s which the [`monitor::Monitor`]
//! delivers afterwards. Anything that mutates a pawn (item transfers and
//! punishments) is queued and runs on the next simulation step, after the
//! player is looked up again by id.
//!
//! ### Single-Threaded Event Loop
//! A tokio interval task posts timer messages into a channel; the server
//! loop owns the host and the monitor and handles timer firings, match
//! events and simulation steps one at a time. No detector state is ever
//! shared across tasks.
//!
//! ## Module Organization
//!
//! ### Detectors (`afk`, `anticamp`, `spectator`)
//! One per rule, each owning a per-player state store from [`tracker`].
//!
//! ### Monitor (`monitor`)
//! Match phase flags, buy-zone membership, the tick pass and the deferred
//! task runner.
//!
//! ### Driver (`driver`)
//! The repeating timer, its generation counter and restart handling.
//!
//! ### Config (`config`)
//! The JSON settings file with its defaults, validation and derived values.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::MonitorConfig;
//! use server::driver::TickDriver;
//! use server::monitor::Monitor;
//! use server::sim::SimulatedServer;
//! use std::path::Path;
//! use std::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::from_file(Path::new("afk_manager.json"))?;
//!     let mut host = SimulatedServer::new();
//!     let (mut driver, mut fired) = TickDriver::new(Monitor::new());
//!     driver.start(&config);
//!
//!     while let Some(message) = fired.recv().await {
//!         driver.on_timer_fired(message, &mut host, &config, Instant::now());
//!         driver.step(&mut host, &config);
//!     }
//!     Ok(())
//! }
//! ```

pub mod afk;
pub mod anticamp;
pub mod config;
pub mod driver;
pub mod effects;
pub mod error;
pub mod host;
pub mod monitor;
pub mod sim;
pub mod spectator;
pub mod tracker;

pub use config::MonitorConfig;
pub use driver::{TickDriver, TimerFired};
pub use error::{ActionError, ConfigError};
pub use monitor::{Monitor, TickSummary};
