//! Shared simulation model and the authoritative server side

pub mod command;
pub mod entity;
pub mod history;
pub mod physics;
pub mod registry;
pub mod simulator;
pub mod snapshot;
pub mod world;

pub use command::{Direction, DirectionSet, InputCommand};
pub use entity::{CommandInbox, Entity, EntityId};
pub use history::{History, PositionSnapshot, Stamped};
pub use physics::{EntityParams, Position, WorldBounds};
pub use registry::{ConnectTicket, Registry};
pub use simulator::{HistoryPruner, Simulator};
pub use world::{TickOutcome, World, WorldConfig};
