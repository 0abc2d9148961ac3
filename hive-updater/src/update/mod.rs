//! Update coordination for player statistics.
//!
//! The update subsystem is responsible for:
//! - Merging asynchronously fetched player info and per-game-type records
//!   into one composite view per player
//! - Tracking registered consumers and the game types each one needs
//! - Deciding which consumers a fetch completion satisfies
//! - Rate limiting consumer invocations per player
//! - Routing every fetch and consumer failure through one error reporter

mod cache;
mod clock;
mod gate;
mod registry;
mod report;
mod service;
mod source;
mod stats;
mod types;

pub use cache::{CompositeCache, CompositeEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{DispatchGate, GateDecision};
pub use registry::{Consumer, ConsumerRegistry, FnConsumer, Registration, RegistrationId};
pub use report::{ErrorReporter, TracingReporter};
pub use service::{
    DispatchReport, MaintenanceReport, PlayerState, UpdateService, UpdateServiceConfig,
};
pub use source::FetchSource;
pub use stats::{UpdateStats, UpdateStatsSnapshot};
pub use types::{DataKind, FetchedRecord, PlayerUpdate};
