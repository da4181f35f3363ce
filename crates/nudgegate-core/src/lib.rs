//! # Nudgegate Core Library
//!
//! Core business logic for Nudgegate, the safety-and-personalization
//! pipeline that gates machine-generated intervention suggestions before
//! they reach a user. The library is CLI-first: every operation is
//! available through the `nudgegate-cli` binary, and any transport layer
//! is a thin shell over the same calls.
//!
//! ## Architecture
//!
//! - **Decision Gateway**: admission-control state machine enforcing
//!   per-mode point budgets, hourly/daily caps, a cooldown clock, and
//!   hard safety rules; budgets replenish lazily from elapsed time
//! - **Focus Monitor**: rolling-window state machine over frontmost-app
//!   snapshots producing switch-count / no-progress / focus-duration
//!   enrichment signals
//! - **Preference Memory**: confidence-decaying profile store fed by
//!   user feedback on past decisions
//! - **Storage**: one SQLite database behind all three subsystems
//!
//! ## Key Components
//!
//! - [`Gateway`]: evaluates candidate actions, owns all budget state
//! - [`FocusMonitor`]: sequential poll loop plus concurrent read accessors
//! - [`MemoryService`]: feedback processing and decayed summaries
//! - [`Database`]: schema and typed accessors

pub mod enrich;
pub mod error;
pub mod focus;
pub mod gateway;
pub mod memory;
pub mod model;
pub mod settings;
pub mod storage;

pub use enrich::{enrich_context, should_auto_suggest, AutoSuggestGate};
pub use error::{CoreError, DatabaseError, FocusError, Result, ValidationError};
pub use focus::{FocusMonitor, SnapshotProvider};
pub use gateway::{Gateway, GatewayConfig, GatewayStatus};
pub use memory::MemoryService;
pub use model::{
    Action, ActionType, Context, DecisionOutcome, DecisionRecord, FocusState, GatewayDecision,
    Mode, ReasonCode, RiskLevel,
};
pub use storage::{Database, SettingsStore};
