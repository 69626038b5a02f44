//! fairstake - Server-Authoritative Wagering Core
//!
//! Provably-fair multi-game backend: HMAC commit-reveal outcome
//! derivation, per-session state machines (real-time crash, turn-based
//! mines, instant dice), atomic wallet lock/release settlement over a
//! key-value store, and a pure verification surface.

pub mod api;
pub mod broadcast;
pub mod config;
pub mod errors;
pub mod games;
pub mod models;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use broadcast::{Broadcaster, ChannelBroadcaster, NoopBroadcaster};
pub use config::{EngineConfig, FairstakeConfig, StorageConfig};
pub use errors::{EngineError, EngineResult};
pub use games::{FairRng, GameEngine};
pub use store::KvStore;
