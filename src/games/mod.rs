pub mod engine;
pub mod fair;
pub mod settlement;
pub mod types;

pub use engine::GameEngine;
pub use fair::FairRng;
pub use types::*;
