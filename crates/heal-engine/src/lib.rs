//! Bounded self-healing
//!
//! When a step fails, the engine runs up to `max_heal_rounds` rounds of
//! reveal (make the target actionable), reprobe (rediscover with a relaxed
//! ladder, biased by learned priors), and stabilize (regate with relaxed
//! thresholds). Loop guards force an exit when discovery dries up or the
//! reprobe stops producing new selectors.

pub mod blocked;
pub mod engine;
pub mod history;
pub mod reveal;

pub use blocked::{detect_blocked, BlockedSignal};
pub use engine::{HealEngine, HealRoundReport};
pub use history::{HealHistory, NoopHealHistory, SqliteHealHistory, StrategyStat};
pub use reveal::Revealer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealError {
    #[error("heal history store error: {0}")]
    History(String),
}

impl From<rusqlite::Error> for HealError {
    fn from(err: rusqlite::Error) -> Self {
        HealError::History(err.to_string())
    }
}
