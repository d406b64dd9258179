//! Org-mode journal engine.
//!
//! The journal is a single outline document (`* 2024` / `** 2024-W11` /
//! `*** 2024-03-15 Friday`) or, in the daily layout, one file per day.  Every
//! operation is a fresh load → mutate → save cycle; nothing is cached.

pub mod daily;
pub mod error;
pub mod format;
pub mod journal;
pub mod outline;
pub mod query;
pub mod store;
pub mod upsert;

pub use error::{JournalError, Result};
pub use format::format_for_display;
pub use journal::{AppendReceipt, Journal};
pub use outline::{DayKeys, DayNode};
pub use query::{DayRef, anniversary_matches, day_node_exists, find_day, newest_day};
pub use store::DocumentStore;
pub use upsert::{Created, UpsertOutcome, upsert};

/// Generates a fresh Day node identifier.
pub fn new_day_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
