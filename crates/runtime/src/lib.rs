//! Runtime glue between the journal engine and the outside world: the
//! serialised journal service, the clock, the cron jobs and the collaborator
//! traits the interfaces implement.

pub mod clock;
pub mod indexer;
pub mod notifier;
pub mod scheduler;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock, parse_timezone};
pub use indexer::{CommandIndexer, Indexer, NoopIndexer, indexer_from_config};
pub use notifier::Notifier;
pub use scheduler::{JobKind, ScheduledJob, jobs_from_config, next_fire, run_job, spawn_jobs};
pub use service::{JournalService, ServiceError, parse_date_arg};
