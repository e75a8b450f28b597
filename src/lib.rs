pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod metrics;
pub mod store;
pub mod workflow;

pub use clock::{Clock, FixedClock, IdGenerator, SequentialIds, SystemClock, UuidV7Generator};
pub use config::MarketplaceConfig;
pub use error::{ErrorKind, MarketplaceError};
pub use store::{InMemoryStore, JournalSources, PostgresStore, Store};
pub use workflow::BiddingWorkflow;
