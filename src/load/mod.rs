//! Load injection against the service
//!
//! - `LoadInjector` runs N tasks until an `EndCondition` holds
//! - `WriteRecord` / `KeyScheme` make sequential writes self-verifying
//! - `StopFlag` is the cooperative cancellation signal

mod injector;
mod record;
mod stop;

pub use injector::{LoadInjector, TaskTally, Workload};
pub use record::{decode_index, KeyScheme, WriteRecord};
pub use stop::{EndCondition, StopFlag};
