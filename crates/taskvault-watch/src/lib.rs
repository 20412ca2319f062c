//! Detection side of the pipeline: watching, stability, dedup, intake and
//! plan production.

pub mod dedup;
pub mod error;
pub mod intake;
pub mod planner;
pub mod producer;
pub mod shutdown;
pub mod stability;
pub mod watcher;

pub use dedup::{dedup_key, DedupGate};
pub use error::WatchError;
pub use intake::{run_intake, Intake};
pub use planner::{ChecklistPlanner, PlanProducer, Produced};
pub use producer::ProducerLoop;
pub use shutdown::ShutdownSignal;
pub use stability::{await_stable, StabilityDetector};
pub use watcher::{DirectoryWatcher, WatchEvent, WatchEventKind};
