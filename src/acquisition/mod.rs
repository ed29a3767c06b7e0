//! Sample acquisition
//!
//! Accepts readings from connected sensing devices, attributes them to the
//! active session, and tracks which devices are online.

pub mod ingestor;
pub mod registry;
pub mod stats;

pub use ingestor::{IngestOutcome, Ingestor};
pub use registry::DeviceRegistry;
pub use stats::{IngestStats, StatsSnapshot};
