//! Core data types and I/O operations.

pub mod channels;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use channels::{Meter, Valve, ValveSignal};
pub use loaders::{LoopData, SensorTable};
pub use writers::{write_buckets_csv, write_series_csv, WriteError};
