pub mod config;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod ports;
pub mod scaler;
pub mod signal;

pub use config::*;
pub use detectors::*;
pub use error::{HeartfeltError, Result};
pub use metrics::*;
pub use pipeline::*;
pub use signal::*;
