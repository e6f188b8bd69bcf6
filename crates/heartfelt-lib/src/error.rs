use thiserror::Error;

/// Configuration and asset failures. Data-quality problems never end up here;
/// they degrade to sentinel values instead.
#[derive(Debug, Error)]
pub enum HeartfeltError {
    #[error("invalid filter band: low {low} Hz, high {high} Hz (nyquist {nyquist} Hz)")]
    InvalidBand { low: f64, high: f64, nyquist: f64 },
    #[error("filter order must be at least 1")]
    InvalidOrder,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("scaler channel `{0}` is missing")]
    MissingScalerChannel(String),
    #[error("scaler channel `{channel}` has degenerate bounds [{min}, {max}]")]
    DegenerateScaler { channel: String, min: f64, max: f64 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON asset: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, HeartfeltError>;
