use crate::error::{HeartfeltError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Channels with min-max bounds in the scaler asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Ppg,
    Vpg,
    Apg,
    Abp,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Ppg, Channel::Vpg, Channel::Apg, Channel::Abp];

    pub fn name(&self) -> &'static str {
        match self {
            Channel::Ppg => "ppg",
            Channel::Vpg => "vpg",
            Channel::Apg => "apg",
            Channel::Abp => "abp",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Read-only min-max scaler shared by every window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    ppg: Bounds,
    vpg: Bounds,
    apg: Bounds,
    abp: Bounds,
}

impl Scaler {
    pub fn new(ppg: Bounds, vpg: Bounds, apg: Bounds, abp: Bounds) -> Result<Self> {
        let scaler = Self { ppg, vpg, apg, abp };
        for channel in Channel::ALL {
            let b = scaler.bounds(channel);
            if !(b.max > b.min) || !b.span().is_finite() {
                return Err(HeartfeltError::DegenerateScaler {
                    channel: channel.to_string(),
                    min: b.min,
                    max: b.max,
                });
            }
        }
        Ok(scaler)
    }

    /// Parse the asset form `{"ppg": [min, max], "vpg": [...], "apg": [...], "abp": [...]}`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: BTreeMap<String, [f64; 2]> = serde_json::from_str(text)?;
        let get = |channel: Channel| -> Result<Bounds> {
            raw.get(channel.name())
                .map(|&[min, max]| Bounds { min, max })
                .ok_or_else(|| HeartfeltError::MissingScalerChannel(channel.to_string()))
        };
        Self::new(
            get(Channel::Ppg)?,
            get(Channel::Vpg)?,
            get(Channel::Apg)?,
            get(Channel::Abp)?,
        )
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| HeartfeltError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn bounds(&self, channel: Channel) -> Bounds {
        match channel {
            Channel::Ppg => self.ppg,
            Channel::Vpg => self.vpg,
            Channel::Apg => self.apg,
            Channel::Abp => self.abp,
        }
    }

    /// `(x - min) / (max - min)`
    pub fn normalize(&self, channel: Channel, data: &[f64]) -> Vec<f64> {
        let b = self.bounds(channel);
        data.iter().map(|x| (x - b.min) / b.span()).collect()
    }

    /// `x * (max - min) + min`
    pub fn denormalize(&self, channel: Channel, data: &[f64]) -> Vec<f64> {
        let b = self.bounds(channel);
        data.iter().map(|x| x * b.span() + b.min).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET: &str = r#"{
        "ppg": [-2.0, 2.0],
        "vpg": [-0.5, 0.5],
        "apg": [-0.1, 0.1],
        "abp": [20.0, 220.0]
    }"#;

    #[test]
    fn normalizes_and_restores() {
        let scaler = Scaler::from_json_str(ASSET).unwrap();
        let scaled = scaler.normalize(Channel::Ppg, &[-2.0, 0.0, 2.0]);
        assert_eq!(scaled, vec![0.0, 0.5, 1.0]);
        let abp = scaler.denormalize(Channel::Abp, &[0.0, 0.5, 1.0]);
        assert_eq!(abp, vec![20.0, 120.0, 220.0]);
    }

    #[test]
    fn missing_channel_is_reported() {
        let err = Scaler::from_json_str(r#"{"ppg": [0.0, 1.0]}"#).unwrap_err();
        assert!(matches!(err, HeartfeltError::MissingScalerChannel(ref c) if c == "vpg"));
    }

    #[test]
    fn degenerate_bounds_are_rejected() {
        let text = ASSET.replace("[20.0, 220.0]", "[5.0, 5.0]");
        let err = Scaler::from_json_str(&text).unwrap_err();
        assert!(matches!(err, HeartfeltError::DegenerateScaler { .. }));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, ASSET).unwrap();
        let scaler = Scaler::from_json_file(&path).unwrap();
        assert_eq!(scaler.bounds(Channel::Vpg), Bounds { min: -0.5, max: 0.5 });
    }
}
