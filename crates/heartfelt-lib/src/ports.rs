//! Storage and inference seams around the window pipeline.

use crate::config::ValidationConfig;
use crate::pipeline::{
    estimate_pressure, validate_window, InferenceRequest, PressureEstimate, WindowReport,
};
use crate::scaler::Scaler;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

/// Source of raw windows and sink for results, keyed by sample id.
pub trait SampleStore {
    fn load_window(&self, id: &str) -> Result<Vec<f64>>;
    fn save_report(&mut self, id: &str, report: &WindowReport) -> Result<()>;
    fn save_pressure(&mut self, id: &str, estimate: &PressureEstimate) -> Result<()>;
}

/// Remote model turning normalised PPG/VPG/APG into a normalised ABP waveform.
pub trait InferenceClient {
    fn predict(&self, request: &InferenceRequest) -> Result<Vec<f64>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub windows: HashMap<String, Vec<f64>>,
    pub reports: HashMap<String, WindowReport>,
    pub pressures: HashMap<String, PressureEstimate>,
}

impl MemoryStore {
    pub fn insert_window(&mut self, id: impl Into<String>, samples: Vec<f64>) {
        self.windows.insert(id.into(), samples);
    }
}

impl SampleStore for MemoryStore {
    fn load_window(&self, id: &str) -> Result<Vec<f64>> {
        self.windows
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no window stored for sample {id}"))
    }

    fn save_report(&mut self, id: &str, report: &WindowReport) -> Result<()> {
        self.reports.insert(id.to_string(), report.clone());
        Ok(())
    }

    fn save_pressure(&mut self, id: &str, estimate: &PressureEstimate) -> Result<()> {
        self.pressures.insert(id.to_string(), estimate.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SampleOutcome {
    pub report: WindowReport,
    /// Present only when the window was valid and inference ran.
    pub pressure: Option<PressureEstimate>,
}

/// Validate stored windows and, for valid ones, estimate blood pressure.
pub struct Pipeline<S, I> {
    store: S,
    inference: I,
    config: ValidationConfig,
    scaler: Scaler,
}

impl<S: SampleStore, I: InferenceClient> Pipeline<S, I> {
    pub fn new(store: S, inference: I, config: ValidationConfig, scaler: Scaler) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            inference,
            config,
            scaler,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn process(&mut self, id: &str) -> Result<SampleOutcome> {
        let raw = self
            .store
            .load_window(id)
            .with_context(|| format!("loading sample {id}"))?;
        let report = validate_window(&raw, &self.config, Some(&self.scaler))?;
        self.store.save_report(id, &report)?;

        let scaled = match (&report.scaled, report.is_valid()) {
            (Some(scaled), true) => scaled,
            _ => {
                log::info!("sample {id} rejected, skipping inference");
                return Ok(SampleOutcome {
                    report,
                    pressure: None,
                });
            }
        };

        let request = InferenceRequest::from_scaled(scaled, self.config.win_len);
        let prediction = self
            .inference
            .predict(&request)
            .with_context(|| format!("inference for sample {id}"))?;
        if prediction.len() != self.config.win_len {
            log::warn!(
                "sample {id}: prediction has {} samples, expected {}",
                prediction.len(),
                self.config.win_len
            );
        }
        let pressure = estimate_pressure(
            &prediction,
            &self.scaler,
            self.config.fs,
            &self.config.peak_detector(),
        );
        self.store.save_pressure(id, &pressure)?;
        log::info!(
            "sample {id}: sbp {:.1} dbp {:.1}",
            pressure.systolic,
            pressure.diastolic
        );
        Ok(SampleOutcome {
            report,
            pressure: Some(pressure),
        })
    }
}
