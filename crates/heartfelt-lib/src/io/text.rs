use anyhow::{Context, Result};
use std::path::Path;

/// Parse a sample series: either a JSON array (`null` entries read as NaN) or
/// newline-delimited values, ignoring blank/comment lines.
pub fn parse_f64_series(text: &str) -> Result<Vec<f64>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let values: Vec<Option<f64>> =
            serde_json::from_str(trimmed).context("parsing JSON sample array")?;
        let out: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
        if out.is_empty() {
            anyhow::bail!("no numeric samples found");
        }
        return Ok(out);
    }

    let mut out = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let val: f64 = trimmed
            .parse()
            .with_context(|| format!("line {} is not f64: {}", idx + 1, trimmed))?;
        out.push(val);
    }
    if out.is_empty() {
        anyhow::bail!("no numeric samples found");
    }
    Ok(out)
}

/// Read a sample series from disk.
pub fn read_f64_series(path: &Path) -> Result<Vec<f64>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_f64_series(&text)
}
