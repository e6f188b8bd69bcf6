use crate::pipeline::{Frame, FrameChannels};
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Load a device capture with either a `ppg` column or `red` and `ir` columns.
/// Unparseable or empty cells become NaN.
pub fn read_frame_csv(path: &Path, fs: f64) -> Result<Frame> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_frame_csv(file, fs).with_context(|| format!("reading frame {}", path.display()))
}

pub fn parse_frame_csv<R: Read>(source: R, fs: f64) -> Result<Frame> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(source);
    let headers = reader.headers().context("reading header")?.clone();

    let red_ir = locate_column(&headers, "red", "red channel")
        .and_then(|red| Ok((red, locate_column(&headers, "ir", "infrared channel")?)));
    let columns: Vec<usize> = match red_ir {
        Ok((red, ir)) => vec![red, ir],
        Err(_) => vec![locate_column(&headers, "ppg", "ppg or red/ir")?],
    };

    let mut data = vec![Vec::new(); columns.len()];
    for result in reader.records() {
        let record = result.context("reading record")?;
        for (out, &col) in data.iter_mut().zip(&columns) {
            let value = record
                .get(col)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            out.push(value);
        }
    }
    if data.iter().all(Vec::is_empty) {
        anyhow::bail!("frame has no samples");
    }

    let channels = match <[Vec<f64>; 2]>::try_from(data) {
        Ok([red, ir]) => FrameChannels::RedIr { red, ir },
        Err(mut single) => FrameChannels::Ppg(single.remove(0)),
    };
    Ok(Frame { fs, channels })
}

fn locate_column(headers: &csv::StringRecord, requested: &str, hint: &str) -> Result<usize> {
    headers
        .iter()
        .position(|name| name.eq_ignore_ascii_case(requested))
        .ok_or_else(|| anyhow::anyhow!("missing {} column ({})", hint, requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn reads_red_ir_columns() {
        let text = "timestamp,Red,IR\n0,1000,2000\n1,1001,\n2,1002,2002\n";
        let frame = parse_frame_csv(text.as_bytes(), 100.0).unwrap();
        assert_eq!(frame.fs, 100.0);
        match frame.channels {
            FrameChannels::RedIr { red, ir } => {
                assert_eq!(red, vec![1000.0, 1001.0, 1002.0]);
                assert!(ir[1].is_nan());
            }
            other => panic!("unexpected channels {other:?}"),
        }
    }

    #[test]
    fn falls_back_to_ppg_column() {
        let text = "ppg\n0.1\n0.2\n";
        let frame = parse_frame_csv(text.as_bytes(), 125.0).unwrap();
        assert!(matches!(frame.channels, FrameChannels::Ppg(ref v) if v.len() == 2));
    }

    #[test]
    fn missing_columns_are_reported() {
        let err = parse_frame_csv("a,b\n1,2\n".as_bytes(), 125.0).unwrap_err();
        assert!(format!("{err:#}").contains("ppg"));
    }

    #[test]
    fn reads_sample_frame_file() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace")
            .join("test_data/red_ir_frame.csv");
        let frame = read_frame_csv(&path, 200.0).unwrap();
        match frame.channels {
            FrameChannels::RedIr { red, ir } => {
                assert_eq!(red.len(), 2000);
                assert_eq!(ir.len(), 2000);
            }
            other => panic!("unexpected channels {other:?}"),
        }
    }
}
