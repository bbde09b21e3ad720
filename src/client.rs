//! Client harness: producers that submit one kernel evaluation at a time and
//! block on their own result, plus the output files and checks around them.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::jobs::TaskId;
use crate::server::Server;
use crate::tasks::Kernel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub arg: f64,
    pub result: f64,
}

/// Submits `works` evaluations of `kernel`, awaiting each before the next.
pub fn run_client<R: Rng>(
    server: &Server<f64>,
    kernel: Kernel,
    works: usize,
    rng: &mut R,
) -> Result<Vec<Sample>> {
    let mut samples = Vec::with_capacity(works);
    for _ in 0..works {
        let arg = rng.random::<f64>() * kernel.arg_range();
        let id = server.submit(kernel.bind(arg));
        let result = server.request_result(id)?;
        samples.push(Sample { arg, result });
    }
    debug!(%kernel, works, "client finished");
    Ok(samples)
}

/// One `arg result` pair per line.
pub fn write_samples(path: &Path, samples: &[Sample]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for sample in samples {
        writeln!(out, "{} {}", sample.arg, sample.result)?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_samples(path: &Path) -> Result<Vec<Sample>> {
    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace().map(str::parse::<f64>);
        match (fields.next(), fields.next(), fields.next()) {
            (Some(Ok(arg)), Some(Ok(result)), None) => samples.push(Sample { arg, result }),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{}:{}: expected `arg result`", path.display(), lineno + 1),
                )
                .into())
            }
        }
    }
    Ok(samples)
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub kernel: Kernel,
    pub samples: usize,
    pub max_error: f64,
    pub passed: bool,
    pub first_mismatch: Option<Sample>,
}

/// Checks `|result - kernel(arg)| < tolerance` for every sample.
pub fn verify(kernel: Kernel, samples: &[Sample], tolerance: f64) -> Report {
    let mut max_error: f64 = 0.0;
    let mut first_mismatch = None;
    for sample in samples {
        let err = (sample.result - kernel.apply(sample.arg)).abs();
        max_error = max_error.max(err);
        if first_mismatch.is_none() && (err >= tolerance || err.is_nan()) {
            first_mismatch = Some(*sample);
        }
    }
    Report {
        kernel,
        samples: samples.len(),
        max_error,
        passed: first_mismatch.is_none(),
        first_mismatch,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub issued: TaskId,
    pub reports: Vec<Report>,
}

impl Summary {
    pub fn passed(&self) -> bool {
        self.reports.iter().all(|r| r.passed)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.flush()?;
        Ok(())
    }
}
