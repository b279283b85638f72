// Round-trip timing for the gateway experiment.
//
// `measure` runs a probe a fixed number of times, serially, sleeping for a
// fixed delay between trials, and records each trial's wall-clock duration in
// nanoseconds. `Timings` then answers min/max/median/mean/standard deviation.
// The median is the upper median (`sorted[n / 2]`) and the standard deviation
// is the population one, matching how the gateway numbers have always been
// reported. Every statistic is `None` for zero trials.
//
// Summaries can be appended to a JSON-lines report file (`report_path` in the
// controller config) so repeated runs are easy to compare.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

/// Per-trial durations in nanoseconds, in trial order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Timings {
    samples: Vec<u64>,
}

/// Statistics over a non-empty `Timings`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimingSummary {
    pub trials: usize,
    pub min_ns: u64,
    pub max_ns: u64,
    pub median_ns: u64,
    pub mean_ns: f64,
    pub std_dev_ns: f64,
}

impl Timings {
    pub fn from_samples(samples: Vec<u64>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[u64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn min(&self) -> Option<u64> {
        self.samples.iter().copied().min()
    }

    pub fn max(&self) -> Option<u64> {
        self.samples.iter().copied().max()
    }

    pub fn median(&self) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        Some(sorted[sorted.len() / 2])
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|&s| s as f64).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let sq_sum: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let diff = s as f64 - mean;
                diff * diff
            })
            .sum();
        Some((sq_sum / self.samples.len() as f64).sqrt())
    }

    pub fn summary(&self) -> Option<TimingSummary> {
        Some(TimingSummary {
            trials: self.samples.len(),
            min_ns: self.min()?,
            max_ns: self.max()?,
            median_ns: self.median()?,
            mean_ns: self.mean()?,
            std_dev_ns: self.std_dev()?,
        })
    }
}

/// Run `probe` `trials` times with `delay` between consecutive trials and
/// time each call. Stops at the first probe error.
pub fn measure<E, F>(trials: usize, delay: Duration, mut probe: F) -> Result<Timings, E>
where
    F: FnMut() -> Result<(), E>,
{
    let mut samples = Vec::with_capacity(trials);
    for trial in 0..trials {
        if trial > 0 && !delay.is_zero() {
            thread::sleep(delay);
        }
        let start = Instant::now();
        probe()?;
        let elapsed = start.elapsed().as_nanos();
        samples.push(u64::try_from(elapsed).unwrap_or(u64::MAX));
    }
    Ok(Timings::from_samples(samples))
}

#[derive(Serialize)]
struct ReportLine<'a> {
    delay_ms: u64,
    #[serde(flatten)]
    summary: &'a TimingSummary,
}

/// Append one JSON line describing `summary` to the report at `path`.
pub fn append_report(path: &Path, delay: Duration, summary: &TimingSummary) -> io::Result<()> {
    let line = ReportLine {
        delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        summary,
    };
    let mut json = serde_json::to_vec(&line).map_err(io::Error::other)?;
    json.push(b'\n');

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_over_known_samples() {
        let timings = Timings::from_samples(vec![40, 10, 30, 20]);
        assert_eq!(timings.min(), Some(10));
        assert_eq!(timings.max(), Some(40));
        // Upper median of [10, 20, 30, 40].
        assert_eq!(timings.median(), Some(30));
        assert_eq!(timings.mean(), Some(25.0));
        let sd = timings.std_dev().unwrap();
        assert!((sd - 125f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_timings_have_no_statistics() {
        let timings = Timings::default();
        assert!(timings.is_empty());
        assert_eq!(timings.min(), None);
        assert_eq!(timings.median(), None);
        assert_eq!(timings.std_dev(), None);
        assert!(timings.summary().is_none());
    }

    #[test]
    fn measure_runs_every_trial_in_order() {
        let mut calls = 0;
        let timings = measure::<(), _>(3, Duration::ZERO, || {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(timings.len(), 3);
        let summary = timings.summary().unwrap();
        assert!(summary.min_ns <= summary.median_ns);
        assert!(summary.median_ns <= summary.max_ns);
    }

    #[test]
    fn measure_stops_at_first_error() {
        let mut calls = 0;
        let result = measure(5, Duration::ZERO, || {
            calls += 1;
            if calls == 2 { Err("boom") } else { Ok(()) }
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn delay_separates_trials() {
        let delay = Duration::from_millis(15);
        let start = Instant::now();
        measure::<(), _>(3, delay, || Ok(())).unwrap();
        assert!(start.elapsed() >= delay * 2);
    }

    #[test]
    fn report_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.jsonl");
        let summary = Timings::from_samples(vec![5, 7, 9]).summary().unwrap();

        append_report(&path, Duration::from_millis(20), &summary).unwrap();
        append_report(&path, Duration::from_millis(20), &summary).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["delay_ms"], 20);
        assert_eq!(value["median_ns"], 7);
        assert_eq!(value["trials"], 3);
    }
}
