use crate::SimError;
use crate::parallel::{PARALLEL_THRESHOLD, Workers, for_each_indexed};
use crate::walk::Trajectories;

pub const SUMMARY_COLUMNS: usize = 3;

#[derive(Clone, Debug, Default)]
struct WalkerMsd {
    ensemble: Vec<f64>,
    time_avg: Vec<f64>,
    ensemble_time: Vec<f64>,
}

impl WalkerMsd {
    fn compute(path: &[f64], n_steps: usize) -> Self {
        let n_lags = n_steps.saturating_sub(1);
        let origin = point(path, 0);
        let mut record = Self {
            ensemble: Vec::with_capacity(n_lags),
            time_avg: Vec::with_capacity(n_lags),
            ensemble_time: Vec::with_capacity(n_lags),
        };
        for lag in 1..n_steps {
            record
                .ensemble
                .push(squared_distance(point(path, lag), origin));
            record.time_avg.push(tamsd(path, n_steps, lag));
            record.ensemble_time.push(tamsd(path, lag, 1));
        }
        record
    }

    fn sanitize(&mut self) {
        zero_non_finite(&mut self.ensemble);
        zero_non_finite(&mut self.time_avg);
        zero_non_finite(&mut self.ensemble_time);
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MsdAnalysis {
    pub ea_msd: Vec<f64>,
    pub eata_msd: Vec<f64>,
    pub ergodicity: Vec<f64>,
    pub ta_msd: Vec<Vec<f64>>,
}

impl MsdAnalysis {
    pub fn n_lags(&self) -> usize {
        self.ea_msd.len()
    }

    pub fn n_walks(&self) -> usize {
        self.ta_msd.len()
    }

    /// Row-major `n_lags x (3 + n_walks)` table:
    /// `[eaMSD, eataMSD, ergodicity, taMSD_0, ..., taMSD_{n_walks-1}]`.
    pub fn to_table(&self) -> Vec<f64> {
        let width = SUMMARY_COLUMNS + self.n_walks();
        let mut table = Vec::with_capacity(self.n_lags() * width);
        for lag in 0..self.n_lags() {
            table.push(self.ea_msd[lag]);
            table.push(self.eata_msd[lag]);
            table.push(self.ergodicity[lag]);
            table.extend(self.ta_msd.iter().map(|walker| walker[lag]));
        }
        table
    }
}

#[inline]
fn point(path: &[f64], step: usize) -> [f64; 2] {
    [path[2 * step], path[2 * step + 1]]
}

#[inline]
fn squared_distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Time-averaged squared displacement at `lag` over the first `window`
/// steps of `path`. An empty window yields NaN.
pub fn tamsd(path: &[f64], window: usize, lag: usize) -> f64 {
    let count = window.saturating_sub(lag);
    let integral: f64 = (0..count)
        .map(|k| squared_distance(point(path, k + lag), point(path, k)))
        .sum();
    integral / count as f64
}

#[inline]
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn zero_non_finite(values: &mut [f64]) {
    for value in values.iter_mut() {
        *value = finite_or_zero(*value);
    }
}

fn lag_mean(records: &[WalkerMsd], lag: usize, select: impl Fn(&WalkerMsd) -> &[f64]) -> f64 {
    let sum: f64 = records.iter().map(|r| select(r)[lag]).sum();
    sum / records.len() as f64
}

pub fn analyse_walks(
    trajectories: &Trajectories,
    workers: Workers,
) -> Result<MsdAnalysis, SimError> {
    let n_walks = trajectories.n_walks();
    let n_steps = trajectories.n_steps();
    if n_walks == 0 || n_steps == 0 {
        return Ok(MsdAnalysis::default());
    }
    let n_lags = n_steps - 1;

    let mut records = vec![WalkerMsd::default(); n_walks];
    for_each_indexed(&mut records, workers, PARALLEL_THRESHOLD, |walker, record| {
        *record = WalkerMsd::compute(trajectories.walker(walker), n_steps);
    })?;
    for record in records.iter_mut() {
        record.sanitize();
    }

    let mut ea_msd = Vec::with_capacity(n_lags);
    let mut eata_msd = Vec::with_capacity(n_lags);
    let mut ergodicity = Vec::with_capacity(n_lags);
    for lag in 0..n_lags {
        ea_msd.push(finite_or_zero(lag_mean(&records, lag, |r| r.ensemble.as_slice())));
        eata_msd.push(finite_or_zero(lag_mean(&records, lag, |r| r.ensemble_time.as_slice())));

        let mean_ta = lag_mean(&records, lag, |r| r.time_avg.as_slice());
        let mean_ta_sq = records.iter().map(|r| r.time_avg[lag].powi(2)).sum::<f64>()
            / n_walks as f64;
        let squared_mean = mean_ta * mean_ta;
        let breaking = finite_or_zero((mean_ta_sq - squared_mean) / squared_mean);
        ergodicity.push(finite_or_zero(breaking / (lag + 1) as f64));
    }

    Ok(MsdAnalysis {
        ea_msd,
        eata_msd,
        ergodicity,
        ta_msd: records.into_iter().map(|r| r.time_avg).collect(),
    })
}
