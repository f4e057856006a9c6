use crate::SimError;
use crate::lattice::{Crossing, LatticeCoords, Topology};
use crate::percolation::Forest;
use log::{info, warn};
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};
use std::str::FromStr;

const MAX_START_ATTEMPTS: usize = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkType {
    AllClusters,
    LargestCluster,
}

impl TryFrom<i64> for WalkType {
    type Error = SimError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AllClusters),
            1 => Ok(Self::LargestCluster),
            other => Err(SimError::InvalidArgument(format!(
                "unsupported walk type code {} (expected 0=all clusters or 1=largest cluster)",
                other
            ))),
        }
    }
}

impl FromStr for WalkType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            m if m.eq_ignore_ascii_case("all") => Ok(Self::AllClusters),
            m if m.eq_ignore_ascii_case("largest") => Ok(Self::LargestCluster),
            other => Err(SimError::InvalidArgument(format!(
                "unrecognized walk type '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trajectories {
    data: Vec<f64>,
    n_walks: usize,
    n_steps: usize,
}

impl Trajectories {
    pub fn zeros(n_walks: usize, n_steps: usize) -> Self {
        Self {
            data: vec![0.0; n_walks * n_steps * 2],
            n_walks,
            n_steps,
        }
    }

    pub fn from_vec(n_walks: usize, n_steps: usize, data: Vec<f64>) -> Result<Self, SimError> {
        let expected = n_walks * n_steps * 2;
        if data.len() != expected {
            return Err(SimError::InvalidArgument(format!(
                "trajectory data length {} does not match {} walks x {} steps x 2 (expected {})",
                data.len(),
                n_walks,
                n_steps,
                expected
            )));
        }
        Ok(Self {
            data,
            n_walks,
            n_steps,
        })
    }

    pub fn n_walks(&self) -> usize {
        self.n_walks
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    pub fn walker(&self, idx: usize) -> &[f64] {
        let stride = self.n_steps * 2;
        &self.data[idx * stride..(idx + 1) * stride]
    }

    fn walker_mut(&mut self, idx: usize) -> &mut [f64] {
        let stride = self.n_steps * 2;
        &mut self.data[idx * stride..(idx + 1) * stride]
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StartSite {
    Mobile(usize),
    Pinned(usize),
}

pub(crate) struct WalkEngine<'a> {
    topology: &'a Topology,
    forest: &'a Forest,
    coords: &'a LatticeCoords,
    candidates: Vec<usize>,
    n_steps: usize,
    sim_length: usize,
    tau0: f64,
    waiting: Option<Exp<f64>>,
}

impl<'a> WalkEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        topology: &'a Topology,
        forest: &'a Forest,
        labels: &[i64],
        coords: &'a LatticeCoords,
        walk_type: WalkType,
        n_steps: usize,
        beta: f64,
        tau0: f64,
    ) -> Result<Self, SimError> {
        let candidates = start_candidates(forest, labels, walk_type);
        let waiting = if beta > 0.0 {
            Some(Exp::new(beta).map_err(|e| {
                SimError::InvalidArgument(format!("invalid waiting-time exponent {beta}: {e}"))
            })?)
        } else {
            None
        };
        Ok(Self {
            topology,
            forest,
            coords,
            candidates,
            n_steps,
            sim_length: sim_length(n_steps, tau0),
            tau0,
            waiting,
        })
    }

    pub(crate) fn run<R: Rng + ?Sized>(&self, n_walks: usize, rng: &mut R) -> Trajectories {
        let mut trajectories = Trajectories::zeros(n_walks, self.n_steps);
        let mut sites = Vec::with_capacity(self.sim_length);
        let mut crossings = Vec::with_capacity(self.sim_length);
        let mut pinned = 0usize;

        for walker in 0..n_walks {
            match self.pick_start(rng) {
                StartSite::Mobile(site) => {
                    self.discrete_walk(site, rng, &mut sites, &mut crossings);
                }
                StartSite::Pinned(site) => {
                    warn!("walker {walker} found no mobile start site; pinned to site {site}");
                    pinned += 1;
                    sites.clear();
                    sites.resize(self.sim_length, site);
                    crossings.clear();
                    crossings.resize(self.sim_length, Crossing::None);
                }
            }
            let times = ctrw_times(
                self.sim_length,
                self.n_steps,
                self.tau0,
                self.waiting.as_ref(),
                rng,
            );
            let (path, tags) = subordinate(&sites, &crossings, &times, self.n_steps);
            unwrap_into(self.coords, &path, &tags, trajectories.walker_mut(walker));
        }

        info!(
            "{} walkers x {} steps ({} discrete), {} pinned",
            n_walks, self.n_steps, self.sim_length, pinned
        );
        trajectories
    }

    fn pick_start<R: Rng + ?Sized>(&self, rng: &mut R) -> StartSite {
        if self.candidates.is_empty() {
            return StartSite::Pinned(rng.random_range(0..self.topology.n_sites()));
        }
        let attempts = self.topology.n_sites().min(MAX_START_ATTEMPTS);
        let mut site = self.candidates[0];
        for _ in 0..attempts {
            site = self.candidates[rng.random_range(0..self.candidates.len())];
            if self
                .topology
                .neighbours(site)
                .iter()
                .any(|&n| self.forest.is_occupied(n))
            {
                return StartSite::Mobile(site);
            }
        }
        StartSite::Pinned(site)
    }

    fn discrete_walk<R: Rng + ?Sized>(
        &self,
        start: usize,
        rng: &mut R,
        sites: &mut Vec<usize>,
        crossings: &mut Vec<Crossing>,
    ) {
        sites.clear();
        crossings.clear();
        sites.push(start);
        crossings.push(Crossing::None);

        let mut options = Vec::with_capacity(self.topology.arity());
        let mut pos = start;
        for _ in 1..self.sim_length {
            options.clear();
            options.extend(
                self.topology
                    .neighbours(pos)
                    .iter()
                    .copied()
                    .filter(|&n| self.forest.is_occupied(n)),
            );
            if options.is_empty() {
                sites.push(pos);
                crossings.push(Crossing::None);
                continue;
            }
            let next = options[rng.random_range(0..options.len())];
            crossings.push(self.topology.crossing(pos, next));
            sites.push(next);
            pos = next;
        }
    }
}

fn start_candidates(forest: &Forest, labels: &[i64], walk_type: WalkType) -> Vec<usize> {
    match walk_type {
        WalkType::AllClusters => (0..forest.len())
            .filter(|&site| forest.is_occupied(site))
            .collect(),
        WalkType::LargestCluster => match forest.largest_root() {
            Some(root) => labels
                .iter()
                .enumerate()
                .filter(|&(_, &label)| label == root as i64)
                .map(|(site, _)| site)
                .collect(),
            None => Vec::new(),
        },
    }
}

pub(crate) fn discrete_steps(n_steps: usize, tau0: f64) -> f64 {
    if tau0 < 1.0 {
        (n_steps as f64 / tau0).trunc()
    } else {
        n_steps as f64
    }
}

pub(crate) fn sim_length(n_steps: usize, tau0: f64) -> usize {
    discrete_steps(n_steps, tau0) as usize
}

/// CTRW arrival times, cut at the first arrival at or beyond `n_steps`
/// which is clamped to exactly `n_steps`.
///
/// With a waiting-time law the increments are `tau0 * exp(E)` for
/// exponential `E`, i.e. Pareto distributed; without one the arrivals are
/// `1, 2, ..., sim_length`.
pub(crate) fn ctrw_times<R: Rng + ?Sized>(
    sim_length: usize,
    n_steps: usize,
    tau0: f64,
    waiting: Option<&Exp<f64>>,
    rng: &mut R,
) -> Vec<f64> {
    let mut times: Vec<f64> = match waiting {
        Some(law) => {
            let mut elapsed = 0.0;
            (0..sim_length)
                .map(|_| {
                    elapsed += tau0 * law.sample(rng).exp();
                    elapsed
                })
                .collect()
        }
        None => (1..=sim_length).map(|t| t as f64).collect(),
    };
    if times.is_empty() {
        return times;
    }
    let horizon = n_steps as f64;
    let cut = times
        .iter()
        .position(|&t| t >= horizon)
        .unwrap_or(times.len() - 1);
    times.truncate(cut + 1);
    times[cut] = horizon;
    times
}

/// Resamples a discrete walk onto physical steps `0..n_steps`.
///
/// The walker advances at most one discrete step per physical step, once
/// the physical step exceeds the pending arrival time, and carries that
/// step's crossing tag along.
pub(crate) fn subordinate(
    sites: &[usize],
    crossings: &[Crossing],
    times: &[f64],
    n_steps: usize,
) -> (Vec<usize>, Vec<Crossing>) {
    let mut path = Vec::with_capacity(n_steps);
    let mut tags = Vec::with_capacity(n_steps);
    let mut counter = 0usize;
    for step in 0..n_steps {
        let mut tag = Crossing::None;
        if step as f64 > times[counter] {
            counter += 1;
            tag = crossings[counter];
        }
        path.push(sites[counter]);
        tags.push(tag);
    }
    (path, tags)
}

fn unwrap_into(coords: &LatticeCoords, path: &[usize], tags: &[Crossing], out: &mut [f64]) {
    let cell = coords.unit_cell();
    let (mut cell_x, mut cell_y) = (0i64, 0i64);
    for ((&site, &tag), point) in path.iter().zip(tags).zip(out.chunks_exact_mut(2)) {
        match tag {
            Crossing::Top => cell_y += 1,
            Crossing::Bottom => cell_y -= 1,
            Crossing::Right => cell_x += 1,
            Crossing::Left => cell_x -= 1,
            Crossing::None => {}
        }
        let [x, y] = coords.point(site);
        point[0] = x + cell_x as f64 * cell[0];
        point[1] = y + cell_y as f64 * cell[1];
    }
}

pub fn add_noise<R: Rng + ?Sized>(
    trajectories: &mut Trajectories,
    noise: f64,
    rng: &mut R,
) -> Result<(), SimError> {
    if noise <= 0.0 {
        return Ok(());
    }
    let jitter = Normal::new(0.0, noise)
        .map_err(|e| SimError::InvalidArgument(format!("invalid noise level {noise}: {e}")))?;
    for value in trajectories.data.iter_mut() {
        *value += jitter.sample(rng);
    }
    Ok(())
}
