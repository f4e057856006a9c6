use log::{debug, info};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use thiserror::Error;

mod analysis;
mod lattice;
mod parallel;
mod percolation;
#[cfg(feature = "python")]
mod python;
mod walk;

pub use analysis::{MsdAnalysis, SUMMARY_COLUMNS, analyse_walks, tamsd};
pub use lattice::{Crossing, LatticeCoords, LatticeType, Topology};
pub use parallel::{PARALLEL_THRESHOLD, Workers, for_each_indexed};
pub use percolation::{Forest, occupation_order, percolate};
pub use walk::{Trajectories, WalkType, add_noise};

/// Upper bound on the discrete steps one walker may need, `n_steps / tau0`.
pub const MAX_DISCRETE_STEPS: usize = 1 << 26;

pub type SimRng = ChaCha8Rng;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("thread pool error: {0}")]
    ThreadPool(String),
}

pub fn seeded_rng(seed: Option<u64>) -> SimRng {
    match seed {
        Some(seed) => SimRng::seed_from_u64(seed),
        None => SimRng::from_os_rng(),
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub grid_size: usize,
    pub lattice_type: LatticeType,
    pub threshold: f64,
    pub walk_type: WalkType,
    pub n_walks: usize,
    pub n_steps: usize,
    pub beta: f64,
    pub tau0: f64,
    pub noise: f64,
    pub seed: Option<u64>,
    pub n_jobs: i64,
}

impl SimulationConfig {
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            lattice_type: LatticeType::Square,
            threshold: 0.5,
            walk_type: WalkType::AllClusters,
            n_walks: 0,
            n_steps: 0,
            beta: 0.0,
            tau0: 1.0,
            noise: 0.0,
            seed: None,
            n_jobs: -1,
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.grid_size == 0 {
            return Err(SimError::InvalidArgument(
                "grid_size must be at least 1".into(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SimError::InvalidArgument(format!(
                "threshold must lie in (0, 1], got {}",
                self.threshold
            )));
        }
        if !(self.tau0 > 0.0) || !self.tau0.is_finite() {
            return Err(SimError::InvalidArgument(format!(
                "tau0 must be positive, got {}",
                self.tau0
            )));
        }
        if self.includes_walks() {
            let discrete_steps = walk::discrete_steps(self.n_steps, self.tau0);
            if !discrete_steps.is_finite() || discrete_steps > MAX_DISCRETE_STEPS as f64 {
                return Err(SimError::InvalidArgument(format!(
                    "tau0 = {} needs {discrete_steps} discrete steps, more than {MAX_DISCRETE_STEPS}",
                    self.tau0
                )));
            }
        }
        if !(self.beta >= 0.0) || !self.beta.is_finite() {
            return Err(SimError::InvalidArgument(format!(
                "beta must be non-negative, got {}",
                self.beta
            )));
        }
        if !(self.noise >= 0.0) || !self.noise.is_finite() {
            return Err(SimError::InvalidArgument(format!(
                "noise must be non-negative, got {}",
                self.noise
            )));
        }
        Ok(())
    }

    pub fn includes_walks(&self) -> bool {
        self.n_walks > 0 && self.n_steps > 0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimulationOutput {
    /// Cluster root per site, or the empty marker `-n_sites - 1`.
    pub clusters: Vec<i64>,
    pub lattice: Vec<f64>,
    /// `(n_steps - 1) x (3 + n_walks)` analysis table; empty without walks.
    pub analysis: Vec<f64>,
    /// `n_walks x n_steps x 2` unwrapped trajectories; empty without walks.
    pub walks: Vec<f64>,
    pub n_sites: usize,
    pub n_walks: usize,
    pub n_steps: usize,
    pub occupied: usize,
    pub largest_cluster: usize,
}

impl SimulationOutput {
    pub fn analysis_shape(&self) -> (usize, usize) {
        if self.analysis.is_empty() {
            (0, 0)
        } else {
            (self.n_steps - 1, SUMMARY_COLUMNS + self.n_walks)
        }
    }

    pub fn walks_shape(&self) -> (usize, usize, usize) {
        if self.walks.is_empty() {
            (0, 0, 0)
        } else {
            (self.n_walks, self.n_steps, 2)
        }
    }
}

fn timed<T>(stage: &str, run: impl FnOnce() -> T) -> T {
    debug!("{stage}...");
    let start = Instant::now();
    let out = run();
    debug!(
        "{stage} finished in {:.3} ms",
        start.elapsed().as_secs_f64() * 1e3
    );
    out
}

pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationOutput, SimError> {
    let mut rng = seeded_rng(config.seed);
    run_simulation_with_rng(config, &mut rng)
}

pub fn run_simulation_with_rng(
    config: &SimulationConfig,
    rng: &mut SimRng,
) -> Result<SimulationOutput, SimError> {
    config.validate()?;

    let topology = timed("searching neighbours", || {
        Topology::new(config.grid_size, config.lattice_type)
    })?;
    let n_sites = topology.n_sites();
    let order = timed("randomizing occupations", || occupation_order(n_sites, rng));
    let forest = timed("running percolation", || {
        percolate(&topology, &order, config.threshold)
    });
    info!(
        "percolation: {} of {} sites occupied, largest cluster {}",
        forest.occupied(),
        n_sites,
        forest.largest()
    );
    let coords = timed("building lattice", || LatticeCoords::new(&topology));
    let clusters = timed("grouping clusters", || forest.group_clusters());

    let (analysis, walks) = if config.includes_walks() {
        let engine = walk::WalkEngine::new(
            &topology,
            &forest,
            &clusters,
            &coords,
            config.walk_type,
            config.n_steps,
            config.beta,
            config.tau0,
        )?;
        let mut trajectories = timed("simulating random walks", || {
            engine.run(config.n_walks, rng)
        });
        timed("adding noise", || {
            add_noise(&mut trajectories, config.noise, rng)
        })?;
        let workers = Workers::from_n_jobs(config.n_jobs);
        let stats = timed("analysing random walks", || {
            analyse_walks(&trajectories, workers)
        })?;
        (stats.to_table(), trajectories.into_vec())
    } else {
        (Vec::new(), Vec::new())
    };

    Ok(SimulationOutput {
        clusters,
        lattice: coords.to_flat(),
        analysis,
        walks,
        n_sites,
        n_walks: config.n_walks,
        n_steps: config.n_steps,
        occupied: forest.occupied(),
        largest_cluster: forest.largest(),
    })
}
