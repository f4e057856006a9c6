use crate::{
    LatticeType, SimError, SimulationConfig, SimulationOutput, WalkType, run_simulation,
};
use numpy::{Element, IxDyn, PyArrayDyn, PyArrayMethods};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::str::FromStr;

impl From<SimError> for PyErr {
    fn from(err: SimError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

fn export_array<T: Copy + Element>(
    py: Python<'_>,
    dims: &[usize],
    data: &[T],
) -> PyResult<Py<PyAny>> {
    let array = unsafe { PyArrayDyn::<T>::new(py, IxDyn(dims), false) };
    unsafe {
        array
            .as_slice_mut()
            .map_err(|_| PyValueError::new_err("failed to export data"))?
            .copy_from_slice(data);
    }
    Ok(array.into_any().unbind())
}

type ExportedArrays = (Py<PyAny>, Py<PyAny>, Py<PyAny>, Py<PyAny>);

impl SimulationOutput {
    fn into_py(self, py: Python<'_>) -> PyResult<ExportedArrays> {
        let (rows, cols) = self.analysis_shape();
        let (walkers, steps, dims) = self.walks_shape();
        Ok((
            export_array(py, &[self.n_sites], &self.clusters)?,
            export_array(py, &[self.n_sites, 2], &self.lattice)?,
            export_array(py, &[rows, cols], &self.analysis)?,
            export_array(py, &[walkers, steps, dims], &self.walks)?,
        ))
    }
}

/// Runs percolation, walks and analysis; returns
/// `(clusters, lattice, analysis, walks)` as C-ordered numpy arrays.
#[pyfunction(signature = (
    grid_size,
    lattice_type="square",
    threshold=0.5,
    walk_type="all",
    n_walks=0,
    n_steps=0,
    beta=0.0,
    tau0=1.0,
    noise=0.0,
    seed=None,
    n_jobs=-1
))]
#[allow(clippy::too_many_arguments)]
pub fn simulate(
    py: Python<'_>,
    grid_size: usize,
    lattice_type: &str,
    threshold: f64,
    walk_type: &str,
    n_walks: usize,
    n_steps: usize,
    beta: f64,
    tau0: f64,
    noise: f64,
    seed: Option<i64>,
    n_jobs: i64,
) -> PyResult<ExportedArrays> {
    let config = SimulationConfig {
        grid_size,
        lattice_type: LatticeType::from_str(lattice_type)?,
        threshold,
        walk_type: WalkType::from_str(walk_type)?,
        n_walks,
        n_steps,
        beta,
        tau0,
        noise,
        seed: seed.and_then(|s| u64::try_from(s).ok()),
        n_jobs,
    };
    config.validate()?;
    let output = py.detach(move || run_simulation(&config))?;
    output.into_py(py)
}

#[pymodule]
fn percwalk(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(simulate, module)?)?;
    Ok(())
}
