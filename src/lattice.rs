use crate::SimError;
use std::str::FromStr;

const SQRT3: f64 = 1.7320508075688772;
const SQRT3_HALF: f64 = 0.8660254037844386;

const HONEYCOMB_COLUMN_KINDS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatticeType {
    Square,
    Honeycomb,
}

impl LatticeType {
    pub fn arity(self) -> usize {
        match self {
            Self::Square => 4,
            Self::Honeycomb => 3,
        }
    }

    pub fn n_sites(self, grid_size: usize) -> usize {
        match self {
            Self::Square => grid_size * grid_size,
            Self::Honeycomb => HONEYCOMB_COLUMN_KINDS * grid_size * grid_size,
        }
    }
}

impl TryFrom<i64> for LatticeType {
    type Error = SimError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Square),
            1 => Ok(Self::Honeycomb),
            other => Err(SimError::InvalidArgument(format!(
                "unsupported lattice type code {} (expected 0=square or 1=honeycomb)",
                other
            ))),
        }
    }
}

impl FromStr for LatticeType {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            m if m.eq_ignore_ascii_case("square") => Ok(Self::Square),
            m if m.eq_ignore_ascii_case("honeycomb") => Ok(Self::Honeycomb),
            other => Err(SimError::InvalidArgument(format!(
                "unrecognized lattice type '{}'",
                other
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Crossing {
    #[default]
    None,
    Top,
    Bottom,
    Right,
    Left,
}

/// Neighbour table and wrap rows of a periodic lattice.
///
/// Square sites are indexed `x * g + y`. Honeycomb sites are indexed
/// `column * g + row` over `4 * g` columns whose kind (`column % 4`) decides
/// which diagonal bond the site owns.
#[derive(Clone, Debug)]
pub struct Topology {
    grid_size: usize,
    lattice_type: LatticeType,
    n_sites: usize,
    arity: usize,
    neighbours: Vec<usize>,
    first_row: Vec<usize>,
    last_row: Vec<usize>,
    in_first_row: Vec<bool>,
    in_last_row: Vec<bool>,
}

impl Topology {
    pub fn new(grid_size: usize, lattice_type: LatticeType) -> Result<Self, SimError> {
        if grid_size == 0 {
            return Err(SimError::InvalidArgument(
                "grid_size must be at least 1".into(),
            ));
        }
        let n_sites = lattice_type.n_sites(grid_size);
        let arity = lattice_type.arity();
        let (neighbours, first_row, last_row) = match lattice_type {
            LatticeType::Square => square_neighbours(grid_size),
            LatticeType::Honeycomb => honeycomb_neighbours(grid_size),
        };
        debug_assert_eq!(neighbours.len(), n_sites * arity);

        let mut in_first_row = vec![false; n_sites];
        let mut in_last_row = vec![false; n_sites];
        for &site in &first_row {
            in_first_row[site] = true;
        }
        for &site in &last_row {
            in_last_row[site] = true;
        }

        Ok(Self {
            grid_size,
            lattice_type,
            n_sites,
            arity,
            neighbours,
            first_row,
            last_row,
            in_first_row,
            in_last_row,
        })
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    pub fn lattice_type(&self) -> LatticeType {
        self.lattice_type
    }

    pub fn n_sites(&self) -> usize {
        self.n_sites
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    #[inline]
    pub fn neighbours(&self, site: usize) -> &[usize] {
        let start = site * self.arity;
        &self.neighbours[start..start + self.arity]
    }

    pub fn first_row(&self) -> &[usize] {
        &self.first_row
    }

    pub fn last_row(&self) -> &[usize] {
        &self.last_row
    }

    /// Classifies the step `prev -> next` by the periodic boundary it wraps
    /// across, if any.
    ///
    /// Vertical wraps are detected by row membership, horizontal ones by the
    /// first and last `grid_size` indices (the first and last columns).
    pub fn crossing(&self, prev: usize, next: usize) -> Crossing {
        let edge = self.grid_size;
        let far_edge = self.n_sites - edge;
        if self.in_first_row[prev] && self.in_last_row[next] {
            Crossing::Top
        } else if self.in_last_row[prev] && self.in_first_row[next] {
            Crossing::Bottom
        } else if prev >= far_edge && next < edge {
            Crossing::Right
        } else if prev < edge && next >= far_edge {
            Crossing::Left
        } else {
            Crossing::None
        }
    }
}

fn square_neighbours(g: usize) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let mut neighbours = Vec::with_capacity(g * g * 4);
    for x in 0..g {
        for y in 0..g {
            neighbours.push(x * g + (y + 1) % g);
            neighbours.push(x * g + (y + g - 1) % g);
            neighbours.push(((x + 1) % g) * g + y);
            neighbours.push(((x + g - 1) % g) * g + y);
        }
    }
    let first_row = (0..g).map(|x| x * g + g - 1).collect();
    let last_row = (0..g).map(|x| x * g).collect();
    (neighbours, first_row, last_row)
}

fn honeycomb_neighbours(g: usize) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let columns = (HONEYCOMB_COLUMN_KINDS * g) as isize;
    let rows = g as isize;
    let index = |column: isize, row: isize| -> usize {
        (column.rem_euclid(columns) * rows + row.rem_euclid(rows)) as usize
    };

    let mut neighbours = Vec::with_capacity(columns as usize * g * 3);
    for c in 0..columns {
        for j in 0..rows {
            // Two bonds stay on row j; the third is the kind-specific diagonal.
            let bonds = match c as usize % HONEYCOMB_COLUMN_KINDS {
                0 => [(c - 1, j), (c + 1, j - 1), (c + 1, j)],
                1 => [(c - 1, j), (c - 1, j + 1), (c + 1, j)],
                2 => [(c - 1, j), (c + 1, j), (c + 1, j + 1)],
                _ => [(c - 1, j - 1), (c - 1, j), (c + 1, j)],
            };
            neighbours.extend(bonds.iter().map(|&(col, row)| index(col, row)));
        }
    }

    let columns = columns as usize;
    let first_row = (0..columns)
        .filter(|c| matches!(c % HONEYCOMB_COLUMN_KINDS, 0 | 3))
        .map(|c| c * g)
        .collect();
    let last_row = (0..columns)
        .filter(|c| matches!(c % HONEYCOMB_COLUMN_KINDS, 1 | 2))
        .map(|c| c * g + g - 1)
        .collect();
    (neighbours, first_row, last_row)
}

#[derive(Clone, Debug)]
pub struct LatticeCoords {
    points: Vec<[f64; 2]>,
    unit_cell: [f64; 2],
}

impl LatticeCoords {
    /// The honeycomb unit cell is `(3g, g * sqrt(3))`. Its x-period differs on
    /// purpose from the legacy `3g + 0.5`, so wrapped bonds unwrap to unit length.
    pub fn new(topology: &Topology) -> Self {
        let g = topology.grid_size();
        let mut points = Vec::with_capacity(topology.n_sites());
        let margin = match topology.lattice_type() {
            LatticeType::Square => {
                for x in 0..g {
                    for y in 0..g {
                        points.push([x as f64, y as f64]);
                    }
                }
                [1.0, 1.0]
            }
            LatticeType::Honeycomb => {
                for column in 0..HONEYCOMB_COLUMN_KINDS * g {
                    let cell_x = (column / HONEYCOMB_COLUMN_KINDS) as f64 * 3.0;
                    for row in 0..g {
                        // Row 0 is the top of the embedding.
                        let cell_y = (g - row - 1) as f64 * SQRT3;
                        let point = match column % HONEYCOMB_COLUMN_KINDS {
                            0 => [cell_x, cell_y + SQRT3_HALF],
                            1 => [cell_x + 0.5, cell_y],
                            2 => [cell_x + 1.5, cell_y],
                            _ => [cell_x + 2.0, cell_y + SQRT3_HALF],
                        };
                        points.push(point);
                    }
                }
                [1.0, SQRT3_HALF]
            }
        };

        let max = points.iter().fold([f64::MIN, f64::MIN], |acc, p| {
            [acc[0].max(p[0]), acc[1].max(p[1])]
        });
        Self {
            points,
            unit_cell: [max[0] + margin[0], max[1] + margin[1]],
        }
    }

    #[inline]
    pub fn point(&self, site: usize) -> [f64; 2] {
        self.points[site]
    }

    pub fn unit_cell(&self) -> [f64; 2] {
        self.unit_cell
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn to_flat(&self) -> Vec<f64> {
        self.points.iter().flatten().copied().collect()
    }
}
