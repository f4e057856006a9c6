use crate::lattice::Topology;
use rand::Rng;

const PERMUTATION_MAX_DRAW: u32 = 4_294_967_294;
const PERMUTATION_SCALE: f64 = 2.3283064e-10;

pub fn occupation_order<R: Rng + ?Sized>(n_sites: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n_sites).collect();
    for i in 0..n_sites {
        let draw = rng.random_range(0..=PERMUTATION_MAX_DRAW);
        let offset = ((n_sites - i) as f64 * PERMUTATION_SCALE * f64::from(draw)) as usize;
        let j = (i + offset).min(n_sites - 1);
        order.swap(i, j);
    }
    order
}

/// Weighted union-find forest over lattice sites.
///
/// Each slot holds either the parent index (`>= 0`), the negated cluster
/// size for a root, or the empty marker `-n_sites - 1` for an unoccupied
/// site.
#[derive(Clone, Debug)]
pub struct Forest {
    slots: Vec<i64>,
    empty: i64,
    occupied: usize,
    largest: usize,
}

impl Forest {
    pub fn new(n_sites: usize) -> Self {
        let empty = -(n_sites as i64) - 1;
        Self {
            slots: vec![empty; n_sites],
            empty,
            occupied: 0,
            largest: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn empty_marker(&self) -> i64 {
        self.empty
    }

    #[inline]
    pub fn is_occupied(&self, site: usize) -> bool {
        self.slots[site] != self.empty
    }

    pub fn occupied(&self) -> usize {
        self.occupied
    }

    pub fn largest(&self) -> usize {
        self.largest
    }

    /// Root of the cluster containing the occupied `site`, compressing the
    /// path on the way.
    pub fn find_root(&mut self, site: usize) -> usize {
        debug_assert!(self.is_occupied(site));
        find_compress(&mut self.slots, site)
    }

    pub fn cluster_size(&mut self, site: usize) -> usize {
        let root = self.find_root(site);
        (-self.slots[root]) as usize
    }

    pub fn clusters(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|&(_, &slot)| slot < 0 && slot != self.empty)
            .map(|(root, &slot)| (root, (-slot) as usize))
    }

    pub fn largest_root(&self) -> Option<usize> {
        self.clusters()
            .fold(None, |best: Option<(usize, usize)>, (root, size)| match best {
                Some((_, best_size)) if best_size >= size => best,
                _ => Some((root, size)),
            })
            .map(|(root, _)| root)
    }

    pub fn occupy(&mut self, site: usize, topology: &Topology) {
        debug_assert!(!self.is_occupied(site), "site {site} occupied twice");
        self.slots[site] = -1;
        self.occupied += 1;
        self.largest = self.largest.max(1);

        let mut root = site;
        for &neighbour in topology.neighbours(site) {
            if !self.is_occupied(neighbour) {
                continue;
            }
            let other = find_compress(&mut self.slots, neighbour);
            if other == root {
                continue;
            }
            if self.slots[root] > self.slots[other] {
                self.slots[other] += self.slots[root];
                self.slots[root] = other as i64;
                root = other;
            } else {
                self.slots[root] += self.slots[other];
                self.slots[other] = root as i64;
            }
            self.largest = self.largest.max((-self.slots[root]) as usize);
        }
    }

    /// Flat cluster labels: the root index for occupied sites, the empty
    /// marker otherwise. The forest itself is left as is.
    pub fn group_clusters(&self) -> Vec<i64> {
        let mut scratch = self.slots.clone();
        (0..scratch.len())
            .map(|site| {
                if scratch[site] == self.empty {
                    self.empty
                } else {
                    find_compress(&mut scratch, site) as i64
                }
            })
            .collect()
    }
}

fn find_compress(slots: &mut [i64], site: usize) -> usize {
    let mut root = site;
    while slots[root] >= 0 {
        root = slots[root] as usize;
    }
    let mut node = site;
    while slots[node] >= 0 {
        let parent = slots[node] as usize;
        slots[node] = root as i64;
        node = parent;
    }
    root
}

/// Occupies the first `floor(threshold * n_sites) - 1` sites of `order`.
pub fn percolate(topology: &Topology, order: &[usize], threshold: f64) -> Forest {
    let n_sites = topology.n_sites();
    let steps = ((threshold * n_sites as f64).floor() as usize)
        .saturating_sub(1)
        .min(order.len());
    let mut forest = Forest::new(n_sites);
    for &site in &order[..steps] {
        forest.occupy(site, topology);
    }
    forest
}
