//! Adaptive binary-partition grids.
//!
//! A [`Parni`] grid samples points in a hyper-rectangle with a density that
//! adapts to an unknown non-negative integrand. The state is a binary tree
//! of axis-aligned bins; each bin accumulates the integrand values sampled
//! inside it, and adaptation splits the heaviest leaf where its weight
//! divides most evenly, merging the lightest sibling pair when the bin cap
//! is exceeded.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weight-aggregation criterion steering the adaptation.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum GridMode {
    /// Accumulated integrand sums.
    #[default]
    CumulantWeights,
    /// Accumulated squared integrand sums.
    VarianceWeights,
    /// Largest sampled integrand value per bin.
    MaximumWeights,
}

#[derive(Clone, Debug)]
struct Bin {
    lower: Vec<f64>,
    upper: Vec<f64>,
    weight: f64,
    weight2: f64,
    max_weight: f64,
    count: u64,
    /// Per-axis weight accumulated in the lower half of the bin.
    half_weights: Vec<f64>,
    parent: Option<usize>,
    children: Option<(usize, usize)>,
    dead: bool,
}

impl Bin {
    fn new(lower: Vec<f64>, upper: Vec<f64>, parent: Option<usize>) -> Self {
        let dim = lower.len();
        Self {
            lower,
            upper,
            weight: 0.0,
            weight2: 0.0,
            max_weight: 0.0,
            count: 0,
            half_weights: vec![0.0; dim],
            parent,
            children: None,
            dead: false,
        }
    }

    fn volume(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| hi - lo)
            .product()
    }

    fn contains(&self, point: &[f64]) -> bool {
        point
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .all(|(x, (lo, hi))| *x >= *lo && *x < *hi || *x == *hi)
    }

    fn score(&self, mode: GridMode) -> f64 {
        match mode {
            GridMode::CumulantWeights => self.weight,
            GridMode::VarianceWeights => self.weight2.sqrt(),
            GridMode::MaximumWeights => self.max_weight * self.volume(),
        }
    }
}

/// Adaptive binary-partition integrator over a hyper-rectangle.
#[derive(Clone, Debug)]
pub struct Parni {
    dim: usize,
    bins: Vec<Bin>,
    free: Vec<usize>,
    mode: GridMode,
    max_bins: usize,
    last_leaf: Option<usize>,
    last_weight: f64,
}

impl Parni {
    /// Creates a grid covering `[lower, upper]` with at most `max_bins`
    /// leaves.
    ///
    /// # Panics
    ///
    /// Panics if the corners have different dimensions or the box is empty.
    #[must_use]
    pub fn new(lower: &[f64], upper: &[f64], max_bins: usize, mode: GridMode) -> Self {
        assert_eq!(lower.len(), upper.len());
        assert!(lower.iter().zip(upper).all(|(lo, hi)| lo < hi));
        Self {
            dim: lower.len(),
            bins: vec![Bin::new(lower.to_vec(), upper.to_vec(), None)],
            free: Vec::new(),
            mode,
            max_bins: max_bins.max(1),
            last_leaf: None,
            last_weight: 0.0,
        }
    }

    /// Creates a one-dimensional grid on `[lower, upper]`.
    #[must_use]
    pub fn new_1d(lower: f64, upper: f64, max_bins: usize, mode: GridMode) -> Self {
        Self::new(&[lower], &[upper], max_bins, mode)
    }

    /// Dimension of the integration domain.
    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    /// Number of live bins in the tree.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bins.iter().filter(|bin| !bin.dead).count()
    }

    /// Number of leaves.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.bins
            .iter()
            .filter(|bin| !bin.dead && bin.children.is_none())
            .count()
    }

    /// Returns whether the leaf cap has been reached.
    #[must_use]
    pub fn saturated(&self) -> bool {
        self.leaf_count() >= self.max_bins
    }

    fn children_scores(&self, node: usize) -> Option<(usize, usize, f64, f64)> {
        let (left, right) = self.bins[node].children?;
        Some((
            left,
            right,
            self.bins[left].score(self.mode),
            self.bins[right].score(self.mode),
        ))
    }

    /// Draws a point and returns it with its reciprocal sampling density.
    pub fn generate<R: Rng>(&mut self, rng: &mut R) -> (Vec<f64>, f64) {
        let mut node = 0;
        let mut probability = 1.0;
        while let Some((left, right, score_left, score_right)) = self.children_scores(node) {
            let total = score_left + score_right;
            let p_left = if total > 0.0 { score_left / total } else { 0.5 };
            if rng.gen::<f64>() < p_left {
                probability *= p_left;
                node = left;
            } else {
                probability *= 1.0 - p_left;
                node = right;
            }
        }
        let bin = &self.bins[node];
        let point: Vec<f64> = bin
            .lower
            .iter()
            .zip(&bin.upper)
            .map(|(lo, hi)| lo + (hi - lo) * rng.gen::<f64>())
            .collect();
        let weight = bin.volume() / probability;
        self.last_leaf = Some(node);
        self.last_weight = weight;
        (point, weight)
    }

    /// Returns the reciprocal sampling density of an externally supplied
    /// point, registering its leaf for the next update.
    pub fn evaluate_weight(&mut self, point: &[f64]) -> f64 {
        let mut node = 0;
        let mut probability = 1.0;
        while let Some((left, right, score_left, score_right)) = self.children_scores(node) {
            let total = score_left + score_right;
            let p_left = if total > 0.0 { score_left / total } else { 0.5 };
            if self.bins[left].contains(point) {
                probability *= p_left;
                node = left;
            } else {
                probability *= 1.0 - p_left;
                node = right;
            }
        }
        let weight = self.bins[node].volume() / probability;
        self.last_leaf = Some(node);
        self.last_weight = weight;
        weight
    }

    /// Accumulates the integrand value of the last generated or evaluated
    /// point into its leaf and all ancestors. The point itself must be
    /// supplied again for the split statistics.
    pub fn update(&mut self, point: &[f64], integrand: f64) {
        let Some(leaf) = self.last_leaf else {
            return;
        };
        let contribution = integrand * self.last_weight;
        let mut node = Some(leaf);
        while let Some(index) = node {
            let bin = &mut self.bins[index];
            bin.weight += contribution;
            bin.weight2 += contribution * contribution;
            bin.max_weight = bin.max_weight.max(contribution);
            bin.count += 1;
            for axis in 0..self.dim {
                let mid = 0.5 * (bin.lower[axis] + bin.upper[axis]);
                if point[axis] < mid {
                    bin.half_weights[axis] += contribution;
                }
            }
            node = bin.parent;
        }
    }

    /// Adapts the tree: splits the highest-score leaf at the axis that
    /// divides its weight most evenly, then merges the lowest-score sibling
    /// pairs while the leaf cap is exceeded.
    pub fn adapt(&mut self) {
        if let Some(leaf) = self.best_leaf() {
            self.split(leaf);
        }
        while self.leaf_count() > self.max_bins {
            let Some(parent) = self.worst_sibling_parent() else {
                break;
            };
            self.merge(parent);
        }
    }

    fn best_leaf(&self) -> Option<usize> {
        self.bins
            .iter()
            .enumerate()
            .filter(|(_, bin)| !bin.dead && bin.children.is_none() && bin.count > 1)
            .max_by(|(_, a), (_, b)| {
                a.score(self.mode)
                    .partial_cmp(&b.score(self.mode))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, _)| index)
    }

    fn worst_sibling_parent(&self) -> Option<usize> {
        self.bins
            .iter()
            .enumerate()
            .filter(|(index, bin)| {
                !bin.dead
                    && bin.children.is_some_and(|(left, right)| {
                        self.bins[left].children.is_none()
                            && self.bins[right].children.is_none()
                    })
                    && *index != 0
            })
            .min_by(|(_, a), (_, b)| {
                a.score(self.mode)
                    .partial_cmp(&b.score(self.mode))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(index, _)| index)
    }

    fn split(&mut self, leaf: usize) {
        // choose the axis whose midpoint divides the weight most evenly
        let bin = &self.bins[leaf];
        let weight = bin.weight;
        let axis = (0..self.dim)
            .min_by(|a, b| {
                let da = (2.0 * bin.half_weights[*a] - weight).abs();
                let db = (2.0 * bin.half_weights[*b] - weight).abs();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(0);
        let mid = 0.5 * (bin.lower[axis] + bin.upper[axis]);

        let mut left = Bin::new(bin.lower.clone(), bin.upper.clone(), Some(leaf));
        left.upper[axis] = mid;
        let mut right = Bin::new(bin.lower.clone(), bin.upper.clone(), Some(leaf));
        right.lower[axis] = mid;
        // seed the children with the recorded halves
        let lower_weight = bin.half_weights[axis];
        let upper_weight = (weight - lower_weight).max(0.0);
        left.weight = lower_weight;
        right.weight = upper_weight;
        let share = if weight > 0.0 {
            lower_weight / weight
        } else {
            0.5
        };
        left.weight2 = bin.weight2 * share;
        right.weight2 = bin.weight2 * (1.0 - share);
        left.max_weight = bin.max_weight;
        right.max_weight = bin.max_weight;
        left.count = (bin.count as f64 * share) as u64;
        right.count = bin.count - left.count;

        let left_index = self.insert_bin(left);
        let right_index = self.insert_bin(right);
        self.bins[leaf].children = Some((left_index, right_index));
        self.last_leaf = None;
    }

    fn merge(&mut self, parent: usize) {
        if let Some((left, right)) = self.bins[parent].children.take() {
            self.bins[left].dead = true;
            self.bins[right].dead = true;
            self.free.push(left);
            self.free.push(right);
        }
        self.last_leaf = None;
    }

    fn insert_bin(&mut self, bin: Bin) -> usize {
        if let Some(index) = self.free.pop() {
            self.bins[index] = bin;
            index
        } else {
            self.bins.push(bin);
            self.bins.len() - 1
        }
    }

    /// Integral estimate: the mean of `integrand × weight` over all updates.
    #[must_use]
    pub fn integral_estimate(&self) -> f64 {
        let root = &self.bins[0];
        if root.count == 0 {
            return 0.0;
        }
        root.weight / root.count as f64
    }

    /// Creates a restricted view sampling only inside the sub-rectangle,
    /// sharing all adaptation state with this grid.
    #[must_use]
    pub fn sub_grid(&self, lower: Vec<f64>, upper: Vec<f64>) -> SubGrid {
        SubGrid { lower, upper }
    }

    /// Restricted score mass of `node` inside a sub-rectangle; leaves count
    /// their score times the contained volume fraction.
    fn restricted_mass(&self, node: usize, lower: &[f64], upper: &[f64]) -> f64 {
        let bin = &self.bins[node];
        let overlap: f64 = bin
            .lower
            .iter()
            .zip(&bin.upper)
            .zip(lower.iter().zip(upper))
            .map(|((blo, bhi), (lo, hi))| (bhi.min(*hi) - blo.max(*lo)).max(0.0))
            .product();
        if overlap <= 0.0 {
            return 0.0;
        }
        match bin.children {
            Some((left, right)) => {
                self.restricted_mass(left, lower, upper)
                    + self.restricted_mass(right, lower, upper)
            }
            None => {
                let score = bin.score(self.mode).max(f64::MIN_POSITIVE);
                score * overlap / bin.volume()
            }
        }
    }
}

/// Restricted view of a [`Parni`] grid on a sub-rectangle.
#[derive(Clone, Debug)]
pub struct SubGrid {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl SubGrid {
    /// Draws a point inside the sub-rectangle from the parent's density,
    /// returning it with its reciprocal density.
    pub fn generate<R: Rng>(&self, parent: &mut Parni, rng: &mut R) -> (Vec<f64>, f64) {
        let mut node = 0;
        let mut probability = 1.0;
        while let Some((left, right)) = parent.bins[node].children {
            let mass_left = parent.restricted_mass(left, &self.lower, &self.upper);
            let mass_right = parent.restricted_mass(right, &self.lower, &self.upper);
            let sum = mass_left + mass_right;
            if sum <= 0.0 {
                break;
            }
            let p_left = mass_left / sum;
            if rng.gen::<f64>() < p_left {
                probability *= p_left;
                node = left;
            } else {
                probability *= 1.0 - p_left;
                node = right;
            }
        }
        let bin = &parent.bins[node];
        let (lower, upper): (Vec<f64>, Vec<f64>) = bin
            .lower
            .iter()
            .zip(&bin.upper)
            .zip(self.lower.iter().zip(&self.upper))
            .map(|((blo, bhi), (lo, hi))| (blo.max(*lo), bhi.min(*hi)))
            .unzip();
        let point: Vec<f64> = lower
            .iter()
            .zip(&upper)
            .map(|(lo, hi)| lo + (hi - lo) * rng.gen::<f64>())
            .collect();
        let volume: f64 = lower.iter().zip(&upper).map(|(lo, hi)| hi - lo).product();
        let weight = volume / probability;
        parent.last_leaf = Some(node);
        parent.last_weight = weight;
        (point, weight)
    }

    /// Reciprocal density of an external point under the restricted view.
    pub fn evaluate_weight(&self, parent: &mut Parni, point: &[f64]) -> f64 {
        parent.evaluate_weight(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn drive(parni: &mut Parni, rng: &mut Pcg64, events: usize, f: impl Fn(&[f64]) -> f64) {
        for event in 0..events {
            let (point, _) = parni.generate(rng);
            parni.update(&point, f(&point));
            if event % 200 == 199 {
                parni.adapt();
            }
        }
    }

    #[test]
    fn uniform_density_integral() {
        let mut parni = Parni::new_1d(0.0, 2.0, 16, GridMode::CumulantWeights);
        let mut rng = Pcg64::seed_from_u64(7);
        drive(&mut parni, &mut rng, 4000, |_| 1.0);
        // ∫ 1 dx over [0, 2]
        assert!((parni.integral_estimate() - 2.0).abs() < 0.05);
    }

    #[test]
    fn bin_cap_is_respected() {
        let mut parni = Parni::new(&[0.0, 0.0], &[1.0, 1.0], 12, GridMode::CumulantWeights);
        let mut rng = Pcg64::seed_from_u64(3);
        drive(&mut parni, &mut rng, 5000, |x| (-(x[0] + x[1])).exp());
        assert!(parni.leaf_count() <= 12);
        assert!(parni.saturated() || parni.leaf_count() < 12);
    }

    #[test]
    fn tree_weights_are_additive() {
        let mut parni = Parni::new_1d(0.0, 1.0, 8, GridMode::CumulantWeights);
        let mut rng = Pcg64::seed_from_u64(11);
        drive(&mut parni, &mut rng, 2000, |x| x[0]);
        for (index, bin) in parni.bins.iter().enumerate() {
            if bin.dead {
                continue;
            }
            if let Some((left, right)) = bin.children {
                let sum = parni.bins[left].weight + parni.bins[right].weight;
                assert!(
                    (bin.weight - sum).abs() <= 1e-9 * bin.weight.abs().max(1.0),
                    "bin {index} weight not additive"
                );
                // children partition the parent rectangle
                let vol = parni.bins[left].volume() + parni.bins[right].volume();
                assert!((bin.volume() - vol).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn evaluate_weight_matches_generate() {
        let mut parni = Parni::new_1d(0.0, 1.0, 8, GridMode::CumulantWeights);
        let mut rng = Pcg64::seed_from_u64(5);
        drive(&mut parni, &mut rng, 1000, |x| 1.0 + x[0]);
        let (point, weight) = parni.generate(&mut rng);
        let replayed = parni.evaluate_weight(&point);
        assert!((weight - replayed).abs() < 1e-12);
    }

    #[test]
    fn sub_grid_samples_inside_its_rectangle() {
        let mut parni = Parni::new_1d(0.0, 1.0, 8, GridMode::CumulantWeights);
        let mut rng = Pcg64::seed_from_u64(9);
        drive(&mut parni, &mut rng, 1000, |x| 1.0 + 10.0 * x[0]);
        let sub = parni.sub_grid(vec![0.25], vec![0.5]);
        for _ in 0..200 {
            let (point, weight) = sub.generate(&mut parni, &mut rng);
            assert!(point[0] >= 0.25 && point[0] <= 0.5);
            assert!(weight > 0.0);
        }
    }
}
