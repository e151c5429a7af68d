//! Exhaustive grid search for the logistic curve, with parallel evaluation
//!
//! Every (K, r, t0) triple on a regular grid is scored by its sum of squared
//! residuals against the history, and the best one wins. The reduction breaks
//! SSE ties on candidate index, so the parallel and sequential builds always
//! pick the same triple.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Evenly spaced values over `[min, max]`, endpoints included
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub steps: usize,
}

impl ParamRange {
    #[must_use]
    pub const fn new(min: f64, max: f64, steps: usize) -> Self {
        Self { min, max, steps }
    }

    #[must_use]
    pub fn value(&self, index: usize) -> f64 {
        if self.steps <= 1 {
            (self.min + self.max) / 2.0
        } else {
            self.min + (self.max - self.min) * (index as f64) / (self.steps - 1) as f64
        }
    }
}

/// Parameters of `share(t) = K / (1 + e^(-r (t - t0)))`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Carrying capacity K
    pub capacity: f64,
    /// Growth rate r
    pub growth_rate: f64,
    /// Inflection year t0
    pub midpoint: f64,
}

impl LogisticParams {
    #[must_use]
    pub fn eval(&self, t: f64) -> f64 {
        self.capacity / (1.0 + (-self.growth_rate * (t - self.midpoint)).exp())
    }
}

/// Search space for the logistic fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticGrid {
    pub capacity: ParamRange,
    pub growth_rate: ParamRange,
    pub midpoint: ParamRange,
}

impl Default for LogisticGrid {
    fn default() -> Self {
        Self {
            capacity: ParamRange::new(0.3, 0.8, 20),
            growth_rate: ParamRange::new(0.01, 0.1, 20),
            midpoint: ParamRange::new(2000.0, 2040.0, 20),
        }
    }
}

impl LogisticGrid {
    /// Total number of candidate triples
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacity.steps.max(1) * self.growth_rate.steps.max(1) * self.midpoint.steps.max(1)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode a flat candidate index; K varies slowest, t0 fastest
    #[must_use]
    pub fn candidate(&self, index: usize) -> LogisticParams {
        let n_r = self.growth_rate.steps.max(1);
        let n_t = self.midpoint.steps.max(1);

        LogisticParams {
            capacity: self.capacity.value(index / (n_r * n_t)),
            growth_rate: self.growth_rate.value((index / n_t) % n_r),
            midpoint: self.midpoint.value(index % n_t),
        }
    }
}

/// Winning candidate of a grid search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFit {
    pub params: LogisticParams,
    pub sse: f64,
    pub index: usize,
    pub candidates: usize,
}

fn sse(params: &LogisticParams, points: &[(f64, f64)]) -> f64 {
    let total: f64 = points
        .iter()
        .map(|&(t, y)| {
            let residual = params.eval(t) - y;
            residual * residual
        })
        .sum();
    if total.is_nan() { f64::INFINITY } else { total }
}

/// Lower SSE wins, ties go to the lower index
fn better(a: (f64, usize), b: (f64, usize)) -> (f64, usize) {
    if b.0 < a.0 || (b.0 == a.0 && b.1 < a.1) {
        b
    } else {
        a
    }
}

/// Fit the logistic curve to `(year, share)` points.
///
/// Returns `None` when the grid is empty or no candidate yields a finite SSE.
#[must_use]
pub fn fit_logistic(grid: &LogisticGrid, points: &[(f64, f64)]) -> Option<GridFit> {
    let candidates = grid.len();
    let score = |index: usize| (sse(&grid.candidate(index), points), index);

    #[cfg(feature = "parallel")]
    let best = (0..candidates)
        .into_par_iter()
        .map(score)
        .reduce_with(better);

    #[cfg(not(feature = "parallel"))]
    let best = (0..candidates).map(score).reduce(better);

    let (best_sse, index) = best?;
    if !best_sse.is_finite() {
        return None;
    }

    Some(GridFit {
        params: grid.candidate(index),
        sse: best_sse,
        index,
        candidates,
    })
}
