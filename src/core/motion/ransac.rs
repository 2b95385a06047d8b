// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Robust PnP: DLT hypotheses inside a RANSAC loop.

use log::debug;
use rand::{rngs::StdRng, seq::index, SeedableRng};

use crate::core::camera::Intrinsics;
use crate::core::motion::{dlt, reprojection_error, EstimationError, MotionEstimator};
use crate::core::track::point_track::Point2D3D;
use crate::misc::type_aliases::{Float, Iso3};

/// Configuration of the RANSAC PnP estimator.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of sampled hypotheses.
    pub max_iterations: usize,
    /// Maximum reprojection error (pixels) of an inlier.
    pub inlier_threshold: Float,
    /// Minimum number of inliers to accept a motion.
    pub min_inliers: usize,
    /// Probability of sampling at least one outlier free hypothesis,
    /// used to stop iterations early.
    pub confidence: Float,
    /// Seed of the random number generator, for reproducibility.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            inlier_threshold: 2.0,
            min_inliers: 12,
            confidence: 0.999,
            seed: 1_234_567,
        }
    }
}

/// RANSAC PnP estimator, implementing `MotionEstimator`.
/// Can only be constructed by initialization from a `Config`.
pub struct RansacPnp {
    config: Config,
    intrinsics: Intrinsics,
    rng: StdRng,
    model: Iso3,
    match_set: Vec<Point2D3D>,
    input_indices: Vec<usize>,
}

/// Best hypothesis so far.
struct Hypothesis {
    model: Iso3,
    inliers: Vec<usize>,
    rms: Float,
}

impl Config {
    /// Initialize the estimator for a camera.
    pub fn init(self, intrinsics: Intrinsics) -> RansacPnp {
        RansacPnp {
            rng: StdRng::seed_from_u64(self.seed),
            config: self,
            intrinsics,
            model: Iso3::identity(),
            match_set: Vec::new(),
            input_indices: Vec::new(),
        }
    }
}

impl RansacPnp {
    /// Configuration of the estimator.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Indices of inliers of a model, with the RMS of their reprojection errors.
    #[allow(clippy::cast_precision_loss)]
    fn inliers_of(&self, corrs: &[Point2D3D], model: &Iso3) -> (Vec<usize>, Float) {
        let mut inliers = Vec::new();
        let mut squared_sum = 0.0;
        for (i, corr) in corrs.iter().enumerate() {
            let error = reprojection_error(&self.intrinsics, model, corr);
            if error <= self.config.inlier_threshold {
                inliers.push(i);
                squared_sum += error * error;
            }
        }
        let rms = if inliers.is_empty() {
            Float::INFINITY
        } else {
            (squared_sum / inliers.len() as Float).sqrt()
        };
        (inliers, rms)
    }

    /// Fit a model to a subset of correspondences and score it on all of them.
    fn hypothesis(&self, corrs: &[Point2D3D], subset: &[usize]) -> Option<Hypothesis> {
        let sample: Vec<Point2D3D> = subset.iter().map(|&i| corrs[i]).collect();
        let model = dlt::solve(&self.intrinsics, &sample).ok()?;
        let (inliers, rms) = self.inliers_of(corrs, &model);
        Some(Hypothesis {
            model,
            inliers,
            rms,
        })
    }
}

impl MotionEstimator for RansacPnp {
    fn process(&mut self, corrs: &[Point2D3D]) -> Result<(), EstimationError> {
        self.match_set.clear();
        self.input_indices.clear();
        let n = corrs.len();
        if n < dlt::MIN_POINTS {
            return Err(EstimationError::TooFewCorrespondences {
                got: n,
                min: dlt::MIN_POINTS,
            });
        }

        let mut best: Option<Hypothesis> = None;
        let mut max_iterations = self.config.max_iterations;
        let mut nb_iter = 0;
        while nb_iter < max_iterations {
            nb_iter += 1;
            let sample = index::sample(&mut self.rng, n, dlt::MIN_POINTS).into_vec();
            let candidate = match self.hypothesis(corrs, &sample) {
                Some(h) if h.inliers.len() >= dlt::MIN_POINTS => h,
                _ => continue,
            };

            // Refit on all inliers of the hypothesis.
            let candidate = match self.hypothesis(corrs, &candidate.inliers) {
                Some(refit) if refit.inliers.len() >= candidate.inliers.len() => refit,
                _ => candidate,
            };

            if is_better(&candidate, best.as_ref()) {
                let inlier_ratio = candidate.inliers.len() as Float / n as Float;
                max_iterations = nb_iterations(
                    self.config.confidence,
                    inlier_ratio,
                    nb_iter,
                    self.config.max_iterations,
                );
                best = Some(candidate);
            }
        }

        let best = best.ok_or(EstimationError::NoConsensus {
            best: 0,
            min: self.config.min_inliers,
        })?;
        debug!(
            "RANSAC: {} inliers out of {} after {} iterations, rms {:.3} px",
            best.inliers.len(),
            n,
            nb_iter,
            best.rms
        );
        if best.inliers.len() < self.config.min_inliers {
            return Err(EstimationError::NoConsensus {
                best: best.inliers.len(),
                min: self.config.min_inliers,
            });
        }
        self.model = best.model;
        self.match_set = best.inliers.iter().map(|&i| corrs[i]).collect();
        self.input_indices = best.inliers;
        Ok(())
    }

    fn model(&self) -> &Iso3 {
        &self.model
    }

    fn match_set(&self) -> &[Point2D3D] {
        &self.match_set
    }

    fn input_index(&self, i: usize) -> usize {
        self.input_indices[i]
    }
}

// Helper ######################################################################

/// More inliers is better, then lower reprojection error.
fn is_better(candidate: &Hypothesis, best: Option<&Hypothesis>) -> bool {
    match best {
        None => true,
        Some(best) => {
            candidate.inliers.len() > best.inliers.len()
                || (candidate.inliers.len() == best.inliers.len() && candidate.rms < best.rms)
        }
    }
}

/// Number of iterations needed to sample an outlier free hypothesis
/// with the given confidence.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
fn nb_iterations(confidence: Float, inlier_ratio: Float, nb_iter: usize, max: usize) -> usize {
    let outlier_free = inlier_ratio.powi(dlt::MIN_POINTS as i32);
    let denom = (1.0 - outlier_free).max(1e-12).ln();
    if denom >= 0.0 || confidence <= 0.0 {
        return max;
    }
    let needed = ((1.0 - confidence).ln() / denom).ceil();
    (needed.max(0.0) as usize).clamp(nb_iter, max)
}

// TESTS #############################################################
