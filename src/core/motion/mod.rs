// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Estimation of the camera motion from 2D-3D correspondences (PnP).
//!
//! Motion estimators are robust to outliers and report which correspondences
//! are inliers of the estimated motion.
//! Refiners improve a motion estimate with non-linear optimization
//! on the inlier set.

pub mod dlt;
pub mod lm_refiner;
pub mod ransac;

use thiserror::Error;

use crate::core::camera::Intrinsics;
use crate::core::track::point_track::Point2D3D;
use crate::misc::type_aliases::{Float, Iso3};

/// Failure of a motion estimation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    /// Less correspondences than needed to estimate a motion.
    #[error("not enough correspondences: got {got}, need at least {min}")]
    TooFewCorrespondences {
        /// Number of correspondences given.
        got: usize,
        /// Minimum number of correspondences.
        min: usize,
    },
    /// The configuration of the points does not determine a motion.
    #[error("degenerate configuration of points: {0}")]
    Degenerate(&'static str),
    /// No motion hypothesis is supported by enough inliers.
    #[error("no consensus: best motion has {best} inliers, need at least {min}")]
    NoConsensus {
        /// Number of inliers of the best hypothesis.
        best: usize,
        /// Minimum number of inliers.
        min: usize,
    },
}

/// Failure of a motion refinement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RefineError {
    /// Less points than degrees of freedom.
    #[error("not enough points to refine a motion: {0}")]
    TooFewPoints(usize),
    /// The normal equations of the least squares problem cannot be solved.
    #[error("singular normal equations")]
    Singular,
}

/// Estimation of a rigid body motion robust to outliers.
///
/// The motion transforms points from the key frame (3D locations of the
/// correspondences) to the current frame (2D observations).
pub trait MotionEstimator {
    /// Estimate the motion from the given correspondences.
    /// Model and inliers are only meaningful after a successful call.
    fn process(&mut self, correspondences: &[Point2D3D]) -> Result<(), EstimationError>;

    /// Motion from the key frame to the current frame.
    fn model(&self) -> &Iso3;

    /// Correspondences classified as inliers of the model.
    fn match_set(&self) -> &[Point2D3D];

    /// Index, among the correspondences given to `process`,
    /// of the i-th correspondence of the match set.
    fn input_index(&self, i: usize) -> usize;
}

/// Non-linear refinement of a motion estimate.
pub trait PoseRefiner {
    /// Refine the motion from the key frame to the current frame,
    /// using only inlier correspondences.
    fn refine(&mut self, initial: &Iso3, inliers: &[Point2D3D]) -> Result<Iso3, RefineError>;
}

/// Pixel distance between the observation and the reprojection of the 3D location.
/// Points behind the camera have an infinite error.
pub fn reprojection_error(intrinsics: &Intrinsics, model: &Iso3, corr: &Point2D3D) -> Float {
    match intrinsics.project_pixel(&(model * corr.location)) {
        Some(pixel) => (pixel - corr.observation).norm(),
        None => Float::INFINITY,
    }
}
