// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Levenberg-Marquardt implementation of the `OptimizerState` trait
//! for the refinement of a PnP motion, minimizing reprojection errors.
//!
//! Motion increments are twists left-multiplied to the current estimate:
//! `T_new = exp(delta) * T`.

use crate::core::camera::Intrinsics;
use crate::core::motion::{PoseRefiner, RefineError};
use crate::core::track::point_track::Point2D3D;
use crate::math::optimizer::{Continue, OptimizerState};
use crate::math::{se3, so3};
use crate::misc::helper;
use crate::misc::type_aliases::{Float, Iso3, Mat2x6, Mat6, Point3, Vec2, Vec6};

/// Configuration of the refiner.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of Levenberg-Marquardt iterations.
    pub max_iterations: usize,
    /// Iterations stop when the mean squared reprojection error (pixels²)
    /// decreases less than this.
    pub min_energy_decrease: Float,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            min_energy_decrease: 1e-10,
        }
    }
}

/// Refiner of PnP motions, implementing `PoseRefiner`.
/// Can only be constructed by initialization from a `Config`.
pub struct LmRefiner {
    config: Config,
    intrinsics: Intrinsics,
}

impl Config {
    /// Initialize the refiner for a camera.
    pub fn init(self, intrinsics: Intrinsics) -> LmRefiner {
        LmRefiner {
            config: self,
            intrinsics,
        }
    }
}

impl PoseRefiner for LmRefiner {
    fn refine(&mut self, initial: &Iso3, inliers: &[Point2D3D]) -> Result<Iso3, RefineError> {
        // Each point gives two equations for six degrees of freedom.
        if inliers.len() < 3 {
            return Err(RefineError::TooFewPoints(inliers.len()));
        }
        let obs = Obs {
            intrinsics: &self.intrinsics,
            config: &self.config,
            points: inliers,
        };
        let (state, _nb_iter) = LMOptimizerState::iterative_solve(&obs, *initial)?;
        Ok(state.eval_data.model)
    }
}

/// State of the Levenberg-Marquardt optimizer.
pub struct LMOptimizerState {
    /// Levenberg-Marquardt hessian diagonal coefficient.
    pub lm_coef: Float,
    /// Data resulting of a successful model evaluation.
    pub eval_data: EvalData,
    max_iterations: usize,
    min_energy_decrease: Float,
}

/// Either a successfully constructed `EvalData`
/// or an error containing the energy of a given model.
///
/// The error is returned when the new computed energy
/// is higher than the previous iteration energy.
pub type EvalState = Result<EvalData, Float>;

/// Data resulting of a successful model evaluation.
pub struct EvalData {
    /// The hessian matrix of the system.
    pub hessian: Mat6,
    /// The gradient of the system.
    pub gradient: Vec6,
    /// Energy associated with the current model.
    pub energy: Float,
    /// Estimated motion at the current state of iterations.
    pub model: Iso3,
}

/// Observations available for the optimizer iterations.
pub struct Obs<'a> {
    /// Intrinsic parameters of the camera.
    pub intrinsics: &'a Intrinsics,
    /// Configuration of the refiner.
    pub config: &'a Config,
    /// Inlier correspondences.
    pub points: &'a [Point2D3D],
}

impl LMOptimizerState {
    /// Mean squared reprojection error of a model.
    /// Points behind the camera are ignored.
    #[allow(clippy::cast_precision_loss)]
    fn eval_energy(obs: &Obs, model: &Iso3) -> Float {
        let (sum, count) = obs
            .points
            .iter()
            .filter_map(|corr| {
                let pixel = obs.intrinsics.project_pixel(&(model * corr.location))?;
                Some((pixel - corr.observation).norm_squared())
            })
            .fold((0.0, 0_usize), |(sum, count), r2| (sum + r2, count + 1));
        if count == 0 {
            Float::INFINITY
        } else {
            sum / count as Float
        }
    }

    /// Fully evaluate a model.
    fn compute_eval_data(obs: &Obs, model: Iso3, energy: Float) -> EvalData {
        let mut gradient = Vec6::zeros();
        let mut hessian = Mat6::zeros();
        for corr in obs.points {
            let point = model * corr.location;
            if let Some(pixel) = obs.intrinsics.project_pixel(&point) {
                let residual: Vec2 = pixel - corr.observation;
                let jac = projection_jacobian(obs.intrinsics, &point);
                gradient += jac.transpose() * residual;
                hessian += jac.transpose() * jac;
            }
        }
        EvalData {
            hessian,
            gradient,
            energy,
            model,
        }
    }
}

impl<'a> OptimizerState<Obs<'a>, EvalState, Iso3, RefineError> for LMOptimizerState {
    /// Initialize the optimizer state.
    fn init(obs: &Obs, model: Iso3) -> Self {
        Self {
            lm_coef: 0.1,
            eval_data: Self::compute_eval_data(obs, model, Self::eval_energy(obs, &model)),
            max_iterations: obs.config.max_iterations,
            min_energy_decrease: obs.config.min_energy_decrease,
        }
    }

    /// Compute the step using Levenberg-Marquardt.
    /// May return an error at the Cholesky decomposition of the hessian.
    fn step(&self) -> Result<Iso3, RefineError> {
        let mut hessian = self.eval_data.hessian;
        for i in 0..6 {
            hessian[(i, i)] *= 1.0 + self.lm_coef;
        }
        let cholesky = hessian.cholesky().ok_or(RefineError::Singular)?;
        let delta = se3::exp(-cholesky.solve(&self.eval_data.gradient));
        Ok(helper::renormalize(delta * self.eval_data.model))
    }

    /// Compute the energy of the new model.
    /// Then, evaluate the new hessian and gradient if the energy has decreased.
    fn eval(&self, obs: &Obs, model: Iso3) -> EvalState {
        let energy = Self::eval_energy(obs, &model);
        if energy > self.eval_data.energy {
            Err(energy)
        } else {
            Ok(Self::compute_eval_data(obs, model, energy))
        }
    }

    /// Stop after too many iterations,
    /// or if the energy variation is too low.
    ///
    /// Also update the Levenberg-Marquardt coefficient
    /// depending on if the energy increased or decreased.
    fn stop_criterion(self, nb_iter: usize, eval_state: EvalState) -> (Self, Continue) {
        let too_many_iterations = nb_iter >= self.max_iterations;
        match (eval_state, too_many_iterations) {
            (Err(_), true) => (self, Continue::Stop),
            (Ok(eval_data), true) => (Self { eval_data, ..self }, Continue::Stop),
            (Err(_energy), false) => {
                let mut kept_state = self;
                kept_state.lm_coef *= 10.0;
                (kept_state, Continue::Forward)
            }
            (Ok(eval_data), false) => {
                let d_energy = self.eval_data.energy - eval_data.energy;
                let continuation = if d_energy > self.min_energy_decrease {
                    Continue::Forward
                } else {
                    Continue::Stop
                };
                let kept_state = Self {
                    lm_coef: 0.1 * self.lm_coef,
                    eval_data,
                    ..self
                };
                (kept_state, continuation)
            }
        }
    }
}

// Helper ######################################################################

/// Jacobian of the projection of `exp(delta) * point` with respect to the twist `delta`,
/// at `delta = 0`.
#[allow(clippy::many_single_char_names)]
fn projection_jacobian(intrinsics: &Intrinsics, point: &Point3) -> Mat2x6 {
    let (fu, fv) = intrinsics.focal;
    let s = intrinsics.skew;
    let (x, y) = (point.x, point.y);
    let _z = 1.0 / point.z;
    let _z2 = _z * _z;

    // Jacobian of the pixel with respect to the 3D point.
    #[rustfmt::skip]
    let d_proj = nalgebra::Matrix2x3::new(
        fu * _z, s * _z,  -(fu * x + s * y) * _z2,
        0.0,     fv * _z, -fv * y * _z2,
    );

    // Jacobian of the moved point: [ I | -hat(point) ].
    let mut d_point = nalgebra::Matrix3x6::zeros();
    d_point.fixed_view_mut::<3, 3>(0, 0).fill_with_identity();
    d_point
        .fixed_view_mut::<3, 3>(0, 3)
        .copy_from(&(-so3::hat(point.coords)));

    d_proj * d_point
}

// TESTS #############################################################
