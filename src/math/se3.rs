// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Exponential and logarithm maps of 3D rigid body motions.
//!
//! Twists are parameterized as `[v; w]`, linear velocity first.
//! The rotation part is delegated to `so3`, the translation part
//! goes through the left jacobian `V` of SO3:
//! `exp([v; w]) = (V(w) v, exp(w))`.

use nalgebra::Translation3;

use crate::math::so3;
use crate::misc::type_aliases::{Float, Iso3, Mat3, Vec3, Vec6};

const EPSILON_TAYLOR_SERIES_2: Float = 1e-4;

/// Parameterization of a twist (element of se3).
pub type Twist = Vec6;

/// Compute the exponential map from Lie algebra se3 to Lie group SE3.
pub fn exp(xi: Twist) -> Iso3 {
    let v = Vec3::new(xi[0], xi[1], xi[2]);
    let w = Vec3::new(xi[3], xi[4], xi[5]);
    Iso3::from_parts(Translation3::from(left_jacobian(w) * v), so3::exp(w))
}

/// Compute the logarithm map from the Lie group SE3 to the Lie algebra se3.
/// Inverse of the exponential map.
pub fn log(motion: Iso3) -> Twist {
    let w = so3::log(motion.rotation);
    let v = left_jacobian_inverse(w) * motion.translation.vector;
    Vec6::new(v.x, v.y, v.z, w.x, w.y, w.z)
}

/// `V(w) = I + (1 - cos θ) / θ² [w] + (θ - sin θ) / θ³ [w]²`.
fn left_jacobian(w: Vec3) -> Mat3 {
    let theta_2 = w.norm_squared();
    let (coef_1, coef_2) = if theta_2 < EPSILON_TAYLOR_SERIES_2 {
        (0.5 - theta_2 / 24.0, 1.0 / 6.0 - theta_2 / 120.0)
    } else {
        let theta = theta_2.sqrt();
        (
            (1.0 - theta.cos()) / theta_2,
            (theta - theta.sin()) / (theta * theta_2),
        )
    };
    Mat3::identity() + coef_1 * so3::hat(w) + coef_2 * so3::hat_2(w)
}

/// `V(w)⁻¹ = I - [w] / 2 + (1 - θ sin θ / (2 (1 - cos θ))) / θ² [w]²`.
fn left_jacobian_inverse(w: Vec3) -> Mat3 {
    let theta_2 = w.norm_squared();
    let coef_2 = if theta_2 < EPSILON_TAYLOR_SERIES_2 {
        1.0 / 12.0 + theta_2 / 720.0
    } else {
        let theta = theta_2.sqrt();
        (1.0 - theta * theta.sin() / (2.0 * (1.0 - theta.cos()))) / theta_2
    };
    Mat3::identity() - 0.5 * so3::hat(w) + coef_2 * so3::hat_2(w)
}

// TESTS #############################################################
