// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Miscellaneous helper functions that didn't fit elsewhere.

use nalgebra::UnitQuaternion;

use crate::math::so3;
use crate::misc::type_aliases::{Float, Iso3};

/// First order Taylor approximation for renormalization of rotation part of motion.
pub fn renormalize(motion: Iso3) -> Iso3 {
    let mut motion = motion;
    motion.rotation = renormalize_unit_quaternion(motion.rotation);
    motion
}

/// First order Taylor approximation for unit quaternion re-normalization.
fn renormalize_unit_quaternion(uq: UnitQuaternion<Float>) -> UnitQuaternion<Float> {
    let q = uq.into_inner();
    let sq_norm = q.norm_squared();
    UnitQuaternion::new_unchecked(0.5 * (3.0 - sq_norm) * q)
}

/// Angle (radians) of the rotation part of a rigid body motion.
pub fn rotation_angle(motion: &Iso3) -> Float {
    so3::log(motion.rotation).norm()
}

/// Distance in translation and angle in rotation between two rigid body motions.
pub fn pose_error(estimated: &Iso3, reference: &Iso3) -> (Float, Float) {
    let delta = reference.inverse() * estimated;
    (delta.translation.vector.norm(), rotation_angle(&delta))
}

// TESTS #############################################################
