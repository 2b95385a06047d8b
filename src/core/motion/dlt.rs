// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Direct Linear Transform (DLT) solution of the PnP problem.
//!
//! The 3x4 projection matrix `[R | t]` is the least squares solution of
//! the homogeneous linear system built from normalized image coordinates.
//! Its rotation part is then projected onto SO(3).

use nalgebra::{DMatrix, Matrix3x4, Rotation3, Translation3, UnitQuaternion};

use crate::core::camera::Intrinsics;
use crate::core::motion::EstimationError;
use crate::core::track::point_track::Point2D3D;
use crate::misc::type_aliases::{Float, Iso3, Mat4, Vec3};

/// Minimum number of correspondences for the DLT.
pub const MIN_POINTS: usize = 6;

/// Motion from the key frame to the current frame, fitting all correspondences.
///
/// 3D points must not all lie on a plane.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::many_single_char_names)]
pub fn solve(intrinsics: &Intrinsics, corrs: &[Point2D3D]) -> Result<Iso3, EstimationError> {
    let n = corrs.len();
    if n < MIN_POINTS {
        return Err(EstimationError::TooFewCorrespondences {
            got: n,
            min: MIN_POINTS,
        });
    }

    // Normalize 3D points: centered, with a mean distance of sqrt(3) to the origin.
    let centroid = corrs.iter().map(|c| c.location.coords).sum::<Vec3>() / n as Float;
    let mean_dist = corrs
        .iter()
        .map(|c| (c.location.coords - centroid).norm())
        .sum::<Float>()
        / n as Float;
    if mean_dist <= Float::EPSILON {
        return Err(EstimationError::Degenerate("all 3D points are identical"));
    }
    let scale = (3.0 as Float).sqrt() / mean_dist;
    #[rustfmt::skip]
    let normalization = Mat4::new(
        scale, 0.0,   0.0,   -scale * centroid.x,
        0.0,   scale, 0.0,   -scale * centroid.y,
        0.0,   0.0,   scale, -scale * centroid.z,
        0.0,   0.0,   0.0,   1.0,
    );

    // Two rows per correspondence in the 2n x 12 system A p = 0.
    let mut a = DMatrix::<Float>::zeros(2 * n, 12);
    for (i, corr) in corrs.iter().enumerate() {
        let p = (corr.location.coords - centroid) * scale;
        let (x, y, z) = (p.x, p.y, p.z);
        let obs = intrinsics.normalize(&corr.observation);
        let (u, v) = (obs.x, obs.y);
        let (r0, r1) = (2 * i, 2 * i + 1);
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = z;
        a[(r0, 3)] = 1.0;
        a[(r0, 8)] = -u * x;
        a[(r0, 9)] = -u * y;
        a[(r0, 10)] = -u * z;
        a[(r0, 11)] = -u;
        a[(r1, 4)] = x;
        a[(r1, 5)] = y;
        a[(r1, 6)] = z;
        a[(r1, 7)] = 1.0;
        a[(r1, 8)] = -v * x;
        a[(r1, 9)] = -v * y;
        a[(r1, 10)] = -v * z;
        a[(r1, 11)] = -v;
    }

    // Right singular vector of the smallest singular value.
    let svd = a.svd(false, true);
    let v_t = svd.v_t.ok_or(EstimationError::Degenerate("SVD failed"))?;
    let smallest = svd.singular_values.imin();
    let p_coefs: Vec<Float> = v_t.row(smallest).iter().copied().collect();
    let p_normalized = Matrix3x4::from_row_slice(&p_coefs);
    let p_mat = p_normalized * normalization;

    // Remove the unknown scale (and sign) of the solution.
    let m = p_mat.fixed_view::<3, 3>(0, 0).into_owned();
    let mut s = (m.row(0).norm() + m.row(1).norm() + m.row(2).norm()) / 3.0;
    if m.determinant() < 0.0 {
        s = -s;
    }
    if s.abs() <= Float::EPSILON {
        return Err(EstimationError::Degenerate("null rotation part"));
    }
    let r_approx = m / s;
    let t = p_mat.column(3) / s;

    // Closest rotation matrix.
    let svd = r_approx.svd(true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Err(EstimationError::Degenerate("SVD failed")),
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(r_orth));
    Ok(Iso3::from_parts(Translation3::from(t), rotation))
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::misc::helper;
    use crate::misc::type_aliases::{Point2, Point3};

    const INTRINSICS: Intrinsics = Intrinsics {
        principal_point: (320.0, 240.0),
        focal: (520.0, 515.0),
        skew: 0.0,
    };

    fn synthetic_corrs(key_to_current: &Iso3) -> Vec<Point2D3D> {
        let mut corrs = Vec::new();
        for i in 0..3 {
            for j in 0..3 {
                for k in 0..2 {
                    let location = Point3::new(
                        -0.6 + 0.6 * Float::from(i),
                        -0.5 + 0.5 * Float::from(j),
                        2.0 + 1.5 * Float::from(k) + 0.1 * Float::from(i),
                    );
                    let observation = INTRINSICS
                        .project_pixel(&(key_to_current * location))
                        .unwrap();
                    corrs.push(Point2D3D {
                        observation,
                        location,
                    });
                }
            }
        }
        corrs
    }

    #[test]
    fn recovers_exact_motion() {
        let truth = Iso3::from_parts(
            Translation3::new(0.1, -0.05, 0.2),
            UnitQuaternion::from_euler_angles(0.05, -0.1, 0.02),
        );
        let estimated = solve(&INTRINSICS, &synthetic_corrs(&truth)).unwrap();
        let (dt, dr) = helper::pose_error(&estimated, &truth);
        assert!(dt < 1e-6, "translation error: {}", dt);
        assert!(dr < 1e-6, "rotation error: {}", dr);
    }

    #[test]
    fn too_few_points() {
        let corrs = synthetic_corrs(&Iso3::identity());
        assert_eq!(
            Err(EstimationError::TooFewCorrespondences { got: 5, min: 6 }),
            solve(&INTRINSICS, &corrs[..5])
        );
    }

    #[test]
    fn identical_points_are_degenerate() {
        let corr = Point2D3D {
            observation: Point2::new(320.0, 240.0),
            location: Point3::new(0.0, 0.0, 1.0),
        };
        let result = solve(&INTRINSICS, &vec![corr; 8]);
        assert!(matches!(result, Err(EstimationError::Degenerate(_))));
    }
}
