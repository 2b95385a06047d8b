// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Camera intrinsics parameters and projections.

use crate::misc::type_aliases::{Float, Mat3, Point2, Point3, Vec3};

/// Intrinsic parameters of a pinhole camera.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Intrinsics {
    /// Principal point (in pixels) of the camera, `(cu, cv)`.
    pub principal_point: (Float, Float),
    /// Focal lengths (in pixels) along the two image axis, `(fu, fv)`.
    pub focal: (Float, Float),
    /// Skew of the image axis.
    pub skew: Float,
}

impl Intrinsics {
    /// Intrinsics 3x3 matrix, usually called K.
    #[rustfmt::skip]
    pub fn matrix(&self) -> Mat3 {
        let (cu, cv) = self.principal_point;
        let (fu, fv) = self.focal;
        Mat3::new(
            fu,  self.skew, cu,
            0.0, fv,        cv,
            0.0, 0.0,       1.0,
        )
    }

    /// Project a 3D point into homogeneous image coordinates.
    /// Divide by the last coordinate to get the pixel.
    pub fn project(&self, point: Point3) -> Vec3 {
        let (cu, cv) = self.principal_point;
        let (fu, fv) = self.focal;
        Vec3::new(
            fu * point[0] + self.skew * point[1] + cu * point[2],
            fv * point[1] + cv * point[2],
            point[2],
        )
    }

    /// Project a 3D point into its pixel.
    /// Return `None` if the point is not in front of the camera.
    pub fn project_pixel(&self, point: &Point3) -> Option<Point2> {
        if point.z > Float::EPSILON {
            let uvz = self.project(*point);
            Some(Point2::new(uvz.x / uvz.z, uvz.y / uvz.z))
        } else {
            None
        }
    }

    /// Coordinates of a pixel on the normalized image plane (`z = 1`).
    pub fn normalize(&self, pixel: &Point2) -> Point2 {
        let (cu, cv) = self.principal_point;
        let (fu, fv) = self.focal;
        let y = (pixel.y - cv) / fv;
        let x = (pixel.x - cu - self.skew * y) / fu;
        Point2::new(x, y)
    }

    /// Back project a pixel with a known depth into a 3D point.
    pub fn back_project(&self, pixel: Point2, depth: Float) -> Point3 {
        let normalized = self.normalize(&pixel);
        Point3::new(normalized.x * depth, normalized.y * depth, depth)
    }
}

// TESTS #############################################################
