// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Recovery of the 3D location of pixels from range data.

use nalgebra::DMatrix;

use crate::core::camera::Intrinsics;
use crate::core::inverse_depth;
use crate::misc::type_aliases::{Float, Point2, Point3, Vec4};

/// Computes the 3D location of pixels of the latest frame,
/// from stereo, structured light, time of flight, ...
///
/// The sensor data of the current frame is expected to be given
/// to the implementation by the caller, before the frame is processed.
pub trait RangeProvider {
    /// Prepare the provider before a series of `localize` calls.
    /// Called once each time the key frame changes, before new tracks are spawned.
    fn initialize(&mut self);

    /// Homogeneous coordinates `(X, Y, Z, W)` of the point seen at pixel `(x, y)`.
    /// The 3D point is `(X/W, Y/W, Z/W)`, so points at infinity have `W == 0`.
    ///
    /// Return `None` if the pixel cannot be localized.
    fn localize(&mut self, x: Float, y: Float) -> Option<Vec4>;
}

/// Metric 3D point of homogeneous coordinates.
/// Return `None` for points at infinity (`W == 0`).
pub fn dehomogenize(coords: &Vec4) -> Option<Point3> {
    let w = coords.w;
    if w == 0.0 {
        None
    } else {
        Some(Point3::new(coords.x / w, coords.y / w, coords.z / w))
    }
}

/// Range provider reading depth maps, such as the ones of RGB-D cameras.
#[derive(Debug, Clone)]
pub struct DepthMap {
    intrinsics: Intrinsics,
    depth_scale: Float,
    depth_map: DMatrix<u16>,
}

impl DepthMap {
    /// Depth map provider for a camera.
    ///
    /// `depth_scale` is the 16 bits value corresponding to 1 meter.
    /// This is 5000.0 for the TUM RGB-D dataset.
    pub fn new(intrinsics: Intrinsics, depth_scale: Float) -> Self {
        Self {
            intrinsics,
            depth_scale,
            depth_map: DMatrix::zeros(0, 0),
        }
    }

    /// Set the depth map of the next frame to process.
    /// Rows are along the `v` (y) axis of the image.
    pub fn set_depth_map(&mut self, depth_map: DMatrix<u16>) {
        self.depth_map = depth_map;
    }

    /// Depth map of the frame being processed.
    pub fn depth_map(&self) -> &DMatrix<u16> {
        &self.depth_map
    }

    /// Raw depth value at the nearest pixel, if inside the depth map.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    #[allow(clippy::cast_precision_loss)]
    fn depth_at(&self, x: Float, y: Float) -> Option<u16> {
        let (nb_rows, nb_cols) = self.depth_map.shape();
        let u = x.round();
        let v = y.round();
        if u >= 0.0 && v >= 0.0 && u < nb_cols as Float && v < nb_rows as Float {
            Some(self.depth_map[(v as usize, u as usize)])
        } else {
            None
        }
    }
}

impl RangeProvider for DepthMap {
    /// Depth maps need no per key frame preparation.
    fn initialize(&mut self) {}

    /// Returns `(x_n, y_n, 1, inverse_depth)` where `(x_n, y_n)`
    /// are the coordinates of the pixel on the normalized image plane.
    fn localize(&mut self, x: Float, y: Float) -> Option<Vec4> {
        let depth = self.depth_at(x, y)?;
        let idepth = inverse_depth::from_depth(self.depth_scale, depth, 1.0).value()?;
        let normalized = self.intrinsics.normalize(&Point2::new(x, y));
        Some(Vec4::new(normalized.x, normalized.y, 1.0, idepth))
    }
}

// TESTS #############################################################
