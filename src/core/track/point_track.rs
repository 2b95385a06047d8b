// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Point tracks and the 2D-3D correspondences built from them.

use crate::misc::type_aliases::{Iso3, Point2, Point3};

/// A 2D feature followed across frames, with its 3D location.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTrack<H> {
    /// Handle of this track in the underlying 2D tracker.
    pub handle: H,
    /// Pixel of the feature in the frame where it was spawned.
    pub first: Point2,
    /// Pixel of the feature in the current frame.
    pub current: Point2,
    /// 3D location of the feature, in the coordinates of the current key frame.
    pub location: Point3,
    /// Tick of the last frame where this track was part of the inlier set.
    pub last_inlier: u64,
}

impl<H> PointTrack<H> {
    /// Number of ticks since this track was last an inlier.
    pub fn staleness(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.last_inlier)
    }

    /// Express the 3D location in a new reference frame.
    pub fn reparent(&mut self, transform: &Iso3) {
        self.location = transform * self.location;
    }

    /// The 2D-3D correspondence of this track in the current frame.
    pub fn correspondence(&self) -> Point2D3D {
        Point2D3D {
            observation: self.current,
            location: self.location,
        }
    }
}

/// Observed pixel of a 3D point.
/// The input of the PnP problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D3D {
    /// Pixel where the point is observed in the current frame.
    pub observation: Point2,
    /// 3D location of the point, in the key frame.
    pub location: Point3,
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    fn track() -> PointTrack<u32> {
        PointTrack {
            handle: 7,
            first: Point2::new(10.0, 20.0),
            current: Point2::new(12.0, 21.0),
            location: Point3::new(1.0, 0.0, 2.0),
            last_inlier: 3,
        }
    }

    #[test]
    fn staleness_counts_ticks() {
        let track = track();
        assert_eq!(0, track.staleness(3));
        assert_eq!(2, track.staleness(5));
        assert_eq!(0, track.staleness(1));
    }

    #[test]
    fn reparent_applies_transform() {
        let mut track = track();
        let transform = Iso3::from_parts(
            Translation3::new(0.0, 1.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        track.reparent(&transform);
        approx::assert_abs_diff_eq!(track.location, Point3::new(0.0, 2.0, 2.0), epsilon = 1e-12);
    }

    #[test]
    fn correspondence_uses_current_pixel() {
        let corr = track().correspondence();
        assert_eq!(Point2::new(12.0, 21.0), corr.observation);
        assert_eq!(Point3::new(1.0, 0.0, 2.0), corr.location);
    }
}
