// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Chain of rigid body motions from the current frame to the world origin.
//!
//! The pose of the current frame is split in two parts:
//! the pose of the key frame in the world, and the pose of the current frame
//! relative to the key frame.
//! Tracked points are expressed in the key frame, so the motion estimated each frame
//! only replaces the second part.

use crate::misc::type_aliases::Iso3;

/// Key-to-world and current-to-key rigid body motions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseChain {
    key_to_world: Iso3,
    current_to_key: Iso3,
}

impl Default for PoseChain {
    fn default() -> Self {
        Self::identity()
    }
}

impl PoseChain {
    /// Current frame, key frame and world coordinates all coincide.
    pub fn identity() -> Self {
        Self {
            key_to_world: Iso3::identity(),
            current_to_key: Iso3::identity(),
        }
    }

    /// Transform from the key frame to the world frame.
    pub fn key_to_world(&self) -> Iso3 {
        self.key_to_world
    }

    /// Transform from the current frame to the key frame.
    pub fn current_to_key(&self) -> Iso3 {
        self.current_to_key
    }

    /// Transform from the current frame to the world frame.
    pub fn current_to_world(&self) -> Iso3 {
        self.key_to_world * self.current_to_key
    }

    /// Update the pose of the current frame with the estimated
    /// motion from the key frame to the current frame.
    pub fn with_motion(self, key_to_current: &Iso3) -> Self {
        Self {
            key_to_world: self.key_to_world,
            current_to_key: key_to_current.inverse(),
        }
    }

    /// Make the current frame the new key frame.
    ///
    /// Also return the transform from the previous key frame to the new one,
    /// to re-express points previously in the key frame.
    pub fn advance_key_frame(self) -> (Self, Iso3) {
        let chain = Self {
            key_to_world: self.current_to_world(),
            current_to_key: Iso3::identity(),
        };
        (chain, self.current_to_key.inverse())
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::misc::type_aliases::{Float, Point3};
    use nalgebra::{Translation3, UnitQuaternion};

    const EPSILON: Float = 1e-9;

    fn motion(t: (Float, Float, Float), angles: (Float, Float, Float)) -> Iso3 {
        Iso3::from_parts(
            Translation3::new(t.0, t.1, t.2),
            UnitQuaternion::from_euler_angles(angles.0, angles.1, angles.2),
        )
    }

    #[test]
    fn identity_chain() {
        let chain = PoseChain::default();
        assert_eq!(Iso3::identity(), chain.current_to_world());
        assert_eq!(Iso3::identity(), chain.key_to_world());
    }

    #[test]
    fn motion_replaces_current_to_key() {
        let key_to_current = motion((0.1, 0.2, -0.3), (0.01, 0.02, 0.03));
        let chain = PoseChain::identity()
            .with_motion(&motion((5.0, 5.0, 5.0), (0.5, 0.5, 0.5)))
            .with_motion(&key_to_current);
        approx::assert_relative_eq!(
            chain.current_to_key(),
            key_to_current.inverse(),
            epsilon = EPSILON
        );
    }

    #[test]
    fn advancing_key_frame_keeps_current_pose() {
        let chain = PoseChain::identity()
            .with_motion(&motion((0.5, -0.1, 0.2), (0.1, -0.2, 0.05)))
            .advance_key_frame()
            .0
            .with_motion(&motion((0.2, 0.3, -0.1), (-0.05, 0.1, 0.2)));
        let before = chain.current_to_world();
        let (advanced, _) = chain.advance_key_frame();
        assert_eq!(Iso3::identity(), advanced.current_to_key());
        approx::assert_relative_eq!(advanced.key_to_world(), before, epsilon = EPSILON);
        approx::assert_relative_eq!(advanced.current_to_world(), before, epsilon = EPSILON);
    }

    #[test]
    fn reparenting_transform_keeps_world_location() {
        let chain = PoseChain::identity()
            .with_motion(&motion((1.0, 0.0, 0.5), (0.3, 0.0, -0.2)))
            .advance_key_frame()
            .0
            .with_motion(&motion((0.0, 0.4, 0.1), (0.0, 0.2, 0.1)));
        let point_in_key = Point3::new(0.5, -1.0, 3.0);
        let in_world = chain.key_to_world() * point_in_key;
        let (advanced, old_key_to_new_key) = chain.advance_key_frame();
        let point_in_new_key = old_key_to_new_key * point_in_key;
        approx::assert_relative_eq!(
            advanced.key_to_world() * point_in_new_key,
            in_world,
            epsilon = EPSILON
        );
    }

    // PROPERTY TESTS ################################################

    #[quickcheck_macros::quickcheck]
    fn composition_invariant(steps: Vec<(i8, i8, i8, i8, i8, i8, bool)>) -> bool {
        let mut chain = PoseChain::identity();
        steps.into_iter().all(|(t1, t2, t3, a1, a2, a3, new_key)| {
            let scaled = |x: i8| Float::from(x) * 0.01;
            let key_to_current = motion(
                (scaled(t1), scaled(t2), scaled(t3)),
                (scaled(a1), scaled(a2), scaled(a3)),
            );
            chain = chain.with_motion(&key_to_current);
            if new_key {
                chain = chain.advance_key_frame().0;
            }
            let composed = chain.key_to_world().to_homogeneous() * chain.current_to_key().to_homogeneous();
            let current_to_world = chain.current_to_world().to_homogeneous();
            (composed - current_to_world).amax() < EPSILON
        })
    }
}
