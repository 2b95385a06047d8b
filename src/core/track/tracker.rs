// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Interface of the underlying 2D point tracker.

use std::hash::Hash;

use crate::misc::type_aliases::Point2;

/// A feature currently tracked by a `PointTracker`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPair<H> {
    /// Handle identifying the track.
    pub handle: H,
    /// Pixel where the track was spawned.
    pub first: Point2,
    /// Pixel of the track in the latest processed image.
    pub current: Point2,
}

/// A tracker of 2D point features in a sequence of images.
///
/// Detection and matching of features are entirely up to the implementation.
/// In particular, tracks may be lost during any call to `advance`,
/// without notification other than their absence from `active_pairs`.
pub trait PointTracker {
    /// Type of the images processed.
    type Image: ?Sized;
    /// Identifier of a track, unique among the active tracks.
    type Handle: Copy + Eq + Hash;

    /// Track the active features into a new image.
    fn advance(&mut self, image: &Self::Image);

    /// Detect new features in the latest image and start tracking them.
    /// Return the handles and pixels of the new tracks.
    fn spawn_tracks(&mut self) -> Vec<(Self::Handle, Point2)>;

    /// Stop tracking a feature. Does nothing if the handle is unknown.
    fn drop_track(&mut self, handle: Self::Handle);

    /// All the tracks still alive, with their first and current pixels.
    fn active_pairs(&self) -> Vec<TrackedPair<Self::Handle>>;

    /// Drop all tracks and forget any previous image.
    fn reset(&mut self);
}
