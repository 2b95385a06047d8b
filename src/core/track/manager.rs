// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Life cycle of point tracks: spawning, updating, retiring.

use std::collections::HashMap;

use log::trace;

use crate::core::range::{self, RangeProvider};
use crate::core::track::point_track::{Point2D3D, PointTrack};
use crate::core::track::tracker::PointTracker;
use crate::misc::type_aliases::Iso3;

/// Owns the 2D point tracker and the set of active point tracks.
///
/// The order of the active tracks only changes when tracks are added or removed,
/// so indices into `active_tracks()` stay valid between two such operations.
pub struct TrackManager<T: PointTracker> {
    tracker: T,
    tracks: Vec<PointTrack<T::Handle>>,
}

impl<T: PointTracker> TrackManager<T> {
    /// Manage the tracks of a 2D point tracker.
    /// Tracks already followed by the tracker are ignored until reset.
    pub fn new(tracker: T) -> Self {
        Self {
            tracker,
            tracks: Vec::new(),
        }
    }

    /// Track features into a new image.
    ///
    /// Tracks lost by the underlying tracker are removed from the active set,
    /// and the pixels of the others are updated.
    pub fn advance(&mut self, image: &T::Image) {
        self.tracker.advance(image);
        let alive: HashMap<_, _> = self
            .tracker
            .active_pairs()
            .into_iter()
            .map(|pair| (pair.handle, pair))
            .collect();
        let nb_before = self.tracks.len();
        self.tracks.retain_mut(|track| match alive.get(&track.handle) {
            Some(pair) => {
                track.first = pair.first;
                track.current = pair.current;
                true
            }
            None => false,
        });
        trace!("Tracker lost {} tracks", nb_before - self.tracks.len());
    }

    /// Spawn new tracks and localize them in 3D with the range provider.
    ///
    /// Candidates that cannot be localized, or that are at infinity, are dropped.
    /// The others are considered inliers at the given tick.
    /// Return the newly added tracks.
    pub fn spawn_tracks<R: RangeProvider>(
        &mut self,
        range_provider: &mut R,
        tick: u64,
    ) -> &[PointTrack<T::Handle>] {
        range_provider.initialize();
        let nb_before = self.tracks.len();
        for (handle, pixel) in self.tracker.spawn_tracks() {
            let location = range_provider
                .localize(pixel.x, pixel.y)
                .and_then(|coords| range::dehomogenize(&coords));
            match location {
                Some(location) => self.tracks.push(PointTrack {
                    handle,
                    first: pixel,
                    current: pixel,
                    location,
                    last_inlier: tick,
                }),
                None => {
                    trace!("Could not localize candidate at {}", pixel);
                    self.tracker.drop_track(handle);
                }
            }
        }
        &self.tracks[nb_before..]
    }

    /// Stop tracking a feature.
    /// Return `false` if the track was not active.
    pub fn drop_track(&mut self, handle: T::Handle) -> bool {
        match self.tracks.iter().position(|t| t.handle == handle) {
            Some(index) => {
                self.tracks.remove(index);
                self.tracker.drop_track(handle);
                true
            }
            None => false,
        }
    }

    /// Express the 3D location of all tracks in a new reference frame.
    pub fn reparent_all(&mut self, transform: &Iso3) {
        self.tracks.iter_mut().for_each(|t| t.reparent(transform));
    }

    /// Active tracks, in a stable order.
    pub fn active_tracks(&self) -> &[PointTrack<T::Handle>] {
        &self.tracks
    }

    /// 2D-3D correspondences of all active tracks, in the same order.
    pub fn correspondences(&self) -> Vec<Point2D3D> {
        self.tracks.iter().map(PointTrack::correspondence).collect()
    }

    /// Mark tracks, given by their index in `active_tracks()`, as inliers at the given tick.
    pub fn mark_inliers<I: IntoIterator<Item = usize>>(&mut self, indices: I, tick: u64) {
        for index in indices {
            self.tracks[index].last_inlier = tick;
        }
    }

    /// Drop all tracks which have not been inliers for `threshold` ticks or more.
    /// Return the number of dropped tracks.
    pub fn retire_stale(&mut self, tick: u64, threshold: u64) -> usize {
        let tracker = &mut self.tracker;
        let nb_before = self.tracks.len();
        self.tracks.retain(|t| {
            let stale = t.staleness(tick) >= threshold;
            if stale {
                tracker.drop_track(t.handle);
            }
            !stale
        });
        nb_before - self.tracks.len()
    }

    /// Drop all tracks, and reset the underlying tracker.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.tracker.reset();
    }

    /// The underlying 2D point tracker.
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Mutable access to the underlying 2D point tracker.
    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use crate::core::track::tracker::TrackedPair;
    use crate::misc::type_aliases::{Float, Point2, Point3, Vec4};

    /// Tracker whose features move by one pixel along x at each image.
    #[derive(Default)]
    struct ShiftTracker {
        next_handle: u32,
        pairs: Vec<TrackedPair<u32>>,
        to_spawn: usize,
        to_lose: Vec<u32>,
        dropped: Vec<u32>,
    }

    impl PointTracker for ShiftTracker {
        type Image = ();
        type Handle = u32;

        fn advance(&mut self, _image: &()) {
            let to_lose = std::mem::take(&mut self.to_lose);
            self.pairs.retain(|p| !to_lose.contains(&p.handle));
            self.pairs.iter_mut().for_each(|p| p.current.x += 1.0);
        }

        fn spawn_tracks(&mut self) -> Vec<(u32, Point2)> {
            (0..self.to_spawn)
                .map(|_| {
                    let handle = self.next_handle;
                    self.next_handle += 1;
                    let pixel = Point2::new(Float::from(handle), 0.0);
                    self.pairs.push(TrackedPair {
                        handle,
                        first: pixel,
                        current: pixel,
                    });
                    (handle, pixel)
                })
                .collect()
        }

        fn drop_track(&mut self, handle: u32) {
            self.dropped.push(handle);
            self.pairs.retain(|p| p.handle != handle);
        }

        fn active_pairs(&self) -> Vec<TrackedPair<u32>> {
            self.pairs.clone()
        }

        fn reset(&mut self) {
            self.pairs.clear();
        }
    }

    /// Localize pixel (x, y) at (x, y, 1), except odd x which are at infinity.
    /// Pixels for which `blind` holds cannot be localized at all.
    struct ParityRange {
        nb_initialize: usize,
        blind: fn(Float) -> bool,
    }

    impl RangeProvider for ParityRange {
        fn initialize(&mut self) {
            self.nb_initialize += 1;
        }

        #[allow(clippy::cast_possible_truncation)]
        fn localize(&mut self, x: Float, y: Float) -> Option<Vec4> {
            if (self.blind)(x) {
                return None;
            }
            let w = if (x as i64) % 2 == 0 { 2.0 } else { 0.0 };
            Some(Vec4::new(2.0 * x, 2.0 * y, 2.0, w))
        }
    }

    fn manager_with(nb_tracks: usize) -> (TrackManager<ShiftTracker>, ParityRange) {
        let tracker = ShiftTracker {
            to_spawn: nb_tracks,
            ..ShiftTracker::default()
        };
        let range = ParityRange {
            nb_initialize: 0,
            blind: |_| false,
        };
        (TrackManager::new(tracker), range)
    }

    #[test]
    fn spawn_keeps_only_localized_candidates() {
        let (mut manager, mut range) = manager_with(6);
        let spawned = manager.spawn_tracks(&mut range, 4);
        let handles: Vec<u32> = spawned.iter().map(|t| t.handle).collect();
        assert_eq!(vec![0, 2, 4], handles);
        assert!(spawned.iter().all(|t| t.last_inlier == 4));
        assert_eq!(Point3::new(2.0, 0.0, 1.0), spawned[1].location);
        assert_eq!(1, range.nb_initialize);
        assert_eq!(vec![1, 3, 5], manager.tracker().dropped);
    }

    #[test]
    fn spawn_drops_candidates_without_range() {
        let (mut manager, mut range) = manager_with(6);
        range.blind = |x| x >= 4.0;
        let spawned = manager.spawn_tracks(&mut range, 0);
        let handles: Vec<u32> = spawned.iter().map(|t| t.handle).collect();
        assert_eq!(vec![0, 2], handles);
        assert!(manager.active_tracks().iter().all(|t| t.handle != 4));
        assert_eq!(vec![1, 3, 4, 5], manager.tracker().dropped);
    }

    #[test]
    fn advance_follows_tracker_and_removes_lost_tracks() {
        let (mut manager, mut range) = manager_with(6);
        manager.spawn_tracks(&mut range, 0);
        manager.tracker_mut().to_lose = vec![2];
        manager.advance(&());
        let tracks = manager.active_tracks();
        assert_eq!(2, tracks.len());
        assert_eq!(0, tracks[0].handle);
        assert_eq!(Point2::new(1.0, 0.0), tracks[0].current);
        assert_eq!(Point2::new(0.0, 0.0), tracks[0].first);
        assert_eq!(4, tracks[1].handle);
    }

    #[test]
    fn drop_track_is_idempotent() {
        let (mut manager, mut range) = manager_with(4);
        manager.spawn_tracks(&mut range, 0);
        assert!(manager.drop_track(2));
        assert!(!manager.drop_track(2));
        assert!(!manager.drop_track(42));
        assert_eq!(1, manager.active_tracks().len());
    }

    #[test]
    fn retire_stale_uses_threshold() {
        let (mut manager, mut range) = manager_with(6);
        manager.spawn_tracks(&mut range, 0);
        manager.mark_inliers(vec![1], 3);
        assert_eq!(0, manager.retire_stale(3, 4));
        assert_eq!(2, manager.retire_stale(4, 4));
        let remaining: Vec<u32> = manager.active_tracks().iter().map(|t| t.handle).collect();
        assert_eq!(vec![2], remaining);
        assert!(manager.tracker().dropped.contains(&0));
        assert!(manager.tracker().dropped.contains(&4));
    }

    #[test]
    fn reparent_all_moves_every_location() {
        let (mut manager, mut range) = manager_with(4);
        manager.spawn_tracks(&mut range, 0);
        let shift = Iso3::translation(0.0, 0.0, 1.0);
        manager.reparent_all(&shift);
        assert!(manager.active_tracks().iter().all(|t| t.location.z == 2.0));
    }

    #[test]
    fn correspondences_follow_active_order() {
        let (mut manager, mut range) = manager_with(4);
        manager.spawn_tracks(&mut range, 0);
        manager.advance(&());
        let corrs = manager.correspondences();
        assert_eq!(2, corrs.len());
        assert_eq!(Point2::new(3.0, 0.0), corrs[1].observation);
        assert_eq!(Point3::new(2.0, 0.0, 1.0), corrs[1].location);
    }

    #[test]
    fn reset_forgets_everything() {
        let (mut manager, mut range) = manager_with(4);
        manager.spawn_tracks(&mut range, 0);
        manager.reset();
        assert!(manager.active_tracks().is_empty());
        assert!(manager.tracker().active_pairs().is_empty());
    }
}
