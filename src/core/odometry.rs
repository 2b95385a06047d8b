// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Visual odometry from tracked image points with known range.
//!
//! Each point track is localized in 3D when it is spawned, in the key frame.
//! The motion of the current frame relative to the key frame is then estimated
//! from the 2D-3D correspondences of the tracks (PnP).
//! When too few tracks remain inliers of the motion,
//! the current frame becomes the new key frame and new tracks are spawned.

use log::{debug, info, warn};
use thiserror::Error;

use crate::core::motion::{EstimationError, MotionEstimator, PoseRefiner};
use crate::core::pose_chain::PoseChain;
use crate::core::range::RangeProvider;
use crate::core::track::manager::TrackManager;
use crate::core::track::point_track::PointTrack;
use crate::core::track::tracker::PointTracker;
use crate::misc::type_aliases::{Iso3, Point2};

/// Configuration of the odometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// New tracks are spawned, on a new key frame, when the number of inliers
    /// is lower than this. With 0, a new key frame is created every frame.
    pub threshold_add: usize,
    /// Tracks which have not been inliers for this number of frames are dropped.
    pub threshold_retire: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold_add: 50,
            threshold_retire: 2,
        }
    }
}

/// Failure to process a frame.
/// The odometry is left as it was before the frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OdometryError {
    /// The motion of the frame could not be estimated.
    #[error("motion estimation failed: {0}")]
    MotionEstimation(#[from] EstimationError),
}

/// Summary of a successfully processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Number of inliers of the estimated motion.
    pub inliers: usize,
    /// Number of tracks retired for not being inliers for too long.
    pub dropped: usize,
    /// Number of new tracks.
    pub spawned: usize,
    /// Number of active tracks at the end of the frame.
    pub active_tracks: usize,
    /// The frame is the new key frame.
    pub keyframe_changed: bool,
}

/// State of the odometry between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Next frame is the first frame, defining the world coordinates.
    Uninitialized,
    /// Tracks are localized in the key frame.
    Tracking,
}

/// Visual odometry, generic over its four collaborators:
/// the 2D point tracker, the range provider, the motion estimator
/// and an optional motion refiner.
/// Can only be constructed by initialization from a `Config`.
pub struct VisualOdometry<T, P, E, R>
where
    T: PointTracker,
    P: RangeProvider,
    E: MotionEstimator,
    R: PoseRefiner,
{
    config: Config,
    state: State,
    tick: u64,
    pose_chain: PoseChain,
    tracks: TrackManager<T>,
    range_provider: P,
    estimator: E,
    refiner: Option<R>,
    inlier_pixels: Vec<Point2>,
}

impl Config {
    /// Initialize the odometry with its collaborators.
    pub fn init<T, P, E, R>(
        self,
        tracker: T,
        range_provider: P,
        estimator: E,
        refiner: Option<R>,
    ) -> VisualOdometry<T, P, E, R>
    where
        T: PointTracker,
        P: RangeProvider,
        E: MotionEstimator,
        R: PoseRefiner,
    {
        VisualOdometry {
            config: self,
            state: State::Uninitialized,
            tick: 0,
            pose_chain: PoseChain::identity(),
            tracks: TrackManager::new(tracker),
            range_provider,
            estimator,
            refiner,
            inlier_pixels: Vec::new(),
        }
    }
}

impl<T, P, E, R> VisualOdometry<T, P, E, R>
where
    T: PointTracker,
    P: RangeProvider,
    E: MotionEstimator,
    R: PoseRefiner,
{
    /// Process a new image.
    ///
    /// The first image after initialization or reset defines the world coordinates.
    /// On error, the pose, the tracks 3D locations and the inliers are unchanged,
    /// but the 2D tracker has already moved to the new image.
    pub fn process(&mut self, image: &T::Image) -> Result<FrameStats, OdometryError> {
        self.tracks.advance(image);
        match self.state {
            State::Uninitialized => Ok(self.process_first_frame()),
            State::Tracking => self.process_tracking(),
        }
    }

    fn process_first_frame(&mut self) -> FrameStats {
        self.inlier_pixels.clear();
        let spawned = self
            .tracks
            .spawn_tracks(&mut self.range_provider, self.tick)
            .len();
        self.state = State::Tracking;
        debug!("First frame: {} tracks spawned", spawned);
        FrameStats {
            inliers: 0,
            dropped: 0,
            spawned,
            active_tracks: self.tracks.active_tracks().len(),
            keyframe_changed: true,
        }
    }

    fn process_tracking(&mut self) -> Result<FrameStats, OdometryError> {
        let correspondences = self.tracks.correspondences();
        self.estimator.process(&correspondences)?;

        // Motion of the current frame relative to the key frame.
        let mut key_to_current = *self.estimator.model();
        if let Some(refiner) = self.refiner.as_mut() {
            match refiner.refine(&key_to_current, self.estimator.match_set()) {
                Ok(refined) => key_to_current = refined,
                Err(err) => warn!("Keeping the unrefined motion: {}", err),
            }
        }
        self.pose_chain = self.pose_chain.with_motion(&key_to_current);

        // Inlier bookkeeping.
        let nb_inliers = self.estimator.match_set().len();
        let indices: Vec<usize> = (0..nb_inliers)
            .map(|i| self.estimator.input_index(i))
            .collect();
        let tracks = self.tracks.active_tracks();
        self.inlier_pixels = indices.iter().map(|&i| tracks[i].current).collect();
        self.tracks.mark_inliers(indices, self.tick);
        let dropped = self
            .tracks
            .retire_stale(self.tick, self.config.threshold_retire);

        // Change of key frame.
        let keyframe_changed =
            self.config.threshold_add == 0 || nb_inliers < self.config.threshold_add;
        let mut spawned = 0;
        if keyframe_changed {
            let (pose_chain, old_key_to_new_key) = self.pose_chain.advance_key_frame();
            self.pose_chain = pose_chain;
            self.tracks.reparent_all(&old_key_to_new_key);
            spawned = self
                .tracks
                .spawn_tracks(&mut self.range_provider, self.tick)
                .len();
        }

        let stats = FrameStats {
            inliers: nb_inliers,
            dropped,
            spawned,
            active_tracks: self.tracks.active_tracks().len(),
            keyframe_changed,
        };
        debug!("Frame {}: {:?}", self.tick, stats);
        self.tick += 1;
        Ok(stats)
    }

    /// Forget everything: tracks, pose and frame counter.
    /// The next processed image defines new world coordinates.
    pub fn reset(&mut self) {
        info!("Reset of the visual odometry at frame {}", self.tick);
        self.tracks.reset();
        self.pose_chain = PoseChain::identity();
        self.inlier_pixels.clear();
        self.tick = 0;
        self.state = State::Uninitialized;
    }

    /// Transform from the current frame to the world (first frame) coordinates.
    pub fn current_to_world(&self) -> Iso3 {
        self.pose_chain.current_to_world()
    }

    /// Pixels, in the latest image, of the inliers of the latest estimated motion.
    pub fn inlier_pixels(&self) -> &[Point2] {
        &self.inlier_pixels
    }

    /// Key frame and current frame poses.
    pub fn pose_chain(&self) -> &PoseChain {
        &self.pose_chain
    }

    /// Number of frames processed since the first frame.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Active tracks, with 3D locations in the key frame.
    pub fn active_tracks(&self) -> &[PointTrack<T::Handle>] {
        self.tracks.active_tracks()
    }

    /// The underlying 2D point tracker.
    pub fn tracker(&self) -> &T {
        self.tracks.tracker()
    }

    /// The motion estimator, in the state of the latest estimation.
    pub fn motion_estimator(&self) -> &E {
        &self.estimator
    }

    /// The range provider, to update its sensor data before processing an image.
    pub fn range_provider_mut(&mut self) -> &mut P {
        &mut self.range_provider
    }

    /// Configuration of the odometry.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

// TESTS #############################################################
