// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Synthetic sequences: a cloud of landmarks seen by a moving RGB-D camera.
//!
//! A sequence provides the ground truth camera poses, sparse depth maps
//! where only landmarks are rendered, and a point tracker following
//! the projections of landmarks with configurable noise and failures.

use itertools::Itertools;
use nalgebra::DMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

use crate::core::camera::Intrinsics;
use crate::core::inverse_depth::{self, InverseDepth};
use crate::core::track::tracker::{PointTracker, TrackedPair};
use crate::math::se3;
use crate::misc::type_aliases::{Float, Iso3, Point2, Point3, Vec2, Vec6};

/// Configuration of a synthetic sequence.
#[derive(Debug, Clone)]
pub struct Config {
    /// Camera intrinsics.
    pub intrinsics: Intrinsics,
    /// Image `(width, height)` in pixels.
    pub image_size: (usize, usize),
    /// 16 bits value of 1 meter in depth maps.
    pub depth_scale: Float,
    /// Number of landmarks, uniformly drawn in a box in front of the first camera.
    pub nb_landmarks: usize,
    /// Number of frames of the sequence.
    pub nb_frames: usize,
    /// Constant camera motion between two frames, as a twist `[v; w]`.
    pub twist: Vec6,
    /// Maximum number of tracks followed at the same time by the tracker.
    pub max_tracks: usize,
    /// Amplitude (pixels) of the uniform noise added to tracked pixels.
    pub pixel_noise: Float,
    /// Probability for a track to jump to a wrong location at each frame.
    pub outlier_ratio: Float,
    /// Seed of the random number generators.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            intrinsics: Intrinsics {
                principal_point: (319.5, 239.5),
                focal: (525.0, 525.0),
                skew: 0.0,
            },
            image_size: (640, 480),
            depth_scale: 5000.0,
            nb_landmarks: 600,
            nb_frames: 30,
            twist: Vec6::new(0.01, 0.0, 0.04, 0.0, 0.005, 0.002),
            max_tracks: 200,
            pixel_noise: 0.0,
            outlier_ratio: 0.0,
            seed: 0,
        }
    }
}

/// Landmarks and ground truth trajectory of a synthetic sequence.
#[derive(Debug, Clone)]
pub struct Sequence {
    config: Config,
    landmarks: Vec<Point3>,
    poses: Vec<Iso3>,
}

impl Config {
    /// Generate the landmarks and trajectory of the sequence.
    pub fn init(self) -> Sequence {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let landmarks = (0..self.nb_landmarks)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-5.0..5.0),
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(4.0..12.0),
                )
            })
            .collect();
        let step = se3::exp(self.twist);
        let mut poses = Vec::with_capacity(self.nb_frames);
        let mut camera_to_world = Iso3::identity();
        for _ in 0..self.nb_frames {
            poses.push(camera_to_world);
            camera_to_world *= step;
        }
        Sequence {
            config: self,
            landmarks,
            poses,
        }
    }
}

impl Sequence {
    /// Configuration of the sequence.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Landmarks, in world coordinates.
    pub fn landmarks(&self) -> &[Point3] {
        &self.landmarks
    }

    /// Ground truth camera to world poses, the first one is the identity.
    pub fn poses(&self) -> &[Iso3] {
        &self.poses
    }

    /// Depth map of a frame, where only landmarks are rendered.
    /// Each landmark covers the pixel nearest to its projection, the closest one wins.
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    pub fn depth_map(&self, frame: usize) -> DMatrix<u16> {
        let (width, height) = self.config.image_size;
        let mut depth_map = DMatrix::zeros(height, width);
        let world_to_camera = self.poses[frame].inverse();
        for landmark in &self.landmarks {
            let point = world_to_camera * landmark;
            let pixel = match visible_pixel(&self.config, &point) {
                Some(pixel) => pixel,
                None => continue,
            };
            let idepth = InverseDepth::WithVariance(1.0 / point.z, 0.0);
            let depth = inverse_depth::to_depth(self.config.depth_scale, idepth);
            let (u, v) = (pixel.x.round() as usize, pixel.y.round() as usize);
            if u >= width || v >= height || depth == 0 {
                continue;
            }
            let current: &mut u16 = &mut depth_map[(v, u)];
            if *current == 0 || depth < *current {
                *current = depth;
            }
        }
        depth_map
    }

    /// A point tracker following the landmarks of this sequence.
    /// Its images are camera to world poses.
    pub fn tracker(&self) -> SyntheticTracker {
        SyntheticTracker {
            config: self.config.clone(),
            landmarks: self.landmarks.clone(),
            rng: StdRng::seed_from_u64(self.config.seed.wrapping_add(1)),
            world_to_camera: None,
            next_handle: 0,
            tracks: Vec::new(),
        }
    }
}

/// Pixel of a point in camera coordinates, if inside the image.
fn visible_pixel(config: &Config, point: &Point3) -> Option<Point2> {
    let (width, height) = config.image_size;
    let pixel = config.intrinsics.project_pixel(point)?;
    #[allow(clippy::cast_precision_loss)]
    let inside = pixel.x >= 0.0
        && pixel.y >= 0.0
        && pixel.x <= (width - 1) as Float
        && pixel.y <= (height - 1) as Float;
    if inside {
        Some(pixel)
    } else {
        None
    }
}

/// A track of the synthetic tracker.
#[derive(Debug, Clone)]
struct Track {
    handle: u64,
    landmark: usize,
    first: Point2,
    current: Point2,
    /// Accumulated tracking failure.
    offset: Vec2,
}

/// Point tracker following projections of landmarks.
///
/// Tracks are lost when their landmark leaves the image.
/// Tracked pixels are perturbed by uniform noise, and at each frame
/// a track may jump to a wrong location, where it stays.
pub struct SyntheticTracker {
    config: Config,
    landmarks: Vec<Point3>,
    rng: StdRng,
    world_to_camera: Option<Iso3>,
    next_handle: u64,
    tracks: Vec<Track>,
}

impl SyntheticTracker {
    /// Index of the landmark followed by a track.
    pub fn landmark_of(&self, handle: u64) -> Option<usize> {
        self.tracks
            .iter()
            .find(|t| t.handle == handle)
            .map(|t| t.landmark)
    }

    fn noise(&mut self) -> Vec2 {
        let amplitude = self.config.pixel_noise;
        if amplitude > 0.0 {
            Vec2::new(
                self.rng.gen_range(-amplitude..amplitude),
                self.rng.gen_range(-amplitude..amplitude),
            )
        } else {
            Vec2::zeros()
        }
    }

    fn jump(&mut self) -> Vec2 {
        if self.rng.gen_bool(self.config.outlier_ratio.clamp(0.0, 1.0)) {
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            Vec2::new(sign * self.rng.gen_range(10.0..40.0), self.rng.gen_range(-40.0..40.0))
        } else {
            Vec2::zeros()
        }
    }
}

impl PointTracker for SyntheticTracker {
    /// Camera to world pose of the new frame.
    type Image = Iso3;
    type Handle = u64;

    fn advance(&mut self, camera_to_world: &Iso3) {
        let world_to_camera = camera_to_world.inverse();
        self.world_to_camera = Some(world_to_camera);
        let tracks = std::mem::take(&mut self.tracks);
        let mut kept = Vec::with_capacity(tracks.len());
        for mut track in tracks {
            let point = world_to_camera * self.landmarks[track.landmark];
            if let Some(pixel) = visible_pixel(&self.config, &point) {
                track.offset += self.jump();
                track.current = pixel + track.offset + self.noise();
                kept.push(track);
            }
        }
        self.tracks = kept;
    }

    fn spawn_tracks(&mut self) -> Vec<(u64, Point2)> {
        let world_to_camera = match self.world_to_camera {
            Some(pose) => pose,
            None => return Vec::new(),
        };
        let tracked: HashSet<usize> = self.tracks.iter().map(|t| t.landmark).collect();
        let room = self.config.max_tracks.saturating_sub(self.tracks.len());
        let candidates = self
            .landmarks
            .iter()
            .enumerate()
            .filter(|(id, _)| !tracked.contains(id))
            .filter_map(|(id, landmark)| {
                visible_pixel(&self.config, &(world_to_camera * landmark)).map(|pixel| (id, pixel))
            })
            .take(room)
            .collect_vec();
        candidates
            .into_iter()
            .map(|(landmark, pixel)| {
                let handle = self.next_handle;
                self.next_handle += 1;
                self.tracks.push(Track {
                    handle,
                    landmark,
                    first: pixel,
                    current: pixel,
                    offset: Vec2::zeros(),
                });
                (handle, pixel)
            })
            .collect()
    }

    fn drop_track(&mut self, handle: u64) {
        self.tracks.retain(|t| t.handle != handle);
    }

    fn active_pairs(&self) -> Vec<TrackedPair<u64>> {
        self.tracks
            .iter()
            .map(|t| TrackedPair {
                handle: t.handle,
                first: t.first,
                current: t.current,
            })
            .collect()
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.world_to_camera = None;
    }
}

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;

    fn sequence() -> Sequence {
        Config {
            nb_landmarks: 100,
            nb_frames: 5,
            ..Config::default()
        }
        .init()
    }

    #[test]
    fn trajectory_starts_at_identity() {
        let sequence = sequence();
        assert_eq!(5, sequence.poses().len());
        assert_eq!(Iso3::identity(), sequence.poses()[0]);
        let step = se3::exp(sequence.config().twist);
        approx::assert_relative_eq!(sequence.poses()[2], step * step, epsilon = 1e-12);
    }

    #[test]
    fn depth_map_renders_visible_landmarks() {
        let sequence = sequence();
        let depth_map = sequence.depth_map(0);
        let config = sequence.config();
        let mut nb_checked = 0;
        for landmark in sequence.landmarks() {
            if let Some(pixel) = visible_pixel(config, landmark) {
                let (u, v) = (pixel.x.round() as usize, pixel.y.round() as usize);
                let depth = Float::from(depth_map[(v, u)]) / config.depth_scale;
                // Another landmark may be closer on the same pixel.
                assert!(depth > 0.0 && depth <= landmark.z + 1e-3);
                nb_checked += 1;
            }
        }
        assert!(nb_checked > 0);
        let nb_rendered = depth_map.iter().filter(|&&d| d > 0).count();
        assert!(nb_rendered <= nb_checked);
    }

    #[test]
    fn tracks_follow_landmarks() {
        let sequence = sequence();
        let mut tracker = sequence.tracker();
        assert!(tracker.spawn_tracks().is_empty());
        tracker.advance(&sequence.poses()[0]);
        let spawned = tracker.spawn_tracks();
        assert!(!spawned.is_empty());
        assert!(spawned.len() <= sequence.config().max_tracks);

        tracker.advance(&sequence.poses()[1]);
        let world_to_camera = sequence.poses()[1].inverse();
        for pair in tracker.active_pairs() {
            let landmark = sequence.landmarks()[tracker.landmark_of(pair.handle).unwrap()];
            let expected = sequence
                .config()
                .intrinsics
                .project_pixel(&(world_to_camera * landmark))
                .unwrap();
            approx::assert_relative_eq!(pair.current, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn spawning_does_not_duplicate_landmarks() {
        let sequence = sequence();
        let mut tracker = sequence.tracker();
        tracker.advance(&sequence.poses()[0]);
        let first = tracker.spawn_tracks().len();
        assert!(tracker.spawn_tracks().is_empty());
        tracker.drop_track(0);
        assert_eq!(1, tracker.spawn_tracks().len());
        assert_eq!(first, tracker.active_pairs().len());
    }

    #[test]
    fn outliers_jump_away() {
        let sequence = Config {
            nb_landmarks: 100,
            nb_frames: 2,
            outlier_ratio: 1.0,
            ..Config::default()
        }
        .init();
        let mut tracker = sequence.tracker();
        tracker.advance(&sequence.poses()[0]);
        tracker.spawn_tracks();
        tracker.advance(&sequence.poses()[1]);
        let world_to_camera = sequence.poses()[1].inverse();
        for pair in tracker.active_pairs() {
            let landmark = sequence.landmarks()[tracker.landmark_of(pair.handle).unwrap()];
            let expected = sequence
                .config()
                .intrinsics
                .project_pixel(&(world_to_camera * landmark))
                .unwrap();
            assert!((pair.current - expected).norm() >= 10.0);
        }
    }

    #[test]
    fn reset_forgets_tracks_and_image() {
        let sequence = sequence();
        let mut tracker = sequence.tracker();
        tracker.advance(&sequence.poses()[0]);
        tracker.spawn_tracks();
        tracker.reset();
        assert!(tracker.active_pairs().is_empty());
        assert!(tracker.spawn_tracks().is_empty());
    }
}
