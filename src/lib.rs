// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! # Visual Odometry from pixel depth and PnP
//!
//! Full 6-DOF visual odometry where a range sensor (stereo, structured light,
//! time of flight, RGB-D camera) gives the 3D location of pixels in the key frame,
//! and the motion of each new frame is estimated by a robust
//! Perspective-n-Point solver on tracked 2D features.
//!
//! The entry point is [`core::odometry::Config`], initialized with the four
//! collaborators of the pipeline:
//!
//! * a 2D point tracker ([`core::track::tracker::PointTracker`]),
//! * a range provider ([`core::range::RangeProvider`]),
//! * a robust motion estimator ([`core::motion::MotionEstimator`]),
//! * an optional pose refiner ([`core::motion::PoseRefiner`]).
//!
//! Reference implementations are provided for all of them except a real image
//! feature tracker, for which [`dataset::synthetic`] provides a synthetic
//! substitute.

#![warn(missing_docs)]

pub mod core;
pub mod dataset;
pub mod math;
pub mod misc;
