// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use log::warn;
use std::{env, error::Error};

use visual_odometry_pnp::core::motion::{lm_refiner, ransac};
use visual_odometry_pnp::core::odometry;
use visual_odometry_pnp::core::range::DepthMap;
use visual_odometry_pnp::dataset::{synthetic, tum_rgbd};
use visual_odometry_pnp::misc::helper;
use visual_odometry_pnp::misc::type_aliases::Float;

/// Frame rate of the generated sequence, for timestamps.
const FPS: Float = 30.0;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    if let Err(error) = my_run(&args) {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

const USAGE: &str = "Usage: ./vopnp_synthetic [nb_frames] [seed]";

#[allow(clippy::cast_precision_loss)]
fn my_run(args: &[String]) -> Result<(), Box<dyn Error>> {
    // Check that the arguments are correct.
    let valid_args = check_args(args)?;

    // Generate the synthetic sequence.
    let sequence = synthetic::Config {
        nb_frames: valid_args.nb_frames,
        seed: valid_args.seed,
        pixel_noise: 0.5,
        outlier_ratio: 0.02,
        ..synthetic::Config::default()
    }
    .init();
    let intrinsics = sequence.config().intrinsics;

    // Setup the odometry.
    let estimator = ransac::Config {
        seed: valid_args.seed,
        ..ransac::Config::default()
    }
    .init(intrinsics);
    let refiner = lm_refiner::Config::default().init(intrinsics);
    let range_provider = DepthMap::new(intrinsics, sequence.config().depth_scale);
    let mut vo = odometry::Config::default().init(
        sequence.tracker(),
        range_provider,
        estimator,
        Some(refiner),
    );

    // Process every frame of the sequence.
    for (frame, camera_to_world) in sequence.poses().iter().enumerate() {
        vo.range_provider_mut()
            .set_depth_map(sequence.depth_map(frame));
        if let Err(error) = vo.process(camera_to_world) {
            warn!("Frame {}: {}", frame, error);
        }

        // Print to stdout the frame pose.
        let frame = tum_rgbd::Frame {
            timestamp: frame as Float / FPS,
            pose: vo.current_to_world(),
        };
        println!("{}", frame);
    }

    // Print to stderr the drift at the end of the sequence.
    if let Some(truth) = sequence.poses().last() {
        let (translation, rotation) = helper::pose_error(&vo.current_to_world(), truth);
        eprintln!(
            "Drift after {} frames: {:.4} m, {:.4} rad",
            sequence.poses().len(),
            translation,
            rotation
        );
    }

    Ok(())
}

struct Args {
    nb_frames: usize,
    seed: u64,
}

/// Verify that command line arguments are correct.
fn check_args(args: &[String]) -> Result<Args, String> {
    let default = synthetic::Config::default();
    let parse_error = |arg: &str| {
        eprintln!("{}", USAGE);
        format!("Invalid argument: {}", arg)
    };
    match args {
        [_] => Ok(Args {
            nb_frames: default.nb_frames,
            seed: default.seed,
        }),
        [_, nb_frames] => Ok(Args {
            nb_frames: nb_frames.parse().map_err(|_| parse_error(nb_frames))?,
            seed: default.seed,
        }),
        [_, nb_frames, seed] => Ok(Args {
            nb_frames: nb_frames.parse().map_err(|_| parse_error(nb_frames))?,
            seed: seed.parse().map_err(|_| parse_error(seed))?,
        }),
        _ => {
            eprintln!("{}", USAGE);
            Err("Wrong number of arguments".to_string())
        }
    }
}
