// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to handle datasets compatible with TUM RGB-D.

use nalgebra as na;
use std::fmt;
use std::path::PathBuf;

use crate::core::camera::Intrinsics;
use crate::misc::type_aliases::{Float, Iso3};

/// U16 depth values are scaled for better precision.
/// So 5000 in the 16 bits gray png corresponds to 1 meter.
pub const DEPTH_SCALE: Float = 5000.0;

/// Intrinsics parameters of freiburg 1 (fr1) scenes in the TUM RGB-D dataset.
#[allow(clippy::excessive_precision)]
pub const INTRINSICS_FR1: Intrinsics = Intrinsics {
    principal_point: (318.643_040, 255.313_989),
    focal: (517.306_408, 516.469_215),
    skew: 0.0,
};

/// Intrinsics parameters of freiburg 2 (fr2) scenes in the TUM RGB-D dataset.
#[allow(clippy::excessive_precision)]
pub const INTRINSICS_FR2: Intrinsics = Intrinsics {
    principal_point: (325.141_442, 249.701_764),
    focal: (520.908_620, 521.007_327),
    skew: 0.0,
};

/// Intrinsics parameters of freiburg 3 (fr3) scenes in the TUM RGB-D dataset.
#[allow(clippy::excessive_precision)]
pub const INTRINSICS_FR3: Intrinsics = Intrinsics {
    principal_point: (320.106_653, 247.632_132),
    focal: (535.433_105, 539.212_524),
    skew: 0.0,
};

/// Timestamp and 3D camera pose of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Timestamp of the frame.
    pub timestamp: f64,
    /// Pose (rigid body motion / direct isometry) of the frame.
    pub pose: Iso3,
}

/// Association of two related depth and color timestamps and images file paths.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    /// Timestamp of the depth image.
    pub depth_timestamp: f64,
    /// File path of the depth image.
    pub depth_file_path: PathBuf,
    /// Timestamp of the color image.
    pub color_timestamp: f64,
    /// File path of the color image.
    pub color_file_path: PathBuf,
}

/// Write Frame data in the TUM RGB-D format for trajectories:
/// `timestamp tx ty tz qx qy qz qw`.
impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let t = self.pose.translation.vector;
        let q = self.pose.rotation.into_inner().coords;
        write!(
            f,
            "{} {} {} {} {} {} {} {}",
            self.timestamp, t.x, t.y, t.z, q.x, q.y, q.z, q.w
        )
    }
}

/// Parse useful files (trajectories, associations, ...) in a dataset using the TUM RGB-D format.
pub mod parse {
    use super::*;
    use nom::{
        branch::alt,
        bytes::complete::{is_not, tag},
        character::complete::{space0, space1},
        combinator::{map, rest},
        number::complete::double,
        sequence::{preceded, terminated, tuple},
        IResult,
    };
    use thiserror::Error;

    /// A line of the file could not be parsed.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    #[error("parsing error at line {line}: {content:?}")]
    pub struct ParseError {
        /// Line number, starting at 1.
        pub line: usize,
        /// Content of the line.
        pub content: String,
    }

    /// Parse an association file into a vector of `Association`.
    pub fn associations(file_content: &str) -> Result<Vec<Association>, ParseError> {
        multi_line(association_line, file_content)
    }

    /// Parse a trajectory file into a vector of `Frame`.
    pub fn trajectory(file_content: &str) -> Result<Vec<Frame>, ParseError> {
        multi_line(trajectory_line, file_content)
    }

    /// Empty lines are skipped.
    fn multi_line<F, T>(line_parser: F, file_content: &str) -> Result<Vec<T>, ParseError>
    where
        F: Fn(&str) -> IResult<&str, Option<T>>,
    {
        let mut vec_data = Vec::new();
        for (line_nb, line) in file_content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match line_parser(line) {
                Ok((_, Some(data))) => vec_data.push(data),
                Ok(_) => (),
                Err(_) => {
                    return Err(ParseError {
                        line: line_nb + 1,
                        content: line.to_string(),
                    })
                }
            }
        }
        Ok(vec_data)
    }

    // nom parsers #############################################################

    // Associations --------------------

    /// Association line is either a comment or two timestamps and file paths.
    fn association_line(input: &str) -> IResult<&str, Option<Association>> {
        alt((map(comment, |_| None), map(association, Some)))(input)
    }

    /// Parse an association of depth and color timestamps and file paths.
    fn association(input: &str) -> IResult<&str, Association> {
        map(
            tuple((
                terminated(double, space1),
                terminated(path, space1),
                terminated(double, space1),
                path,
            )),
            |(depth_timestamp, depth_file_path, color_timestamp, color_file_path)| Association {
                depth_timestamp,
                depth_file_path,
                color_timestamp,
                color_file_path,
            },
        )(input)
    }

    fn path(input: &str) -> IResult<&str, PathBuf> {
        map(is_not(" \t\r\n"), PathBuf::from)(input)
    }

    // Trajectory ----------------------

    /// Trajectory line is either a comment or a frame timestamp and pose.
    fn trajectory_line(input: &str) -> IResult<&str, Option<Frame>> {
        alt((map(comment, |_| None), map(frame, Some)))(input)
    }

    /// Parse a comment.
    fn comment(input: &str) -> IResult<&str, ()> {
        map(preceded(tag("#"), rest), |_| ())(input)
    }

    /// Parse a frame.
    fn frame(input: &str) -> IResult<&str, Frame> {
        map(
            tuple((preceded(space0, double), pose)),
            |(timestamp, pose)| Frame { timestamp, pose },
        )(input)
    }

    /// Parse extrinsics camera parameters.
    fn pose(input: &str) -> IResult<&str, Iso3> {
        map(tuple((translation, rotation)), |(t, r)| Iso3::from_parts(t, r))(input)
    }

    /// Parse components of a translation.
    fn translation(input: &str) -> IResult<&str, na::Translation3<Float>> {
        map(tuple((spaced, spaced, spaced)), |(x, y, z)| {
            na::Translation3::new(x, y, z)
        })(input)
    }

    /// Parse components of a unit quaternion describing the rotation.
    fn rotation(input: &str) -> IResult<&str, na::UnitQuaternion<Float>> {
        map(tuple((spaced, spaced, spaced, spaced)), |(qx, qy, qz, qw)| {
            na::UnitQuaternion::from_quaternion(na::Quaternion::new(qw, qx, qy, qz))
        })(input)
    }

    /// A number preceded by spaces.
    fn spaced(input: &str) -> IResult<&str, Float> {
        preceded(space1, double)(input)
    }
} // pub mod parse

// TESTS #############################################################

#[cfg(test)]
mod tests {

    use super::*;
    use nalgebra::{Translation3, UnitQuaternion};

    const TRAJECTORY: &str = "\
# ground truth trajectory
# timestamp tx ty tz qx qy qz qw
1305031102.175304 1.3405 0.6266 1.6575 0.6574 0.6126 -0.2949 -0.3248

1305031102.211214 1.3303 0.6256 1.6464 0.6579 0.6161 -0.2932 -0.3189
";

    #[test]
    fn parse_trajectory() {
        let frames = parse::trajectory(TRAJECTORY).unwrap();
        assert_eq!(2, frames.len());
        approx::assert_relative_eq!(1_305_031_102.211_214, frames[1].timestamp);
        approx::assert_relative_eq!(1.3303, frames[1].pose.translation.vector.x);
        approx::assert_relative_eq!(1.0, frames[0].pose.rotation.into_inner().norm(), epsilon = 1e-12);
    }

    #[test]
    fn parse_error_gives_line() {
        let content = "# comment\n1.0 2.0 3.0\n";
        let error = parse::trajectory(content).unwrap_err();
        assert_eq!(2, error.line);
        assert_eq!("1.0 2.0 3.0", error.content);
    }

    #[test]
    fn parse_associations() {
        let content = "1305031102.160407 depth/1305031102.160407.png 1305031102.175304 rgb/1305031102.175304.png\n";
        let associations = parse::associations(content).unwrap();
        assert_eq!(1, associations.len());
        assert_eq!(
            PathBuf::from("rgb/1305031102.175304.png"),
            associations[0].color_file_path
        );
        approx::assert_relative_eq!(1_305_031_102.160_407, associations[0].depth_timestamp);
    }

    #[test]
    fn display_is_parsed_back() {
        let frame = Frame {
            timestamp: 0.5,
            pose: Iso3::from_parts(
                Translation3::new(1.0, -2.0, 0.25),
                UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
            ),
        };
        let line = frame.to_string();
        assert!(line.starts_with("0.5 1 -2 0.25 "));
        let parsed = parse::trajectory(&line).unwrap();
        assert_eq!(0.5, parsed[0].timestamp);
        approx::assert_relative_eq!(parsed[0].pose, frame.pose, epsilon = 1e-12);
    }
}
