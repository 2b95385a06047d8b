// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helper functions to manipulate inverse depth data from depth images.

use crate::misc::type_aliases::Float;

/// An inverse depth can be one of three values: unknown, discarded, or known with a given
/// variance.
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum InverseDepth {
    /// Not known by the capture device.
    Unknown,
    /// Value was considered too unreliable and discarded.
    Discarded,
    /// `WithVariance(inverse_depth, variance)`: known but with a given uncertainty.
    WithVariance(Float, Float),
}

impl InverseDepth {
    /// Inverse depth value, if known.
    pub fn value(&self) -> Option<Float> {
        match *self {
            InverseDepth::WithVariance(idepth, _) => Some(idepth),
            _ => None,
        }
    }
}

/// Transform a depth value from a depth map into an inverse depth value with a given scaling.
///
/// A value of 0 means that it is unknown.
pub fn from_depth(scale: Float, depth: u16, variance: Float) -> InverseDepth {
    match depth {
        0 => InverseDepth::Unknown,
        _ => InverseDepth::WithVariance(scale / Float::from(depth), variance),
    }
}

/// Transform inverse depth value back into a depth value with a given scaling.
///
/// Unknown, discarded, or out of range values are encoded with 0.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn to_depth(scale: Float, idepth: InverseDepth) -> u16 {
    match idepth {
        InverseDepth::WithVariance(x, _) if x > 0.0 => {
            let depth = (scale / x).round();
            if depth >= 1.0 && depth <= Float::from(u16::MAX) {
                depth as u16
            } else {
                0
            }
        }
        _ => 0,
    }
}

// TESTS #############################################################
