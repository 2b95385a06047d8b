// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Point tracks: the 2D tracker interface, the track entity and its life cycle.

pub mod manager;
pub mod point_track;
pub mod tracker;
