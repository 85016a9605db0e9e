// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The errors a caller of the renderer can see.  Every one of them is
//! fatal to the call that produced it; the recoverable conditions (a
//! formula that doesn't parse, a pixel that divides by zero) are
//! absorbed long before they get here.

use failure::Fail;

/// Everything that can stop a render, a zoom, or an export.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum Error {
    /// The formula named something outside the allowlist.  This is
    /// never downgraded to the default rule.
    #[fail(display = "The function is not a mathematical expression: '{}' is not allowed", _0)]
    DisallowedToken(String),

    /// The plane rectangle failed its invariant.
    #[fail(display = "Incorrect coordinates: {}", _0)]
    InvalidViewport(String),

    /// A zoom selection had no area.
    #[fail(display = "Invalid selection: {}", _0)]
    InvalidSelection(String),

    /// A caller-supplied pixel buffer doesn't match the image size.
    #[fail(
        display = "Pixel buffer is {}x{}, but the render is {}x{}",
        width, height, size, size
    )]
    BufferMismatch {
        /// Width of the supplied buffer.
        width: u32,
        /// Height of the supplied buffer.
        height: u32,
        /// Edge length of the requested render.
        size: u32,
    },

    /// A worker thread died before delivering its band.
    #[fail(display = "Render worker failed: {}", _0)]
    WorkerFailed(String),

    /// Animation export was asked for with too few saved frames.
    #[fail(display = "Need at least {} frames to create an animation, have {}", needed, have)]
    NotEnoughFrames {
        /// The minimum number of saved frames.
        needed: usize,
        /// How many are currently saved.
        have: usize,
    },
}

/// Shorthand used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
