#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time fractal renderer
//!
//! The Mandelbrot set is drawn by taking a point `c` on the complex
//! plane, starting at zero, and repeatedly squaring and adding `c`.
//! Some points fly off to infinity and some never do; how quickly a
//! point flies off picks its color.  Nothing about that recipe needs
//! the squaring in particular, so this crate lets the caller type the
//! rule: `sin(z)`, `z**3 - z`, `exp(z)/z`, and so on.  Whatever is
//! typed, `c` is added afterwards.
//!
//! The typed formula is never run as code.  It is checked against a
//! short list of permitted names and then parsed into a little
//! arithmetic tree that can only ever add, multiply, and call a handful
//! of complex functions.
//!
//! A render splits the image into horizontal bands, one per worker
//! thread, and stitches the bands back together once every worker is
//! done.  On top of that, a [`Session`](session/struct.Session.html)
//! remembers where the user has zoomed to, keeps the frames they want
//! to keep, and turns those frames into an animation that glides from
//! one to the next.

extern crate crossbeam;
extern crate failure;
extern crate image;
extern crate itertools;
extern crate log;
extern crate num;
extern crate num_cpus;

pub mod errors;
pub mod escape;
pub mod formula;
pub mod gradient;
pub mod planes;
pub mod render;
pub mod session;

pub use errors::{Error, Result};
pub use escape::{escape_time, Escape};
pub use formula::{verify, Formula};
pub use gradient::Gradient;
pub use planes::{Pixel, PlaneMapper, Viewport};
pub use render::{render, PixelBuffer, Renderer, Request};
pub use session::{Animation, Frame, Seams, Session, Shot};
