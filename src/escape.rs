// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time loop.

use num::Complex;

use crate::formula::Formula;

/// Once an iterate's modulus passes this, it has escaped.
pub const BAILOUT: f64 = 2.0;

/// What happened to a single point.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Escape {
    /// The iterate left the bailout disc after this many updates.
    Escaped(usize),
    /// It was still inside when the iteration limit ran out.
    Bounded,
}

/// Iterates `formula` from zero at the plane coordinate `c`, up to
/// `limit` times, and reports when (if ever) the orbit escaped.  The
/// test comes before each update, so the index is always less than
/// `limit`.
///
/// A step that can't be evaluated (a division by zero, say) doesn't
/// end the orbit; the iterate is reset to `c` and the loop goes on.
pub fn escape_time(formula: &Formula, c: Complex<f64>, limit: usize) -> Escape {
    let mut z: Complex<f64> = Complex { re: 0.0, im: 0.0 };
    for i in 0..limit {
        if z.norm() > BAILOUT {
            return Escape::Escaped(i);
        }
        z = formula.apply(z, c).unwrap_or(c);
    }
    Escape::Bounded
}
