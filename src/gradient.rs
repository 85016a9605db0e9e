// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Two-color gradients, flattened into one color per iteration count.

use image::Rgb;

use crate::escape::Escape;

/// A lookup table running linearly from one color to another, with
/// one entry per possible escape index.  Built once per render and
/// shared, read-only, by every worker.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradient {
    from: Rgb<u8>,
    to: Rgb<u8>,
    table: Vec<Rgb<u8>>,
}

/// `steps` evenly spaced values from `start` to `stop`, both included.
fn linspace(start: f64, stop: f64, steps: usize) -> impl Iterator<Item = f64> {
    let div = steps.saturating_sub(1).max(1) as f64;
    let step = (stop - start) / div;
    (0..steps).map(move |i| if i + 1 == steps && steps > 1 { stop } else { start + (i as f64) * step })
}

impl Gradient {
    /// Requires the two endpoint colors and the iteration limit the
    /// table has to cover.  Channels are truncated, not rounded.
    pub fn new(from: Rgb<u8>, to: Rgb<u8>, max_iterations: usize) -> Gradient {
        let channel = |c: usize| {
            linspace(f64::from(from.0[c]), f64::from(to.0[c]), max_iterations)
                .map(|v| v as u8)
                .collect::<Vec<u8>>()
        };
        let (r, g, b) = (channel(0), channel(1), channel(2));
        let table = (0..max_iterations)
            .map(|i| Rgb([r[i], g[i], b[i]]))
            .collect();
        Gradient { from, to, table }
    }

    /// The color for one escape result.  Bounded points take the first
    /// entry; so does anything the table doesn't cover.
    pub fn color(&self, escape: Escape) -> Rgb<u8> {
        let index = match escape {
            Escape::Escaped(i) => i,
            Escape::Bounded => 0,
        };
        self.table.get(index).copied().unwrap_or(self.from)
    }

    /// The endpoint colors.
    pub fn endpoints(&self) -> (Rgb<u8>, Rgb<u8>) {
        (self.from, self.to)
    }

    /// The full table.
    pub fn table(&self) -> &[Rgb<u8>] {
        &self.table
    }
}
