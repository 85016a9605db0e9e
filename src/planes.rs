// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Viewport, a rectangle on the complex plane, and the
//! PlaneMapper, which lays a square grid of pixels over one.  Also the
//! arithmetic that moves from one viewport to another: zooming to a
//! dragged-out selection, and sliding between two saved viewports for
//! an animation.
use num::Complex;

use crate::errors::{Error, Result};

/// Describes the x, y of a pixel on the integral plane, with 0,0 at
/// the first row and column.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pixel(pub u32, pub u32);

/// A rectangle on the complex plane, treating the real part as x and
/// the imaginary part as y.  Always has positive width and height.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Smallest real part.
    pub x_min: f64,
    /// Smallest imaginary part.
    pub y_min: f64,
    /// Largest real part.
    pub x_max: f64,
    /// Largest imaginary part.
    pub y_max: f64,
}

impl Default for Viewport {
    /// The square from -2-2i to 2+2i, which holds the whole Mandelbrot set.
    fn default() -> Self {
        Viewport {
            x_min: -2.0,
            y_min: -2.0,
            x_max: 2.0,
            y_max: 2.0,
        }
    }
}

/// `steps` evenly spaced values from `start` to `stop` inclusive, the
/// last one exactly `stop`.
fn linspace(start: f64, stop: f64, steps: usize) -> Vec<f64> {
    if steps == 1 {
        return vec![start];
    }
    let step = (stop - start) / ((steps.max(2) - 1) as f64);
    (0..steps)
        .map(|i| if i + 1 == steps { stop } else { start + (i as f64) * step })
        .collect()
}

impl Viewport {
    /// Constructor.  Takes the lower-left and upper-right corners as
    /// four coordinates and refuses anything that isn't a finite
    /// rectangle with area.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Viewport> {
        let all = [x_min, y_min, x_max, y_max];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidViewport(format!(
                "corners must be finite, got ({}, {}) to ({}, {})",
                x_min, y_min, x_max, y_max
            )));
        }
        if x_min >= x_max {
            return Err(Error::InvalidViewport(format!(
                "x_min ({}) must be less than x_max ({})",
                x_min, x_max
            )));
        }
        if y_min >= y_max {
            return Err(Error::InvalidViewport(format!(
                "y_min ({}) must be less than y_max ({})",
                y_min, y_max
            )));
        }
        Ok(Viewport {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Same as `new`, from two corner points.
    pub fn from_corners(lower: Complex<f64>, upper: Complex<f64>) -> Result<Viewport> {
        Viewport::new(lower.re, lower.im, upper.re, upper.im)
    }

    /// Re-checks the invariant.  Useful on viewports assembled by hand,
    /// since the fields are public.
    pub fn validate(&self) -> Result<()> {
        Viewport::new(self.x_min, self.y_min, self.x_max, self.y_max).map(|_| ())
    }

    /// Extent along the real axis.
    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    /// Extent along the imaginary axis.
    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// The geometric centre.
    pub fn center(&self) -> Complex<f64> {
        Complex::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Given a pixel on a `size`×`size` canvas showing this viewport,
    /// return the point under it.  Pixel 0,0 is the lower corner and
    /// `size`,`size` the upper one; the axes scale independently, so a
    /// non-square viewport is stretched.
    pub fn pixel_to_point(&self, pixel: Pixel, size: u32) -> Complex<f64> {
        let size = f64::from(size);
        Complex::new(
            self.x_min + self.width() * (f64::from(pixel.0) / size),
            self.y_min + self.height() * (f64::from(pixel.1) / size),
        )
    }

    /// The viewport under a selection dragged between two pixel
    /// corners, in either direction.  A selection with no width or no
    /// height is refused.
    pub fn zoom(&self, start: Pixel, end: Pixel, size: u32) -> Result<Viewport> {
        if start.0 == end.0 || start.1 == end.1 {
            return Err(Error::InvalidSelection(format!(
                "the selection from {:?} to {:?} has no area",
                start, end
            )));
        }
        let lower = Pixel(start.0.min(end.0), start.1.min(end.1));
        let upper = Pixel(start.0.max(end.0), start.1.max(end.1));
        Viewport::from_corners(
            self.pixel_to_point(lower, size),
            self.pixel_to_point(upper, size),
        )
    }

    /// `steps` viewports sliding from this one to `other`, both ends
    /// included.  Each coordinate moves linearly, so every step is a
    /// valid rectangle if both ends are.
    pub fn interpolate(&self, other: &Viewport, steps: usize) -> Vec<Viewport> {
        let x_min = linspace(self.x_min, other.x_min, steps);
        let y_min = linspace(self.y_min, other.y_min, steps);
        let x_max = linspace(self.x_max, other.x_max, steps);
        let y_max = linspace(self.y_max, other.y_max, steps);
        (0..steps)
            .map(|i| Viewport {
                x_min: x_min[i],
                y_min: y_min[i],
                x_max: x_max[i],
                y_max: y_max[i],
            })
            .collect()
    }
}

/// Lays a `size`×`size` grid of sample points over a viewport.  The
/// first and last columns sit exactly on the viewport's left and right
/// edges, and likewise for rows, so the samples span the full extent.
#[derive(Clone, Debug)]
pub struct PlaneMapper {
    /// Edge length of the integral plane.
    pub size: u32,
    /// The complex plane being sampled.
    pub viewport: Viewport,
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl PlaneMapper {
    /// Constructor.  Precomputes the sample coordinates along each axis.
    pub fn new(size: u32, viewport: Viewport) -> Result<PlaneMapper> {
        viewport.validate()?;
        Ok(PlaneMapper {
            size,
            viewport,
            xs: linspace(viewport.x_min, viewport.x_max, size as usize),
            ys: linspace(viewport.y_min, viewport.y_max, size as usize),
        })
    }

    /// The total number of points in the integral grid.
    pub fn len(&self) -> usize {
        (self.size as usize) * (self.size as usize)
    }

    /// Describes that the integral plane is of no size.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The sample point for a pixel of the grid.  Columns and rows run
    /// from 0 to `size - 1`; anything past that has no sample.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Option<Complex<f64>> {
        let x = self.xs.get(pixel.0 as usize)?;
        let y = self.ys.get(pixel.1 as usize)?;
        Some(Complex::new(*x, *y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn viewport_fails_on_bad_shape() {
        assert!(Viewport::new(1.0, -1.0, -1.0, 1.0).is_err());
        assert!(Viewport::new(-1.0, 1.0, 1.0, -1.0).is_err());
        assert!(Viewport::new(-1.0, -1.0, -1.0, 1.0).is_err());
        assert!(Viewport::new(-1.0, 0.0, 1.0, 0.0).is_err());
        assert!(Viewport::new(std::f64::NAN, -1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn viewport_passes_on_good_shape() {
        assert!(Viewport::new(-1.0, -1.0, 1.0, 1.0).is_ok());
        assert_eq!(Viewport::new(-2.0, -2.0, 2.0, 2.0), Ok(Viewport::default()));
    }

    #[test]
    fn bad_shapes_say_which_axis() {
        match Viewport::new(-1.0, 2.0, 1.0, 1.0) {
            Err(Error::InvalidViewport(msg)) => assert!(msg.contains("y_min")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pixel_to_point_hits_corners_and_centre() {
        let v = Viewport::new(-2.0, -1.0, 2.0, 3.0).unwrap();
        assert_eq!(v.pixel_to_point(Pixel(0, 0), 512), Complex::new(-2.0, -1.0));
        assert_eq!(v.pixel_to_point(Pixel(512, 512), 512), Complex::new(2.0, 3.0));
        assert_eq!(v.pixel_to_point(Pixel(256, 256), 512), v.center());
    }

    #[test]
    fn pixel_to_point_on_mixed_planes() {
        let v = Viewport::default();
        assert_eq!(v.pixel_to_point(Pixel(2, 2), 4), Complex::new(0.0, 0.0));
        assert_eq!(v.pixel_to_point(Pixel(1, 3), 4), Complex::new(-1.0, 1.0));
    }

    #[test]
    fn zoom_normalizes_the_selection() {
        let v = Viewport::default();
        let forward = v.zoom(Pixel(100, 100), Pixel(300, 200), 400).unwrap();
        let backward = v.zoom(Pixel(300, 200), Pixel(100, 100), 400).unwrap();
        let crossed = v.zoom(Pixel(100, 200), Pixel(300, 100), 400).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, crossed);
        assert_eq!(forward, Viewport::new(-1.0, -1.0, 1.0, 0.0).unwrap());
    }

    #[test]
    fn zoom_rejects_empty_selections() {
        let v = Viewport::default();
        assert!(v.zoom(Pixel(10, 10), Pixel(10, 50), 100).is_err());
        assert!(v.zoom(Pixel(10, 10), Pixel(50, 10), 100).is_err());
        assert!(v.zoom(Pixel(10, 10), Pixel(10, 10), 100).is_err());
    }

    #[test]
    fn random_zooms_stay_valid() {
        let mut rng = rand::thread_rng();
        let mut v = Viewport::default();
        for _ in 0..200 {
            let a = Pixel(rng.gen_range(0, 65), rng.gen_range(0, 65));
            let b = Pixel(rng.gen_range(0, 65), rng.gen_range(0, 65));
            match v.zoom(a, b, 64) {
                Ok(next) => {
                    assert!(next.x_min < next.x_max && next.y_min < next.y_max);
                    let slack = 1e-12;
                    assert!(next.x_min >= v.x_min - slack && next.x_max <= v.x_max + slack);
                    assert!(next.y_min >= v.y_min - slack && next.y_max <= v.y_max + slack);
                    if next.width() > 1e-6 && next.height() > 1e-6 {
                        v = next;
                    }
                }
                Err(_) => assert!(a.0 == b.0 || a.1 == b.1),
            }
        }
    }

    #[test]
    fn interpolation_is_linear_and_inclusive() {
        let a = Viewport::new(-2.0, -2.0, 2.0, 2.0).unwrap();
        let b = Viewport::new(-1.0, -1.0, 1.0, 1.0).unwrap();
        let steps = a.interpolate(&b, 7);
        assert_eq!(steps.len(), 7);
        assert_eq!(steps[0], a);
        assert_eq!(steps[6], b);
        for (i, v) in steps.iter().enumerate() {
            let t = i as f64 / 6.0;
            assert!(close(v.x_min, -2.0 + t), "{:?}", v);
            assert!(close(v.y_min, -2.0 + t), "{:?}", v);
            assert!(close(v.x_max, 2.0 - t), "{:?}", v);
            assert!(close(v.y_max, 2.0 - t), "{:?}", v);
            assert!(v.validate().is_ok());
        }
        for pair in steps.windows(2) {
            assert!(pair[1].x_min > pair[0].x_min);
            assert!(pair[1].x_max < pair[0].x_max);
            assert!(close(pair[1].x_min - pair[0].x_min, 1.0 / 6.0));
        }
    }

    #[test]
    fn interpolation_edge_counts() {
        let a = Viewport::default();
        let b = Viewport::new(0.0, 0.0, 1.0, 1.0).unwrap();
        assert!(a.interpolate(&b, 0).is_empty());
        assert_eq!(a.interpolate(&b, 1), vec![a]);
        assert_eq!(a.interpolate(&b, 2), vec![a, b]);
    }

    #[test]
    fn plane_mapper_samples_span_the_viewport() {
        let pm = PlaneMapper::new(5, Viewport::default()).unwrap();
        assert_eq!(pm.len(), 25);
        assert_eq!(pm.pixel_to_point(&Pixel(0, 0)), Some(Complex::new(-2.0, -2.0)));
        assert_eq!(pm.pixel_to_point(&Pixel(2, 2)), Some(Complex::new(0.0, 0.0)));
        assert_eq!(pm.pixel_to_point(&Pixel(4, 4)), Some(Complex::new(2.0, 2.0)));
        assert_eq!(pm.pixel_to_point(&Pixel(1, 3)), Some(Complex::new(-1.0, 1.0)));
    }

    #[test]
    fn plane_mapper_has_no_samples_past_the_edge() {
        let pm = PlaneMapper::new(8, Viewport::default()).unwrap();
        assert_eq!(pm.pixel_to_point(&Pixel(8, 8)), None);
        assert_eq!(pm.pixel_to_point(&Pixel(7, 8)), None);
        assert_eq!(pm.pixel_to_point(&Pixel(8, 0)), None);
        assert_eq!(pm.pixel_to_point(&Pixel(7, 7)), Some(Complex::new(2.0, 2.0)));
        // The continuous mapping still reaches the far corner.
        assert_eq!(
            pm.viewport.pixel_to_point(Pixel(8, 8), 8),
            Complex::new(2.0, 2.0)
        );
        let empty = PlaneMapper::new(0, Viewport::default()).unwrap();
        assert_eq!(empty.pixel_to_point(&Pixel(0, 0)), None);
    }

    #[test]
    fn plane_mapper_fails_on_bad_shape() {
        let bad = Viewport {
            x_min: 1.0,
            y_min: -1.0,
            x_max: -1.0,
            y_max: 1.0,
        };
        assert!(PlaneMapper::new(4, bad).is_err());
        assert!(PlaneMapper::new(0, Viewport::default()).unwrap().is_empty());
    }
}
