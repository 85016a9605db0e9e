// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time renderer
//!
//! Every pixel of a square image is mapped to a point on the complex
//! plane, the formula is iterated from zero at that point, and the
//! number of iterations it took the orbit to leave the disc of radius
//! two picks a color from the gradient.  Points whose orbits never
//! leave take the gradient's first color.
//!
//! Rows are split into contiguous bands, one per worker.  The workers
//! are scoped threads that only read the renderer; each returns its
//! pixels as (row, column, color) triples, and the calling thread
//! writes them into the image.  Bands never overlap, so the order the
//! workers finish in doesn't matter and the result is the same for any
//! number of workers.

use crossbeam::thread::ScopedJoinHandle;
use image::{Rgb, RgbImage};
use itertools::iproduct;
use log::{debug, info};
use std::any::Any;
use std::ops::Range;

use crate::errors::{Error, Result};
use crate::escape::escape_time;
use crate::formula::{Formula, DEFAULT_FORMULA};
use crate::gradient::Gradient;
use crate::planes::{Pixel, PlaneMapper, Viewport};

/// A square RGB raster, row-major.
pub type PixelBuffer = RgbImage;

/// One worker's output: (row, column, color) for every pixel it owns.
pub type Band = Vec<(u32, u32, Rgb<u8>)>;

/// Everything a front-end supplies to get a picture.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    /// The iteration formula, as typed.
    pub formula: String,
    /// Edge length of the square image, in pixels.
    pub size: u32,
    /// The iteration limit, which is also the gradient's length.
    pub max_iterations: usize,
    /// The region of the plane to draw.
    pub viewport: Viewport,
    /// The gradient's first and last colors.
    pub colors: (Rgb<u8>, Rgb<u8>),
}

impl Default for Request {
    fn default() -> Self {
        Request {
            formula: DEFAULT_FORMULA.to_string(),
            size: 512,
            max_iterations: 50,
            viewport: Viewport::default(),
            colors: (Rgb([0, 0, 0]), Rgb([0, 255, 0])),
        }
    }
}

/// One worker per available core, less one for whoever is waiting on
/// the result; never fewer than one.
pub fn default_workers() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// Splits `size` rows into at most `workers` contiguous bands of
/// `ceil(size / workers)` rows each.  The last band stops at the edge
/// of the image; bands that would start past it are dropped.
pub fn bands(size: u32, workers: usize) -> Vec<Range<u32>> {
    let workers = workers.max(1) as u64;
    let size = u64::from(size);
    let rows = (size + workers - 1) / workers;
    (0..workers)
        .map(|w| (w * rows)..((w + 1) * rows).min(size))
        .filter(|band| band.start < size)
        .map(|band| (band.start as u32)..(band.end as u32))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

/// Holds a compiled formula, the sampling grid, the iteration limit
/// and the gradient.  Once built it is only ever read, so one renderer
/// can be shared by any number of workers.
#[derive(Clone, Debug)]
pub struct Renderer {
    formula: Formula,
    plane: PlaneMapper,
    gradient: Gradient,
    limit: usize,
}

impl Renderer {
    /// Requires the compiled formula, the edge length of the image, the
    /// iteration limit, the region of the plane, and the gradient.
    /// Fails if the viewport isn't a proper rectangle.
    pub fn new(
        formula: Formula,
        size: u32,
        limit: usize,
        viewport: Viewport,
        gradient: Gradient,
    ) -> Result<Self> {
        let plane = PlaneMapper::new(size, viewport)?;
        Ok(Renderer {
            formula,
            plane,
            gradient,
            limit,
        })
    }

    /// Builds a renderer from a front-end request.  A formula that
    /// names anything outside the allowlist is refused here, before any
    /// work starts.
    pub fn from_request(request: &Request) -> Result<Self> {
        let formula = Formula::compile(&request.formula)?;
        let gradient = Gradient::new(request.colors.0, request.colors.1, request.max_iterations);
        Renderer::new(
            formula,
            request.size,
            request.max_iterations,
            request.viewport,
            gradient,
        )
    }

    /// Edge length of the image this renderer produces.
    pub fn size(&self) -> u32 {
        self.plane.size
    }

    /// The region of the plane being drawn.
    pub fn viewport(&self) -> Viewport {
        self.plane.viewport
    }

    /// The same renderer, looking at a different region.
    pub fn with_viewport(&self, viewport: Viewport) -> Result<Renderer> {
        Ok(Renderer {
            plane: PlaneMapper::new(self.plane.size, viewport)?,
            ..self.clone()
        })
    }

    /// A black image of the right size.
    pub fn blank(&self) -> PixelBuffer {
        RgbImage::new(self.plane.size, self.plane.size)
    }

    /// The color of a single pixel, or `None` if the pixel is outside
    /// the image.
    pub fn color_at(&self, pixel: &Pixel) -> Option<Rgb<u8>> {
        let c = self.plane.pixel_to_point(pixel)?;
        Some(self.gradient.color(escape_time(&self.formula, c, self.limit)))
    }

    /// The body of a worker: every pixel in `rows`.
    fn band(&self, rows: Range<u32>) -> Band {
        iproduct!(rows, 0..self.plane.size)
            .filter_map(|(row, column)| {
                self.color_at(&Pixel(column, row))
                    .map(|color| (row, column, color))
            })
            .collect()
    }

    fn check(&self, buffer: &PixelBuffer) -> Result<()> {
        let (width, height) = buffer.dimensions();
        if width != self.plane.size || height != self.plane.size {
            return Err(Error::BufferMismatch {
                width,
                height,
                size: self.plane.size,
            });
        }
        Ok(())
    }

    /// The single-threaded version, one pixel after another.
    pub fn render_single(&self) -> PixelBuffer {
        let mut buffer = self.blank();
        for (row, column, color) in self.band(0..self.plane.size) {
            buffer.put_pixel(column, row, color);
        }
        buffer
    }

    /// Renders over the top of an existing image, which must already be
    /// the right size.  Workers are started fresh for this call and all
    /// joined before it returns.  If any of them dies the image is left
    /// untouched.
    pub fn render_into(&self, buffer: &mut PixelBuffer, workers: usize) -> Result<()> {
        self.render_bands_with(buffer, workers, |rows| self.band(rows))
    }

    fn render_bands_with<F>(&self, buffer: &mut PixelBuffer, workers: usize, body: F) -> Result<()>
    where
        F: Fn(Range<u32>) -> Band + Sync,
    {
        self.check(buffer)?;
        let bands = bands(self.plane.size, workers);
        info!(
            "Rendering '{}' at {}x{}, {} iterations, over {:?} in {} bands",
            self.formula,
            self.plane.size,
            self.plane.size,
            self.limit,
            self.plane.viewport,
            bands.len()
        );

        let body = &body;
        let results: Vec<Band> = crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<Band>> = bands
                .into_iter()
                .map(|rows| {
                    spawner.spawn(move |_| {
                        debug!("Band {:?} starting", rows);
                        body(rows)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<std::thread::Result<Vec<Band>>>()
        })
        .map_err(|e| Error::WorkerFailed(panic_message(&*e)))?
        .map_err(|e| Error::WorkerFailed(panic_message(&*e)))?;

        for band in results {
            for (row, column, color) in band {
                buffer.put_pixel(column, row, color);
            }
        }
        Ok(())
    }

    /// A multi-threaded render into a fresh image.
    pub fn render(&self, workers: usize) -> Result<PixelBuffer> {
        let mut buffer = self.blank();
        self.render_into(&mut buffer, workers)?;
        Ok(buffer)
    }
}

/// The main entry point: renders `request` with the default number of
/// workers, into `buffer` if one is given (it is reused, not replaced)
/// or into a new black image.
pub fn render(request: &Request, buffer: Option<PixelBuffer>) -> Result<PixelBuffer> {
    let renderer = Renderer::from_request(request)?;
    let mut buffer = buffer.unwrap_or_else(|| renderer.blank());
    renderer.render_into(&mut buffer, default_workers())?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn request(formula: &str, size: u32, max_iterations: usize) -> Request {
        Request {
            formula: formula.to_string(),
            size,
            max_iterations,
            colors: (BLACK, WHITE),
            ..Request::default()
        }
    }

    #[test]
    fn bands_cover_every_row_once() {
        assert_eq!(bands(10, 3), vec![0..4, 4..8, 8..10]);
        assert_eq!(bands(2, 5), vec![0..1, 1..2]);
        assert_eq!(bands(7, 0), vec![0..7]);
        assert_eq!(bands(12, 4), vec![0..3, 3..6, 6..9, 9..12]);
        assert!(bands(0, 4).is_empty());
        for &(size, workers) in [(1, 1), (13, 4), (100, 7), (64, 64), (5, 9)].iter() {
            let rows: Vec<u32> = bands(size, workers).into_iter().flatten().collect();
            assert_eq!(rows, (0..size).collect::<Vec<u32>>());
        }
    }

    #[test]
    fn there_is_always_a_worker() {
        assert!(default_workers() >= 1);
    }

    #[test_log::test]
    fn parallel_matches_single_threaded() {
        let r = Renderer::from_request(&request("z**3 - 0.5j", 37, 40)).unwrap();
        let single = r.render_single();
        for &workers in [1, 2, 3, 8, 37, 100].iter() {
            assert_eq!(r.render(workers).unwrap(), single, "{} workers", workers);
        }
    }

    #[test_log::test]
    fn renders_the_mandelbrot_with_both_endpoints() {
        let image = render(&request("z**2", 8, 5), None).unwrap();
        assert_eq!(image.dimensions(), (8, 8));
        let pixels: Vec<Rgb<u8>> = image.pixels().cloned().collect();
        assert!(pixels.iter().any(|p| *p == BLACK));
        assert!(pixels.iter().any(|p| *p != BLACK));
        // -2-2i escapes after one update.
        assert_eq!(*image.get_pixel(0, 0), Rgb([63, 63, 63]));
    }

    #[test]
    fn division_by_zero_at_the_origin_is_absorbed() {
        // size 9 puts a sample exactly on 0.
        let image = render(&request("1/z", 9, 10), None).unwrap();
        assert_eq!(*image.get_pixel(4, 4), BLACK);
    }

    #[test]
    fn existing_buffers_are_reused() {
        let req = Request {
            size: 16,
            max_iterations: 10,
            ..Request::default()
        };
        let white = RgbImage::from_pixel(16, 16, WHITE);
        let image = render(&req, Some(white)).unwrap();
        assert_ne!(*image.get_pixel(0, 0), WHITE);
        assert!(image.pixels().all(|p| *p != WHITE));
    }

    #[test]
    fn wrong_sized_buffers_are_refused() {
        let r = Renderer::from_request(&request("z**2", 8, 5)).unwrap();
        let mut small = RgbImage::from_pixel(4, 4, WHITE);
        assert_eq!(
            r.render_into(&mut small, 2),
            Err(Error::BufferMismatch {
                width: 4,
                height: 4,
                size: 8
            })
        );
        assert!(small.pixels().all(|p| *p == WHITE));
    }

    #[test]
    fn disallowed_formulas_never_render() {
        match render(&request("__import__('os').system('ls')", 8, 5), None) {
            Err(Error::DisallowedToken(token)) => assert_eq!(token, "__import__"),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn bad_viewports_never_render() {
        let req = Request {
            viewport: Viewport {
                x_min: 2.0,
                y_min: -2.0,
                x_max: 1.0,
                y_max: 2.0,
            },
            ..Request::default()
        };
        assert!(render(&req, None).is_err());
    }

    #[test]
    fn empty_images_and_zero_iterations() {
        let image = render(&request("z**2", 0, 5), None).unwrap();
        assert_eq!(image.dimensions(), (0, 0));
        let image = render(&request("z**2", 4, 0), None).unwrap();
        assert!(image.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn malformed_formulas_render_as_the_mandelbrot() {
        let broken = Renderer::from_request(&request("(z**2", 16, 20)).unwrap();
        let classic = Renderer::from_request(&request("z**2", 16, 20)).unwrap();
        assert_eq!(broken.render(3).unwrap(), classic.render(3).unwrap());
    }

    #[test]
    fn moving_the_viewport_keeps_everything_else() {
        let r = Renderer::from_request(&request("z**2", 8, 5)).unwrap();
        let v = Viewport::new(-1.0, -1.0, 1.0, 1.0).unwrap();
        let moved = r.with_viewport(v).unwrap();
        assert_eq!(moved.viewport(), v);
        assert_eq!(moved.size(), 8);
    }

    #[test]
    fn colors_exist_only_inside_the_image() {
        let r = Renderer::from_request(&request("z**2", 8, 5)).unwrap();
        assert_eq!(r.color_at(&Pixel(0, 0)), Some(Rgb([63, 63, 63])));
        assert_eq!(r.color_at(&Pixel(8, 8)), None);
        assert_eq!(r.color_at(&Pixel(3, 8)), None);
        assert_eq!(r.viewport().pixel_to_point(Pixel(8, 8), 8).re, 2.0);
    }

    #[test]
    fn a_dead_worker_fails_the_render_and_leaves_the_image() {
        let r = Renderer::from_request(&request("z**2", 12, 5)).unwrap();
        let mut image = RgbImage::from_pixel(12, 12, WHITE);
        let result = r.render_bands_with(&mut image, 4, |rows| {
            if rows.start == 3 {
                panic!("band lost");
            }
            r.band(rows)
        });
        match result {
            Err(Error::WorkerFailed(message)) => assert_eq!(message, "band lost"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(image.pixels().all(|p| *p == WHITE));

        // The same renderer still works afterwards.
        r.render_into(&mut image, 4).unwrap();
        assert_eq!(image, r.render_single());
    }

    #[test]
    fn panic_messages_are_recovered() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*boxed), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*boxed), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(&*boxed), "worker panicked");
    }
}
