// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! An exploring session: one formula, one image size, one gradient, a
//! current viewport that moves as the user zooms, and the list of
//! frames they chose to keep.  The saved frames are the keyframes of an
//! animation; exporting fills the gaps between consecutive keyframes
//! with renders of interpolated viewports.

use log::{debug, info};

use crate::errors::{Error, Result};
use crate::planes::{Pixel, Viewport};
use crate::render::{default_workers, PixelBuffer, Renderer, Request};

/// Interpolation steps per gap between keyframes, counting both ends.
pub const DEFAULT_STEPS: usize = 7;

/// How long each exported frame is meant to stay up: 8 per second.
pub const FRAME_DELAY_MS: u32 = 125;

/// A rendered image and the viewport it shows.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// The pixels.
    pub image: PixelBuffer,
    /// Where on the plane they came from.
    pub viewport: Viewport,
}

/// What to do where two gaps meet during export.  Each gap's
/// interpolation includes both of its keyframes' viewports, so the
/// keyframe between two gaps can be shown once or several times.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Seams {
    /// Every keyframe appears exactly once: `1 + (J-1)(K-1)` images for
    /// `J` keyframes and `K >= 2` steps.  With fewer than two steps there
    /// is nothing between the ends, so only the `J` keyframes remain.
    Shared,
    /// Each gap emits its first keyframe's saved image followed by all
    /// `K` interpolated renders, ends included, and the last keyframe
    /// closes the sequence: `J + (J-1)K` images.
    Repeated,
}

impl Default for Seams {
    fn default() -> Self {
        Seams::Shared
    }
}

/// One entry of an export plan.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shot {
    /// The saved image of keyframe `n`.
    Saved(usize),
    /// A fresh render of this viewport.
    Between(Viewport),
}

/// Images in display order, with the delay each is meant to be shown
/// for.  Encoding them is up to the caller.
#[derive(Clone, Debug)]
pub struct Animation {
    /// The images, first to last.
    pub frames: Vec<PixelBuffer>,
    /// Display time per image, in milliseconds.
    pub delay_ms: u32,
}

/// Owns everything that changes while exploring.  Sessions share
/// nothing, so several can run side by side.
#[derive(Clone, Debug)]
pub struct Session {
    renderer: Renderer,
    origin: Renderer,
    current: Option<Frame>,
    frames: Vec<Frame>,
    workers: usize,
}

impl Session {
    /// Starts a session at the request's viewport, which is also where
    /// `reset` returns to.  Refuses disallowed formulas and malformed
    /// viewports.
    pub fn new(request: &Request) -> Result<Session> {
        let renderer = Renderer::from_request(request)?;
        Ok(Session {
            origin: renderer.clone(),
            renderer,
            current: None,
            frames: vec![],
            workers: default_workers(),
        })
    }

    /// Overrides the number of render workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Where the session is looking now.
    pub fn viewport(&self) -> Viewport {
        self.renderer.viewport()
    }

    /// Edge length of every image in the session.
    pub fn size(&self) -> u32 {
        self.renderer.size()
    }

    /// Renders the current viewport, painting over the previous render
    /// rather than allocating a new image.  A failed render keeps the
    /// previous one.
    pub fn render(&mut self) -> Result<&PixelBuffer> {
        let viewport = self.renderer.viewport();
        let (mut image, previous) = match self.current.take() {
            Some(frame) => (frame.image, Some(frame.viewport)),
            None => (self.renderer.blank(), None),
        };
        if let Err(err) = self.renderer.render_into(&mut image, self.workers) {
            self.current = previous.map(|viewport| Frame { image, viewport });
            return Err(err);
        }
        Ok(&self.current.get_or_insert(Frame { image, viewport }).image)
    }

    /// The latest render and its viewport, if there has been one.
    pub fn current(&self) -> Option<&Frame> {
        self.current.as_ref()
    }

    /// Zooms to the selection between two pixel corners of the current
    /// image.  Nothing changes if the selection is refused.
    pub fn zoom(&mut self, start: Pixel, end: Pixel) -> Result<Viewport> {
        let next = self.viewport().zoom(start, end, self.size())?;
        self.renderer = self.renderer.with_viewport(next)?;
        info!("Zoomed to {:?}", next);
        Ok(next)
    }

    /// Back to the viewport the session started with.
    pub fn reset(&mut self) {
        self.renderer = self.origin.clone();
        info!("View reset to {:?}", self.renderer.viewport());
    }

    /// Keeps the current view as a keyframe, rendering it first if the
    /// latest render is stale or missing.  Returns the number of saved
    /// frames.
    pub fn save_frame(&mut self) -> Result<usize> {
        let fresh = match &self.current {
            Some(frame) => frame.viewport == self.viewport(),
            None => false,
        };
        if !fresh {
            self.render()?;
        }
        if let Some(frame) = &self.current {
            self.frames.push(frame.clone());
        }
        info!("Frame saved. Total frames: {}", self.frames.len());
        Ok(self.frames.len())
    }

    /// The saved keyframes, oldest first.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Forgets every saved keyframe.
    pub fn clear_frames(&mut self) {
        self.frames.clear();
        info!("All frames cleared");
    }

    /// The export sequence, without rendering anything.
    pub fn plan(&self, steps: usize, seams: Seams) -> Vec<Shot> {
        let mut shots = vec![];
        if seams == Seams::Shared && !self.frames.is_empty() {
            shots.push(Shot::Saved(0));
        }
        for (j, pair) in self.frames.windows(2).enumerate() {
            let between = pair[0].viewport.interpolate(&pair[1].viewport, steps);
            match seams {
                Seams::Shared => {
                    let inner = between.len().saturating_sub(1);
                    shots.extend(between.into_iter().take(inner).skip(1).map(Shot::Between));
                    shots.push(Shot::Saved(j + 1));
                }
                Seams::Repeated => {
                    shots.push(Shot::Saved(j));
                    shots.extend(between.into_iter().map(Shot::Between));
                }
            }
        }
        if seams == Seams::Repeated && !self.frames.is_empty() {
            shots.push(Shot::Saved(self.frames.len() - 1));
        }
        shots
    }

    /// Renders the export sequence.  Needs at least two keyframes.
    /// Interpolated frames are rendered one after another into a single
    /// scratch image, each render using the full worker pool.
    pub fn animate(&self, steps: usize, seams: Seams) -> Result<Animation> {
        if self.frames.len() < 2 {
            return Err(Error::NotEnoughFrames {
                needed: 2,
                have: self.frames.len(),
            });
        }
        let plan = self.plan(steps, seams);
        info!(
            "Exporting {} images from {} keyframes, {} steps per gap, {:?} seams",
            plan.len(),
            self.frames.len(),
            steps,
            seams
        );
        let mut scratch = self.renderer.blank();
        let mut images = Vec::with_capacity(plan.len());
        for shot in plan {
            match shot {
                Shot::Saved(n) => images.push(self.frames[n].image.clone()),
                Shot::Between(viewport) => {
                    debug!("Interpolating {:?}", viewport);
                    self.renderer
                        .with_viewport(viewport)?
                        .render_into(&mut scratch, self.workers)?;
                    images.push(scratch.clone());
                }
            }
        }
        Ok(Animation {
            frames: images,
            delay_ms: FRAME_DELAY_MS,
        })
    }
}
