// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;
extern crate fraktal;

use criterion::Criterion;
use fraktal::{Renderer, Request};

fn renderer(formula: &str) -> Renderer {
    let request = Request {
        formula: formula.to_string(),
        size: 128,
        max_iterations: 100,
        ..Request::default()
    };
    Renderer::from_request(&request).unwrap()
}

fn single_threaded(c: &mut Criterion) {
    let r = renderer("z**2");
    c.bench_function("mandelbrot 128px, one thread", move |b| {
        b.iter(|| r.render_single())
    });
}

fn parallel(c: &mut Criterion) {
    let r = renderer("z**2");
    let workers = fraktal::render::default_workers();
    c.bench_function("mandelbrot 128px, all workers", move |b| {
        b.iter(|| r.render(workers).unwrap())
    });
}

fn transcendental(c: &mut Criterion) {
    let r = renderer("sin(z)**2 + exp(-z)/3");
    let workers = fraktal::render::default_workers();
    c.bench_function("sine-exponential 128px, all workers", move |b| {
        b.iter(|| r.render(workers).unwrap())
    });
}

criterion_group!(benches, single_threaded, parallel, transcendental);
criterion_main!(benches);
