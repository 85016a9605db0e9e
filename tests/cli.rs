// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate assert_cmd;
extern crate image;
extern crate predicates;
extern crate tempfile;

use assert_cmd::prelude::*;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Rgb};
use predicates::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::process::Command;
use tempfile::tempdir;

fn fraktal() -> Command {
    Command::cargo_bin("fraktal").unwrap()
}

#[test]
fn renders_a_png() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("mandelbrot.png");
    fraktal()
        .args(&["z**2", "-s", "16", "-i", "5", "-t", "1", "-o"])
        .arg(&out)
        .assert()
        .success();
    let image = image::open(&out).unwrap().to_rgb8();
    assert_eq!(image.dimensions(), (16, 16));
    // The corner escapes after one update: entry 1 of a five-entry
    // black-to-green table.
    assert_eq!(*image.get_pixel(0, 0), Rgb([0, 63, 0]));
}

#[test]
fn custom_colors_and_coordinates() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("inside.png");
    fraktal()
        .args(&["z**2", "-s", "4", "-i", "10", "-t", "1"])
        .args(&["-x", "-0.1", "-0.1", "0.1", "0.1"])
        .args(&["-c", "10", "20", "30", "255", "255", "255", "-o"])
        .arg(&out)
        .assert()
        .success();
    let image = image::open(&out).unwrap().to_rgb8();
    assert!(image.pixels().all(|p| *p == Rgb([10, 20, 30])));
}

#[test]
fn disallowed_formulas_fail() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("never.png");
    fraktal()
        .args(&["__import__('os')", "-s", "8", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Render failure").from_utf8())
        .stderr(predicate::str::contains("is not allowed").from_utf8());
    assert!(!out.exists());
}

#[test]
fn inverted_coordinates_fail() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("never.png");
    fraktal()
        .args(&["z**2", "-s", "8", "-x", "2", "-2", "-2", "2", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Incorrect coordinates").from_utf8());
    assert!(!out.exists());
}

#[test]
fn negative_sizes_are_refused() {
    fraktal()
        .args(&["z**2", "-s", "-5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse image size").from_utf8());
}

#[test]
fn exports_an_animation() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("zoom.gif");
    fraktal()
        .args(&["z**2", "-s", "8", "-i", "10", "-t", "1", "-k"])
        .args(&["-z", "2", "2", "6", "6", "-o"])
        .arg(&out)
        .assert()
        .success();
    let decoder = GifDecoder::new(BufReader::new(File::open(&out).unwrap())).unwrap();
    let frames = decoder.into_frames().collect_frames().unwrap();
    assert_eq!(frames.len(), 7);
    assert!(frames.iter().all(|f| f.buffer().dimensions() == (8, 8)));
}

#[test]
fn repeated_seams_add_frames() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("zoom.gif");
    fraktal()
        .args(&["z**2", "-s", "8", "-i", "10", "-t", "1", "-k", "--repeat-seams"])
        .args(&["--steps", "3", "-z", "2", "2", "6", "6", "-o"])
        .arg(&out)
        .assert()
        .success();
    let decoder = GifDecoder::new(BufReader::new(File::open(&out).unwrap())).unwrap();
    assert_eq!(decoder.into_frames().collect_frames().unwrap().len(), 2 + 3);
}

#[test]
fn one_keyframe_is_not_an_animation() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("still.gif");
    fraktal()
        .args(&["z**2", "-s", "8", "-i", "10", "-t", "1", "-k", "-o"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Need at least 2 frames").from_utf8());
}
