// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate env_logger;
extern crate failure;
extern crate fraktal;
extern crate image;
extern crate log;
extern crate num_cpus;

use clap::{App, AppSettings, Arg, ArgMatches};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, Rgb};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::str::FromStr;

use fraktal::session::DEFAULT_STEPS;
use fraktal::{Animation, Pixel, Request, Seams, Session, Viewport};

fn validate_number<T: FromStr>(s: &str, err: &str) -> Result<(), String> {
    match T::from_str(s) {
        Ok(_) => Ok(()),
        Err(_) => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + Ord>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const FORMULA: &str = "formula";
const OUTPUT: &str = "output";
const SIZE: &str = "size";
const ITERATIONS: &str = "iterations";
const COORDINATES: &str = "coordinates";
const COLOR: &str = "color";
const THREADS: &str = "threads";
const ZOOM: &str = "zoom";
const KEYFRAMES: &str = "keyframes";
const STEPS: &str = "steps";
const REPEAT_SEAMS: &str = "repeat-seams";

const MAX_SIZE: u32 = 16_384;
const MAX_ITERATIONS: usize = 100_000;

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();

    App::new("fraktal")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Escape-time fractal renderer")
        .setting(AppSettings::AllowNegativeNumbers)
        .arg(
            Arg::with_name(FORMULA)
                .index(1)
                .default_value(fraktal::formula::DEFAULT_FORMULA)
                .help("Iteration formula in z; c is added to it"),
        )
        .arg(
            Arg::with_name(SIZE)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("512")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        MAX_SIZE,
                        "Could not parse image size",
                        &format!("Image size must be between 0 and {}", MAX_SIZE),
                    )
                })
                .help("Width and height of the output image"),
        )
        .arg(
            Arg::with_name(ITERATIONS)
                .long(ITERATIONS)
                .short("i")
                .takes_value(true)
                .default_value("50")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        MAX_ITERATIONS,
                        "Could not parse iteration count",
                        &format!("Iteration count must be between 0 and {}", MAX_ITERATIONS),
                    )
                })
                .help("Maximum number of iterations per point"),
        )
        .arg(
            Arg::with_name(COORDINATES)
                .long(COORDINATES)
                .short("x")
                .takes_value(true)
                .number_of_values(4)
                .value_names(&["X0", "Y0", "X1", "Y1"])
                .validator(|s| validate_number::<f64>(&s, "Could not parse coordinate"))
                .help("Corners of the plane rectangle [default: -2 -2 2 2]"),
        )
        .arg(
            Arg::with_name(COLOR)
                .long(COLOR)
                .short("c")
                .takes_value(true)
                .number_of_values(6)
                .value_names(&["R0", "G0", "B0", "R1", "G1", "B1"])
                .validator(|s| {
                    validate_range::<u16>(
                        &s,
                        0,
                        255,
                        "Could not parse color channel",
                        "Color channels must be between 0 and 255",
                    )
                })
                .help("First and last colors of the gradient [default: 0 0 0 0 255 0]"),
        )
        .arg(
            Arg::with_name(THREADS)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of threads to use in renderer [default: one less than the core count]"),
        )
        .arg(
            Arg::with_name(ZOOM)
                .long(ZOOM)
                .short("z")
                .takes_value(true)
                .multiple(true)
                .number_of_values(4)
                .value_names(&["PX0", "PY0", "PX1", "PY1"])
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        MAX_SIZE,
                        "Could not parse zoom corner",
                        &format!("Zoom corners must be between 0 and {}", MAX_SIZE),
                    )
                })
                .help("Zoom to a rectangle of the image, in pixels; may be repeated"),
        )
        .arg(
            Arg::with_name(KEYFRAMES)
                .long(KEYFRAMES)
                .short("k")
                .help("Save a frame before and after every zoom and export a GIF"),
        )
        .arg(
            Arg::with_name(STEPS)
                .long(STEPS)
                .takes_value(true)
                .default_value("7")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        1_000,
                        "Could not parse step count",
                        "Step count must be between 0 and 1000",
                    )
                })
                .help("Interpolation steps between two keyframes"),
        )
        .arg(
            Arg::with_name(REPEAT_SEAMS)
                .long(REPEAT_SEAMS)
                .help("Show each inner keyframe again at the start of the following gap"),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file [default: fractal.png, or fractal.gif with --keyframes]"),
        )
        .get_matches()
}

fn value<T: FromStr>(matches: &ArgMatches, name: &str, default: T) -> Result<T, failure::Error> {
    match matches.value_of(name) {
        None => Ok(default),
        Some(s) => T::from_str(s).map_err(|_| failure::err_msg(format!("Could not parse {}", name))),
    }
}

fn values<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<Vec<T>>, failure::Error> {
    match matches.values_of(name) {
        None => Ok(None),
        Some(vs) => vs
            .map(|s| T::from_str(s).map_err(|_| failure::err_msg(format!("Could not parse {}", name))))
            .collect::<Result<Vec<T>, failure::Error>>()
            .map(Some),
    }
}

fn request(matches: &ArgMatches) -> Result<Request, failure::Error> {
    let defaults = Request::default();
    let viewport = match values::<f64>(matches, COORDINATES)? {
        Some(ref v) if v.len() == 4 => Viewport::new(v[0], v[1], v[2], v[3])?,
        _ => defaults.viewport,
    };
    let colors = match values::<u8>(matches, COLOR)? {
        Some(ref v) if v.len() == 6 => (Rgb([v[0], v[1], v[2]]), Rgb([v[3], v[4], v[5]])),
        _ => defaults.colors,
    };
    Ok(Request {
        formula: value(matches, FORMULA, defaults.formula)?,
        size: value(matches, SIZE, defaults.size)?,
        max_iterations: value(matches, ITERATIONS, defaults.max_iterations)?,
        viewport,
        colors,
    })
}

fn zooms(matches: &ArgMatches) -> Result<Vec<(Pixel, Pixel)>, failure::Error> {
    let corners = values::<u32>(matches, ZOOM)?.unwrap_or_default();
    Ok(corners
        .chunks(4)
        .filter(|c| c.len() == 4)
        .map(|c| (Pixel(c[0], c[1]), Pixel(c[2], c[3])))
        .collect())
}

fn write_gif(outfile: &str, animation: &Animation) -> Result<(), failure::Error> {
    let output = BufWriter::new(File::create(Path::new(outfile))?);
    let mut encoder = GifEncoder::new(output);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(animation.delay_ms, 1);
    encoder.encode_frames(animation.frames.iter().map(|image| {
        let rgba = DynamicImage::ImageRgb8(image.clone()).into_rgba8();
        Frame::from_parts(rgba, 0, 0, delay)
    }))?;
    Ok(())
}

fn run(matches: &ArgMatches) -> Result<(), failure::Error> {
    let request = request(matches)?;
    let threads = value(matches, THREADS, fraktal::render::default_workers())?;
    let keyframes = matches.is_present(KEYFRAMES);
    let mut session = Session::new(&request)?.with_workers(threads);

    if keyframes {
        session.save_frame()?;
    }
    for (start, end) in zooms(matches)? {
        session.zoom(start, end)?;
        if keyframes {
            session.save_frame()?;
        }
    }

    if keyframes {
        let outfile = matches.value_of(OUTPUT).unwrap_or("fractal.gif");
        let steps = value(matches, STEPS, DEFAULT_STEPS)?;
        let seams = if matches.is_present(REPEAT_SEAMS) {
            Seams::Repeated
        } else {
            Seams::Shared
        };
        let animation = session.animate(steps, seams)?;
        write_gif(outfile, &animation)?;
        info!("Wrote {} frames to {}", animation.frames.len(), outfile);
    } else {
        let outfile = matches.value_of(OUTPUT).unwrap_or("fractal.png");
        session.render()?.save(outfile)?;
        info!("Wrote {}", outfile);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let matches = args();
    if let Err(e) = run(&matches) {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
