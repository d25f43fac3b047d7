//! Builds frames from a few test shapes and plays them through a session.
//!
//! The device is an in-process adapter that only logs what it receives, so
//! this runs without hardware. Set `RUST_LOG=debug` to see the session and
//! shutter lifecycle.
//!
//! Run with: `cargo run --example shapes -- [triangle|square|star|circle|demo]`

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use laser_shutter::device::{DeviceAdapter, DeviceDescriptor, DeviceHandle, DeviceStatus};
use laser_shutter::{
    build_frame, ColorRGBA, DevicePoint, DeviceSession, Point2D, Result, SessionConfig,
    ShapeDescriptor,
};
use log::info;

#[derive(Parser)]
#[command(about = "Render test shapes through a logging laser device")]
struct Args {
    /// Shape to display
    #[arg(value_enum, default_value_t = Shape::Triangle)]
    shape: Shape,

    /// Distance between interpolated points (normalized units)
    #[arg(short, long, default_value_t = 0.05)]
    spacing: f32,

    /// Fixed number of interpolated points per edge (overrides --spacing)
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Copies of each vertex
    #[arg(short, long, default_value_t = 3)]
    repeat: u32,

    /// Blank points at the start and end of each shape
    #[arg(short, long, default_value_t = 5)]
    blanks: u32,

    /// Number of frames to play
    #[arg(short, long, default_value_t = 30)]
    frames: u32,

    /// Playback rate
    #[arg(long, default_value_t = 15_000)]
    pps: u32,
}

#[derive(Copy, Clone, ValueEnum)]
enum Shape {
    Triangle,
    Square,
    Star,
    Circle,
    Demo,
}

/// Device adapter that logs every call and is always ready.
struct LoggingAdapter {
    shutter_open: bool,
}

impl DeviceAdapter for LoggingAdapter {
    fn enumerate(&mut self) -> Result<Vec<DeviceDescriptor>> {
        Ok(vec![DeviceDescriptor::new(0, "logging-dac")])
    }

    fn open(&mut self, index: usize) -> Result<DeviceHandle> {
        info!("open device {}", index);
        Ok(DeviceHandle(1))
    }

    fn close(&mut self, handle: DeviceHandle) -> Result<()> {
        info!("close handle {:?}", handle);
        Ok(())
    }

    fn status(&mut self, _handle: DeviceHandle) -> Result<DeviceStatus> {
        Ok(DeviceStatus::Ready)
    }

    fn write(
        &mut self,
        _handle: DeviceHandle,
        points: &[DevicePoint],
        points_per_second: u32,
        repeat_count: i32,
    ) -> Result<()> {
        let lit = points.iter().filter(|p| !p.is_blank()).count();
        info!(
            "write {} points ({} lit) at {} pps, repeat {}, shutter {}",
            points.len(),
            lit,
            points_per_second,
            repeat_count,
            if self.shutter_open { "open" } else { "closed" }
        );
        Ok(())
    }

    fn set_shutter(&mut self, _handle: DeviceHandle, open: bool) -> Result<()> {
        info!("shutter {}", if open { "open" } else { "closed" });
        self.shutter_open = open;
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let session = DeviceSession::builder(LoggingAdapter {
        shutter_open: false,
    })
    .config(SessionConfig::default().with_points_per_second(args.pps))
    .open()?;
    println!("Opened {}", session.descriptor().name);

    if let Shape::Demo = args.shape {
        session.render_demo_frames(args.frames)?;
        return Ok(());
    }

    let (shape, colors) = create_shape(args.shape, &args);
    let frame = build_frame(&[shape], &colors)?;
    println!(
        "Frame: {} points, {} blank",
        frame.len(),
        frame.points().iter().filter(|p| p.is_blank()).count()
    );

    let shutter = session.open_shutter()?;
    for _ in 0..args.frames {
        session.write_frame(&frame)?;
        thread::sleep(Duration::from_millis(33));
    }
    drop(shutter);

    session.park()?;
    Ok(())
}

fn create_shape(shape: Shape, args: &Args) -> (ShapeDescriptor, Vec<ColorRGBA>) {
    let vertices = match shape {
        Shape::Triangle => vec![
            Point2D::new(-0.5, -0.5),
            Point2D::new(0.5, -0.5),
            Point2D::new(0.0, 0.5),
        ],
        Shape::Square => vec![
            Point2D::new(-0.5, -0.5),
            Point2D::new(0.5, -0.5),
            Point2D::new(0.5, 0.5),
            Point2D::new(-0.5, 0.5),
        ],
        Shape::Star => (0..10)
            .map(|i| {
                let radius = if i % 2 == 0 { 0.6 } else { 0.25 };
                let angle = FRAC_PI_2 + i as f32 * PI / 5.0;
                Point2D::new(radius * angle.cos(), radius * angle.sin())
            })
            .collect(),
        Shape::Circle | Shape::Demo => (0..48)
            .map(|i| {
                let angle = i as f32 * TAU / 48.0;
                Point2D::new(0.5 * angle.cos(), 0.5 * angle.sin())
            })
            .collect(),
    };

    let n = vertices.len();
    let colors = (0..n).map(|i| hsv_to_rgb(i as f32 / n as f32)).collect();

    let descriptor = ShapeDescriptor::closed(vertices)
        .with_point_repeat(args.repeat)
        .with_blanks(args.blanks, args.blanks);
    let descriptor = match args.count {
        Some(count) => descriptor.with_interpolation_count(count),
        None => descriptor.with_spacing(args.spacing),
    };
    (descriptor, colors)
}

/// Fully saturated hue in `[0, 1)` to an opaque color.
fn hsv_to_rgb(h: f32) -> ColorRGBA {
    let h = h * 6.0;
    let i = h.floor() as i32;
    let f = h - i as f32;
    let (r, g, b) = match i % 6 {
        0 => (1.0, f, 0.0),
        1 => (1.0 - f, 1.0, 0.0),
        2 => (0.0, 1.0, f),
        3 => (0.0, 1.0 - f, 1.0),
        4 => (f, 0.0, 1.0),
        _ => (1.0, 0.0, 1.0 - f),
    };
    ColorRGBA::rgb(r, g, b)
}
