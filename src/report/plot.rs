use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use super::color::{generate_palette, BACKGROUND, FRAME, GRID};
use super::{AxisScale, Series};

const MARGIN: u32 = 32;
/// Smallest magnitude shown on a log axis.
const LOG_FLOOR: f64 = 1e-16;

// ---------------------------------------------------------------------------
// Line plot rasterizer
// ---------------------------------------------------------------------------

/// Render `series` as overlaid polylines in a `width × height` image.
///
/// The x axis is the sample index (each series is stretched over the full
/// width); the y axis is shared and auto-scaled over all finite values.
pub fn render(series: &[Series], scale: AxisScale, width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, BACKGROUND);
    if width <= 2 * MARGIN + 1 || height <= 2 * MARGIN + 1 {
        return img;
    }
    let left = MARGIN as f64;
    let right = (width - MARGIN - 1) as f64;
    let top = MARGIN as f64;
    let bottom = (height - MARGIN - 1) as f64;

    let transform = |v: f64| match scale {
        AxisScale::Linear => v,
        AxisScale::Log if v.is_nan() => v,
        AxisScale::Log => v.abs().max(LOG_FLOOR).log10(),
    };

    let (mut min, mut max) = series
        .iter()
        .flat_map(|s| s.values.iter())
        .map(|&v| transform(v))
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !min.is_finite() {
        min = 0.0;
        max = 1.0;
    }
    let range = max - min;
    if range.abs() < f64::EPSILON {
        min -= 0.5;
        max += 0.5;
    }
    let y_px = |v: f64| bottom - (v - min) / (max - min) * (bottom - top);

    // Horizontal grid at every decade (log) or at zero (linear).
    match scale {
        AxisScale::Log => {
            let mut decade = min.ceil();
            while decade <= max {
                hline(&mut img, y_px(decade), left, right, GRID);
                decade += 1.0;
            }
        }
        AxisScale::Linear if min < 0.0 && max > 0.0 => {
            hline(&mut img, y_px(0.0), left, right, GRID)
        }
        AxisScale::Linear => {}
    }
    frame(&mut img, left, top, right, bottom);

    let colors = generate_palette(series.len());
    for (s, &color) in series.iter().zip(&colors) {
        let n = s.values.len();
        let x_px = |i: usize| {
            if n <= 1 {
                (left + right) / 2.0
            } else {
                left + i as f64 * (right - left) / (n - 1) as f64
            }
        };
        let mut prev: Option<(f64, f64)> = None;
        for (i, &v) in s.values.iter().enumerate() {
            let tv = transform(v);
            if !tv.is_finite() {
                prev = None;
                continue;
            }
            let point = (x_px(i), y_px(tv));
            match prev {
                Some(p) => line(&mut img, p, point, color),
                None => put(&mut img, point.0, point.1, color),
            }
            prev = Some(point);
        }
    }
    img
}

/// Render and write a PNG, replacing any existing file.
pub fn save_png(
    path: &Path,
    series: &[Series],
    scale: AxisScale,
    width: u32,
    height: u32,
) -> Result<()> {
    render(series, scale, width, height)
        .save(path)
        .with_context(|| format!("writing plot {}", path.display()))
}

// -- drawing primitives --

fn put(img: &mut RgbImage, x: f64, y: f64, color: Rgb<u8>) {
    let (x, y) = (x.round(), y.round());
    if x >= 0.0 && y >= 0.0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Straight segment, stepping one pixel along the longer axis.
fn line(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), color: Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    for s in 0..=steps {
        let t = s as f64 / steps as f64;
        put(img, from.0 + t * dx, from.1 + t * dy, color);
    }
}

fn hline(img: &mut RgbImage, y: f64, left: f64, right: f64, color: Rgb<u8>) {
    line(img, (left, y), (right, y), color);
}

fn frame(img: &mut RgbImage, left: f64, top: f64, right: f64, bottom: f64) {
    line(img, (left, top), (right, top), FRAME);
    line(img, (left, bottom), (right, bottom), FRAME);
    line(img, (left, top), (left, bottom), FRAME);
    line(img, (right, top), (right, bottom), FRAME);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_color(img: &RgbImage, color: Rgb<u8>) -> usize {
        img.pixels().filter(|&&p| p == color).count()
    }

    #[test]
    fn draws_each_series_in_its_own_color() {
        let series = vec![
            Series::new("ramp", (0..50).map(|i| i as f64).collect()),
            Series::new("flat", vec![10.0; 50]),
        ];
        let img = render(&series, AxisScale::Linear, 200, 120);
        assert_eq!(img.dimensions(), (200, 120));
        for color in generate_palette(2) {
            assert!(count_color(&img, color) > 10);
        }
        assert!(count_color(&img, FRAME) > 0);
    }

    #[test]
    fn log_scale_tolerates_zeros_and_nan() {
        let series = vec![Series::new("coeffs", vec![0.0, 1e-3, f64::NAN, 2.0, -5.0])];
        let img = render(&series, AxisScale::Log, 160, 100);
        assert!(count_color(&img, generate_palette(1)[0]) > 0);
    }

    #[test]
    fn tiny_canvas_is_blank() {
        let img = render(&[Series::new("x", vec![1.0, 2.0])], AxisScale::Linear, 40, 40);
        assert_eq!(count_color(&img, BACKGROUND), 1600);
    }

    #[test]
    fn save_png_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        save_png(&path, &[Series::new("x", vec![1.0, 3.0, 2.0])], AxisScale::Linear, 120, 90)
            .unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!((back.width(), back.height()), (120, 90));
    }
}
