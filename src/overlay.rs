// THEORY:
// The overlay renderer is a pure transform: compressed frame in, annotated
// compressed frame out. It holds no shared state and touches nothing outside
// its arguments, which is what lets the ingest loop call it inline without any
// locking. Emphasis of a zone rectangle is governed by the display threshold;
// the TARGET / NO TARGET wording in single-target mode is governed by the
// separate decision threshold. The two are independent knobs on purpose: one
// tunes what catches the operator's eye, the other mirrors the downstream
// controller's actual decision.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

use crate::config::{Config, HEADER_HEIGHT, Zone, ZoneLayout};
use crate::error::RenderError;
use crate::font;
use crate::sample::{Probabilities, Sample};

const JPEG_QUALITY: u8 = 90;

const EMPHASIS: Rgb<u8> = Rgb([0, 255, 0]);
const DIM: Rgb<u8> = Rgb([100, 100, 100]);
const INFO_TEXT: Rgb<u8> = Rgb([200, 200, 200]);
const ALERT: Rgb<u8> = Rgb([230, 40, 40]);
const BAND_PLAIN: Rgb<u8> = Rgb([0, 0, 0]);
const BAND_TARGET: Rgb<u8> = Rgb([0, 60, 0]);
const BAND_NO_TARGET: Rgb<u8> = Rgb([60, 0, 0]);

/// Stateless overlay transform, parameterized once from the config.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    layout: ZoneLayout,
    crop_size: u32,
    center_offset: u32,
    display_threshold: f64,
    decision_threshold: f64,
}

impl OverlayRenderer {
    pub fn new(config: &Config) -> Self {
        Self {
            layout: config.layout(),
            crop_size: config.crop_size,
            center_offset: config.center_offset(),
            display_threshold: config.display_threshold,
            decision_threshold: config.decision_threshold,
        }
    }

    /// Decompresses the sample's frame, draws the telemetry overlay and
    /// recompresses. Undecodable input is reported, never panicked on.
    pub fn render(&self, sample: &Sample) -> Result<Bytes, RenderError> {
        if sample.image.is_empty() {
            return Err(RenderError::EmptyFrame);
        }
        let mut frame = image::load_from_memory(&sample.image)?.into_rgb8();

        match &sample.probabilities {
            Probabilities::Zones(probs) => self.draw_zones(&mut frame, probs),
            Probabilities::Single(prob) => self.draw_single_target(&mut frame, *prob),
        }
        self.draw_fps(&mut frame, sample.source_fps);

        let mut encoded = Vec::with_capacity(sample.image.len());
        let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut encoded), JPEG_QUALITY);
        encoder.encode_image(&frame)?;
        Ok(Bytes::from(encoded))
    }

    fn draw_zones(&self, frame: &mut RgbImage, probs: &std::collections::HashMap<String, f64>) {
        fill_band(frame, BAND_PLAIN);
        let zones = match &self.layout {
            ZoneLayout::Zones(zones) => zones.as_slice(),
            // Sensor sent a zone map but we are configured single-target:
            // no windows to outline, the band and FPS text still render.
            ZoneLayout::SingleTarget => &[],
        };
        for zone in zones {
            let prob = probs.get(&zone.name).copied().unwrap_or(0.0);
            self.draw_zone_window(frame, zone, prob);
        }
    }

    fn draw_zone_window(&self, frame: &mut RgbImage, zone: &Zone, prob: f64) {
        let emphasized = prob > self.display_threshold;
        let (color, thickness) = if emphasized { (EMPHASIS, 2) } else { (DIM, 1) };
        stroke_rect(
            frame,
            zone.offset,
            HEADER_HEIGHT,
            self.crop_size,
            frame.height().saturating_sub(HEADER_HEIGHT),
            thickness,
            color,
        );
        let label = format!("{:.0}%", prob * 100.0);
        font::draw_text(frame, &label, zone.offset as i64 + 5, 4, color);
    }

    fn draw_single_target(&self, frame: &mut RgbImage, prob: f64) {
        let is_target = prob > self.decision_threshold;
        let (band, color, word) = if is_target {
            (BAND_TARGET, EMPHASIS, "TARGET")
        } else {
            (BAND_NO_TARGET, ALERT, "NO TARGET")
        };
        fill_band(frame, band);

        let emphasized = prob > self.display_threshold;
        let thickness = if emphasized { 2 } else { 1 };
        stroke_rect(
            frame,
            self.center_offset,
            HEADER_HEIGHT,
            self.crop_size,
            frame.height().saturating_sub(HEADER_HEIGHT),
            thickness,
            if emphasized { EMPHASIS } else { DIM },
        );

        let label = format!("{word} {:.0}%", prob * 100.0);
        font::draw_text(frame, &label, 5, 4, color);
    }

    fn draw_fps(&self, frame: &mut RgbImage, fps: f64) {
        let text = format!("FPS:{fps:.1}");
        let x = frame.width() as i64 - font::text_width(&text) as i64 - 5;
        font::draw_text(frame, &text, x, 4, INFO_TEXT);
    }
}

/// Fills the header band across the full frame width.
fn fill_band(frame: &mut RgbImage, color: Rgb<u8>) {
    let band_height = HEADER_HEIGHT.min(frame.height());
    for y in 0..band_height {
        for x in 0..frame.width() {
            frame.put_pixel(x, y, color);
        }
    }
}

/// Draws a rectangle outline clamped to the frame bounds.
fn stroke_rect(
    frame: &mut RgbImage,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    thickness: u32,
    color: Rgb<u8>,
) {
    if width == 0 || height == 0 {
        return;
    }
    let x1 = x.saturating_add(width).min(frame.width());
    let y1 = y.saturating_add(height).min(frame.height());
    if x >= x1 || y >= y1 {
        return;
    }
    let t = thickness.max(1);
    for row in y..y1 {
        let edge_row = row < y + t || row >= y1.saturating_sub(t);
        if edge_row {
            for col in x..x1 {
                frame.put_pixel(col, row, color);
            }
        } else {
            for col in (x..x1.min(x + t)).chain(x1.saturating_sub(t).max(x)..x1) {
                frame.put_pixel(col, row, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn config(extra: &[&str]) -> Config {
        Config::parse_from(std::iter::once("jetson_pilot").chain(extra.iter().copied()))
    }

    fn jpeg_frame(width: u32, height: u32) -> Bytes {
        let frame = RgbImage::from_pixel(width, height, Rgb([128, 128, 128]));
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut out), 90);
        encoder.encode_image(&frame).unwrap();
        Bytes::from(out)
    }

    fn sample(probabilities: Probabilities) -> Sample {
        Sample {
            probabilities,
            image: jpeg_frame(320, 224),
            source_fps: 18.2,
        }
    }

    fn decode(rendered: &Bytes) -> RgbImage {
        image::load_from_memory(rendered).unwrap().into_rgb8()
    }

    #[test]
    fn target_label_tints_the_band_green() {
        let renderer = OverlayRenderer::new(&config(&["--single-target"]));
        let rendered = renderer
            .render(&sample(Probabilities::Single(0.81)))
            .unwrap();
        let frame = decode(&rendered);
        // JPEG is lossy; assert channel dominance rather than exact values.
        let px = frame.get_pixel(200, 10);
        assert!(px.0[1] > px.0[0], "band should lean green, got {:?}", px);
    }

    #[test]
    fn no_target_label_tints_the_band_red() {
        let renderer = OverlayRenderer::new(&config(&["--single-target"]));
        let rendered = renderer
            .render(&sample(Probabilities::Single(0.40)))
            .unwrap();
        let frame = decode(&rendered);
        let px = frame.get_pixel(200, 10);
        assert!(px.0[0] > px.0[1], "band should lean red, got {:?}", px);
    }

    #[test]
    fn confident_zone_is_emphasized() {
        let renderer = OverlayRenderer::new(&config(&[]));
        let mut probs = HashMap::new();
        probs.insert("left".to_string(), 0.9);
        probs.insert("center".to_string(), 0.1);
        probs.insert("right".to_string(), 0.1);
        let rendered = renderer.render(&sample(Probabilities::Zones(probs))).unwrap();
        let frame = decode(&rendered);
        // Top edge of the left zone rectangle sits just below the band.
        let emphasized = frame.get_pixel(10, HEADER_HEIGHT);
        assert!(
            emphasized.0[1] > 150 && emphasized.0[1] > emphasized.0[0],
            "emphasized zone edge should be bright green, got {:?}",
            emphasized
        );
        // The center zone is dim grey: channels roughly equal, not bright.
        let dim = frame.get_pixel(60, HEADER_HEIGHT);
        assert!(
            dim.0[1] < 150,
            "low-probability zone should be dim, got {:?}",
            dim
        );
    }

    #[test]
    fn empty_frame_is_reported_not_panicked() {
        let renderer = OverlayRenderer::new(&config(&[]));
        let s = Sample {
            probabilities: Probabilities::Single(0.5),
            image: Bytes::new(),
            source_fps: 0.0,
        };
        assert!(matches!(renderer.render(&s), Err(RenderError::EmptyFrame)));
    }

    #[test]
    fn undecodable_frame_is_reported_not_panicked() {
        let renderer = OverlayRenderer::new(&config(&[]));
        let s = Sample {
            probabilities: Probabilities::Single(0.5),
            image: Bytes::from_static(b"definitely not a jpeg"),
            source_fps: 0.0,
        };
        assert!(matches!(renderer.render(&s), Err(RenderError::Image(_))));
    }

    #[test]
    fn absurd_zone_geometry_clamps_instead_of_overflowing() {
        let renderer = OverlayRenderer::new(&config(&[
            "--zones",
            "far=4294967295",
            "--crop-size",
            "4294967295",
        ]));
        let mut probs = HashMap::new();
        probs.insert("far".to_string(), 0.9);
        // Must render (clamped to the frame), not panic on offset+width math.
        renderer
            .render(&sample(Probabilities::Zones(probs)))
            .unwrap();
    }

    #[test]
    fn output_is_a_decodable_jpeg_of_the_same_size() {
        let renderer = OverlayRenderer::new(&config(&[]));
        let rendered = renderer
            .render(&sample(Probabilities::Zones(HashMap::new())))
            .unwrap();
        let frame = decode(&rendered);
        assert_eq!((frame.width(), frame.height()), (320, 224));
    }
}
