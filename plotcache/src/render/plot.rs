//! Waveform rectangle plot rendering.
//!
//! Draws the shipped plot artifact: a min/max envelope of the segment
//! samples over a zero-amplitude midline, with a strip underneath showing
//! the keyed segment highlighted between its neighbors on the sample axis.

use bytes::Bytes;
use tiny_skia::{
    Color, FillRule, Paint, PathBuilder, Pixmap, PixmapMut, Rect, Shader, Stroke, Transform,
};

use super::{PlotRenderer, RenderError, SampleSource};
use crate::key::SegmentKey;

/// Visual parameters for [`RectanglePlotRenderer`].
#[derive(Debug, Clone)]
pub struct PlotStyle {
    /// Output image width in pixels.
    pub width: u32,
    /// Output image height in pixels.
    pub height: u32,
    /// Padding around the drawing area in pixels.
    pub padding: f32,
    /// Background color (RGBA).
    pub background: (u8, u8, u8, u8),
    /// Waveform envelope fill (RGBA).
    pub envelope: (u8, u8, u8, u8),
    /// Zero-amplitude midline color (RGBA).
    pub midline: (u8, u8, u8, u8),
    /// Fill for neighbor segment boxes (RGBA).
    pub neighbor_fill: (u8, u8, u8, u8),
    /// Fill for the keyed segment box (RGBA).
    pub highlight_fill: (u8, u8, u8, u8),
    /// Border color for segment boxes (RGBA).
    pub border: (u8, u8, u8, u8),
    /// Border width in pixels.
    pub border_width: f32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 400,
            padding: 8.0,
            background: (255, 255, 255, 255),
            // Blue envelope, teal highlight, gray neighbors
            envelope: (69, 183, 209, 255),
            midline: (200, 200, 200, 255),
            neighbor_fill: (149, 165, 166, 130),
            highlight_fill: (78, 205, 196, 190),
            border: (0, 0, 0, 255),
            border_width: 1.0,
        }
    }
}

/// Renders segment plots by drawing directly into a pixmap and encoding
/// the result as PNG in memory.
pub struct RectanglePlotRenderer<S> {
    source: S,
    style: PlotStyle,
}

impl<S: SampleSource> RectanglePlotRenderer<S> {
    /// Create a renderer over `source` with the default style.
    pub fn new(source: S) -> Self {
        Self::with_style(source, PlotStyle::default())
    }

    /// Create a renderer with an explicit style.
    pub fn with_style(source: S, style: PlotStyle) -> Self {
        Self { source, style }
    }
}

impl<S: SampleSource> PlotRenderer for RectanglePlotRenderer<S> {
    fn render(&self, key: &SegmentKey) -> Result<Bytes, RenderError> {
        let samples = self.source.read_segment(key)?;
        let total_samples = self.source.len(key.source_id)?;
        let png = draw(key, &samples, total_samples, &self.style)
            .map_err(|reason| RenderError::Raster {
                key: key.to_string(),
                reason,
            })?;
        Ok(Bytes::from(png))
    }
}

fn draw(
    key: &SegmentKey,
    samples: &[f32],
    total_samples: u64,
    style: &PlotStyle,
) -> Result<Vec<u8>, String> {
    let mut pixmap =
        Pixmap::new(style.width, style.height).ok_or_else(|| "zero-sized canvas".to_string())?;
    pixmap.fill(rgba(style.background));

    let mut canvas = pixmap.as_mut();
    let layout = Layout::for_style(style);
    draw_envelope(&mut canvas, &layout, key, samples, style);
    draw_segment_strip(&mut canvas, &layout, key, total_samples, style);
    drop(canvas);

    pixmap.encode_png().map_err(|e| e.to_string())
}

/// Pixel geometry shared by both drawing passes.
struct Layout {
    left: f32,
    right: f32,
    wave_top: f32,
    wave_bottom: f32,
    strip_top: f32,
    strip_bottom: f32,
}

impl Layout {
    fn for_style(style: &PlotStyle) -> Self {
        let w = style.width as f32;
        let h = style.height as f32;
        let pad = style.padding;
        let strip_height = (h * 0.16).max(24.0);
        let strip_bottom = h - pad;
        let strip_top = strip_bottom - strip_height;
        Self {
            left: pad,
            right: w - pad,
            wave_top: pad,
            wave_bottom: strip_top - pad,
            strip_top,
            strip_bottom,
        }
    }
}

fn draw_envelope(
    canvas: &mut PixmapMut,
    layout: &Layout,
    key: &SegmentKey,
    samples: &[f32],
    style: &PlotStyle,
) {
    let mid = (layout.wave_top + layout.wave_bottom) / 2.0;
    let half = (layout.wave_bottom - layout.wave_top) / 2.0;

    // Midline first so the waveform draws over it.
    fill_rect(
        canvas,
        layout.left,
        mid - 0.5,
        layout.right - layout.left,
        1.0,
        style.midline,
    );

    if samples.is_empty() {
        return;
    }
    let peak = samples
        .iter()
        .fold(0.0f32, |acc, s| acc.max(s.abs()))
        .max(f32::EPSILON);

    // One column per pixel; the x axis spans the nominal segment length so
    // a partial final segment fills only its prefix of the plot.
    let columns = (layout.right - layout.left).max(1.0) as usize;
    let nominal = key.segment_length as usize;
    let mut path = PathBuilder::new();
    for col in 0..columns {
        let begin = (col * nominal / columns).min(samples.len());
        let end = ((col + 1) * nominal / columns).min(samples.len());
        if begin >= end {
            continue;
        }
        let mut lo = f32::MAX;
        let mut hi = f32::MIN;
        for &s in &samples[begin..end] {
            lo = lo.min(s);
            hi = hi.max(s);
        }
        let top = mid - (hi / peak) * half;
        let bottom = (mid - (lo / peak) * half).max(top + 0.5);
        let x = layout.left + col as f32;
        if let Some(rect) = Rect::from_ltrb(x, top, x + 1.0, bottom) {
            path.push_rect(rect);
        }
    }
    if let Some(path) = path.finish() {
        canvas.fill_path(
            &path,
            &solid(style.envelope),
            FillRule::Winding,
            Transform::default(),
            None,
        );
    }
}

fn draw_segment_strip(
    canvas: &mut PixmapMut,
    layout: &Layout,
    key: &SegmentKey,
    total_samples: u64,
    style: &PlotStyle,
) {
    let stride = key.stride();
    let length = u64::from(key.segment_length);

    // The keyed segment and its immediate neighbors, truncated to the
    // signal extent. Neighbors past the end are dropped entirely.
    let first = key.segment_index.saturating_sub(1);
    let mut boxes: Vec<(u32, u64, u64)> = Vec::new();
    for index in first..=key.segment_index.saturating_add(1) {
        let start = u64::from(index) * stride;
        if start >= total_samples && index != key.segment_index {
            continue;
        }
        let end = (start + length).min(total_samples).max(start + 1);
        boxes.push((index, start, end));
    }
    let Some(&(_, span_start, _)) = boxes.first() else {
        return;
    };
    let Some(&(_, _, span_end)) = boxes.last() else {
        return;
    };
    let span = (span_end - span_start).max(1) as f32;

    let to_x = |sample: u64| {
        layout.left + (sample - span_start) as f32 / span * (layout.right - layout.left)
    };

    for (index, start, end) in boxes {
        let x0 = to_x(start);
        let x1 = to_x(end);
        let Some(rect) = Rect::from_ltrb(x0, layout.strip_top, x1.max(x0 + 1.0), layout.strip_bottom)
        else {
            continue;
        };
        let fill = if index == key.segment_index {
            style.highlight_fill
        } else {
            style.neighbor_fill
        };

        let path = PathBuilder::from_rect(rect);
        canvas.fill_path(
            &path,
            &solid(fill),
            FillRule::Winding,
            Transform::default(),
            None,
        );
        if style.border_width > 0.0 {
            canvas.stroke_path(
                &path,
                &solid(style.border),
                &Stroke {
                    width: style.border_width,
                    ..Default::default()
                },
                Transform::default(),
                None,
            );
        }
    }
}

fn rgba(c: (u8, u8, u8, u8)) -> Color {
    Color::from_rgba8(c.0, c.1, c.2, c.3)
}

fn solid(c: (u8, u8, u8, u8)) -> Paint<'static> {
    Paint {
        shader: Shader::SolidColor(rgba(c)),
        anti_alias: true,
        ..Default::default()
    }
}

fn fill_rect(canvas: &mut PixmapMut, x: f32, y: f32, w: f32, h: f32, color: (u8, u8, u8, u8)) {
    if let Some(rect) = Rect::from_xywh(x, y, w, h) {
        canvas.fill_rect(rect, &solid(color), Transform::default(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SyntheticSource;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    #[test]
    fn test_render_produces_png() {
        let renderer = RectanglePlotRenderer::new(SyntheticSource::new(1 << 20));
        let key = SegmentKey::new(1, 8192, 4, 0);

        let bytes = renderer.render(&key).unwrap();
        assert!(bytes.len() > PNG_MAGIC.len());
        assert_eq!(bytes[..8], PNG_MAGIC);
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = RectanglePlotRenderer::new(SyntheticSource::new(1 << 18));
        let key = SegmentKey::new(7, 65536, 2, 2500);

        let first = renderer.render(&key).unwrap();
        let second = renderer.render(&key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_partial_final_segment_renders() {
        // Samples 8192..10000 only, so the envelope covers a prefix
        let renderer = RectanglePlotRenderer::new(SyntheticSource::new(10_000));
        let key = SegmentKey::new(3, 8192, 1, 0);

        let bytes = renderer.render(&key).unwrap();
        assert_eq!(bytes[..8], PNG_MAGIC);
    }

    #[test]
    fn test_segment_past_end_is_not_found() {
        let renderer = RectanglePlotRenderer::new(SyntheticSource::new(10_000));
        let key = SegmentKey::new(3, 8192, 2, 0);

        let err = renderer.render(&key).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_overlap_changes_the_artifact() {
        // 25% overlap shifts the sample window, so the pixels differ
        let renderer = RectanglePlotRenderer::new(SyntheticSource::new(1 << 20));
        let plain = renderer.render(&SegmentKey::new(5, 8192, 3, 0)).unwrap();
        let shifted = renderer
            .render(&SegmentKey::new(5, 8192, 3, 2500))
            .unwrap();

        assert_ne!(plain, shifted);
    }
}
