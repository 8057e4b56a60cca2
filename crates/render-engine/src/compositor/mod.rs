//! Frame compositor: background, shadow, recording, webcam and overlays.
//!
//! Every output frame is built back to front by a fixed list of
//! [`EffectStage`]s. A stage reads the frame inputs, the effects snapshot
//! and the canvas geometry, and paints into the output buffer. Artwork that
//! only depends on geometry (rounded mask, shadow sprite, background) comes
//! from a [`GeometryCache`] owned by the compositor.
//!
//! Compositing is pure: the same inputs always produce the same bytes.

pub mod background;
pub mod cache;
pub mod captions;
pub mod cursor;
pub mod keystrokes;
pub mod text;
pub mod webcam;

use sheen_common::error::{SheenError, SheenResult};
use sheen_processing_core::captions::active_caption;
use sheen_processing_core::cursor_smooth::CursorSmoother;
use sheen_processing_core::keystrokes::{fold_key_presses, visible_badges, KeyPress};
use sheen_processing_core::zoom::ZoomTransform;
use sheen_project_model::effects::EffectsConfiguration;
use sheen_project_model::event::{CaptionSegment, CursorEvent, EventLogs, TimestampNs};

use crate::canvas::CanvasGeometry;
use crate::frame::RgbaFrame;
use crate::raster::{blend_at, blend_pixel, sample_bilinear};

pub use background::ResolvedBackground;
pub use cache::{CacheStats, GeometryCache};
use cursor::{draw_cursor, CursorMapper};

/// Webcam border width in canvas pixels.
const WEBCAM_BORDER: f64 = 2.0;

/// One layer of the composite, in back-to-front order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectStage {
    Background,
    Shadow,
    Foreground,
    Webcam,
    Cursor,
    Keystrokes,
    Captions,
}

impl EffectStage {
    /// Every stage in z-order.
    pub const ORDER: [EffectStage; 7] = [
        Self::Background,
        Self::Shadow,
        Self::Foreground,
        Self::Webcam,
        Self::Cursor,
        Self::Keystrokes,
        Self::Captions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Background => "background",
            Self::Shadow => "shadow",
            Self::Foreground => "foreground",
            Self::Webcam => "webcam",
            Self::Cursor => "cursor",
            Self::Keystrokes => "keystrokes",
            Self::Captions => "captions",
        }
    }

    /// Whether the stage does anything under `config`.
    pub fn is_enabled(self, config: &EffectsConfiguration) -> bool {
        match self {
            Self::Background | Self::Foreground => true,
            Self::Shadow => config.shadow.enabled && config.shadow.opacity > 0.0,
            Self::Webcam => config.webcam.enabled,
            Self::Cursor => config.cursor.enabled,
            Self::Keystrokes => config.keystrokes.enabled,
            Self::Captions => config.captions.enabled,
        }
    }

    fn apply(self, ctx: &StageContext<'_>, cache: &mut GeometryCache, out: &mut RgbaFrame) {
        match self {
            Self::Background => paint_background(ctx, cache, out),
            Self::Shadow => paint_shadow(ctx, cache, out),
            Self::Foreground => paint_foreground(ctx, cache, out),
            Self::Webcam => paint_webcam(ctx, out),
            Self::Cursor => paint_cursor(ctx, out),
            Self::Keystrokes => paint_keystrokes(ctx, cache, out),
            Self::Captions => paint_captions(ctx, cache, out),
        }
    }
}

/// Timeline data the overlays look up per frame, prepared once per export.
#[derive(Debug, Clone, Default)]
pub struct OverlayData {
    /// Cursor path after smoothing.
    pub cursor: Vec<CursorEvent>,
    /// Raw click-downs, for ripples.
    pub clicks: Vec<CursorEvent>,
    pub key_presses: Vec<KeyPress>,
    pub captions: Vec<CaptionSegment>,
    /// Capture size the cursor coordinates are expressed in.
    pub capture_width: f64,
    pub capture_height: f64,
}

impl OverlayData {
    pub fn prepare(
        events: &EventLogs,
        config: &EffectsConfiguration,
        capture_width: u32,
        capture_height: u32,
    ) -> Self {
        let smoother = CursorSmoother::from_config(&config.cursor);
        Self {
            cursor: smoother.smooth(&events.cursor),
            clicks: events.clicks().cloned().collect(),
            key_presses: fold_key_presses(&events.keystrokes, config.keystrokes.display_secs),
            captions: events.captions.clone(),
            capture_width: capture_width as f64,
            capture_height: capture_height as f64,
        }
    }
}

/// Per-frame inputs.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Raw screen frame at source resolution.
    pub frame: &'a RgbaFrame,
    /// Recording-timeline time used for overlay lookups.
    pub time_ns: TimestampNs,
    /// Zoom in capture pixels, as returned by the zoom transformer.
    pub zoom: ZoomTransform,
    pub webcam: Option<&'a RgbaFrame>,
}

struct StageContext<'a> {
    config: &'a EffectsConfiguration,
    geometry: &'a CanvasGeometry,
    overlays: &'a OverlayData,
    inputs: &'a FrameInputs<'a>,
    /// Zoom rescaled to content pixels.
    zoom: ZoomTransform,
}

pub struct EffectsCompositor {
    config: EffectsConfiguration,
    geometry: CanvasGeometry,
    overlays: OverlayData,
    stages: Vec<EffectStage>,
    cache: GeometryCache,
}

impl EffectsCompositor {
    pub fn new(config: EffectsConfiguration, geometry: CanvasGeometry, overlays: OverlayData) -> Self {
        let stages: Vec<_> = EffectStage::ORDER
            .into_iter()
            .filter(|s| s.is_enabled(&config))
            .collect();
        tracing::debug!(
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            output_width = geometry.output_width,
            output_height = geometry.output_height,
            "Compositor ready"
        );
        Self {
            config,
            geometry,
            overlays,
            stages,
            cache: GeometryCache::new(),
        }
    }

    pub fn geometry(&self) -> &CanvasGeometry {
        &self.geometry
    }

    pub fn stages(&self) -> &[EffectStage] {
        &self.stages
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Composite one frame into `out`, which must be output-sized.
    pub fn compose(&mut self, inputs: &FrameInputs<'_>, out: &mut RgbaFrame) -> SheenResult<()> {
        let g = &self.geometry;
        if out.width != g.output_width || out.height != g.output_height {
            return Err(SheenError::invalid_job(format!(
                "output buffer is {}x{}, expected {}x{}",
                out.width, out.height, g.output_width, g.output_height
            )));
        }
        if inputs.frame.width != g.source_width || inputs.frame.height != g.source_height {
            return Err(SheenError::source_unavailable(format!(
                "frame is {}x{}, source was probed as {}x{}",
                inputs.frame.width, inputs.frame.height, g.source_width, g.source_height
            )));
        }

        let ctx = StageContext {
            config: &self.config,
            geometry: &self.geometry,
            overlays: &self.overlays,
            inputs,
            zoom: content_zoom(inputs.zoom, &self.geometry, &self.overlays),
        };
        for stage in &self.stages {
            stage.apply(&ctx, &mut self.cache, out);
        }
        Ok(())
    }
}

/// Rescale a capture-space zoom to the content rectangle.
fn content_zoom(zoom: ZoomTransform, geometry: &CanvasGeometry, overlays: &OverlayData) -> ZoomTransform {
    if zoom.is_identity() {
        return ZoomTransform::IDENTITY;
    }
    let cap_w = if overlays.capture_width > 0.0 {
        overlays.capture_width
    } else {
        geometry.source_width as f64
    };
    let cap_h = if overlays.capture_height > 0.0 {
        overlays.capture_height
    } else {
        geometry.source_height as f64
    };
    ZoomTransform {
        scale: zoom.scale,
        offset_x: zoom.offset_x * geometry.content.w as f64 / cap_w,
        offset_y: zoom.offset_y * geometry.content.h as f64 / cap_h,
        active: true,
    }
}

fn paint_background(ctx: &StageContext<'_>, cache: &mut GeometryCache, out: &mut RgbaFrame) {
    let bg = cache.background(
        out.width,
        out.height,
        ResolvedBackground::resolve(&ctx.config.background),
    );
    out.data.copy_from_slice(&bg.data);
}

fn paint_shadow(ctx: &StageContext<'_>, cache: &mut GeometryCache, out: &mut RgbaFrame) {
    let g = ctx.geometry;
    let shadow = &ctx.config.shadow;
    let blur = (shadow.blur.max(0.0) * g.scale).round() as u32;
    let sprite = cache.shadow(g.content.w, g.content.h, g.corner_radius, blur);
    let color = shadow.color.with_opacity(shadow.opacity).to_array();

    let ox = g.content.x as i64 - sprite.margin as i64 + (shadow.offset_x * g.scale).round() as i64;
    // Positive offset_y moves the shadow up.
    let oy = g.content.y as i64 - sprite.margin as i64 - (shadow.offset_y * g.scale).round() as i64;

    for sy in 0..sprite.height {
        let row = (sy * sprite.width) as usize;
        for sx in 0..sprite.width {
            let a = sprite.alpha[row + sx as usize];
            if a > 0 {
                blend_pixel(out, ox + sx as i64, oy + sy as i64, color, a as f32 / 255.0);
            }
        }
    }
}

fn paint_foreground(ctx: &StageContext<'_>, cache: &mut GeometryCache, out: &mut RgbaFrame) {
    let g = ctx.geometry;
    let c = g.content;
    let src = ctx.inputs.frame;
    let mask = cache.mask(c.w, c.h, g.corner_radius);
    let (cw, ch) = (c.w as f64, c.h as f64);
    let (sx_scale, sy_scale) = (src.width as f64 / cw, src.height as f64 / ch);
    let direct = ctx.zoom.is_identity() && c.w == src.width && c.h == src.height;

    for v in 0..c.h {
        for u in 0..c.w {
            let m = mask[(v * c.w + u) as usize];
            if m == 0 {
                continue;
            }
            let px = if direct {
                src.pixel(u, v)
            } else {
                let (x, y) = (u as f64 + 0.5, v as f64 + 0.5);
                let (x, y) = if ctx.zoom.is_identity() {
                    (x, y)
                } else {
                    ctx.zoom.invert(x, y, cw, ch)
                };
                sample_bilinear(src, x * sx_scale, y * sy_scale)
            };
            let i = out.index(c.x + u, c.y + v);
            if m == 255 {
                out.data[i..i + 3].copy_from_slice(&px[..3]);
                out.data[i + 3] = 255;
            } else {
                blend_at(&mut out.data, i, [px[0], px[1], px[2], 255], m as f32 / 255.0);
            }
        }
    }
}

fn paint_webcam(ctx: &StageContext<'_>, out: &mut RgbaFrame) {
    let Some(camera) = ctx.inputs.webcam else {
        return;
    };
    if camera.height == 0 {
        return;
    }
    let g = ctx.geometry;
    let aspect = camera.width as f64 / camera.height as f64;
    if let Some(rect) = webcam::webcam_rect(&ctx.config.webcam, &g.canvas_rect, g.scale, aspect) {
        webcam::draw_webcam(out, camera, &rect, ctx.config.webcam.shape, WEBCAM_BORDER * g.scale);
    }
}

fn paint_cursor(ctx: &StageContext<'_>, out: &mut RgbaFrame) {
    let o = ctx.overlays;
    if o.capture_width <= 0.0 || o.capture_height <= 0.0 {
        return;
    }
    let mapper = CursorMapper {
        capture_width: o.capture_width,
        capture_height: o.capture_height,
        geometry: *ctx.geometry,
        zoom: ctx.zoom,
    };
    draw_cursor(
        out,
        &ctx.config.cursor,
        &mapper,
        &o.cursor,
        &o.clicks,
        ctx.inputs.time_ns,
    );
}

fn paint_keystrokes(ctx: &StageContext<'_>, cache: &mut GeometryCache, out: &mut RgbaFrame) {
    let cfg = &ctx.config.keystrokes;
    let badges = visible_badges(&ctx.overlays.key_presses, ctx.inputs.time_ns, cfg.display_secs);
    let font_size = cfg.font_size * ctx.geometry.scale as f32;
    keystrokes::draw_badges(out, cache, &badges, &ctx.geometry.canvas_rect, font_size);
}

fn paint_captions(ctx: &StageContext<'_>, cache: &mut GeometryCache, out: &mut RgbaFrame) {
    let Some(segment) = active_caption(&ctx.overlays.captions, ctx.inputs.time_ns) else {
        return;
    };
    let font_size = ctx.config.captions.font_size * ctx.geometry.scale as f32;
    captions::draw_caption(out, cache, &segment.text, &ctx.geometry.canvas_rect, font_size);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheen_project_model::effects::{BackgroundKind, Color, FrameStyle};
    use sheen_project_model::effects::WebcamShape;
    use sheen_project_model::event::{CursorEventKind, KeystrokeEvent};
    use sheen_project_model::export::Resolution;

    const SEC: u64 = 1_000_000_000;

    fn plain_config(padding: u32, corner_radius: u32) -> EffectsConfiguration {
        let mut config = EffectsConfiguration::default();
        config.frame = FrameStyle {
            padding,
            corner_radius,
        };
        config.background.kind = BackgroundKind::Solid;
        config.background.color = Color::rgb(10, 20, 30);
        config.shadow.enabled = false;
        config.cursor.enabled = false;
        config.webcam.enabled = false;
        config
    }

    fn compositor(config: EffectsConfiguration, w: u32, h: u32) -> EffectsCompositor {
        let geometry =
            CanvasGeometry::new(w, h, &config.frame, Resolution::Original).unwrap();
        let overlays = OverlayData {
            capture_width: w as f64,
            capture_height: h as f64,
            ..OverlayData::default()
        };
        EffectsCompositor::new(config, geometry, overlays)
    }

    fn render(c: &mut EffectsCompositor, frame: &RgbaFrame, t: TimestampNs, zoom: ZoomTransform) -> RgbaFrame {
        render_with_webcam(c, frame, t, zoom, None)
    }

    fn render_with_webcam(
        c: &mut EffectsCompositor,
        frame: &RgbaFrame,
        t: TimestampNs,
        zoom: ZoomTransform,
        webcam: Option<&RgbaFrame>,
    ) -> RgbaFrame {
        let g = c.geometry();
        let mut out = RgbaFrame::new(g.output_width, g.output_height);
        c.compose(
            &FrameInputs {
                frame,
                time_ns: t,
                zoom,
                webcam,
            },
            &mut out,
        )
        .unwrap();
        out
    }

    fn with_events(config: EffectsConfiguration, events: &EventLogs, w: u32, h: u32) -> EffectsCompositor {
        let geometry = CanvasGeometry::new(w, h, &config.frame, Resolution::Original).unwrap();
        let overlays = OverlayData::prepare(events, &config, w, h);
        EffectsCompositor::new(config, geometry, overlays)
    }

    /// Pixels darker than the plain white source, as (x, y).
    fn darkened(out: &RgbaFrame) -> Vec<(u32, u32)> {
        let mut found = Vec::new();
        for y in 0..out.height {
            for x in 0..out.width {
                if out.pixel(x, y)[0] < 200 {
                    found.push((x, y));
                }
            }
        }
        found
    }

    #[test]
    fn test_stage_order_is_fixed() {
        let mut config = EffectsConfiguration::default();
        config.keystrokes.enabled = true;
        config.captions.enabled = true;
        let c = compositor(config, 64, 64);
        assert_eq!(c.stages(), &EffectStage::ORDER[..]);
    }

    #[test]
    fn test_disabled_stages_are_skipped() {
        let c = compositor(plain_config(0, 0), 64, 64);
        assert_eq!(c.stages(), &[EffectStage::Background, EffectStage::Foreground]);
    }

    #[test]
    fn test_square_corners_copy_frame() {
        let frame = RgbaFrame::filled(64, 64, [200, 100, 50, 255]);
        let mut c = compositor(plain_config(0, 0), 64, 64);
        let out = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_padding_shows_background() {
        let frame = RgbaFrame::filled(64, 64, [200, 100, 50, 255]);
        let mut c = compositor(plain_config(8, 0), 64, 64);
        let out = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        assert_eq!((out.width, out.height), (80, 80));
        assert_eq!(out.pixel(2, 2), [10, 20, 30, 255]);
        assert_eq!(out.pixel(40, 40), [200, 100, 50, 255]);
    }

    #[test]
    fn test_rounded_corners_reveal_background() {
        let frame = RgbaFrame::filled(64, 64, [200, 100, 50, 255]);
        let mut c = compositor(plain_config(0, 16), 64, 64);
        let out = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        assert_eq!(out.pixel(0, 0), [10, 20, 30, 255]);
        assert_eq!(out.pixel(32, 32), [200, 100, 50, 255]);
    }

    #[test]
    fn test_compose_is_deterministic_and_cached() {
        let mut config = EffectsConfiguration::default();
        config.frame.padding = 16;
        let mut frame = RgbaFrame::filled(96, 64, [0, 0, 0, 255]);
        for x in 0..96 {
            frame.put_pixel(x, 10, [255, 255, 255, 255]);
        }
        let mut c = compositor(config, 96, 64);
        let a = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        let b = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        assert_eq!(a, b);

        let stats = c.cache_stats();
        assert_eq!(stats.background_builds, 1);
        assert_eq!(stats.shadow_builds, 1);
        assert_eq!(stats.mask_builds, 1);
    }

    #[test]
    fn test_shadow_darkens_below_content() {
        let mut config = plain_config(24, 0);
        config.background.color = Color::rgb(200, 200, 200);
        config.shadow.enabled = true;
        config.shadow.blur = 4.0;
        config.shadow.opacity = 1.0;
        config.shadow.offset_y = -8.0;
        let frame = RgbaFrame::filled(64, 64, [255, 255, 255, 255]);
        let mut c = compositor(config, 64, 64);
        let out = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        // Just under the content edge the shadow has been pushed down.
        let below = out.pixel(56, 24 + 64 + 3);
        let above = out.pixel(56, 24 - 3);
        assert!(below[0] < above[0]);
    }

    #[test]
    fn test_zoom_magnifies_centre() {
        let mut frame = RgbaFrame::filled(64, 64, [0, 0, 0, 255]);
        for y in 28..36 {
            for x in 28..36 {
                frame.put_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let mut c = compositor(plain_config(0, 0), 64, 64);
        let zoom = ZoomTransform {
            scale: 2.0,
            offset_x: 0.0,
            offset_y: 0.0,
            active: true,
        };
        let out = render(&mut c, &frame, 0, zoom);
        // The 8px square now spans roughly 16px around the centre.
        assert_eq!(out.pixel(26, 32), [255, 255, 255, 255]);
        assert_eq!(out.pixel(20, 32), [0, 0, 0, 255]);
    }

    #[test]
    fn test_cursor_stage_draws_dot() {
        let mut config = plain_config(0, 0);
        config.cursor.enabled = true;
        config.cursor.highlight = false;
        config.cursor.smoothing_strength = 0.0;
        let geometry = CanvasGeometry::new(64, 64, &config.frame, Resolution::Original).unwrap();
        let events = EventLogs::new(
            vec![CursorEvent::new(0, 32.0, 32.0, CursorEventKind::Move)],
            vec![],
            vec![],
        );
        let overlays = OverlayData::prepare(&events, &config, 64, 64);
        let mut c = EffectsCompositor::new(config.clone(), geometry, overlays);
        let frame = RgbaFrame::filled(64, 64, [255, 255, 255, 255]);
        let out = render(&mut c, &frame, 0, ZoomTransform::IDENTITY);
        assert_eq!(out.pixel(32, 32), config.cursor.color.to_array());
    }

    #[test]
    fn test_webcam_only_drawn_when_enabled() {
        let frame = RgbaFrame::filled(160, 120, [255, 255, 255, 255]);
        let camera = RgbaFrame::filled(32, 24, [220, 20, 20, 255]);

        let mut off = compositor(plain_config(0, 0), 160, 120);
        let out = render_with_webcam(&mut off, &frame, 0, ZoomTransform::IDENTITY, Some(&camera));
        assert_eq!(out, frame);

        let mut config = plain_config(0, 0);
        config.webcam.enabled = true;
        config.webcam.shape = WebcamShape::Rectangle;
        config.webcam.size = 0.25;
        let mut on = compositor(config.clone(), 160, 120);
        let out = render_with_webcam(&mut on, &frame, 0, ZoomTransform::IDENTITY, Some(&camera));

        let g = *on.geometry();
        let rect = webcam::webcam_rect(&config.webcam, &g.canvas_rect, g.scale, 32.0 / 24.0).unwrap();
        let centre = rect.center();
        let px = out.pixel(centre.x as u32, centre.y as u32);
        assert!(px[0] > 200 && px[1] < 40, "bubble centre is {px:?}");

        let (x0, y0, x1, y1) = rect.pixel_span(out.width, out.height);
        for y in 0..out.height {
            for x in 0..out.width {
                if out.pixel(x, y) != frame.pixel(x, y) {
                    assert!((x0..x1).contains(&x) && (y0..y1).contains(&y), "({x}, {y}) outside bubble");
                }
            }
        }

        // No matched webcam frame, no bubble.
        let out = render_with_webcam(&mut on, &frame, 0, ZoomTransform::IDENTITY, None);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_keystroke_badge_follows_display_window() {
        let mut config = plain_config(0, 0);
        config.keystrokes.enabled = true;
        config.keystrokes.display_secs = 1.5;
        let events = EventLogs::new(vec![], vec![KeystrokeEvent::down(SEC, "K")], vec![]);
        let mut c = with_events(config, &events, 320, 240);
        let frame = RgbaFrame::filled(320, 240, [255, 255, 255, 255]);

        assert_eq!(render(&mut c, &frame, SEC / 2, ZoomTransform::IDENTITY), frame);

        let shown = darkened(&render(&mut c, &frame, SEC + SEC / 5, ZoomTransform::IDENTITY));
        assert!(!shown.is_empty());
        assert!(shown.iter().all(|&(_, y)| y >= 120), "badge should sit in the lower half");

        assert_eq!(render(&mut c, &frame, 3 * SEC, ZoomTransform::IDENTITY), frame);
    }

    #[test]
    fn test_caption_shown_only_inside_segment() {
        let mut config = plain_config(0, 0);
        config.captions.enabled = true;
        let events = EventLogs::new(vec![], vec![], vec![CaptionSegment::new(SEC, 2 * SEC, "Hello there")]);
        let mut c = with_events(config, &events, 320, 240);
        let frame = RgbaFrame::filled(320, 240, [255, 255, 255, 255]);

        assert_eq!(render(&mut c, &frame, SEC - 1, ZoomTransform::IDENTITY), frame);
        for t in [SEC, SEC + SEC / 2] {
            let shown = darkened(&render(&mut c, &frame, t, ZoomTransform::IDENTITY));
            assert!(!shown.is_empty(), "caption missing at {t}");
            assert!(shown.iter().all(|&(_, y)| y >= 120));
        }
        assert_eq!(render(&mut c, &frame, 2 * SEC, ZoomTransform::IDENTITY), frame);
    }

    #[test]
    fn test_wrong_output_size_is_rejected() {
        let frame = RgbaFrame::filled(64, 64, [0, 0, 0, 255]);
        let mut c = compositor(plain_config(0, 0), 64, 64);
        let mut out = RgbaFrame::new(10, 10);
        let err = c
            .compose(
                &FrameInputs {
                    frame: &frame,
                    time_ns: 0,
                    zoom: ZoomTransform::IDENTITY,
                    webcam: None,
                },
                &mut out,
            )
            .unwrap_err();
        assert!(matches!(err, SheenError::InvalidJob { .. }));
    }
}
