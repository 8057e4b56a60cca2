use sheen_processing_core::zoom::{ZoomTransform, ZoomTransformer};
use sheen_project_model::effects::{ZoomConfig, ZoomStyle};
use sheen_project_model::event::{parse_jsonl, CursorEvent};

const W: f64 = 1920.0;
const H: f64 = 1080.0;
const MS: u64 = 1_000_000;

fn events() -> Vec<CursorEvent> {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/clicks.jsonl");
    let text = std::fs::read_to_string(path).expect("fixture should be readable");
    parse_jsonl(&text).expect("fixture should parse")
}

fn config(style: ZoomStyle) -> ZoomConfig {
    ZoomConfig {
        enabled: true,
        max_scale: 2.0,
        style,
    }
}

fn at(ms: u64, style: ZoomStyle) -> ZoomTransform {
    ZoomTransformer::transform_at(ms * MS, &events(), &config(style), W, H)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn fixture_parses_all_samples() {
    let events = events();
    assert_eq!(events.len(), 7);
    assert!(events.windows(2).all(|w| w[0].timestamp_ns <= w[1].timestamp_ns));
}

#[test]
fn nothing_happens_before_the_first_click() {
    assert_eq!(at(900, ZoomStyle::Quick), ZoomTransform::IDENTITY);
}

#[test]
fn hold_keeps_clicked_point_fixed_on_screen() {
    let z = at(2_000, ZoomStyle::Quick);
    assert!(z.active);
    assert!(close(z.scale, 2.0));
    assert!(close(z.offset_x, 480.0));
    assert!(close(z.offset_y, 270.0));

    // (480, 810) in y-up capture space is (480, 270) in render space.
    let (x, y) = z.apply(480.0, 270.0, W, H);
    assert!(close(x, 480.0));
    assert!(close(y, 270.0));
}

#[test]
fn zoom_in_midpoint_is_half_way() {
    let z = at(1_200, ZoomStyle::Quick);
    assert!(close(z.scale, 1.5));
}

#[test]
fn window_closes_after_zoom_out() {
    let z = at(3_300, ZoomStyle::Quick);
    assert!(!z.active);
    assert!(z.is_identity());
}

#[test]
fn corner_click_still_covers_viewport() {
    let z = at(6_000, ZoomStyle::Quick);
    assert!(close(z.scale, 2.0));
    assert!(close(z.offset_x, -960.0));
    assert!(close(z.offset_y, -540.0));
    let (x, y) = z.apply(W, H, W, H);
    assert!(close(x, W));
    assert!(close(y, H));
    let (x0, y0) = z.apply(0.0, 0.0, W, H);
    assert!(x0 <= 0.0 && y0 <= 0.0);
}

#[test]
fn auxiliary_button_does_not_retarget_zoom() {
    let z = at(5_300, ZoomStyle::Quick);
    assert!(z.active);
    assert!(z.scale > 1.0);
    assert!(close(z.offset_x / (z.scale - 1.0), -960.0));
}

#[test]
fn slower_styles_zoom_in_more_gradually() {
    let quick = at(1_200, ZoomStyle::Quick).scale;
    let mellow = at(1_200, ZoomStyle::Mellow).scale;
    let slow = at(1_200, ZoomStyle::Slow).scale;
    assert!(slow < mellow && mellow < quick);
}
