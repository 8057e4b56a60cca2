//! Keystroke badges: which key presses are on screen at a given time.
//!
//! A bare modifier press (Cmd, Shift, ...) is never shown on its own. It is
//! held and folded into the label of the next real key, so pressing Cmd then
//! K renders a single "Cmd+K" badge.

use sheen_project_model::event::{KeystrokeEvent, Modifier, TimestampNs};

/// Seconds at the end of the display window over which a badge fades out.
pub const FADE_SECS: f64 = 0.3;

/// Most badges shown at once; older ones drop off the left.
pub const MAX_BADGES: usize = 6;

/// A folded key press ready for display.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    pub timestamp_ns: TimestampNs,
    pub label: String,
}

/// A badge visible at a particular instant.
#[derive(Debug, Clone, PartialEq)]
pub struct KeystrokeBadge {
    pub label: String,
    /// Opacity in `[0, 1]`.
    pub opacity: f64,
}

/// Fold modifier-only presses into the following key.
///
/// `events` must be sorted by time. Releases are ignored. A held modifier
/// expires when no key follows within `hold_secs`.
pub fn fold_key_presses(events: &[KeystrokeEvent], hold_secs: f64) -> Vec<KeyPress> {
    let hold_ns = (hold_secs.max(0.0) * 1_000_000_000.0) as u64;
    let mut pending: Vec<(Modifier, TimestampNs)> = Vec::new();
    let mut presses = Vec::new();

    for event in events.iter().filter(|e| e.is_down()) {
        pending.retain(|&(_, t)| event.timestamp_ns.saturating_sub(t) <= hold_ns);

        if let Some(modifier) = Modifier::from_key_name(&event.key) {
            pending.retain(|&(m, _)| m != modifier);
            pending.push((modifier, event.timestamp_ns));
            continue;
        }

        let mut modifiers: Vec<Modifier> = pending
            .drain(..)
            .map(|(m, _)| m)
            .chain(event.modifiers.iter().copied())
            .collect();
        modifiers.sort();
        modifiers.dedup();

        let mut label: String = modifiers
            .iter()
            .map(|m| format!("{}+", m.label()))
            .collect();
        label.push_str(&event.key);

        presses.push(KeyPress {
            timestamp_ns: event.timestamp_ns,
            label,
        });
    }

    presses
}

/// Badges visible at `t_ns`, oldest first.
///
/// `presses` must come from [`fold_key_presses`]. A press is visible while
/// its age is within `[0, display_secs)`.
pub fn visible_badges(presses: &[KeyPress], t_ns: TimestampNs, display_secs: f64) -> Vec<KeystrokeBadge> {
    if display_secs <= 0.0 {
        return Vec::new();
    }
    let window_ns = (display_secs * 1_000_000_000.0) as u64;
    let end = presses.partition_point(|p| p.timestamp_ns <= t_ns);
    let start = presses[..end].partition_point(|p| t_ns - p.timestamp_ns >= window_ns);
    let visible = &presses[start..end];
    let skip = visible.len().saturating_sub(MAX_BADGES);

    visible[skip..]
        .iter()
        .map(|p| {
            let age = (t_ns - p.timestamp_ns) as f64 / 1_000_000_000.0;
            let remaining = display_secs - age;
            let fade = FADE_SECS.min(display_secs);
            KeystrokeBadge {
                label: p.label.clone(),
                opacity: (remaining / fade).clamp(0.0, 1.0),
            }
        })
        .collect()
}
