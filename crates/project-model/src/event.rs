//! Recorded metadata logs: cursor, keystroke, and caption events.
//!
//! Logs are stored as append-only JSONL (one JSON object per line) and
//! share a zero-based nanosecond time base with the screen video. Cursor
//! coordinates are in capture pixels with the origin at the bottom-left
//! corner of the captured region.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Monotonic timestamp in nanoseconds since recording start.
pub type TimestampNs = u64;

/// Anything that sits on the recording timeline.
pub trait Timestamped {
    fn timestamp_ns(&self) -> TimestampNs;

    /// Timestamp as fractional seconds since recording start.
    fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns() as f64 / 1_000_000_000.0
    }
}

/// What happened at a cursor sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorEventKind {
    #[default]
    Move,
    LeftDown,
    LeftUp,
    RightDown,
    RightUp,
    OtherDown,
    OtherUp,
}

impl CursorEventKind {
    /// Primary or secondary button press. These drive click zoom and ripples.
    pub fn is_click(self) -> bool {
        matches!(self, Self::LeftDown | Self::RightDown)
    }

    /// Any button press, including auxiliary buttons.
    pub fn is_press(self) -> bool {
        matches!(self, Self::LeftDown | Self::RightDown | Self::OtherDown)
    }
}

/// A single cursor sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorEvent {
    /// Monotonic nanoseconds since recording start.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Capture-space X in pixels.
    pub x: f64,

    /// Capture-space Y in pixels, origin bottom-left.
    pub y: f64,

    #[serde(default)]
    pub kind: CursorEventKind,
}

impl CursorEvent {
    /// Create a move sample.
    pub fn moved(timestamp_ns: TimestampNs, x: f64, y: f64) -> Self {
        Self {
            timestamp_ns,
            x,
            y,
            kind: CursorEventKind::Move,
        }
    }

    /// Create a sample with an explicit kind.
    pub fn new(timestamp_ns: TimestampNs, x: f64, y: f64, kind: CursorEventKind) -> Self {
        Self {
            timestamp_ns,
            x,
            y,
            kind,
        }
    }
}

impl Timestamped for CursorEvent {
    fn timestamp_ns(&self) -> TimestampNs {
        self.timestamp_ns
    }
}

/// Button/key state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonState {
    Down,
    Up,
}

/// Keyboard modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Ctrl,
    Alt,
    Shift,
    Cmd,
    Fn,
}

impl Modifier {
    /// Parse a key name that denotes a bare modifier press.
    pub fn from_key_name(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "ctrl" | "control" | "controlleft" | "controlright" => Some(Self::Ctrl),
            "alt" | "option" | "altleft" | "altright" => Some(Self::Alt),
            "shift" | "shiftleft" | "shiftright" => Some(Self::Shift),
            "cmd" | "command" | "meta" | "super" | "metaleft" | "metaright" => Some(Self::Cmd),
            "fn" | "function" => Some(Self::Fn),
            _ => None,
        }
    }

    /// Short display label used in keystroke badges.
    pub fn label(self) -> &'static str {
        match self {
            Self::Ctrl => "Ctrl",
            Self::Alt => "Alt",
            Self::Shift => "Shift",
            Self::Cmd => "Cmd",
            Self::Fn => "Fn",
        }
    }
}

/// A single keyboard event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeystrokeEvent {
    /// Monotonic nanoseconds since recording start.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Display label of the key (e.g., "K", "Enter", "Shift").
    pub key: String,

    /// Modifiers held while the key was pressed.
    #[serde(default)]
    pub modifiers: Vec<Modifier>,

    /// Press or release.
    pub state: ButtonState,
}

impl KeystrokeEvent {
    /// Create a key-down event.
    pub fn down(timestamp_ns: TimestampNs, key: impl Into<String>) -> Self {
        Self {
            timestamp_ns,
            key: key.into(),
            modifiers: Vec::new(),
            state: ButtonState::Down,
        }
    }

    /// Attach held modifiers.
    pub fn with_modifiers(mut self, modifiers: impl IntoIterator<Item = Modifier>) -> Self {
        self.modifiers = modifiers.into_iter().collect();
        self
    }

    /// True when the key itself is a modifier with nothing else attached.
    pub fn is_modifier_only(&self) -> bool {
        Modifier::from_key_name(&self.key).is_some()
    }

    pub fn is_down(&self) -> bool {
        self.state == ButtonState::Down
    }
}

impl Timestamped for KeystrokeEvent {
    fn timestamp_ns(&self) -> TimestampNs {
        self.timestamp_ns
    }
}

/// A transcript segment shown as a caption while `start <= t < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionSegment {
    #[serde(rename = "start")]
    pub start_ns: TimestampNs,
    #[serde(rename = "end")]
    pub end_ns: TimestampNs,
    pub text: String,
}

impl CaptionSegment {
    pub fn new(start_ns: TimestampNs, end_ns: TimestampNs, text: impl Into<String>) -> Self {
        Self {
            start_ns,
            end_ns,
            text: text.into(),
        }
    }

    /// Half-open containment check.
    pub fn is_active_at(&self, t_ns: TimestampNs) -> bool {
        self.start_ns <= t_ns && t_ns < self.end_ns
    }
}

impl Timestamped for CaptionSegment {
    fn timestamp_ns(&self) -> TimestampNs {
        self.start_ns
    }
}

/// The three overlay logs of a recording, sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLogs {
    pub cursor: Vec<CursorEvent>,
    pub keystrokes: Vec<KeystrokeEvent>,
    pub captions: Vec<CaptionSegment>,
}

impl EventLogs {
    /// Build logs, sorting each one stably by timestamp.
    pub fn new(
        cursor: Vec<CursorEvent>,
        keystrokes: Vec<KeystrokeEvent>,
        captions: Vec<CaptionSegment>,
    ) -> Self {
        Self {
            cursor: sorted_by_time(cursor),
            keystrokes: sorted_by_time(keystrokes),
            captions: sorted_by_time(captions),
        }
    }

    /// Click-down events (primary or secondary) in time order.
    pub fn clicks(&self) -> impl Iterator<Item = &CursorEvent> {
        self.cursor.iter().filter(|e| e.kind.is_click())
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty() && self.keystrokes.is_empty() && self.captions.is_empty()
    }
}

/// Stable sort by timestamp. Capture writes logs in order, but merged or
/// hand-edited logs may not be.
pub fn sorted_by_time<T: Timestamped>(mut events: Vec<T>) -> Vec<T> {
    events.sort_by_key(Timestamped::timestamp_ns);
    events
}

/// Parse records from JSONL content (one JSON object per line).
///
/// Blank lines and `#` comment lines are skipped.
pub fn parse_jsonl<T: DeserializeOwned>(jsonl: &str) -> Result<Vec<T>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize records to JSONL format.
pub fn serialize_jsonl<T: Serialize>(records: &[T]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for record in records {
        output.push_str(&serde_json::to_string(record)?);
        output.push('\n');
    }
    Ok(output)
}
