//! Gesture commands and their outcomes.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A single-finger stroke: a press at `start` moved to `end` over `duration`.
///
/// A stroke whose start and end coincide is a stationary press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stroke {
    pub start: (i32, i32),
    pub end: (i32, i32),
    pub duration: Duration,
}

impl Stroke {
    pub fn is_point(&self) -> bool {
        self.start == self.end
    }
}

/// What a gesture is meant to do, used in logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    Click,
    LongClick,
    Scroll,
    Swipe,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::Click => "click",
            GestureKind::LongClick => "long click",
            GestureKind::Scroll => "scroll",
            GestureKind::Swipe => "swipe",
        }
    }
}

impl fmt::Display for GestureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A gesture that every injection tier knows how to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureCommand {
    pub kind: GestureKind,
    pub stroke: Stroke,
}

impl GestureCommand {
    pub fn tap(at: (i32, i32), duration: Duration) -> Self {
        Self {
            kind: GestureKind::Click,
            stroke: Stroke {
                start: at,
                end: at,
                duration,
            },
        }
    }

    pub fn long_press(at: (i32, i32), duration: Duration) -> Self {
        Self {
            kind: GestureKind::LongClick,
            stroke: Stroke {
                start: at,
                end: at,
                duration,
            },
        }
    }

    pub fn scroll(from: (i32, i32), to: (i32, i32), duration: Duration) -> Self {
        Self {
            kind: GestureKind::Scroll,
            stroke: Stroke {
                start: from,
                end: to,
                duration,
            },
        }
    }

    pub fn swipe(from: (i32, i32), to: (i32, i32), duration: Duration) -> Self {
        Self {
            kind: GestureKind::Swipe,
            stroke: Stroke {
                start: from,
                end: to,
                duration,
            },
        }
    }

    /// Arguments for the `input` shell tool.
    ///
    /// Clicks become `tap x y`; every other gesture, including a long press,
    /// becomes `swipe x1 y1 x2 y2 ms`.
    pub fn shell_args(&self) -> Vec<String> {
        let Stroke {
            start: (x1, y1),
            end: (x2, y2),
            duration,
        } = self.stroke;

        match self.kind {
            GestureKind::Click => vec!["tap".into(), x1.to_string(), y1.to_string()],
            _ => vec![
                "swipe".into(),
                x1.to_string(),
                y1.to_string(),
                x2.to_string(),
                y2.to_string(),
                duration.as_millis().to_string(),
            ],
        }
    }

    /// The full shell command line, e.g. `input tap 960 540`.
    pub fn shell_command(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in self.shell_args() {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

/// Final result of an asynchronously dispatched gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureOutcome {
    Completed,
    Cancelled,
}

/// Button codes accepted by `/mouse/click`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    /// Mapped to the "navigate back" action.
    Right,
    Middle,
}

impl MouseButton {
    /// `1` is right, `2` is middle, anything else is left.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => MouseButton::Right,
            2 => MouseButton::Middle,
            _ => MouseButton::Left,
        }
    }
}

/// Direction of a `/mouse/swipe` gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    /// Unit vector of this direction in screen coordinates.
    pub fn unit(&self) -> (i64, i64) {
        match self {
            SwipeDirection::Up => (0, -1),
            SwipeDirection::Down => (0, 1),
            SwipeDirection::Left => (-1, 0),
            SwipeDirection::Right => (1, 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown swipe direction: {0}")]
pub struct ParseDirectionError(String);

impl FromStr for SwipeDirection {
    type Err = ParseDirectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(SwipeDirection::Up),
            "down" => Ok(SwipeDirection::Down),
            "left" => Ok(SwipeDirection::Left),
            "right" => Ok(SwipeDirection::Right),
            _ => Err(ParseDirectionError(s.to_string())),
        }
    }
}
