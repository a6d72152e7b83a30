//! Operator commands accepted by the console.
//!
//! One command per line; the first word selects the command and the rest are
//! its arguments.  Parsing validates argument shape and key/button names
//! only; whether a command can run (driver loaded, worker idle) is decided
//! by the console.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lykeys_core::keymap::MouseButton;
use lykeys_core::KeyCatalog;
use thiserror::Error;

/// Distance kept from the screen edge by corner moves.
pub const EDGE_OFFSET: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    /// Absolute target on a `width` x `height` screen.
    pub fn target(self, (width, height): (i32, i32)) -> (i32, i32) {
        let left = EDGE_OFFSET;
        let top = EDGE_OFFSET;
        let right = width - EDGE_OFFSET;
        let bottom = height - EDGE_OFFSET;
        match self {
            Corner::TopLeft => (left, top),
            Corner::TopRight => (right, top),
            Corner::BottomLeft => (left, bottom),
            Corner::BottomRight => (right, bottom),
        }
    }
}

impl FromStr for Corner {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tl" | "top-left" => Ok(Corner::TopLeft),
            "tr" | "top-right" => Ok(Corner::TopRight),
            "bl" | "bottom-left" => Ok(Corner::BottomLeft),
            "br" | "bottom-right" => Ok(Corner::BottomRight),
            _ => Err(CommandError::InvalidValue {
                what: "corner",
                value: s.to_string(),
            }),
        }
    }
}

/// Scripted demonstration routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Demo {
    /// Presses w, a, s, d, enter.
    Keys,
    /// Types a fixed sentence.
    Text,
    /// Visits the four screen corners.
    Mouse,
}

/// Overrides for the cyclic press test.  Absent fields keep their
/// configured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RapidArgs {
    pub key: String,
    pub press_ms: u64,
    pub interval_ms: u64,
    pub duration_s: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load,
    Unload,
    Paths { dll: PathBuf, sys: PathBuf },
    Status,
    Press { key: String, hold: Option<Duration> },
    Type(String),
    Click(MouseButton),
    Wheel(i32),
    Rapid(Option<RapidArgs>),
    GlideRelative { dx: i32, dy: i32 },
    GlideAbsolute { x: i32, y: i32 },
    Corner(Corner),
    Hook,
    Stop,
    Save,
    Demo(Demo),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}; type `help`")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid {what}: {value:?}")]
    InvalidValue { what: &'static str, value: String },
}

/// One line per command, shown by `help`.
pub const HELP: &str = "\
load | unload                      load or unload the driver
paths <dll> <sys>                  set the driver library and image paths
status                             driver status and last check time
press <key> [hold_ms]              press one key (shift-aware)
type <text>                        type a string
click <left|right|middle|x1|x2>    click a mouse button
wheel <delta>                      scroll; positive is up
rapid [key press_ms interval_ms duration_s]
                                   start or stop the rapid press test
glide rel <dx> <dy>                smooth relative move
glide abs <x> <y>                  smooth move to a position
corner <tl|tr|bl|br>               jump to a screen corner
hook                               start or stop the hotkey listener
stop                               cancel running sequences
save                               save settings
demo <keys|text|mouse>             run a demo after a 3 s lead-in
quit                               unload and exit";

fn number<T: FromStr>(what: &'static str, value: &str) -> Result<T, CommandError> {
    value.parse().map_err(|_| CommandError::InvalidValue {
        what,
        value: value.to_string(),
    })
}

fn key_name(name: &str) -> Result<String, CommandError> {
    if KeyCatalog::resolve_stroke(name).is_some() {
        Ok(name.to_string())
    } else {
        Err(CommandError::InvalidValue {
            what: "key",
            value: name.to_string(),
        })
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "load" => Ok(Command::Load),
            "unload" => Ok(Command::Unload),
            "status" => Ok(Command::Status),
            "hook" => Ok(Command::Hook),
            "stop" => Ok(Command::Stop),
            "save" => Ok(Command::Save),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "paths" => match args.as_slice() {
                [dll, sys] => Ok(Command::Paths {
                    dll: PathBuf::from(dll),
                    sys: PathBuf::from(sys),
                }),
                _ => Err(CommandError::Usage("paths <dll> <sys>")),
            },
            "press" => match args.as_slice() {
                [key] => Ok(Command::Press {
                    key: key_name(key)?,
                    hold: None,
                }),
                [key, hold] => Ok(Command::Press {
                    key: key_name(key)?,
                    hold: Some(Duration::from_millis(number("hold", hold)?)),
                }),
                _ => Err(CommandError::Usage("press <key> [hold_ms]")),
            },
            // Text is taken verbatim so it may contain spaces.
            "type" if !rest.is_empty() => Ok(Command::Type(rest.to_string())),
            "type" => Err(CommandError::Usage("type <text>")),
            "click" => match args.as_slice() {
                [button] => MouseButton::parse(button).map(Command::Click).ok_or_else(|| {
                    CommandError::InvalidValue {
                        what: "button",
                        value: button.to_string(),
                    }
                }),
                _ => Err(CommandError::Usage("click <left|right|middle|x1|x2>")),
            },
            "wheel" => match args.as_slice() {
                [delta] => match number::<i32>("wheel delta", delta)? {
                    0 => Err(CommandError::InvalidValue {
                        what: "wheel delta",
                        value: delta.to_string(),
                    }),
                    delta => Ok(Command::Wheel(delta)),
                },
                _ => Err(CommandError::Usage("wheel <delta>")),
            },
            "rapid" => match args.as_slice() {
                [] => Ok(Command::Rapid(None)),
                [key, press, interval, duration] => Ok(Command::Rapid(Some(RapidArgs {
                    key: key_name(key)?,
                    press_ms: number("press time", press)?,
                    interval_ms: number("interval", interval)?,
                    duration_s: number("duration", duration)?,
                }))),
                _ => Err(CommandError::Usage("rapid [key press_ms interval_ms duration_s]")),
            },
            "glide" => match args.as_slice() {
                ["rel", dx, dy] => Ok(Command::GlideRelative {
                    dx: number("dx", dx)?,
                    dy: number("dy", dy)?,
                }),
                ["abs", x, y] => Ok(Command::GlideAbsolute {
                    x: number("x", x)?,
                    y: number("y", y)?,
                }),
                _ => Err(CommandError::Usage("glide rel <dx> <dy> | glide abs <x> <y>")),
            },
            "corner" => match args.as_slice() {
                [corner] => corner.parse().map(Command::Corner),
                _ => Err(CommandError::Usage("corner <tl|tr|bl|br>")),
            },
            "demo" => match args.as_slice() {
                ["keys"] => Ok(Command::Demo(Demo::Keys)),
                ["text"] => Ok(Command::Demo(Demo::Text)),
                ["mouse"] => Ok(Command::Demo(Demo::Mouse)),
                _ => Err(CommandError::Usage("demo <keys|text|mouse>")),
            },
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for Demo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Demo::Keys => f.write_str("keys"),
            Demo::Text => f.write_str("text"),
            Demo::Mouse => f.write_str("mouse"),
        }
    }
}
