//! Console colors
//!
//! Render code asks for a style by what it shows (a running instance, a key
//! hint, the list cursor) and never names a color itself.

use std::sync::OnceLock;

use ratatui::style::{Color, Modifier, Style};

use notebook_core::model::InstanceStatus;
use notebook_core::notify::Level;
use notebook_core::state::EventLevel;

#[derive(Clone, Debug)]
pub struct Palette {
    pub frame: Color,
    pub text: Color,
    /// Field labels and secondary columns
    pub label: Color,
    /// Stopped instances, empty panels, backend name
    pub idle: Color,
    /// Focused panel, headings, tag keys
    pub focus: Color,
    pub running: Color,
    /// Starting/stopping instances, loading toasts, warnings
    pub busy: Color,
    pub failed: Color,
    pub notice: Color,
    pub cursor_bg: Color,
    pub cursor_fg: Color,
    pub key: Color,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            frame: Color::Rgb(58, 62, 70),
            text: Color::Rgb(214, 214, 210),
            label: Color::Rgb(146, 150, 158),
            idle: Color::Rgb(98, 102, 110),
            focus: Color::Rgb(97, 175, 239),
            running: Color::Rgb(120, 200, 140),
            busy: Color::Rgb(229, 192, 123),
            failed: Color::Rgb(224, 108, 117),
            notice: Color::Rgb(150, 205, 235),
            cursor_bg: Color::Rgb(44, 62, 92),
            cursor_fg: Color::White,
            key: Color::Rgb(198, 160, 246),
        }
    }
}

static PALETTE: OnceLock<Palette> = OnceLock::new();

pub fn palette() -> &'static Palette {
    PALETTE.get_or_init(Palette::dark)
}

pub mod styles {
    use super::*;

    fn fg(color: Color) -> Style {
        Style::default().fg(color)
    }

    pub fn status(status: InstanceStatus) -> Style {
        let p = palette();
        fg(match status {
            InstanceStatus::Running => p.running,
            InstanceStatus::Failed => p.failed,
            s if s.is_transient() => p.busy,
            _ => p.idle,
        })
    }

    pub fn status_icon(status: InstanceStatus) -> &'static str {
        match status {
            InstanceStatus::Running => "●",
            InstanceStatus::Starting => "◐",
            InstanceStatus::Stopping => "◑",
            InstanceStatus::Stopped => "○",
            InstanceStatus::Failed => "✗",
        }
    }

    pub fn toast(level: Level) -> Style {
        let p = palette();
        fg(match level {
            Level::Info => p.notice,
            Level::Loading => p.busy,
            Level::Success => p.running,
            Level::Error => p.failed,
        })
    }

    pub fn toast_icon(level: Level) -> &'static str {
        match level {
            Level::Info => "i",
            Level::Loading => "…",
            Level::Success => "✓",
            Level::Error => "✗",
        }
    }

    /// Entries on the events tab
    pub fn event(level: EventLevel) -> Style {
        let p = palette();
        fg(match level {
            EventLevel::Info => p.label,
            EventLevel::Warning => p.busy,
            EventLevel::Error => p.failed,
        })
    }

    pub fn tab(active: bool) -> Style {
        if active {
            heading()
        } else {
            label()
        }
    }

    pub fn key_hint() -> Style {
        fg(palette().key)
    }

    pub fn frame() -> Style {
        fg(palette().frame)
    }

    pub fn frame_focused() -> Style {
        fg(palette().focus)
    }

    pub fn cursor() -> Style {
        let p = palette();
        Style::default()
            .bg(p.cursor_bg)
            .fg(p.cursor_fg)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        fg(palette().text)
    }

    pub fn label() -> Style {
        fg(palette().label)
    }

    pub fn idle() -> Style {
        fg(palette().idle)
    }

    pub fn highlight() -> Style {
        fg(palette().focus)
    }

    pub fn heading() -> Style {
        highlight().add_modifier(Modifier::BOLD)
    }

    pub fn running() -> Style {
        fg(palette().running)
    }

    pub fn busy() -> Style {
        fg(palette().busy)
    }

    pub fn failed() -> Style {
        fg(palette().failed)
    }
}
