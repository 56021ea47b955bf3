//! Colors and text styles for the dashboard.

use ratatui::prelude::*;

const TEXT_COLOR: Color = Color::Rgb(216, 222, 233);

const HEADER_BG: Color = Color::Rgb(46, 52, 64);
const HEADER_FG: Color = Color::Rgb(136, 192, 208);
const ACCENT: Color = Color::Rgb(129, 161, 193);
const BORDER: Color = Color::Rgb(76, 86, 106);
const MUTED: Color = Color::Rgb(118, 128, 148);

const OK: Color = Color::Rgb(163, 190, 140);
const WARN: Color = Color::Rgb(235, 203, 139);
const BAD: Color = Color::Rgb(191, 97, 106);

/// Latency thresholds, in milliseconds, for the green/yellow/red styles.
const FAST_MS: f64 = 200.0;
const SLOW_MS: f64 = 500.0;

fn bold(fg: Color) -> Style {
    Style::default().fg(fg).add_modifier(Modifier::BOLD)
}

pub fn header_style() -> Style {
    bold(HEADER_FG).bg(HEADER_BG)
}

pub fn title_style() -> Style {
    bold(TEXT_COLOR)
}

pub fn table_header_style() -> Style {
    bold(ACCENT)
}

pub fn selected_row_style() -> Style {
    bold(Color::Black).bg(ACCENT)
}

pub fn border_style() -> Style {
    Style::default().fg(BORDER)
}

pub fn text_style() -> Style {
    Style::default().fg(TEXT_COLOR)
}

pub fn success_style() -> Style {
    bold(OK)
}

pub fn error_style() -> Style {
    bold(BAD)
}

pub fn highlight_style() -> Style {
    bold(WARN)
}

pub fn muted_style() -> Style {
    Style::default().fg(MUTED)
}

/// Green under 200ms, yellow under 500ms, red above.
pub fn latency_style(ms: f64) -> Style {
    if ms < FAST_MS {
        success_style()
    } else if ms < SLOW_MS {
        highlight_style()
    } else {
        error_style()
    }
}
