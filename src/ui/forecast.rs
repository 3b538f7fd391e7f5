//! Forecast screen rendering
//!
//! Renders the five-day outlook as a row of day cards, the expanded view of
//! the selected day with farming advice, and a footer with data freshness.

use chrono::{Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::widgets::PrecipitationBar;
use crate::app::{App, StatusKind};
use crate::data::{farming_advice, AdviceKind, DailyWeatherRecord, FieldWorkOutlook};
use crate::service::Tier;

/// Provider icon code to glyph mapping, keyed on the two-digit prefix
fn weather_icon(icon_code: &str) -> &'static str {
    match icon_code.get(..2) {
        Some("01") => "\u{2600}",        // ☀
        Some("02") => "\u{26C5}",        // ⛅
        Some("03" | "04") => "\u{2601}", // ☁
        Some("09") => "\u{1F327}",       // 🌧
        Some("10") => "\u{1F326}",       // 🌦
        Some("11") => "\u{26C8}",        // ⛈
        Some("13") => "\u{2744}",        // ❄
        Some("50") => "\u{1F32B}",       // 🌫
        _ => "?",
    }
}

/// Color for a Fahrenheit temperature (warmer = more red, cooler = more blue)
fn temperature_color(temp: i32) -> Color {
    if temp >= 90 {
        Color::Red
    } else if temp >= 80 {
        Color::LightRed
    } else if temp >= 70 {
        Color::Yellow
    } else if temp >= 55 {
        Color::Green
    } else if temp >= 40 {
        Color::Cyan
    } else {
        Color::Blue
    }
}

fn tier_color(tier: Tier) -> Color {
    match tier {
        Tier::FreshCache | Tier::Remote => Color::Green,
        Tier::StaleCache => Color::Yellow,
        Tier::Persistence => Color::Magenta,
        Tier::Default => Color::Gray,
    }
}

fn outlook_color(outlook: FieldWorkOutlook) -> Color {
    match outlook {
        FieldWorkOutlook::IndoorWork => Color::Blue,
        FieldWorkOutlook::HighHeat => Color::Red,
        FieldWorkOutlook::FrostRisk => Color::Cyan,
        FieldWorkOutlook::GoodForFieldWork => Color::Green,
    }
}

fn advice_style(kind: AdviceKind) -> (&'static str, Style) {
    match kind {
        AdviceKind::Warning => ("!", Style::default().fg(Color::Yellow)),
        AdviceKind::Danger => ("▲", Style::default().fg(Color::Red)),
        AdviceKind::Info => ("i", Style::default().fg(Color::Cyan)),
        AdviceKind::Success => ("✓", Style::default().fg(Color::Green)),
    }
}

/// "Today" for the current date, otherwise the short weekday
fn day_name(record: &DailyWeatherRecord) -> String {
    if record.date == Local::now().date_naive() {
        "Today".to_string()
    } else {
        record.date.format("%a").to_string()
    }
}

/// Human-readable age of the last provider fetch
fn freshness_text(app: &App) -> String {
    let Some(last_update) = app.last_update else {
        return "Data: not yet fetched".to_string();
    };
    let elapsed = Utc::now() - last_update;
    let mins_ago = elapsed.num_minutes();
    let age = if mins_ago < 1 {
        "just now".to_string()
    } else if mins_ago < 60 {
        format!("{}m ago", mins_ago)
    } else {
        format!("{}h ago", elapsed.num_hours())
    };
    if app.is_data_fresh() {
        format!("Data: {}", age)
    } else {
        format!("Data: {} (stale)", age)
    }
}

/// Renders the forecast screen
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Header
            Constraint::Length(8), // Day cards
            Constraint::Min(4),    // Selected day
            Constraint::Length(1), // Footer
        ])
        .split(area);

    render_header(frame, app, chunks[0]);
    render_day_cards(frame, app, chunks[1]);
    render_day_detail(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let time_str = Local::now().format("%a %b %d, %H:%M").to_string();

    let mut spans = vec![
        Span::styled(
            "FARMCAST",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(time_str, Style::default().fg(Color::White)),
    ];

    if let Some(tier) = app.tier {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{}]", tier.label()),
            Style::default().fg(tier_color(tier)),
        ));
    }
    if app.refreshing {
        spans.push(Span::styled(
            "  refreshing…",
            Style::default().fg(Color::DarkGray),
        ));
    }

    let separator = "─".repeat((area.width as usize).saturating_sub(2));
    let lines = vec![
        Line::from(spans),
        Line::from(Span::styled(separator, Style::default().fg(Color::DarkGray))),
    ];

    frame.render_widget(Paragraph::new(lines), area);
}

fn render_day_cards(frame: &mut Frame, app: &App, area: Rect) {
    if app.forecast.is_empty() {
        return;
    }

    let constraints = vec![Constraint::Ratio(1, app.forecast.len() as u32); app.forecast.len()];
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (i, (record, column)) in app.forecast.iter().zip(columns.iter()).enumerate() {
        render_day_card(frame, record, i == app.selected_day, *column);
    }
}

fn render_day_card(frame: &mut Frame, record: &DailyWeatherRecord, selected: bool, area: Rect) {
    let border_style = if selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .title(format!(" {} ", day_name(record)))
        .borders(Borders::ALL)
        .border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let outlook = FieldWorkOutlook::for_day(record);
    let lines = vec![
        Line::from(Span::styled(
            record.date.format("%b %d").to_string(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(format!("{} {}", weather_icon(&record.icon_code), record.conditions_label)),
        Line::from(vec![
            Span::styled(
                format!("{}°", record.temp_high),
                Style::default().fg(temperature_color(record.temp_high)),
            ),
            Span::raw(" / "),
            Span::styled(
                format!("{}°", record.temp_low),
                Style::default().fg(temperature_color(record.temp_low)),
            ),
        ]),
        Line::from(format!("{}% rain", record.precipitation_chance)),
        Line::from(Span::styled(
            outlook.label(),
            Style::default().fg(outlook_color(outlook)),
        )),
    ];
    frame.render_widget(Paragraph::new(lines), inner);

    // Bar on the last inner row
    if inner.height > 5 {
        let bar_area = Rect::new(inner.x, inner.y + inner.height - 1, inner.width, 1);
        frame.render_widget(PrecipitationBar::new(record.precipitation_chance), bar_area);
    }
}

fn render_day_detail(frame: &mut Frame, app: &App, area: Rect) {
    let Some(record) = app.selected_record() else {
        return;
    };

    let outlook = FieldWorkOutlook::for_day(record);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                record.date.format("%A, %B %d").to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                outlook.label(),
                Style::default()
                    .fg(outlook_color(outlook))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(format!(
            "{} {}  High {}°F  Low {}°F  Precipitation {}%",
            weather_icon(&record.icon_code),
            record.conditions_label,
            record.temp_high,
            record.temp_low,
            record.precipitation_chance
        )),
    ];

    let mut extras = Vec::new();
    if let Some(humidity) = record.humidity {
        extras.push(format!("Humidity {}%", humidity));
    }
    if let Some(wind_speed) = record.wind_speed {
        extras.push(format!("Wind {:.0} mph", wind_speed));
    }
    if !extras.is_empty() {
        lines.push(Line::from(Span::styled(
            extras.join("  "),
            Style::default().fg(Color::Gray),
        )));
    }

    let advice = farming_advice(record);
    if !advice.is_empty() {
        lines.push(Line::from(""));
        for item in advice {
            let (marker, style) = advice_style(item.kind);
            lines.push(Line::from(vec![
                Span::styled(format!(" {} ", marker), style),
                Span::raw(item.message),
            ]));
        }
    }

    if !record.is_real_time {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Estimated outlook - live data unavailable",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .title(" Farming Outlook ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("←/→", Style::default().fg(Color::Yellow)),
        Span::raw(" Day  "),
        Span::styled("r", Style::default().fg(Color::Yellow)),
        Span::raw(" Refresh  "),
        Span::styled("?", Style::default().fg(Color::Yellow)),
        Span::raw(" Help  "),
        Span::styled("q", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
        Span::styled(
            format!(" │ {}", freshness_text(app)),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    if let Some(status) = &app.status {
        let color = match status.kind {
            StatusKind::Info => Color::Green,
            StatusKind::Error => Color::Red,
        };
        spans.push(Span::styled(
            format!(" │ {}", status.text),
            Style::default().fg(color),
        ));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
