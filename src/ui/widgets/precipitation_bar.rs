//! Precipitation bar widget for inline visualization

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

const FILLED: char = '█';
const EMPTY: char = '░';

/// A one-row bar filled in proportion to a precipitation chance
pub struct PrecipitationBar {
    /// Chance in percent, 0..=100
    chance: u8,
    /// Style for the empty part
    track_style: Style,
}

impl PrecipitationBar {
    pub fn new(chance: u8) -> Self {
        Self {
            chance: chance.min(100),
            track_style: Style::default().fg(Color::DarkGray),
        }
    }

    /// Number of filled cells out of `width`
    fn filled_cells(&self, width: u16) -> u16 {
        ((u32::from(self.chance) * u32::from(width) + 50) / 100) as u16
    }

    fn fill_color(&self) -> Color {
        match self.chance {
            71..=100 => Color::Blue,
            41..=70 => Color::Cyan,
            _ => Color::Gray,
        }
    }
}

impl Widget for PrecipitationBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let filled = self.filled_cells(area.width);
        let fill_style = Style::default().fg(self.fill_color());

        for i in 0..area.width {
            let (symbol, style) = if i < filled {
                (FILLED, fill_style)
            } else {
                (EMPTY, self.track_style)
            };
            if let Some(cell) = buf.cell_mut((area.x + i, area.y)) {
                cell.set_char(symbol).set_style(style);
            }
        }
    }
}
