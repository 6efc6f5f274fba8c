use super::dashboard::render_banner;
use crate::logic::FetchState;
use crate::models::{DailyOutlook, HourlyIndexPoint, QualityRating};
use crate::ui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
};

const BAR_WIDTH: usize = 25;

/// Rolling hourly index and the daily outlook for the selected zone.
pub struct HourlyScreen<'a> {
    pub state: &'a FetchState,
    pub points: &'a [HourlyIndexPoint],
    pub outlook: &'a [DailyOutlook],
}

impl<'a> HourlyScreen<'a> {
    pub fn new(
        state: &'a FetchState,
        points: &'a [HourlyIndexPoint],
        outlook: &'a [DailyOutlook],
    ) -> Self {
        Self {
            state,
            points,
            outlook,
        }
    }
}

impl Widget for HourlyScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Title
                Constraint::Length(1), // Banner
                Constraint::Min(8),    // Hourly + daily
                Constraint::Length(1), // Nav
            ])
            .split(area);

        let zone = self
            .state
            .zone()
            .map(|z| z.name.clone())
            .unwrap_or_else(|| "Sin zona".to_string());
        let title = Line::from(vec![
            Span::styled("Índice horario", Theme::title()),
            Span::styled(" - ", Theme::dim()),
            Span::styled(zone, Theme::normal()),
        ]);
        Paragraph::new(title).render(chunks[0], buf);

        render_banner(self.state, chunks[1], buf);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[2]);

        self.render_hourly(body[0], buf);
        self.render_outlook(body[1], buf);

        let nav = Line::from(vec![
            Span::styled("[1]", Theme::nav_key()),
            Span::styled("Panel ", Theme::nav_label()),
            Span::styled("[r]", Theme::nav_key()),
            Span::styled("Actualizar ", Theme::nav_label()),
            Span::styled("[Esc]", Theme::nav_key()),
            Span::styled("Volver ", Theme::nav_label()),
            Span::styled("[q]", Theme::nav_key()),
            Span::styled("Salir", Theme::nav_label()),
        ]);
        Paragraph::new(nav).render(chunks[3], buf);
    }
}

impl HourlyScreen<'_> {
    fn render_hourly(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled("Últimas horas", Theme::header()))
            .borders(Borders::ALL)
            .border_style(Theme::border());

        if self.points.is_empty() {
            let inner = block.inner(area);
            block.render(area, buf);
            Paragraph::new(Span::styled("Sin datos horarios", Theme::dim())).render(inner, buf);
            return;
        }

        // newest first so the current hour stays visible
        let rows: Vec<Row> = self
            .points
            .iter()
            .rev()
            .map(|p| {
                let style = Theme::score(p.score);
                Row::new(vec![
                    Cell::from(p.time.format("%d/%m %H:%M").to_string()).style(Theme::dim()),
                    Cell::from(score_bar(p.score)).style(style),
                    Cell::from(format!("{:>3}", p.score)).style(style),
                    Cell::from(QualityRating::from_score(p.score).as_str()).style(style),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(12),
            Constraint::Length(BAR_WIDTH as u16),
            Constraint::Length(4),
            Constraint::Min(10),
        ];
        Table::new(rows, widths).block(block).render(area, buf);
    }

    fn render_outlook(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled("Pronóstico diario", Theme::header()))
            .borders(Borders::ALL)
            .border_style(Theme::border());

        let header = Row::new(vec!["Fecha", "Condición", "Lluvia", "Sol"]).style(Theme::header());
        let fmt = |v: Option<f64>, unit: &str| {
            v.map(|v| format!("{:.1} {}", v, unit))
                .unwrap_or_else(|| "N/A".to_string())
        };

        let rows: Vec<Row> = self
            .outlook
            .iter()
            .map(|day| {
                let condition_style = if day.condition.has_precipitation() {
                    Style::default().fg(Theme::TEMP_COOL)
                } else {
                    Theme::normal()
                };
                Row::new(vec![
                    Cell::from(day.date.format("%d/%m").to_string()),
                    Cell::from(day.condition.as_str()).style(condition_style),
                    Cell::from(fmt(day.precipitation_mm, "mm")),
                    Cell::from(fmt(day.sunshine_hours, "h")),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(6),
            Constraint::Min(12),
            Constraint::Length(9),
            Constraint::Length(7),
        ];
        Table::new(rows, widths)
            .header(header)
            .block(block)
            .render(area, buf);
    }
}

fn score_bar(score: u8) -> String {
    let filled = (usize::from(score) * BAR_WIDTH + 50) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}
