use crate::config::ZoneConfig;
use crate::logic::metrics;
use crate::logic::FetchState;
use crate::models::{QualityReport, WeatherSnapshot};
use crate::ui::components::{humidity_gauge, score_gauge, temperature_gauge, wind_gauge};
use crate::ui::Theme;
use chrono::Local;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Widget},
};

pub struct DashboardScreen<'a> {
    pub zones: &'a [ZoneConfig],
    pub highlighted: usize,
    pub selected_key: Option<&'a str>,
    pub state: &'a FetchState,
    pub report: Option<&'a QualityReport>,
    pub search_input: Option<&'a str>,
    pub status_message: Option<&'a str>,
}

impl<'a> DashboardScreen<'a> {
    pub fn new(
        zones: &'a [ZoneConfig],
        state: &'a FetchState,
        report: Option<&'a QualityReport>,
    ) -> Self {
        Self {
            zones,
            highlighted: 0,
            selected_key: None,
            state,
            report,
            search_input: None,
            status_message: None,
        }
    }

    pub fn with_selection(mut self, highlighted: usize, selected_key: Option<&'a str>) -> Self {
        self.highlighted = highlighted;
        self.selected_key = selected_key;
        self
    }

    pub fn with_search(mut self, input: Option<&'a str>) -> Self {
        self.search_input = input;
        self
    }

    pub fn with_status(mut self, status: Option<&'a str>) -> Self {
        self.status_message = status;
        self
    }
}

impl Widget for DashboardScreen<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(1), // Warning / error banner
                Constraint::Min(10),   // Zones and scores
                Constraint::Length(1), // Status message
                Constraint::Length(1), // Nav bar
            ])
            .split(area);

        self.render_header(chunks[0], buf);
        render_banner(self.state, chunks[1], buf);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(34), Constraint::Min(40)])
            .split(chunks[2]);

        self.render_zones(body[0], buf);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(6)])
            .split(body[1]);

        self.render_gauges(right[0], buf);
        self.render_metrics(right[1], buf);

        self.render_status_message(chunks[3], buf);
        render_nav(chunks[4], buf);
    }
}

impl DashboardScreen<'_> {
    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let title = match self.state.zone() {
            Some(zone) => format!("CacaoWatch - {}", zone.display_name()),
            None => "CacaoWatch - Sin zona seleccionada".to_string(),
        };

        let block = Block::default()
            .title(Span::styled(title, Theme::title()))
            .borders(Borders::BOTTOM)
            .border_style(Theme::border());

        let info = match self.state {
            FetchState::Ready {
                fetched_at, origin, ..
            } => format!(
                "Actualizado: {} ({})",
                fetched_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                origin.as_str()
            ),
            FetchState::Loading { .. } => "Cargando...".to_string(),
            FetchState::Failed { .. } => "Sin datos".to_string(),
            FetchState::Empty => "Seleccione una zona con Enter o busque con /".to_string(),
        };

        Paragraph::new(Span::styled(info, Theme::dim()))
            .block(block)
            .render(area, buf);
    }

    fn render_zones(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled("Zonas", Theme::header()))
            .borders(Borders::ALL)
            .border_style(Theme::border_focused());

        let items: Vec<ListItem> = self
            .zones
            .iter()
            .enumerate()
            .map(|(i, zone)| {
                let marker = if Some(zone.key.as_str()) == self.selected_key {
                    "● "
                } else {
                    "  "
                };
                let style = if i == self.highlighted {
                    Theme::selected()
                } else {
                    Theme::normal()
                };
                let mut lines = vec![Line::from(vec![
                    Span::styled(marker, Theme::highlight()),
                    Span::styled(zone.name.as_str(), style),
                ])];
                if let Some(variety) = &zone.variety {
                    lines.push(Line::from(Span::styled(format!("    {}", variety), Theme::dim())));
                }
                ListItem::new(lines)
            })
            .collect();

        List::new(items).block(block).render(area, buf);
    }

    fn render_gauges(&self, area: Rect, buf: &mut Buffer) {
        let gauge_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(28),
                Constraint::Percentage(24),
                Constraint::Percentage(24),
                Constraint::Percentage(24),
            ])
            .split(area);

        let snapshot: Option<&WeatherSnapshot> = self.state.snapshot();
        let current = snapshot.map(|s| &s.current);
        let unit = |field: &'static str, fallback: &'static str| {
            snapshot
                .map(|s| s.unit(field))
                .filter(|u| !u.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        let temp_unit = unit("temperature_2m", "°C");
        let humidity_unit = unit("relative_humidity_2m", "%");
        let wind_unit = format!(" {}", unit("wind_speed_10m", "km/h"));

        let overall = self.report.map(|r| r.overall);
        let mut index = score_gauge("Índice de calidad", overall);
        if let Some(report) = self.report {
            index = index.caption(report.rating.as_str());
        }
        index.render(gauge_chunks[0], buf);

        temperature_gauge("Temperatura", current.map(|c| c.temperature_2m), &temp_unit)
            .render(gauge_chunks[1], buf);
        humidity_gauge("Humedad", current.map(|c| c.relative_humidity_2m), &humidity_unit)
            .render(gauge_chunks[2], buf);
        wind_gauge("Viento", current.map(|c| c.wind_speed_10m), &wind_unit)
            .render(gauge_chunks[3], buf);
    }

    fn render_metrics(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(Span::styled("Métricas", Theme::header()))
            .borders(Borders::ALL)
            .border_style(Theme::border());

        let Some(report) = self.report else {
            let inner = block.inner(area);
            block.render(area, buf);
            let text = if self.state.is_loading() {
                "Cargando datos meteorológicos..."
            } else {
                "Sin datos"
            };
            Paragraph::new(Span::styled(text, Theme::dim())).render(inner, buf);
            return;
        };

        let header = Row::new(vec!["Métrica", "Valor", "Óptimo", "Peso", "Puntaje"])
            .style(Theme::header());

        let mut rows: Vec<Row> = report
            .metrics
            .iter()
            .map(|m| {
                Row::new(vec![
                    Cell::from(m.label),
                    Cell::from(format!("{:.1} {}", m.value, m.unit)),
                    Cell::from(format!("{} {}", m.optimal, m.unit)).style(Theme::dim()),
                    Cell::from(format!("{:.0}%", m.weight * 100.0)).style(Theme::dim()),
                    Cell::from(m.score.to_string()).style(Theme::score(m.score)),
                ])
            })
            .collect();

        rows.extend(report.missing.iter().filter_map(|id| metrics::find(*id)).map(|m| {
            Row::new(vec![
                Cell::from(m.label),
                Cell::from("N/A").style(Theme::dim()),
                Cell::from(format!("{} {}", m.optimal, m.unit)).style(Theme::dim()),
                Cell::from(format!("{:.0}%", m.weight * 100.0)).style(Theme::dim()),
                Cell::from("-").style(Theme::dim()),
            ])
        }));

        let widths = [
            Constraint::Length(20),
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(8),
        ];

        Table::new(rows, widths)
            .header(header)
            .block(block)
            .render(area, buf);
    }

    fn render_status_message(&self, area: Rect, buf: &mut Buffer) {
        let mut spans = Vec::new();
        if let Some(input) = self.search_input {
            spans.push(Span::styled("Buscar: ", Theme::nav_key()));
            spans.push(Span::styled(format!("{}_", input), Theme::normal()));
            spans.push(Span::raw("  "));
        }
        if let Some(msg) = self.status_message {
            spans.push(Span::styled(msg, Theme::dim()));
        }
        if !spans.is_empty() {
            Paragraph::new(Line::from(spans)).render(area, buf);
        }
    }
}

/// One-line banner for a stale-data warning or a failed fetch.
pub fn render_banner(state: &FetchState, area: Rect, buf: &mut Buffer) {
    let line = if let Some(warning) = state.warning() {
        Line::from(vec![
            Span::styled("⚠ ", Theme::warning()),
            Span::styled(warning.to_string(), Theme::warning()),
        ])
    } else if let Some(error) = state.error() {
        Line::from(vec![
            Span::styled("✖ ", Theme::error()),
            Span::styled(error, Theme::error()),
        ])
    } else {
        return;
    };
    Paragraph::new(line).render(area, buf);
}

fn render_nav(area: Rect, buf: &mut Buffer) {
    let nav = Line::from(vec![
        Span::styled("[1]", Theme::nav_key()),
        Span::styled("Panel ", Theme::nav_label()),
        Span::styled("[2]", Theme::nav_key()),
        Span::styled("Horario ", Theme::nav_label()),
        Span::styled("[↑↓]", Theme::nav_key()),
        Span::styled("Zona ", Theme::nav_label()),
        Span::styled("[Enter]", Theme::nav_key()),
        Span::styled("Seleccionar ", Theme::nav_label()),
        Span::styled("[x]", Theme::nav_key()),
        Span::styled("Limpiar ", Theme::nav_label()),
        Span::styled("[/]", Theme::nav_key()),
        Span::styled("Buscar ", Theme::nav_label()),
        Span::styled("[r]", Theme::nav_key()),
        Span::styled("Actualizar ", Theme::nav_label()),
        Span::styled("[q]", Theme::nav_key()),
        Span::styled("Salir", Theme::nav_label()),
    ]);

    Paragraph::new(nav).render(area, buf);
}
