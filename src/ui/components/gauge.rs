use crate::ui::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Boxed value with a horizontal fill bar underneath.
pub struct GaugeWidget<'a> {
    title: &'a str,
    value: Option<f64>,
    unit: &'a str,
    min: f64,
    max: f64,
    thresholds: Vec<(f64, Color)>,
    precision: usize,
    caption: Option<String>,
}

impl<'a> GaugeWidget<'a> {
    pub fn new(title: &'a str, value: Option<f64>, unit: &'a str) -> Self {
        Self {
            title,
            value,
            unit,
            min: 0.0,
            max: 100.0,
            thresholds: Vec::new(),
            precision: 1,
            caption: None,
        }
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn thresholds(mut self, thresholds: Vec<(f64, Color)>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Dimmed text shown after the value, e.g. the optimal range
    pub fn caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    fn get_color(&self, value: f64) -> Color {
        for (threshold, color) in self.thresholds.iter().rev() {
            if value >= *threshold {
                return *color;
            }
        }
        Theme::FG
    }

    fn ratio(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }
}

impl Widget for GaugeWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 3 || area.width < 10 {
            return;
        }

        let block = Block::default()
            .title(self.title)
            .borders(Borders::ALL)
            .border_style(Theme::border());

        let inner = block.inner(area);
        block.render(area, buf);

        let Some(value) = self.value else {
            Paragraph::new(Span::styled("N/A", Theme::dim())).render(inner, buf);
            return;
        };

        let color = self.get_color(value);
        let mut spans = vec![Span::styled(
            format!("{:.prec$}{}", value, self.unit, prec = self.precision),
            Style::default().fg(color),
        )];
        if let Some(caption) = &self.caption {
            spans.push(Span::styled(format!(" {}", caption), Theme::dim()));
        }
        Paragraph::new(Line::from(spans)).render(inner, buf);

        if inner.height >= 2 {
            let bar_area = Rect {
                x: inner.x,
                y: inner.y + 1,
                width: inner.width,
                height: 1,
            };

            let filled = (bar_area.width as f64 * self.ratio(value)) as u16;
            for x in bar_area.x..bar_area.x + bar_area.width {
                let ch = if x < bar_area.x + filled { '█' } else { '░' };
                buf[(x, bar_area.y)].set_char(ch).set_fg(color);
            }
        }
    }
}

/// 0-100 score colored by rating band.
pub fn score_gauge(title: &str, score: Option<u8>) -> GaugeWidget<'_> {
    GaugeWidget::new(title, score.map(f64::from), "")
        .range(0.0, 100.0)
        .precision(0)
        .thresholds(vec![
            (0.0, Theme::ERROR),
            (50.0, Theme::WARNING),
            (80.0, Theme::SUCCESS),
        ])
}

pub fn temperature_gauge<'a>(title: &'a str, value: Option<f64>, unit: &'a str) -> GaugeWidget<'a> {
    GaugeWidget::new(title, value, unit)
        .range(10.0, 40.0)
        .thresholds(vec![
            (f64::MIN, Theme::TEMP_COOL),
            (22.0, Theme::TEMP_WARM),
            (30.0, Theme::TEMP_HOT),
        ])
}

pub fn humidity_gauge<'a>(title: &'a str, value: Option<f64>, unit: &'a str) -> GaugeWidget<'a> {
    GaugeWidget::new(title, value, unit)
        .range(0.0, 100.0)
        .precision(0)
        .thresholds(vec![
            (0.0, Theme::WARNING),
            (80.0, Theme::SUCCESS),
            (90.5, Theme::TEMP_COOL),
        ])
}

pub fn wind_gauge<'a>(title: &'a str, value: Option<f64>, unit: &'a str) -> GaugeWidget<'a> {
    GaugeWidget::new(title, value, unit)
        .range(0.0, 40.0)
        .thresholds(vec![(0.0, Theme::WIND_CALM), (15.0, Theme::WIND_STRONG)])
}
