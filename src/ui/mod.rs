//! Ratatui presentation layer: renders the session snapshot and the
//! interpolated indicator, nothing more. All state lives in the session
//! clock; this module only reacts to the events it is handed.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Paragraph,
    },
    Frame,
};
use std::time::Instant;

use crate::session::{
    progress::{edge_endpoints, sample, ProgressSample},
    state::{Phase, SessionSnapshot, SessionStatus},
};

/// Format seconds as "MM:SS" for the elapsed and limit displays.
pub fn format_mmss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn phase_color(phase: Phase) -> Color {
    match phase {
        Phase::Inhale => Color::Green,
        Phase::Hold => Color::Yellow,
        Phase::Exhale => Color::Blue,
        Phase::Wait => Color::Magenta,
    }
}

/// View model for the terminal front end: the latest snapshot plus the most
/// recent indicator sample. The sample is only refreshed while the session
/// runs; pausing freezes the indicator where it was.
pub struct App {
    pub snapshot: SessionSnapshot,
    pub sample: Option<ProgressSample>,
}

impl App {
    pub fn new(snapshot: SessionSnapshot) -> Self {
        Self {
            snapshot,
            sample: None,
        }
    }

    pub fn on_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.snapshot = snapshot;
        if self.snapshot.status == SessionStatus::Running {
            self.refresh_sample(Instant::now());
        } else if self.snapshot.elapsed_secs == 0 {
            // fresh idle state: park the indicator at the starting corner
            self.sample = None;
        }
    }

    /// Called from the frame interval while the session is running.
    pub fn refresh_sample(&mut self, now: Instant) {
        if self.snapshot.status == SessionStatus::Running {
            self.sample = Some(sample(&self.snapshot, now));
        }
    }

    pub fn is_running(&self) -> bool {
        self.snapshot.status == SessionStatus::Running
    }

    pub fn draw(&self, f: &mut Frame) {
        let area = f.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(2),
                Constraint::Min(8),
                Constraint::Length(2),
            ])
            .split(area);

        self.draw_status_line(f, chunks[0]);
        self.draw_phase_line(f, chunks[1]);
        self.draw_square(f, chunks[2]);
        self.draw_help(f, chunks[3]);
    }

    fn draw_status_line(&self, f: &mut Frame, area: Rect) {
        let snapshot = &self.snapshot;
        let mut spans = vec![
            Span::styled("boxbreathe", Style::default().add_modifier(Modifier::DIM)),
            Span::raw("   "),
            Span::styled(
                format_mmss(snapshot.elapsed_secs),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ];

        if let Some(mins) = snapshot.time_limit_mins {
            spans.push(Span::raw(" / "));
            spans.push(Span::styled(
                format_mmss(u64::from(mins) * 60),
                Style::default().add_modifier(Modifier::DIM),
            ));
        }
        if snapshot.limit_reached && snapshot.status == SessionStatus::Running {
            spans.push(Span::styled(
                "  finishing cycle…",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            ));
        }

        spans.push(Span::raw("   "));
        spans.push(Span::styled(
            if snapshot.sound_enabled {
                "♪ on"
            } else {
                "♪ off"
            },
            Style::default().add_modifier(Modifier::DIM),
        ));

        f.render_widget(
            Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
            area,
        );
    }

    fn draw_phase_line(&self, f: &mut Frame, area: Rect) {
        let snapshot = &self.snapshot;

        let line = match snapshot.status {
            SessionStatus::Complete => Line::from(Span::styled(
                format!("Session complete — {}", format_mmss(snapshot.elapsed_secs)),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )),
            SessionStatus::Idle if snapshot.elapsed_secs == 0 => Line::from(Span::styled(
                format!(
                    "press space to begin · {} seconds per phase",
                    snapshot.phase_secs
                ),
                Style::default().add_modifier(Modifier::ITALIC | Modifier::DIM),
            )),
            SessionStatus::Idle => Line::from(Span::styled(
                format!("paused — {} {}", snapshot.phase.label(), snapshot.countdown),
                Style::default().add_modifier(Modifier::DIM),
            )),
            SessionStatus::Running => Line::from(vec![
                Span::styled(
                    snapshot.phase.label(),
                    Style::default()
                        .fg(phase_color(snapshot.phase))
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::styled(
                    snapshot.countdown.to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
        };

        f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
    }

    fn draw_square(&self, f: &mut Frame, area: Rect) {
        // Terminal cells are roughly twice as tall as wide; shrink the
        // canvas region so the square looks square.
        let side = area.height.min(area.width / 2);
        let canvas_area = Rect {
            x: area.x + (area.width.saturating_sub(side * 2)) / 2,
            y: area.y + (area.height.saturating_sub(side)) / 2,
            width: side * 2,
            height: side,
        };

        let current = self.snapshot.phase;
        let running = self.is_running();
        let marker = self.sample;

        let canvas = Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([-0.15, 1.15])
            .y_bounds([-0.15, 1.15])
            .paint(move |ctx| {
                for phase in [Phase::Inhale, Phase::Hold, Phase::Exhale, Phase::Wait] {
                    let ((x1, y1), (x2, y2)) = edge_endpoints(phase);
                    let color = if running && phase == current {
                        phase_color(phase)
                    } else {
                        Color::DarkGray
                    };
                    ctx.draw(&CanvasLine {
                        x1,
                        y1,
                        x2,
                        y2,
                        color,
                    });
                }

                let (px, py) = marker.map(|s| s.point).unwrap_or((0.0, 0.0));
                // a small cross reads better than a single braille dot
                let e = 0.02;
                let coords = [
                    (px, py),
                    (px - e, py),
                    (px + e, py),
                    (px, py - e),
                    (px, py + e),
                ];
                ctx.draw(&Points {
                    coords: &coords,
                    color: phase_color(current),
                });
            });

        f.render_widget(canvas, canvas_area);
    }

    fn draw_help(&self, f: &mut Frame, area: Rect) {
        let help = Line::from(Span::styled(
            "space start/pause · r reset · s sound · ↑/↓ phase length · 1-9 limit (min) · 0 no limit · q quit",
            Style::default().add_modifier(Modifier::DIM),
        ));
        f.render_widget(Paragraph::new(help).alignment(Alignment::Center), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::state::{SessionConfig, SessionState};
    use chrono::Utc;

    #[test]
    fn format_mmss_pads() {
        assert_eq!(format_mmss(0), "00:00");
        assert_eq!(format_mmss(61), "01:01");
        assert_eq!(format_mmss(600), "10:00");
    }

    #[test]
    fn sample_is_only_refreshed_while_running() {
        let mut app = App::new(SessionState::new());
        app.refresh_sample(Instant::now());
        assert!(app.sample.is_none());

        let mut running = SessionState::new();
        running.begin(SessionConfig::default(), Utc::now(), Instant::now());
        app.on_snapshot(running.clone());
        assert!(app.sample.is_some());

        // pausing freezes the last sample rather than clearing it
        let frozen = app.sample;
        running.halt();
        running.elapsed_secs = 5;
        app.on_snapshot(running);
        assert_eq!(app.sample, frozen);
    }
}
