use std::time::Duration;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table, Wrap},
};

use super::styles::*;
use crate::app::{App, Mode, Verdict, MAX_BATCH_IN_FLIGHT};

const KEYS: [(&str, &str); 8] = [
    ("Enter", "call"),
    ("Tab", "mode"),
    ("↑↓", "replica"),
    ("+-", "timeout"),
    ("b", "batch"),
    ("[]", "batch size"),
    ("c", "clear"),
    ("q", "quit"),
];

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let [status, body, footer] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(4),
    ])
    .areas(frame.area());

    let [replicas, side] =
        Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(body);
    let [results, last] = Layout::vertical([
        Constraint::Length(Mode::CYCLE.len() as u16 + 4),
        Constraint::Min(4),
    ])
    .areas(side);

    draw_status(frame, status, app);
    draw_replicas(frame, replicas, app);
    draw_results(frame, results, app);
    draw_last_call(frame, last, app);
    draw_footer(frame, footer, app);
}

fn panel(title: &str) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .title_style(title_style())
        .borders(Borders::ALL)
        .border_style(border_style())
}

fn field(name: &'static str, value: String, style: Style) -> [Span<'static>; 2] {
    [
        Span::styled(format!("{name} "), muted_style()),
        Span::styled(format!("{value}   "), style),
    ]
}

/// Milliseconds with one decimal, or `-` when there is nothing to show.
fn fmt_ms(d: Option<Duration>) -> String {
    d.map_or_else(|| "-".to_string(), |d| format!("{:.1}", d.as_secs_f64() * 1000.0))
}

fn draw_status(frame: &mut Frame, area: Rect, app: &App) {
    let slice = match app.mode {
        Mode::Dispatch(_) => format!("{}ms", app.part_budget().as_millis()),
        Mode::Direct => "n/a".to_string(),
    };

    let line: Vec<Span> = [
        field("mode", app.mode.label().to_string(), highlight_style()),
        field("timeout", format!("{}ms", app.timeout.as_millis()), text_style()),
        field("slice", slice, text_style()),
        field("query", format!("{:?}", app.query), text_style()),
    ]
    .into_iter()
    .flatten()
    .collect();

    let title = format!("replica-dispatch :: {} replicas", app.replicas.len());
    let block = panel(&title).title_style(header_style());
    frame.render_widget(Paragraph::new(Line::from(line)).block(block), area);
}

fn draw_replicas(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(["Rank", "Replica", "Sent", "Won", "Lost", "Errors", "Avg ms", "Window"])
        .style(table_header_style())
        .bottom_margin(1);

    let rows = app.replicas.iter().enumerate().map(|(idx, replica)| {
        let stats = app.stats.get(replica);
        let sent = stats.map_or(0, |s| s.attempts);
        let won = stats.map_or(0, |s| s.wins);
        let errors = stats.map_or(0, |s| s.errors);
        // Attempts abandoned because another replica answered first.
        let lost = sent.saturating_sub(won + errors);
        let samples = stats.map_or(0, |s| s.samples);

        let avg = match stats {
            Some(s) if s.samples > 0 => Cell::from(format!("{:.1}", s.avg_latency_ms))
                .style(latency_style(s.avg_latency_ms)),
            _ => Cell::from("untried").style(muted_style()),
        };
        let rank = app
            .rank_of(replica)
            .map_or_else(|| "-".to_string(), |r| r.to_string());

        let row = Row::new([
            Cell::from(rank).style(highlight_style()),
            Cell::from(replica.as_str().to_string()),
            Cell::from(sent.to_string()),
            Cell::from(won.to_string()).style(if won > 0 { success_style() } else { text_style() }),
            Cell::from(lost.to_string()).style(muted_style()),
            Cell::from(errors.to_string()).style(if errors > 0 { error_style() } else { text_style() }),
            avg,
            Cell::from(format!("{samples}/{}", app.client.config().latency_window)),
        ]);

        if idx == app.selected {
            row.style(selected_row_style())
        } else {
            row
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(18),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(7),
        ],
    )
    .header(header)
    .block(panel("Replicas, fastest rank first"))
    .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_results(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(["Mode", "Calls", "Served", "Timeout", "Failed", "Mean", "Worst"])
        .style(table_header_style());

    let rows = Mode::CYCLE.iter().map(|&mode| {
        let tally = app.tally(mode);
        let served_style = match tally.served_pct() {
            _ if tally.calls == 0 => muted_style(),
            pct if pct >= 95.0 => success_style(),
            pct if pct >= 80.0 => highlight_style(),
            _ => error_style(),
        };
        let worst = (tally.served > 0).then_some(tally.worst);

        let row = Row::new([
            Cell::from(mode.label()),
            Cell::from(tally.calls.to_string()),
            Cell::from(format!("{:.0}%", tally.served_pct())).style(served_style),
            Cell::from(tally.timeouts.to_string()),
            Cell::from(tally.failures.to_string()),
            Cell::from(fmt_ms(tally.mean())),
            Cell::from(fmt_ms(worst)),
        ]);
        if mode == app.mode {
            row.style(title_style())
        } else {
            row.style(text_style())
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(8),
        ],
    )
    .header(header)
    .block(panel("Results by mode"));

    frame.render_widget(table, area);
}

fn draw_last_call(frame: &mut Frame, area: Rect, app: &App) {
    let lines = match &app.last {
        None => vec![Line::styled("no calls yet", muted_style())],
        Some(done) => {
            let took = Line::from(Vec::from(field(
                "took",
                format!("{} ms via {}", fmt_ms(Some(done.elapsed)), done.mode.label()),
                latency_style(done.elapsed.as_secs_f64() * 1000.0),
            )));
            let outcome: Vec<Line> = match &done.verdict {
                Verdict::Served { replica, preview } => vec![
                    Line::from(Vec::from(field("winner", replica.to_string(), success_style()))),
                    Line::from(Vec::from(field("body", preview.clone(), text_style()))),
                ],
                Verdict::DeadlineExceeded => vec![Line::styled(
                    format!("deadline of {}ms exceeded", app.timeout.as_millis()),
                    error_style(),
                )],
                Verdict::AllFailed { cause } => {
                    vec![Line::styled(cause.clone(), error_style())]
                }
                Verdict::ReplicaError { replica, cause } => vec![
                    Line::from(Vec::from(field("replica", replica.to_string(), text_style()))),
                    Line::styled(cause.clone(), error_style()),
                ],
            };
            std::iter::once(took).chain(outcome).collect()
        }
    };

    let paragraph = Paragraph::new(lines)
        .block(panel("Last call"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let [progress, keys] =
        Layout::vertical([Constraint::Length(3), Constraint::Length(1)]).areas(area);

    match &app.batch {
        Some(batch) => {
            let label = format!(
                "{}/{} done, {} in flight (max {MAX_BATCH_IN_FLIGHT})",
                batch.finished,
                batch.size,
                batch.in_flight()
            );
            let gauge = Gauge::default()
                .block(panel("Batch"))
                .gauge_style(success_style())
                .percent(batch.percent().min(100))
                .label(label);
            frame.render_widget(gauge, progress);
        }
        None => {
            let text = format!("{}  (batch size {})", app.status, app.batch_size);
            let status = Paragraph::new(text).style(text_style()).block(panel("Status"));
            frame.render_widget(status, progress);
        }
    }

    let hint: Vec<Span> = KEYS
        .iter()
        .flat_map(|(key, what)| {
            [
                Span::styled(format!(" {key} "), highlight_style()),
                Span::styled(format!("{what} "), muted_style()),
            ]
        })
        .collect();
    frame.render_widget(Paragraph::new(Line::from(hint)), keys);
}
