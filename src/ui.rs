use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::api::PriceSource;
use crate::app::{App, InputMode, ListView, View};
use crate::controller::{DetailController, DetailState, HistoryState};
use crate::format::{
    format_chart_date, format_margin, format_number, format_price, format_timestamp, ge_tax,
    margin, profit, truncate, PriceTier,
};
use crate::state::ChartView;
use crate::storage::KeyValueStore;
use crate::types::{Item, PriceHistoryEntry, Trend};

/// Most inline charts shown side by side under the table.
const MAX_INLINE_CHARTS: usize = 3;

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render<A: PriceSource, S: KeyValueStore>(f: &mut Frame, app: &App<A, S>) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    match app.view() {
        View::List(list) => render_list(f, app, list, chunks[1]),
        View::Detail(detail) => render_detail(f, detail, chunks[1]),
    }
    render_footer(f, app, chunks[2]);
}

fn render_header<A: PriceSource, S: KeyValueStore>(f: &mut Frame, app: &App<A, S>, area: Rect) {
    let mut spans = vec![Span::styled(
        " Grand Exchange Tracker  ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    match app.view() {
        View::List(list) => {
            let ctrl = &list.controller;
            let (status_text, status_color) = if ctrl.is_loading() {
                ("◌ loading".to_string(), Color::Yellow)
            } else if let Some(e) = ctrl.error() {
                (format!("✗ {}", truncate(e, 40)), Color::Red)
            } else {
                ("● live".to_string(), Color::Green)
            };
            spans.push(Span::styled(status_text, Style::default().fg(status_color)));
            if let Some(resp) = ctrl.response() {
                spans.push(Span::raw("  │  "));
                spans.push(Span::styled(
                    format!("page {}/{}", resp.page, resp.total_pages.max(1)),
                    Style::default().fg(Color::White),
                ));
                spans.push(Span::raw("  │  "));
                spans.push(Span::styled(
                    format!("{} items", resp.total),
                    Style::default().fg(Color::White),
                ));
            }
            spans.push(Span::raw("  │  "));
            spans.push(Span::styled(
                format!("{} pinned", app.pinned().len()),
                Style::default().fg(Color::Yellow),
            ));
        }
        View::Detail(detail) => {
            let label = detail
                .item()
                .map(|item| item.name.clone())
                .or_else(|| detail.item_id().map(|id| format!("item {id}")))
                .unwrap_or_else(|| "item".to_string());
            spans.push(Span::styled(label, Style::default().fg(Color::White)));
        }
    }

    let paragraph = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// List view
// ---------------------------------------------------------------------------

fn render_list<A: PriceSource, S: KeyValueStore>(
    f: &mut Frame,
    app: &App<A, S>,
    list: &ListView<A>,
    area: Rect,
) {
    let rows = app.sorted_rows();
    let expanded: Vec<&Item> = rows
        .iter()
        .copied()
        .filter(|item| list.charts.is_expanded(item.item_id))
        .take(MAX_INLINE_CHARTS)
        .collect();
    let error = list.controller.error();

    let mut constraints = vec![Constraint::Length(3)];
    if error.is_some() {
        constraints.push(Constraint::Length(3));
    }
    if expanded.is_empty() {
        constraints.push(Constraint::Min(0));
    } else {
        constraints.push(Constraint::Percentage(55));
        constraints.push(Constraint::Percentage(45));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    render_search_bar(f, list, chunks[next]);
    next += 1;
    if let Some(e) = error {
        let banner = Paragraph::new(format!("Error: {e}"))
            .style(Style::default().fg(Color::Red))
            .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Red)));
        f.render_widget(banner, chunks[next]);
        next += 1;
    }
    render_items_table(f, app, list, &rows, chunks[next]);
    next += 1;
    if !expanded.is_empty() {
        render_inline_charts(f, list, &expanded, chunks[next]);
    }
}

fn render_search_bar<A: PriceSource>(f: &mut Frame, list: &ListView<A>, area: Rect) {
    let editing = list.input_mode == InputMode::Search;
    let query = list.controller.query();
    let text = if query.is_empty() && !editing {
        Span::styled("Search items... (press /)", Style::default().fg(Color::DarkGray))
    } else if editing {
        Span::styled(format!("{query}▏"), Style::default().fg(Color::White))
    } else {
        Span::raw(query.to_string())
    };
    let border = if editing { Color::Cyan } else { Color::DarkGray };
    let paragraph = Paragraph::new(Line::from(text)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(" Search "),
    );
    f.render_widget(paragraph, area);
}

fn render_items_table<A: PriceSource, S: KeyValueStore>(
    f: &mut Frame,
    app: &App<A, S>,
    list: &ListView<A>,
    rows: &[&Item],
    area: Rect,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " GRAND EXCHANGE ITEMS ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    if rows.is_empty() {
        let ctrl = &list.controller;
        let message = if ctrl.is_loading() || (ctrl.response().is_none() && ctrl.error().is_none()) {
            "Loading items..."
        } else if ctrl.error().is_some() {
            ""
        } else {
            "No items found."
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let header_cells = [
        "Pin", "Chart", "Item Name", "Buy (Low)", "Sell (High)", "Margin", "GE Tax", "Profit",
        "Volume", "Trend",
    ]
    .iter()
    .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let table_rows: Vec<Row> = rows
        .iter()
        .map(|item| {
            let is_pinned = app.pinned().is_pinned(item.item_id);
            let is_expanded = list.charts.is_expanded(item.item_id);
            let item_margin = margin(item.low, item.high);
            let item_profit = profit(item.low, item.high);

            let name_style = if is_pinned {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            Row::new(vec![
                Cell::from(if is_pinned { "★" } else { "☆" })
                    .style(Style::default().fg(Color::Yellow)),
                Cell::from(if is_expanded { "▾" } else { "▸" })
                    .style(Style::default().fg(Color::Blue)),
                Cell::from(truncate(&item.name, 32)).style(name_style),
                Cell::from(format_price(item.low)),
                Cell::from(format_price(item.high)),
                Cell::from(format_margin(item_margin))
                    .style(Style::default().fg(gain_color(item_margin >= 0.0))),
                Cell::from(format_price(ge_tax(item.high))),
                Cell::from(format_price(item_profit))
                    .style(Style::default().fg(gain_color(item_profit >= 0))),
                Cell::from(format_number(item.volume)),
                Cell::from(item.trend.arrow()).style(
                    Style::default()
                        .fg(trend_color(item.trend))
                        .add_modifier(Modifier::BOLD),
                ),
            ])
        })
        .collect();

    let table = Table::new(
        table_rows,
        [
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(16),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(11),
            Constraint::Length(8),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = TableState::default().with_selected(Some(list.selected));
    f.render_stateful_widget(table, area, &mut state);
}

fn render_inline_charts<A: PriceSource>(
    f: &mut Frame,
    list: &ListView<A>,
    expanded: &[&Item],
    area: Rect,
) {
    let constraints: Vec<Constraint> = expanded
        .iter()
        .map(|_| Constraint::Ratio(1, expanded.len() as u32))
        .collect();
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (item, pane) in expanded.iter().zip(panes.iter()) {
        let title = format!(" {}  7 days ", truncate(&item.name, 24));
        match list.charts.view(item.item_id) {
            Some(ChartView::Loading) | None => render_placeholder(f, *pane, &title, "Loading chart..."),
            Some(ChartView::Ready(history)) => render_price_chart(f, *pane, &title, history),
        }
    }
}

// ---------------------------------------------------------------------------
// Detail view
// ---------------------------------------------------------------------------

fn render_detail<A: PriceSource>(f: &mut Frame, detail: &DetailController<A>, area: Rect) {
    match detail.state() {
        DetailState::Loading => {
            render_placeholder(f, area, " Item ", "Loading item details...");
        }
        DetailState::Invalid(message) | DetailState::Failed(message) => {
            let lines = vec![
                Line::from(Span::styled(
                    format!("Error: {message}"),
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::raw(""),
                Line::from(vec![
                    Span::styled("[Esc] ", Style::default().fg(Color::Yellow)),
                    Span::raw("Back to List"),
                ]),
            ];
            let paragraph = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            );
            f.render_widget(paragraph, area);
        }
        DetailState::Loaded { item, history } => {
            let halves = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(12), Constraint::Min(8)])
                .split(area);
            render_item_summary(f, item, halves[0]);
            let title = " Price History (Last 7 Days) ";
            match history {
                HistoryState::Loading => {
                    render_placeholder(f, halves[1], title, "Loading price history...")
                }
                HistoryState::Ready(entries) => render_price_chart(f, halves[1], title, entries),
            }
        }
    }
}

fn render_item_summary(f: &mut Frame, item: &Item, area: Rect) {
    let label = |s: &'static str| Span::styled(format!("{s:<16}"), Style::default().fg(Color::DarkGray));
    let item_margin = margin(item.low, item.high);
    let item_profit = profit(item.low, item.high);

    let lines = vec![
        Line::from(vec![
            Span::styled(
                item.name.clone(),
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                item.trend.arrow(),
                Style::default().fg(trend_color(item.trend)).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::raw(""),
        Line::from(vec![label("Current Price"), price_badge(item.price)]),
        Line::from(vec![label("24 Hour Average"), price_badge(item.avg_24h)]),
        Line::from(vec![label("7 Day Average"), price_badge(item.avg_7d)]),
        Line::from(vec![
            label("Buy / Sell"),
            Span::raw(format!("{} / {}", format_price(item.low), format_price(item.high))),
        ]),
        Line::from(vec![
            label("Margin / Profit"),
            Span::styled(
                format_margin(item_margin),
                Style::default().fg(gain_color(item_margin >= 0.0)),
            ),
            Span::raw(" / "),
            Span::styled(
                format_price(item_profit),
                Style::default().fg(gain_color(item_profit >= 0)),
            ),
            Span::styled(
                format!("  (tax {})", format_price(ge_tax(item.high))),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            label("Trend"),
            Span::styled(
                format!("{} {}", item.trend.arrow(), item.trend),
                Style::default().fg(trend_color(item.trend)),
            ),
        ]),
        Line::from(Span::styled(
            format!("Last updated: {}", format_timestamp(&item.updated_at)),
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(format!(" #{} ", item.item_id)),
    );
    f.render_widget(paragraph, area);
}

fn price_badge(price: i64) -> Span<'static> {
    let color = match PriceTier::from_price(price) {
        PriceTier::Premium => Color::Magenta,
        PriceTier::High => Color::Blue,
        PriceTier::Mid => Color::Green,
        PriceTier::Base => Color::Gray,
    };
    Span::styled(
        format!(" {} ", format_price(price)),
        Style::default().fg(Color::Black).bg(color).add_modifier(Modifier::BOLD),
    )
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

fn render_price_chart(f: &mut Frame, area: Rect, title: &str, history: &[PriceHistoryEntry]) {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        render_placeholder(f, area, title, "No price history available");
        return;
    };

    let points: Vec<(f64, f64)> = history
        .iter()
        .enumerate()
        .map(|(i, entry)| (i as f64, entry.price as f64))
        .collect();

    let min = history.iter().map(|e| e.price).min().unwrap_or(0);
    let max = history.iter().map(|e| e.price).max().unwrap_or(0);
    let pad = ((max - min) as f64 * 0.05).max(1.0);
    let (lo, hi) = (min as f64 - pad, max as f64 + pad);

    let datasets = vec![Dataset::default()
        .name(format!("latest {}", format_price(last.price)))
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&points)];

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(Span::styled(title.to_string(), Style::default().fg(Color::Cyan))),
        )
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, (points.len().saturating_sub(1)).max(1) as f64])
                .labels(vec![format_chart_date(&first.date), format_chart_date(&last.date)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .bounds([lo, hi])
                .labels(vec![
                    format_number(min),
                    format_number((min + max) / 2),
                    format_number(max),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_placeholder(f: &mut Frame, area: Rect, title: &str, message: &str) {
    let paragraph = Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::DarkGray))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(title.to_string()),
        );
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer<A: PriceSource, S: KeyValueStore>(f: &mut Frame, app: &App<A, S>, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));

    let mut spans = match app.view() {
        View::List(list) if list.input_mode == InputMode::Search => vec![
            key(" [Enter] "),
            Span::raw("search  "),
            key("[Esc] "),
            Span::raw("done  "),
        ],
        View::List(list) => {
            let mut spans = vec![
                key(" [q] "),
                Span::raw("quit  "),
                key("[/] "),
                Span::raw("search  "),
                key("[p] "),
                Span::raw("pin  "),
                key("[c] "),
                Span::raw("chart  "),
                key("[Enter] "),
                Span::raw("details  "),
                key("[r] "),
                Span::raw("refresh  "),
            ];
            if let Some(resp) = list.controller.response() {
                if resp.has_prev_page() {
                    spans.push(key("[←] "));
                    spans.push(Span::raw("prev  "));
                }
                if resp.has_next_page() {
                    spans.push(key("[→] "));
                    spans.push(Span::raw("next  "));
                }
            }
            spans.push(Span::styled("auto-refresh: 5m", Style::default().fg(Color::DarkGray)));
            spans
        }
        View::Detail(_) => vec![
            key(" [q] "),
            Span::raw("quit  "),
            key("[Esc/b] "),
            Span::raw("back to list"),
        ],
    };

    if let Some(notice) = &app.notice {
        spans.push(Span::styled(format!("  {notice}"), Style::default().fg(Color::Red)));
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn gain_color(non_negative: bool) -> Color {
    if non_negative {
        Color::Green
    } else {
        Color::Red
    }
}

fn trend_color(trend: Trend) -> Color {
    match trend {
        Trend::Up => Color::Green,
        Trend::Down => Color::Red,
        Trend::Flat => Color::Gray,
    }
}
