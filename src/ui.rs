//! Terminal UI rendering with ratatui
//!
//! Reads the controller's state and paints it. Nothing here feeds back into
//! game logic.

use crate::board::{Cell, Rubble};
use crate::controller::Controller;
use crate::game::{Game, GameState};
use crate::multiplayer::{MultiplayerSession, Phase};
use crate::piece::Shape;
use crate::results::ResultSink;
use crate::tetromino::ShapeKind;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const EMPTY: &str = "  ";
const BLOCK: &str = "██";
const FLOOR: &str = "▓▓";

/// Side panel width
const PANEL_WIDTH: u16 = 24;

/// What occupies one board cell on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paint {
    Empty,
    Floor,
    Block(ShapeKind),
}

fn kind_color(kind: ShapeKind) -> Color {
    match kind {
        ShapeKind::I => Color::Cyan,
        ShapeKind::O => Color::Yellow,
        ShapeKind::T => Color::Magenta,
        ShapeKind::S => Color::Green,
        ShapeKind::Z => Color::Red,
        ShapeKind::J => Color::Blue,
        ShapeKind::L => Color::Rgb(255, 165, 0),
    }
}

/// Resolve every visible cell, top row first
fn paint_grid(rubble: &Rubble, active: Option<&Shape>) -> Vec<Vec<Paint>> {
    let floor_top = rubble.floor_top();
    (0..rubble.rows())
        .map(|row| {
            (0..rubble.columns())
                .map(|col| {
                    let cell = Cell::new(col, row);
                    if let Some(shape) = active.filter(|s| s.cells.contains(&cell)) {
                        Paint::Block(shape.kind)
                    } else if row >= floor_top {
                        Paint::Floor
                    } else if let Some(kind) = rubble.kind_at(cell) {
                        Paint::Block(kind)
                    } else {
                        Paint::Empty
                    }
                })
                .collect()
        })
        .collect()
}

/// Render the whole screen
pub fn render<S: ResultSink>(frame: &mut Frame, controller: &Controller<S>) {
    let area = frame.area();
    let game = &controller.game;
    let session = &controller.session;
    let board_width = game.rubble.columns() as u16 * 2 + 2;
    let board_height = game.rubble.rows() as u16 + 2;
    let show_mirror = !session.mirror().is_empty();

    let mut constraints = vec![Constraint::Length(board_width), Constraint::Length(PANEL_WIDTH)];
    let mut total_width = board_width + PANEL_WIDTH;
    if show_mirror {
        constraints.push(Constraint::Length(board_width));
        total_width += board_width;
    }
    let game_area = center_rect(area, total_width, board_height + 1);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(board_height), Constraint::Length(1)])
        .split(game_area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(rows[0]);

    render_board(frame, columns[0], game.mode.name(), &game.rubble, game.active.as_ref());

    let panel = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Length(8), Constraint::Min(6)])
        .split(columns[1]);
    render_next(frame, panel[0], game.next_kind);
    render_stats(frame, panel[1], game, session);
    render_lobby(frame, panel[2], session, controller.selected(), controller.is_online());

    if show_mirror {
        if let Some(rubble) = session.mirror().rubble() {
            let name = session.peer().map_or("Opponent", |p| p.name.as_str());
            render_board(frame, columns[2], name, rubble, session.mirror().active());
        }
    }

    let status = Paragraph::new(Line::styled(controller.status().to_string(), Style::default().fg(Color::Gray)))
        .alignment(Alignment::Center);
    frame.render_widget(status, rows[1]);

    // Overlays
    let board_area = columns[0];
    if let Phase::Accepted { countdown, .. } = session.phase() {
        render_countdown(frame, board_area, countdown);
    } else if game.state == GameState::Paused {
        render_overlay(frame, board_area, "PAUSED", "Press P to resume");
    } else if session.phase() == Phase::GameOver {
        let title = match session.outcome() {
            Some(outcome) if outcome.won => "YOU WON",
            Some(_) => "YOU LOST",
            None => "WAITING",
        };
        render_overlay(frame, board_area, title, "Press R to continue");
    } else if game.state == GameState::GameOver && !matches!(session.phase(), Phase::InProgress) {
        render_overlay(frame, board_area, "GAME OVER", "Press R to restart");
    }
}

/// Center a rect within another rect
fn center_rect(area: Rect, width: u16, height: u16) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect {
        x,
        y,
        width: width.min(area.width),
        height: height.min(area.height),
    }
}

/// Render a board with its rubble, floor and falling shape
fn render_board(frame: &mut Frame, area: Rect, title: &str, rubble: &Rubble, active: Option<&Shape>) {
    let block = Block::default()
        .title(format!(" {} ", title))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines: Vec<Line> = paint_grid(rubble, active)
        .into_iter()
        .map(|row| {
            Line::from(
                row.into_iter()
                    .map(|paint| match paint {
                        Paint::Empty => Span::raw(EMPTY),
                        Paint::Floor => Span::styled(FLOOR, Style::default().fg(Color::DarkGray)),
                        Paint::Block(kind) => Span::styled(BLOCK, Style::default().fg(kind_color(kind))),
                    })
                    .collect::<Vec<_>>(),
            )
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render the next shape preview
fn render_next(frame: &mut Frame, area: Rect, next: Option<ShapeKind>) {
    let block = Block::default()
        .title(" NEXT ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(kind) = next else {
        return;
    };
    // Spawn the preview on a 4-wide strip so its cells land in rows 0..2
    let shape = Shape::spawn(kind, 2, 8);
    let min_col = shape.cells.iter().map(|c| c.col).min().unwrap_or(0);
    let mut lines = Vec::new();
    for row in 0..2 {
        let spans: Vec<Span> = (0..4)
            .map(|offset| {
                if shape.cells.contains(&Cell::new(min_col + offset, row)) {
                    Span::styled(BLOCK, Style::default().fg(kind_color(kind)))
                } else {
                    Span::raw(EMPTY)
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), inner);
}

/// Render stats panel
fn render_stats(frame: &mut Frame, area: Rect, game: &Game, session: &MultiplayerSession) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("LINES ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", game.progress.lines), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::styled("LEVEL ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", game.progress.level), Style::default().fg(Color::Cyan)),
        ]),
        Line::from(vec![
            Span::styled("FLOOR ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", game.rubble.floor_level()), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::styled("SPEED ", Style::default().fg(Color::Gray)),
            Span::raw(if game.is_ticking() {
                format!("{}ms", game.tick_interval().as_millis())
            } else {
                "-".to_string()
            }),
        ]),
    ];
    if session.in_match() || session.phase() == Phase::GameOver {
        lines.push(Line::from(vec![
            Span::styled("RAISED ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", session.floors_raised_by_local()),
                Style::default().fg(Color::Yellow).bold(),
            ),
        ]));
        let mirror = session.mirror();
        lines.push(Line::from(vec![
            Span::styled("OPP LINES ", Style::default().fg(Color::Gray)),
            Span::raw(format!("{}", mirror.lines_cleared())),
        ]));
        lines.push(Line::from(vec![
            Span::styled("OPP LEVEL ", Style::default().fg(Color::Gray)),
            Span::raw(mirror.latest().map_or("-".to_string(), |s| s.level.to_string())),
        ]));
        lines.push(Line::from(vec![
            Span::styled("OPP FLOOR ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", mirror.floor_level()), Style::default().fg(Color::Red)),
        ]));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render presence, pool and invitation state
fn render_lobby(frame: &mut Frame, area: Rect, session: &MultiplayerSession, selected: usize, online: bool) {
    let block = Block::default()
        .title(" VERSUS ")
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if !online {
        frame.render_widget(
            Paragraph::new(Line::styled("offline", Style::default().fg(Color::DarkGray))),
            inner,
        );
        return;
    }

    let mut lines = vec![
        Line::raw(format!("{} online", session.logged_in())),
        Line::styled(
            format!("you: {}", session.local_id().map_or("?", |id| id.0.as_str())),
            Style::default().fg(Color::DarkGray),
        ),
        Line::raw(format!("difficulty {}", session.difficulty().level())),
        Line::styled(session.phase().name().to_string(), Style::default().fg(Color::Cyan)),
    ];
    if session.phase() == Phase::Searching {
        for (i, opponent) in session.pool().iter().enumerate() {
            let prefix = if i == selected { "▶ " } else { "  " };
            let style = if i == selected {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default().fg(Color::White)
            };
            lines.push(Line::styled(format!("{}{}", prefix, opponent.name), style));
        }
    } else if let Some(peer) = session.peer() {
        lines.push(Line::raw(format!("vs {}", peer.name)));
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

/// Render countdown overlay (just colored text, no border)
fn render_countdown(frame: &mut Frame, area: Rect, count: u8) {
    let text = match count {
        0 => "GO!".to_string(),
        n => n.to_string(),
    };

    let color = match count {
        3 => Color::Red,
        2 => Color::Yellow,
        1 => Color::Green,
        _ => Color::Cyan,
    };

    let text_area = center_rect(area, 4, 1);
    let paragraph = Paragraph::new(Line::styled(text, Style::default().fg(color).bold())).alignment(Alignment::Center);
    frame.render_widget(paragraph, text_area);
}

/// Render an overlay (for pause/game over)
fn render_overlay(frame: &mut Frame, area: Rect, title: &str, subtitle: &str) {
    let popup_area = center_rect(area, 22, 5);

    // Clear the background
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .style(Style::default().bg(Color::Black));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = vec![
        Line::styled(title.to_string(), Style::default().fg(Color::Yellow).bold()),
        Line::raw(""),
        Line::styled(subtitle.to_string(), Style::default().fg(Color::Gray)),
    ];

    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center), inner);
}
