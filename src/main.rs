use std::io;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph};

use fanvote_terminal::api::ApiClient;
use fanvote_terminal::config::Config;
use fanvote_terminal::demo_feed::DemoFeed;
use fanvote_terminal::provider::{self, DataSource};
use fanvote_terminal::roster::Side;
use fanvote_terminal::state::{self, AppState, ProviderCommand, Screen, apply_delta, side_label};
use fanvote_terminal::view;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    matches_refresh: Duration,
    last_matches_refresh: Instant,
    votes_refresh: Duration,
    last_votes_refresh: Instant,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<ProviderCommand>>, config: &Config) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
            matches_refresh: config.matches_poll,
            last_matches_refresh: Instant::now(),
            votes_refresh: config.votes_poll,
            last_votes_refresh: Instant::now(),
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.composing {
            self.on_compose_key(key);
            return;
        }
        if self.state.match_draft.is_some() {
            self.on_draft_key(key);
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            KeyCode::Char('r') => self.refresh_all(true),
            _ => match self.state.screen {
                Screen::Matches => self.on_matches_key(key),
                Screen::Pitch => self.on_pitch_key(key),
            },
        }
    }

    fn on_matches_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Enter | KeyCode::Char('d') => self.open_selected_match(),
            KeyCode::Char('a') => self.state.begin_match_draft(),
            _ => {}
        }
    }

    fn on_draft_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.state.cancel_match_draft(),
            KeyCode::Tab | KeyCode::Down | KeyCode::Char('j') => self.state.next_draft_field(),
            KeyCode::Right | KeyCode::Char(' ') | KeyCode::Char('l') => self.state.step_draft(),
            KeyCode::Enter => {
                if let Some(cmd) = self.state.create_match_command() {
                    self.send(cmd, "Create match", true);
                }
            }
            _ => {}
        }
    }

    fn on_pitch_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('b') | KeyCode::Esc => self.state.close_match_view(),
            KeyCode::Tab => self.state.toggle_focus_side(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next_player(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev_player(),
            KeyCode::Char('f') => self.state.cycle_formation(Side::Home),
            KeyCode::Char('g') => self.state.cycle_formation(Side::Away),
            KeyCode::Char('v') | KeyCode::Enter => {
                if let Some(cmd) = self.state.vote_command() {
                    self.send(cmd, "Vote", true);
                }
            }
            KeyCode::Char('c') => {
                self.state.composing = true;
                self.state.comment_draft.clear();
            }
            KeyCode::Char('n') => self.state.select_next_comment(),
            KeyCode::Char('p') => self.state.select_prev_comment(),
            KeyCode::Char('x') => {
                if let Some(cmd) = self.state.delete_comment_command() {
                    self.send(cmd, "Delete comment", true);
                }
            }
            _ => {}
        }
    }

    fn on_compose_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.state.composing = false;
                self.state.comment_draft.clear();
            }
            KeyCode::Enter => {
                if let Some(cmd) = self.state.comment_command() {
                    self.send(cmd, "Comment", true);
                }
            }
            KeyCode::Backspace => {
                self.state.comment_draft.pop();
            }
            KeyCode::Char(c) => self.state.comment_draft.push(c),
            _ => {}
        }
    }

    fn open_selected_match(&mut self) {
        let Some(match_id) = self.state.selected_match().map(|m| m.id) else {
            self.state.push_log("[INFO] No match selected");
            return;
        };
        self.open_match(match_id);
    }

    fn open_match(&mut self, match_id: u32) {
        if let Some(idx) = self.state.matches.iter().position(|m| m.id == match_id) {
            self.state.selected = idx;
        }
        let generation = self.state.begin_match_view(match_id);
        self.send(
            ProviderCommand::LoadMatch {
                match_id,
                generation,
            },
            "Roster",
            true,
        );
        self.send(
            ProviderCommand::FetchComments {
                match_id,
                generation,
            },
            "Comments",
            false,
        );
        self.last_votes_refresh = Instant::now();
    }

    fn send(&mut self, cmd: ProviderCommand, what: &str, announce: bool) -> bool {
        let Some(tx) = &self.cmd_tx else {
            if announce {
                self.state.push_log(format!("[INFO] {what} unavailable"));
            }
            return false;
        };
        if tx.send(cmd).is_err() {
            if announce {
                self.state.push_log(format!("[WARN] {what} request failed"));
            }
            return false;
        }
        if announce {
            self.state.push_log(format!("[INFO] {what} request sent"));
        }
        true
    }

    fn refresh_all(&mut self, announce: bool) {
        self.send(ProviderCommand::FetchMatchesPage, "Matches", announce);
        self.send(ProviderCommand::FetchGlobalStats, "Stats", false);
        self.send(ProviderCommand::FetchUserInfo, "User info", false);
        self.last_matches_refresh = Instant::now();
        if let Some(match_id) = self.state.current_match_id {
            let generation = self.state.view_generation;
            self.send(
                ProviderCommand::RefreshVotes {
                    match_id,
                    generation,
                },
                "Votes",
                false,
            );
            self.send(
                ProviderCommand::FetchComments {
                    match_id,
                    generation,
                },
                "Comments",
                false,
            );
            self.last_votes_refresh = Instant::now();
        }
    }

    fn maybe_refresh_matches(&mut self) {
        if self.last_matches_refresh.elapsed() < self.matches_refresh {
            return;
        }
        self.send(ProviderCommand::FetchMatchesPage, "Matches", false);
        self.send(ProviderCommand::FetchGlobalStats, "Stats", false);
        self.last_matches_refresh = Instant::now();
    }

    fn maybe_refresh_votes(&mut self) {
        let Some(match_id) = self.state.current_match_id else {
            return;
        };
        if self.state.loading || self.last_votes_refresh.elapsed() < self.votes_refresh {
            return;
        }
        let generation = self.state.view_generation;
        self.send(
            ProviderCommand::RefreshVotes {
                match_id,
                generation,
            },
            "Votes",
            false,
        );
        self.last_votes_refresh = Instant::now();
    }
}

fn main() -> io::Result<()> {
    let config = Config::load();

    let source: Arc<dyn DataSource> = if config.demo {
        Arc::new(DemoFeed::with_drift(rand::random()))
    } else {
        Arc::new(ApiClient::new(&config))
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(source, tx, cmd_rx);

    let mut app = App::new(Some(cmd_tx), &config);
    if config.demo {
        app.state.push_log("[INFO] Demo feed enabled");
    } else {
        app.state
            .push_log(format!("[INFO] Backend: {}", config.api_base_url));
    }
    app.refresh_all(false);
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }
        if let Some(match_id) = app.state.auto_open.take()
            && app.state.screen == Screen::Matches
        {
            app.open_match(match_id);
        }

        app.maybe_refresh_matches();
        app.maybe_refresh_votes();

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Matches => render_matches(frame, chunks[1], &app.state),
        Screen::Pitch => render_match_view(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[3]);

    if app.state.match_draft.is_some() {
        render_match_draft(frame, frame.size(), &app.state);
    }
    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let line1 = format!("  ( o )  FANVOTE | {}", view::auth_bar(&state.user));
    let line2 = format!("   \\_/   {}", view::stats_bar(&state.global_stats));
    format!("{line1}\n{line2}")
}

fn footer_text(state: &AppState) -> String {
    if state.composing {
        return "Type comment | Enter Post | Esc Cancel".to_string();
    }
    if state.match_draft.is_some() {
        return "Tab/j Field | Space/l Change | Enter Create | Esc Cancel".to_string();
    }
    match state.screen {
        Screen::Matches if state.user.is_admin() => {
            "j/k/↑/↓ Move | Enter/d Open | a New match | r Refresh | ? Help | q Quit".to_string()
        }
        Screen::Matches => {
            "j/k/↑/↓ Move | Enter/d Open | r Refresh | ? Help | q Quit".to_string()
        }
        Screen::Pitch => concat!(
            "b/Esc Back | Tab Side | j/k Player | v Vote | f/g Formation | ",
            "c Comment | n/p Select | x Delete | ? Help | q Quit"
        )
        .to_string(),
    }
}

fn render_matches(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Matches").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if state.matches.is_empty() {
        let empty = Paragraph::new("No matches yet").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }
    if inner.height == 0 {
        return;
    }

    let visible = inner.height as usize;
    let (start, end) = visible_range(state.selected, state.matches.len(), visible);
    let lines: Vec<Line> = (start..end)
        .map(|idx| {
            let m = &state.matches[idx];
            let status = if m.is_active { "OPEN  " } else { "CLOSED" };
            let formations = format!(
                "{} / {}",
                m.formation(Side::Home).unwrap_or("auto"),
                m.formation(Side::Away).unwrap_or("auto")
            );
            let text = format!(
                "{} {:<16} {} vs {}  [{}]",
                status,
                view::format_timestamp(&m.date),
                m.team1,
                m.team2,
                formations
            );
            let style = if idx == state.selected {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else if m.is_active {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Line::from(Span::styled(text, style))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_match_view(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let board = view::scoreboard(state.current_match(), &state.home_roster, &state.away_roster);
    let status = if state.loading {
        "loading..."
    } else if state.vote_status.has_voted {
        "you voted"
    } else if board.active {
        "voting open"
    } else {
        "voting closed"
    };
    let scoreboard = Paragraph::new(format!(
        "{} {}  :  {} {}   {}   ({status})",
        board.home_name, board.home_votes, board.away_votes, board.away_name, board.date
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(scoreboard, rows[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(40), Constraint::Length(38)])
        .split(rows[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(4)])
        .split(columns[0]);
    render_pitch(frame, left[0], state);
    render_selected_player(frame, left[1], state);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Min(4),
        ])
        .split(columns[1]);
    let max_votes = view::max_votes_across(&state.home_roster, &state.away_roster);
    render_ranking(frame, right[0], state, Side::Home, max_votes);
    render_ranking(frame, right[1], state, Side::Away, max_votes);
    render_comments(frame, right[2], state);
}

fn render_pitch(frame: &mut Frame, area: Rect, state: &AppState) {
    let title = format!(
        "Pitch {} vs {}",
        state.formation_for(Side::Home).as_deref().unwrap_or("auto"),
        state.formation_for(Side::Away).as_deref().unwrap_or("auto")
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width < 12 || inner.height < 5 {
        frame.render_widget(Paragraph::new("Pitch needs more room"), inner);
        return;
    }

    let width = inner.width as usize;
    let height = inner.height as usize;
    let line_style = Style::default().fg(Color::DarkGray);
    let mut grid = vec![vec![(' ', line_style); width]; height];
    for row in grid.iter_mut() {
        row[width / 2] = ('│', line_style);
    }
    let mid = height / 2;
    grid[mid][0] = ('[', line_style);
    grid[mid][width - 1] = (']', line_style);

    let focused = state
        .selected_roster_entry()
        .map(|e| (state.focus_side, e.player.id));
    let markers = view::pitch_markers(&state.home_roster, &state.away_roster, state.can_vote());
    for marker in &markers {
        let (cx, cy) = view::project_to_grid(marker.x, marker.y, inner.width, inner.height);
        let mut style = match marker.side {
            Side::Home => Style::default().fg(Color::LightGreen),
            Side::Away => Style::default().fg(Color::LightRed),
        };
        if marker.overflow {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if !marker.enabled {
            style = style.add_modifier(Modifier::DIM);
        }
        if state.vote_status.player_id == Some(marker.player_id) {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        let mut label = marker.label.clone();
        if focused == Some((marker.side, marker.player_id)) {
            style = style
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD);
            label = format!("{} {}", marker.label, marker.short_name);
        }
        let label: Vec<char> = label.chars().collect();
        let start = (cx as usize).min(width.saturating_sub(label.len()));
        for (offset, ch) in label.into_iter().enumerate() {
            if let Some(cell) = grid[cy as usize].get_mut(start + offset) {
                *cell = (ch, style);
            }
        }
    }

    let lines: Vec<Line> = grid
        .into_iter()
        .map(|row| {
            Line::from(
                row.into_iter()
                    .map(|(ch, style)| Span::styled(ch.to_string(), style))
                    .collect::<Vec<_>>(),
            )
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_selected_player(frame: &mut Frame, area: Rect, state: &AppState) {
    let text = match state.selected_roster_entry() {
        Some(entry) => {
            let number = entry
                .player
                .number
                .map(|n| format!("#{n} "))
                .unwrap_or_default();
            let action = if state.vote_status.player_id == Some(entry.player.id) {
                "your pick"
            } else if state.can_vote() {
                "v to vote"
            } else {
                "voting unavailable"
            };
            format!(
                "{} {number}{} ({})  votes {}  | {action}",
                side_label(state.focus_side),
                entry.player.name,
                entry.player.tag(),
                entry.votes
            )
        }
        None if state.loading => "Loading roster...".to_string(),
        None => "No players for this side".to_string(),
    };
    let panel = Paragraph::new(text).block(Block::default().title("Player").borders(Borders::ALL));
    frame.render_widget(panel, area);
}

fn render_ranking(frame: &mut Frame, area: Rect, state: &AppState, side: Side, max_votes: u32) {
    let title = format!("{} votes", side_label(side));
    let rows = view::vote_ranking(state.roster(side), max_votes);
    if rows.is_empty() {
        let empty = Paragraph::new("No votes yet")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    }

    let color = match side {
        Side::Home => Color::Green,
        Side::Away => Color::Red,
    };
    let bars: Vec<Bar> = rows
        .iter()
        .map(|row| {
            Bar::default()
                .value(u64::from(row.votes))
                .label(Line::from(format!("{:<4}{:<10}", row.tag, row.short_name)))
                .text_value(format!("{} ({:.0}%)", row.votes, row.percent))
                .style(Style::default().fg(color))
        })
        .collect();

    let chart = BarChart::default()
        .block(Block::default().title(title).borders(Borders::ALL))
        .data(BarGroup::default().bars(&bars))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .max(u64::from(max_votes.max(1)));
    frame.render_widget(chart, area);
}

fn render_comments(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Comments").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    if state.composing {
        lines.push(Line::from(Span::styled(
            format!("> {}_", state.comment_draft),
            Style::default().fg(Color::Yellow),
        )));
    }
    let rows = view::comment_rows(&state.comments);
    if rows.is_empty() {
        lines.push(Line::from(Span::styled(
            "No comments yet",
            Style::default().fg(Color::DarkGray),
        )));
    }
    for (idx, row) in rows.iter().enumerate() {
        let header_style = if idx == state.comment_selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let mut header = vec![Span::styled(row.header.clone(), header_style)];
        if row.can_delete {
            header.push(Span::styled("  [x] delete", Style::default().fg(Color::Red)));
        }
        lines.push(Line::from(header));
        lines.push(Line::from(row.text.clone()));
    }
    frame.render_widget(Paragraph::new(lines), inner);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    let start = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(start)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 70, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Fanvote Terminal - Help",
        "",
        "Global:",
        "  r            Refresh",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Matches:",
        "  j/k or ↑/↓   Move",
        "  Enter / d    Open match",
        "  a            New match (admins)",
        "",
        "Match:",
        "  b / Esc      Back",
        "  Tab          Switch side",
        "  j/k or ↑/↓   Select player",
        "  v / Enter    Vote for player",
        "  f / g        Cycle home / away formation",
        "  c            Write comment",
        "  n / p        Select comment",
        "  x            Delete own comment",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn render_match_draft(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(draft) = &state.match_draft else {
        return;
    };
    let popup_area = centered_rect(50, 40, area);
    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = view::match_draft_rows(draft, &state.teams)
        .into_iter()
        .map(|row| {
            let style = if row.focused {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::raw(format!("{:<16}", row.label)),
                Span::styled(row.value, style),
            ])
        })
        .collect();
    let form = Paragraph::new(lines)
        .block(Block::default().title("New match").borders(Borders::ALL));
    frame.render_widget(form, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
