use anyhow::Result;
use chrono::NaiveDate;
use crossterm::{
    ExecutableCommand,
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    prelude::*,
    widgets::{BarChart, Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;

use crate::app::App;
use crate::models::{ApplicationStatus, Category, InterviewResult, JobApplication, JobPatch, Label};
use crate::stats::{ApplicationProgress, DashboardStats, InterviewTally, JobFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Applications,
    Dashboard,
}

struct BrowseState {
    filter: JobFilter,
    /// Indices into the loaded applications that pass `filter`.
    visible: Vec<usize>,
    /// Position within `visible`, mirrored into `list_state`.
    selected: usize,
    list_state: ListState,
    scroll_offset: u16,
    view: View,
    today: NaiveDate,
}

impl BrowseState {
    fn new(jobs: &[JobApplication], today: NaiveDate) -> Self {
        let mut state = Self {
            filter: JobFilter::default(),
            visible: Vec::new(),
            selected: 0,
            list_state: ListState::default(),
            scroll_offset: 0,
            view: View::Applications,
            today,
        };
        state.refilter(jobs);
        state
    }

    fn refilter(&mut self, jobs: &[JobApplication]) {
        self.visible = jobs
            .iter()
            .enumerate()
            .filter(|(_, job)| self.filter.matches(job))
            .map(|(i, _)| i)
            .collect();
        let clamped = self.selected.min(self.visible.len().saturating_sub(1));
        self.select(clamped);
    }

    /// Move the selection and the list highlight together.
    fn select(&mut self, index: usize) {
        if index != self.selected {
            self.scroll_offset = 0;
        }
        self.selected = index;
        self.list_state.select((!self.visible.is_empty()).then_some(index));
    }

    fn current<'a>(&self, jobs: &'a [JobApplication]) -> Option<&'a JobApplication> {
        self.visible.get(self.selected).and_then(|&i| jobs.get(i))
    }

    /// all -> applied -> interview -> offer -> rejected -> withdrawn -> all
    fn cycle_filter(&mut self, jobs: &[JobApplication]) {
        let statuses = ApplicationStatus::ALL;
        let next = match &self.filter.status {
            None => statuses.first(),
            Some(current) => {
                let kind = Label::<ApplicationStatus>::new(current.as_str()).kind();
                statuses
                    .iter()
                    .position(|s| *s == kind)
                    .and_then(|i| statuses.get(i + 1))
            }
        };
        self.filter.status = next.map(|s| s.canonical().to_lowercase());
        self.selected = 0;
        self.scroll_offset = 0;
        self.refilter(jobs);
    }

    fn next(&mut self) {
        if !self.visible.is_empty() && self.selected < self.visible.len() - 1 {
            self.select(self.selected + 1);
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.select(self.selected - 1);
        }
    }

    fn scroll_down(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_add(3);
    }

    fn scroll_up(&mut self) {
        self.scroll_offset = self.scroll_offset.saturating_sub(3);
    }
}

pub fn run_browse(app: &mut App) -> Result<()> {
    if app.load_jobs()?.is_empty() {
        println!("No applications found.");
        return Ok(());
    }

    let today = chrono::Local::now().date_naive();
    let mut state = BrowseState::new(app.jobs.jobs(), today);
    load_interviews(app, &state);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, app);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

/// Failures land in `app.jobs.error()` and show in the footer.
fn load_interviews(app: &mut App, state: &BrowseState) {
    if let Some(id) = state.current(app.jobs.jobs()).map(|job| job.id.clone()) {
        let _ = app.load_interviews(&id);
    }
}

fn set_status(app: &mut App, state: &mut BrowseState, status: ApplicationStatus) {
    let Some(id) = state.current(app.jobs.jobs()).map(|job| job.id.clone()) else {
        return;
    };
    if app.update_job(&id, &JobPatch::status(Label::known(status))).is_ok() {
        state.refilter(app.jobs.jobs());
    }
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut BrowseState,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|frame| draw(frame, state, app))?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let prev_selected = state.current(app.jobs.jobs()).map(|job| job.id.clone());
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                KeyCode::Down | KeyCode::Char('j') => state.next(),
                KeyCode::Up | KeyCode::Char('k') => state.prev(),
                KeyCode::Char('J') | KeyCode::PageDown => state.scroll_down(),
                KeyCode::Char('K') | KeyCode::PageUp => state.scroll_up(),
                KeyCode::Char('a') => set_status(app, state, ApplicationStatus::Applied),
                KeyCode::Char('i') => set_status(app, state, ApplicationStatus::Interview),
                KeyCode::Char('o') => set_status(app, state, ApplicationStatus::Offer),
                KeyCode::Char('x') => set_status(app, state, ApplicationStatus::Rejected),
                KeyCode::Char('w') => set_status(app, state, ApplicationStatus::Withdrawn),
                KeyCode::Char('f') => state.cycle_filter(app.jobs.jobs()),
                KeyCode::Char('d') => {
                    state.view = match state.view {
                        View::Applications => View::Dashboard,
                        View::Dashboard => View::Applications,
                    };
                }
                _ => {}
            }
            let selected = state.current(app.jobs.jobs()).map(|job| job.id.clone());
            if selected != prev_selected {
                load_interviews(app, state);
            }
        }
    }
    Ok(())
}

fn status_color(status: &Label<ApplicationStatus>) -> Color {
    match status.kind() {
        ApplicationStatus::Applied => Color::Blue,
        ApplicationStatus::Interview => Color::Magenta,
        ApplicationStatus::Offer => Color::Green,
        ApplicationStatus::Rejected => Color::Red,
        ApplicationStatus::Withdrawn | ApplicationStatus::Unrecognized => Color::Gray,
    }
}

fn result_color(result: &Label<InterviewResult>) -> Color {
    match result.kind() {
        InterviewResult::Passed => Color::Green,
        InterviewResult::Failed => Color::Red,
        InterviewResult::Pending => Color::Yellow,
        InterviewResult::NoResponse | InterviewResult::Unrecognized => Color::Gray,
    }
}

fn draw(frame: &mut Frame, state: &mut BrowseState, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(frame.area());

    match state.view {
        View::Applications => draw_applications(frame, rows[0], state, app),
        View::Dashboard => draw_dashboard(frame, rows[0], state, app.jobs.jobs()),
    }

    let footer = match app.jobs.error() {
        Some(error) => Paragraph::new(format!(" error: {}", error)).style(Style::default().fg(Color::Red)),
        None => Paragraph::new(
            " j/k:navigate  J/K:scroll  a:applied i:interview o:offer x:rejected w:withdrawn  f:filter  d:dashboard  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[1]);
}

fn draw_applications(frame: &mut Frame, area: Rect, state: &mut BrowseState, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(area);

    let jobs = app.jobs.jobs();
    let items: Vec<ListItem> = state
        .visible
        .iter()
        .filter_map(|&i| jobs.get(i))
        .map(|job| {
            let company = if job.company.chars().count() > 24 {
                format!("{}...", job.company.chars().take(21).collect::<String>())
            } else {
                job.company.clone()
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<10}", job.status.as_str()), Style::default().fg(status_color(&job.status))),
                Span::raw(format!("{} | {}", company, job.position)),
            ]))
        })
        .collect();

    let filter = state.filter.status.as_deref().unwrap_or("all");
    let title = if app.jobs.loading() {
        " Applications (loading) ".to_string()
    } else {
        format!(" Applications ({}, {}) ", state.visible.len(), filter)
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let detail = build_detail(state, app);
    frame.render_stateful_widget(list, chunks[0], &mut state.list_state);

    let detail_widget = Paragraph::new(detail)
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.scroll_offset, 0));

    frame.render_widget(detail_widget, chunks[1]);
}

fn build_detail<'a>(state: &BrowseState, app: &'a App) -> Text<'a> {
    let Some(job) = state.current(app.jobs.jobs()) else {
        return Text::raw("No application selected");
    };

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(&job.position, bold)));
    lines.push(Line::from(format!("at {}", job.company)));
    lines.push(Line::from(Span::styled(
        format!("Status: {}", job.status),
        Style::default().fg(status_color(&job.status)),
    )));
    lines.push(Line::from(format!("Location: {}", job.location)));
    lines.push(Line::from(format!("Type: {}", job.employment_type)));
    lines.push(Line::from(format!("Salary: {}", job.salary_range)));
    lines.push(Line::from(format!("Applied: {}", job.application_date.format("%B %-d, %Y"))));
    if let Some(url) = &job.url {
        lines.push(Line::from(format!("URL: {}", url)));
    }
    lines.push(Line::from(""));

    let progress = ApplicationProgress::of(job.status.kind());
    let filled = (progress.percent / 5) as usize;
    lines.push(Line::from(vec![
        Span::styled("Progress ", bold),
        Span::styled("#".repeat(filled), Style::default().fg(status_color(&job.status))),
        Span::styled(".".repeat(20 - filled), dim),
        Span::raw(format!(" {}%", progress.percent)),
    ]));
    for (done, milestone) in [
        (progress.submitted, "Application Submitted"),
        (progress.interviewing, "Interview Process"),
        (progress.offer, "Offer Received"),
    ] {
        let style = if done { Style::default().fg(Color::Green) } else { dim };
        lines.push(Line::from(Span::styled(
            format!("  [{}] {}", if done { "x" } else { " " }, milestone),
            style,
        )));
    }
    lines.push(Line::from(""));

    if let Some(notes) = &job.notes {
        lines.push(Line::from(Span::styled("Notes", bold)));
        for line in textwrap::fill(notes, 70).lines() {
            lines.push(Line::from(format!("  {}", line)));
        }
        lines.push(Line::from(""));
    }

    let interviews = app.jobs.interviews();
    let tally = InterviewTally::of(interviews);
    lines.push(Line::from(Span::styled(
        format!(
            "Interviews ({} total, {} passed, {} failed, {} pending)",
            tally.total, tally.passed, tally.failed, tally.pending
        ),
        bold,
    )));
    if interviews.is_empty() {
        lines.push(Line::from(Span::styled("  No interviews recorded yet.", dim)));
    }
    for interview in interviews {
        lines.push(Line::from(vec![
            Span::raw(format!("  {}  {:<14} ", interview.interview_date, interview.interview_type)),
            Span::styled(
                interview.result.as_str(),
                Style::default().fg(result_color(&interview.result)),
            ),
        ]));
        if let Some(interviewer) = &interview.interviewer {
            lines.push(Line::from(Span::styled(format!("    with {}", interviewer), dim)));
        }
        if let Some(notes) = &interview.notes {
            for line in textwrap::fill(notes, 66).lines() {
                lines.push(Line::from(format!("    {}", line)));
            }
        }
    }

    Text::from(lines)
}

fn draw_dashboard(frame: &mut Frame, area: Rect, state: &BrowseState, jobs: &[JobApplication]) {
    let stats = DashboardStats::compute(jobs, state.today);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(8)])
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[0]);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    let counters = vec![
        Line::from(vec![Span::raw("Total Applications    "), Span::styled(stats.total.to_string(), bold)]),
        Line::from(vec![Span::raw("Active Applications   "), Span::styled(stats.active.to_string(), bold)]),
        Line::from(vec![
            Span::raw("Interviews Scheduled  "),
            Span::styled(stats.interview_scheduled.to_string(), bold),
        ]),
        Line::from(vec![Span::raw("Applied Last Week     "), Span::styled(stats.recent.to_string(), bold)]),
        Line::from(""),
        Line::from(vec![
            Span::raw("Response Rate         "),
            Span::styled(format!("{}%", stats.response_rate), bold),
        ]),
        Line::from(format!(
            "  Interviews {}  Offers {}  Rejections {}",
            stats.responses.interviews, stats.responses.offers, stats.responses.rejections
        )),
    ];
    frame.render_widget(
        Paragraph::new(counters).block(Block::default().borders(Borders::ALL).title(" Dashboard ")),
        top[0],
    );

    let breakdown: Vec<Line> = stats
        .status_breakdown
        .iter()
        .map(|(status, count)| {
            let label = Label::<ApplicationStatus>::new(status);
            Line::from(vec![
                Span::styled(format!("{:<12}", status), Style::default().fg(status_color(&label))),
                Span::raw(format!("{:>4}  {:>3}%", count, stats.status_breakdown.share(status))),
            ])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(breakdown).block(Block::default().borders(Borders::ALL).title(" Status ")),
        top[1],
    );

    let labels: Vec<String> = stats.monthly.iter().map(|bucket| bucket.label()).collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(&stats.monthly)
        .map(|(label, bucket)| (label.as_str(), bucket.count as u64))
        .collect();
    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Applications Over Time "))
        .data(data.as_slice())
        .bar_width(8)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Blue))
        .value_style(Style::default().fg(Color::Black).bg(Color::Blue));
    frame.render_widget(chart, chunks[1]);
}
