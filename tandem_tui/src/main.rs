use anyhow::Result;
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};
use tandem_core::{
    AGENT_COUNT, Action, CellKind, Position, RolloutOutcome, RunConfig, SolveReport, Trainer,
    observer::ProgressLog, partner_of,
};

/// Colors of agent one and agent two.
const AGENT_COLORS: [Color; AGENT_COUNT] = [Color::Blue, Color::Yellow];
const AGENT_MARKERS: [&str; AGENT_COUNT] = ["A ", "B "];

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML run configuration; the canonical room is used without one
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Seed for the exploration RNG
    #[arg(short, long)]
    seed: Option<u64>,

    /// Successful episodes per training run
    #[arg(short, long)]
    epochs: Option<u64>,

    /// Log progress every N episodes
    #[arg(long, default_value_t = 50)]
    report_every: u64,

    /// Print the learned path instead of opening the viewer
    #[arg(long)]
    headless: bool,

    /// Milliseconds between playback frames
    #[arg(long, default_value_t = 250)]
    frame_ms: u64,
}

struct App {
    /// Trainer holding the learned tables.
    trainer: Trainer,
    /// Outcome of the solve loop, including the greedy path.
    report: SolveReport,
    /// Playback position: 0 shows the starts, `n` the state after step `n`.
    frame: usize,
    paused: bool,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(trainer: Trainer, report: SolveReport) -> Self {
        App {
            trainer,
            report,
            frame: 0,
            paused: false,
            should_quit: false,
        }
    }

    fn step_count(&self) -> usize {
        self.report.rollout.steps.len()
    }

    /// Positions shown at the current frame.
    fn positions(&self) -> [Position; AGENT_COUNT] {
        match self.frame {
            0 => self.trainer.scenario().starts(),
            frame => self.report.rollout.steps[frame - 1].to,
        }
    }

    /// Actions the greedy policy takes from the current frame, if any.
    fn proposed(&self) -> Option<[Action; AGENT_COUNT]> {
        self.report
            .rollout
            .steps
            .get(self.frame)
            .map(|step| step.actions)
    }

    /// Advances playback by one step.
    fn tick(&mut self) {
        if !self.paused && self.frame < self.step_count() {
            self.frame += 1;
        }
    }

    fn restart(&mut self) {
        self.frame = 0;
        self.paused = false;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.training.seed = Some(seed);
    }
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }

    let (trainer, report) = Trainer::run(&config, &mut ProgressLog::new(args.report_every))?;
    if !report.solved {
        log::warn!(
            "no path to the goal after {} attempts, showing the last rollout",
            report.attempts
        );
    }

    if args.headless {
        print_summary(&report);
        return Ok(());
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let mut app = App::new(trainer, report);
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.frame_ms));

    // Restore the terminal state even when the loop failed
    restore_terminal(&mut terminal)?;
    result
}

fn print_summary(report: &SolveReport) {
    let counters = report.training.counters;
    println!(
        "solved: {} after {} attempts ({} resets)",
        report.solved, report.attempts, report.resets
    );
    println!(
        "last run: {} steps, Success: {}, Failures: {}",
        report.training.steps, counters.successes, counters.failures
    );
    for (index, step) in report.rollout.steps.iter().enumerate() {
        println!(
            "{:>3}: A {} {} -> {}   B {} {} -> {}",
            index + 1,
            step.from[0],
            step.actions[0],
            step.to[0],
            step.from[1],
            step.actions[1],
            step.to[1]
        );
    }
    println!("outcome: {}", outcome_text(&report.rollout.outcome));
}

fn outcome_text(outcome: &RolloutOutcome) -> String {
    match outcome {
        RolloutOutcome::ReachedGoal => "reached the goal".to_string(),
        RolloutOutcome::StepLimit => "step limit reached".to_string(),
        RolloutOutcome::Failed { deaths } => {
            let causes: Vec<String> = deaths
                .iter()
                .zip(["A", "B"])
                .filter_map(|(cause, name)| cause.map(|cause| format!("{name}: {cause:?}")))
                .collect();
            format!("failed ({})", causes.join(", "))
        }
    }
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the playback loop until the user quits.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.paused = !app.paused,
                    KeyCode::Char('r') => app.restart(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick();
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(65), // Room
            Constraint::Percentage(25), // Agents and counters
            Constraint::Percentage(10), // Help
        ])
        .split(frame.area());

    render_room(frame, main_layout[0], app);
    render_status(frame, main_layout[1], app);

    let help_text = Paragraph::new("'q'/'Esc' quit, 'space' pause, 'r' replay.")
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[2]);
}

/// Lists each agent with its proposed action and that action's value, then
/// the counters of the last training run.
fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let positions = app.positions();
    let proposed = app.proposed();

    let mut items: Vec<ListItem> = (0..AGENT_COUNT)
        .map(|agent| {
            let own = positions[agent];
            let partner = positions[partner_of(agent)];
            let action = proposed.map(|actions| actions[agent]);
            let value = action
                .and_then(|action| app.trainer.table(agent).value(own, partner, action).ok());
            let text = match (action, value) {
                (Some(action), Some(value)) => {
                    format!("Agent {} at {own}: {action} (Q = {value:.2})", agent + 1)
                }
                _ => format!("Agent {} at {own}", agent + 1),
            };
            ListItem::from(Line::from(Span::styled(
                text,
                Style::default().fg(AGENT_COLORS[agent]),
            )))
        })
        .collect();

    let counters = app.report.training.counters;
    items.push(ListItem::from(format!(
        "Success: {}, Failures: {}, attempts: {}",
        counters.successes, counters.failures, app.report.attempts
    )));
    items.push(ListItem::from(format!(
        "Step {}/{}: {}",
        app.frame,
        app.step_count(),
        outcome_text(&app.report.rollout.outcome)
    )));

    let status = List::new(items).block(Block::default().borders(Borders::ALL).title("Agents"));
    frame.render_widget(status, area);
}

/// Renders the room with both agents onto the frame.
fn render_room(frame: &mut Frame, area: Rect, app: &App) {
    let room = &app.trainer.scenario().room;
    let positions = app.positions();

    let mut lines: Vec<Line> = Vec::with_capacity(room.height());
    for y in 0..room.height() {
        let mut spans: Vec<Span> = Vec::with_capacity(room.width());
        for x in 0..room.width() {
            let here = Position::new(x, y);
            let occupants: Vec<usize> = (0..AGENT_COUNT)
                .filter(|agent| positions[*agent] == here)
                .collect();

            let span = match occupants.as_slice() {
                [agent] => Span::styled(
                    AGENT_MARKERS[*agent],
                    Style::default().fg(AGENT_COLORS[*agent]).bold(),
                ),
                [_, _] => Span::styled("AB", Style::default().fg(Color::Magenta).bold()),
                _ => match room.cell_kind(here) {
                    CellKind::Free => Span::styled(". ", Style::default().fg(Color::DarkGray)),
                    CellKind::Hazard => Span::styled("x ", Style::default().fg(Color::Red)),
                    CellKind::Goal => Span::styled("[]", Style::default().fg(Color::Green)),
                },
            };
            spans.push(span);
        }
        lines.push(Line::from(spans));
    }

    let room_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Tandem").borders(Borders::ALL))
        .alignment(Alignment::Center);

    frame.render_widget(room_paragraph, area);
}
