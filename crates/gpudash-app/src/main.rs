use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Runtime;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use gpudash_config::{DashboardConfig, FlushMode, MachineSource};
use gpudash_core::{
    bus::EventBus,
    command::{self, CommandContext, CommandOutput, CommandRegistry},
    console::Console,
    event::Event,
    logging::{self, LogBuffer, LogEntry, LogLevel, LogOptions},
    state::AppState,
};
use gpudash_metrics::{
    source::{HttpSource, MetricsSource, SystemSource},
    Delivery, FlushPolicy,
};
use gpudash_mod_control::ControlModule;
use gpudash_ui::{
    console::{render_console, SampleCounters},
    layout::dashboard_layout,
    shell::{render_shell, ShellView, Tab},
};

mod charts;

use charts::{chart_for_key, ChartManager, ChartSettings, Panels, Sources, CATALOG};

struct App {
    state: AppState,
    panels: Panels,
    charts: ChartManager,
    deliveries: UnboundedReceiver<Delivery>,
    bus: EventBus,
    log_buffer: LogBuffer,
    console: Console,
    commands: CommandRegistry,
}

fn flush_policy(config: &DashboardConfig) -> FlushPolicy {
    match config.accumulator.flush {
        FlushMode::Always => FlushPolicy::Always,
        FlushMode::MinBatch => FlushPolicy::MinBatch(config.accumulator.min_batch),
    }
}

fn build_sources(config: &DashboardConfig) -> Result<Sources> {
    let http: Arc<dyn MetricsSource> = Arc::new(
        HttpSource::new(
            config.base_url(),
            config.token.clone(),
            config.request_timeout(),
        )
        .context("failed to build HTTP client")?,
    );
    let machine: Arc<dyn MetricsSource> = match config.machine_source {
        MachineSource::Http => http.clone(),
        MachineSource::Local => Arc::new(SystemSource::new()),
    };
    Ok(Sources { gpu: http, machine })
}

impl App {
    fn new(config: &DashboardConfig, runtime: &Runtime, log_buffer: LogBuffer) -> Result<Self> {
        let sources = build_sources(config)?;
        let source_label = sources.gpu.describe();
        let machine_label = sources.machine.describe();

        let mut panels = Panels::new();
        panels.register(ControlModule::new(CATALOG, source_label.clone()))?;

        let (tx, deliveries) = mpsc::unbounded_channel();
        let charts = ChartManager::new(
            runtime.handle().clone(),
            sources,
            ChartSettings {
                period: config.poll_interval(),
                policy: flush_policy(config),
                window: config.history_window,
            },
            tx,
        );

        let mut state = AppState::new();
        state.status_line = if machine_label == source_label {
            source_label
        } else {
            format!("{source_label} | machine: {machine_label}")
        };

        Ok(Self {
            state,
            panels,
            charts,
            deliveries,
            bus: EventBus::new(),
            log_buffer,
            console: Console::default(),
            commands: command::builtin_registry(),
        })
    }

    /// Drain new entries from the shared log buffer into the console.
    fn sync_logs(&mut self) {
        if let Ok(mut buf) = self.log_buffer.lock() {
            for entry in buf.drain(..) {
                self.console.push_log(entry);
            }
        }
    }

    fn console_line(&mut self, target: &str, message: String) {
        self.console.push_log(LogEntry {
            level: LogLevel::Info,
            target: target.into(),
            message,
        });
    }

    /// Move poller deliveries onto the bus.
    fn collect_deliveries(&mut self) {
        while let Ok(delivery) = self.deliveries.try_recv() {
            self.bus.publish(Event::Sample(delivery));
        }
    }

    /// Execute a console command. Returns `true` when the app should quit.
    fn dispatch_command(&mut self, input: &str) -> bool {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return false;
        }

        self.console_line("console", format!("> {}", trimmed));

        if trimmed == "help" || trimmed == "?" {
            for line in self.commands.help_lines() {
                self.console_line("help", line);
            }
            return false;
        }

        let mut ctx = CommandContext {
            registry: &mut self.panels.registry,
            console: &mut self.console,
            bus: &mut self.bus,
            catalog: CATALOG,
            started_at: self.state.started_at,
            delivered: self.state.delivered,
            dropped: self.state.dropped,
        };

        match self.commands.execute(trimmed, &mut ctx) {
            CommandOutput::Lines(lines) => {
                for line in lines {
                    self.console_line("console", line);
                }
                false
            }
            CommandOutput::Quit => true,
        }
    }

    /// Key handling outside the console.
    fn handle_normal_key(&mut self, key: KeyEvent) {
        if let Some(info) = match key.code {
            KeyCode::Char(c) => chart_for_key(c),
            _ => None,
        } {
            self.bus.publish(Event::OpenChart {
                id: info.id.to_string(),
            });
            return;
        }

        let active = self.panels.registry.active();
        match key.code {
            KeyCode::Char('q') => self.bus.publish(Event::Quit),
            KeyCode::Tab => {
                let lifecycle = self.panels.registry.cycle_next();
                self.bus.publish_all(lifecycle);
            }
            KeyCode::BackTab => {
                let lifecycle = self.panels.registry.cycle_prev();
                self.bus.publish_all(lifecycle);
            }
            KeyCode::Char('p') => {
                if let Some(m) = active.filter(|m| m.pause_state().is_some()) {
                    let id = m.id().to_string();
                    self.bus.publish(Event::TogglePause { id });
                }
            }
            KeyCode::Char('x') => {
                if let Some(m) = active.filter(|m| m.closable()) {
                    let id = m.id().to_string();
                    self.bus.publish(Event::CloseChart { id });
                }
            }
            _ => self.bus.publish(Event::Key(key)),
        }
    }

    fn handle_console_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Enter => {
                let input = self.console.submit_input();
                return self.dispatch_command(&input);
            }
            KeyCode::Backspace => self.console.backspace(),
            KeyCode::Left => self.console.cursor_left(),
            KeyCode::Right => self.console.cursor_right(),
            KeyCode::Up => self.console.history_prev(),
            KeyCode::Down => self.console.history_next(),
            KeyCode::PageUp => self.console.scroll_up(10),
            KeyCode::PageDown => self.console.scroll_down(10),
            KeyCode::Esc => self.console.toggle(),
            KeyCode::Char(c) => self.console.insert_char(c),
            _ => {}
        }
        false
    }

    /// Route drained events. Returns `true` on quit.
    fn dispatch(&mut self, events: Vec<Event>) -> bool {
        for ev in events {
            match &ev {
                Event::Quit => {
                    self.panels.registry.broadcast(&ev);
                    return true;
                }
                Event::OpenChart { id } => {
                    match self.charts.open(id, &mut self.panels) {
                        Ok(follow_up) => self.bus.publish_all(follow_up),
                        Err(err) => tracing::warn!(chart = %id, error = %err, "open failed"),
                    }
                }
                Event::CloseChart { id } => {
                    match self.charts.close(id, &mut self.panels) {
                        Ok(follow_up) => self.bus.publish_all(follow_up),
                        Err(err) => tracing::warn!(chart = %id, error = %err, "close refused"),
                    }
                }
                Event::Sample(_) => {
                    if self.panels.registry.broadcast(&ev) {
                        self.state.delivered += 1;
                    } else {
                        self.state.dropped += 1;
                    }
                }
                _ => {
                    self.panels.registry.broadcast(&ev);
                }
            }
        }
        false
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn main() -> Result<()> {
    let (config, origin) = DashboardConfig::load()?;
    let log_buffer = logging::init(LogOptions {
        retention_days: config.log_retention_days,
    });
    tracing::info!(config = %origin, base_url = config.base_url(), "gpudash starting up");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("gpudash-poll")
        .build()
        .context("failed to start async runtime")?;

    let mut app = App::new(&config, &runtime, log_buffer)?;

    let mut terminal = setup_terminal()?;
    let res = run(&mut terminal, &mut app);
    restore_terminal(terminal)?;

    app.charts.shutdown();
    runtime.shutdown_timeout(Duration::from_millis(500));
    tracing::info!("gpudash stopped");
    res
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_interval = Duration::from_millis(100);
    let poll_timeout = Duration::from_millis(16);
    let mut last_tick = Instant::now();

    app.bus.publish(Event::OpenCharts { ids: Vec::new() });

    loop {
        // ── Sync logs from tracing into console ──
        app.sync_logs();

        // ── Render ──
        terminal.draw(|f| {
            let rects = dashboard_layout(f.area(), 7, 18);
            let active_id = app.panels.registry.active_id();
            let tabs = app
                .panels
                .registry
                .iter()
                .map(|m| Tab {
                    title: m.title(),
                    active: Some(m.id()) == active_id,
                })
                .collect();

            let (hud, pause) = match app.panels.registry.active() {
                Some(m) => (m.hud(), m.pause_state()),
                None => Default::default(),
            };
            let view = ShellView {
                tabs,
                status_line: &app.state.status_line,
                pause,
                hud_left: hud.left_lines,
                hud_right: hud.right_lines,
            };
            render_shell(f, rects, view, |f, hero_area| {
                app.panels.render_active(f, hero_area)
            });

            // Console overlay on top
            if app.console.visible {
                let counters = SampleCounters {
                    delivered: app.state.delivered,
                    dropped: app.state.dropped,
                };
                render_console(f, f.area(), &app.console, counters);
            }
        })?;

        // ── Poll → Publish ──
        if event::poll(poll_timeout)? {
            match event::read()? {
                CEvent::Key(key) => {
                    // Backtick or tilde always toggles the console
                    if key.code == KeyCode::Char('`') || key.code == KeyCode::Char('~') {
                        app.console.toggle();
                    } else if app.console.visible {
                        if app.handle_console_key(key) {
                            return Ok(());
                        }
                    } else {
                        app.handle_normal_key(key);
                    }
                }
                CEvent::Resize(cols, rows) => {
                    app.bus.publish(Event::Resize { cols, rows });
                }
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick_interval {
            last_tick = Instant::now();
            app.bus.publish(Event::Tick { now: last_tick });
        }

        app.collect_deliveries();

        // ── Drain → Broadcast ──
        let events = app.bus.drain();
        if app.dispatch(events) {
            return Ok(());
        }
    }
}
