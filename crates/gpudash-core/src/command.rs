use std::collections::HashMap;
use std::time::Instant;

use crate::bus::EventBus;
use crate::console::Console;
use crate::event::Event;
use crate::registry::ModuleRegistry;
use crate::state::format_uptime;

/// Output from a command execution.
pub enum CommandOutput {
    /// Lines to display in the console.
    Lines(Vec<String>),
    /// Signal that the app should quit.
    Quit,
}

/// A chart the shell knows how to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartInfo {
    pub id: &'static str,
    pub title: &'static str,
    /// Normal-mode key that opens or focuses it.
    pub key: char,
}

/// Context available to commands during execution.
///
/// Commands never open, close or pause charts directly; they publish the
/// request on the bus so it goes through the same path as a key press.
pub struct CommandContext<'a> {
    pub registry: &'a mut ModuleRegistry,
    pub console: &'a mut Console,
    pub bus: &'a mut EventBus,
    pub catalog: &'a [ChartInfo],
    pub started_at: Instant,
    pub delivered: u64,
    pub dropped: u64,
}

impl CommandContext<'_> {
    fn lookup_chart(&self, id: &str) -> Option<&ChartInfo> {
        self.catalog.iter().find(|c| c.id == id)
    }
}

/// A console command.
pub trait Command: Send + Sync {
    fn name(&self) -> &str;
    fn aliases(&self) -> &[&str] { &[] }
    fn description(&self) -> &str;
    fn usage(&self) -> &str { self.name() }
    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput;
}

/// Registry of console commands.
pub struct CommandRegistry {
    commands: Vec<Box<dyn Command>>,
    lookup: HashMap<String, usize>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn register(&mut self, cmd: Box<dyn Command>) {
        let idx = self.commands.len();
        self.lookup.insert(cmd.name().to_string(), idx);
        for alias in cmd.aliases() {
            self.lookup.insert(alias.to_string(), idx);
        }
        self.commands.push(cmd);
    }

    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandOutput {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((&name, args)) = parts.split_first() else {
            return CommandOutput::Lines(vec![]);
        };

        match self.lookup.get(name) {
            Some(&idx) => self.commands[idx].execute(args, ctx),
            None => CommandOutput::Lines(vec![
                format!("unknown command: '{}'. Type 'help' for available commands.", name),
            ]),
        }
    }

    /// One line per command, for `help`.
    pub fn help_lines(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|cmd| {
                let aliases = cmd.aliases();
                if aliases.is_empty() {
                    format!("  {:14} {}", cmd.usage(), cmd.description())
                } else {
                    format!(
                        "  {:14} {} (aliases: {})",
                        cmd.usage(),
                        cmd.description(),
                        aliases.join(", ")
                    )
                }
            })
            .collect()
    }

    pub fn commands(&self) -> &[Box<dyn Command>] {
        &self.commands
    }
}

// ── Built-in commands ──

pub struct ClearCommand;

impl Command for ClearCommand {
    fn name(&self) -> &str { "clear" }
    fn aliases(&self) -> &[&str] { &["cls"] }
    fn description(&self) -> &str { "Clear console log" }

    fn execute(&self, _args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        ctx.console.clear_logs();
        CommandOutput::Lines(vec![])
    }
}

pub struct ChartsCommand;

impl Command for ChartsCommand {
    fn name(&self) -> &str { "charts" }
    fn aliases(&self) -> &[&str] { &["ls"] }
    fn description(&self) -> &str { "List charts; * active, + open" }

    fn execute(&self, _args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let active = ctx.registry.active_id();
        let lines = ctx
            .catalog
            .iter()
            .map(|c| {
                let marker = match ctx.registry.get(c.id) {
                    Some(_) if active == Some(c.id) => "*",
                    Some(_) => "+",
                    None => " ",
                };
                let state = ctx
                    .registry
                    .get(c.id)
                    .and_then(|m| m.pause_state())
                    .map(|s| format!(" [{s}]"))
                    .unwrap_or_default();
                format!(" {marker} [{}] {:16} {}{}", c.key, c.id, c.title, state)
            })
            .collect();
        CommandOutput::Lines(lines)
    }
}

pub struct OpenCommand;

impl Command for OpenCommand {
    fn name(&self) -> &str { "open" }
    fn aliases(&self) -> &[&str] { &["o", "focus"] }
    fn description(&self) -> &str { "Open a chart, or focus it if open" }
    fn usage(&self) -> &str { "open <chart>" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let Some(&id) = args.first() else {
            return CommandOutput::Lines(vec!["usage: open <chart>".into()]);
        };
        match ctx.lookup_chart(id) {
            Some(info) => {
                let line = if ctx.registry.contains(id) {
                    format!("Focusing {}", info.title)
                } else {
                    format!("Opening {}", info.title)
                };
                ctx.bus.publish(Event::OpenChart { id: id.to_string() });
                CommandOutput::Lines(vec![line])
            }
            None => CommandOutput::Lines(vec![format!(
                "error: unknown chart '{id}'. Type 'charts' to list them."
            )]),
        }
    }
}

pub struct CloseCommand;

impl Command for CloseCommand {
    fn name(&self) -> &str { "close" }
    fn description(&self) -> &str { "Close a chart (default: active)" }
    fn usage(&self) -> &str { "close [chart]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let Some(id) = target_id(args, ctx) else {
            return CommandOutput::Lines(vec!["error: no chart is active".into()]);
        };
        match ctx.registry.get(&id) {
            Some(m) if !m.closable() => {
                CommandOutput::Lines(vec![format!("error: {} cannot be closed", m.title())])
            }
            Some(_) => {
                ctx.bus.publish(Event::CloseChart { id: id.clone() });
                CommandOutput::Lines(vec![format!("Closing {id}")])
            }
            None => CommandOutput::Lines(vec![format!("error: chart '{id}' is not open")]),
        }
    }
}

pub struct PauseCommand;

impl Command for PauseCommand {
    fn name(&self) -> &str { "pause" }
    fn aliases(&self) -> &[&str] { &["resume", "p"] }
    fn description(&self) -> &str { "Toggle pause on a chart (default: active)" }
    fn usage(&self) -> &str { "pause [chart]" }

    fn execute(&self, args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        let Some(id) = target_id(args, ctx) else {
            return CommandOutput::Lines(vec!["error: no chart is active".into()]);
        };
        match ctx.registry.get(&id).map(|m| m.pause_state()) {
            Some(Some(state)) => {
                ctx.bus.publish(Event::TogglePause { id: id.clone() });
                CommandOutput::Lines(vec![format!("{id}: {} -> {}", state, state.toggled())])
            }
            Some(None) => CommandOutput::Lines(vec![format!("error: {id} cannot be paused")]),
            None => CommandOutput::Lines(vec![format!("error: chart '{id}' is not open")]),
        }
    }
}

fn target_id(args: &[&str], ctx: &CommandContext) -> Option<String> {
    args.first()
        .map(|s| s.to_string())
        .or_else(|| ctx.registry.active_id().map(str::to_string))
}

pub struct StatusCommand;

impl Command for StatusCommand {
    fn name(&self) -> &str { "status" }
    fn aliases(&self) -> &[&str] { &["uptime"] }
    fn description(&self) -> &str { "Show uptime and sample counters" }

    fn execute(&self, _args: &[&str], ctx: &mut CommandContext) -> CommandOutput {
        CommandOutput::Lines(vec![
            format!("Uptime: {}", format_uptime(ctx.started_at.elapsed())),
            format!("Open panels: {}", ctx.registry.len()),
            format!("Samples delivered: {}  dropped: {}", ctx.delivered, ctx.dropped),
        ])
    }
}

pub struct QuitCommand;

impl Command for QuitCommand {
    fn name(&self) -> &str { "quit" }
    fn aliases(&self) -> &[&str] { &["exit", "q"] }
    fn description(&self) -> &str { "Exit gpudash" }

    fn execute(&self, _args: &[&str], _ctx: &mut CommandContext) -> CommandOutput {
        CommandOutput::Quit
    }
}

/// Create a CommandRegistry pre-loaded with all built-in commands.
///
/// `help` is not a registered command; the shell answers it from
/// [`CommandRegistry::help_lines`].
pub fn builtin_registry() -> CommandRegistry {
    let mut reg = CommandRegistry::new();
    reg.register(Box::new(ClearCommand));
    reg.register(Box::new(ChartsCommand));
    reg.register(Box::new(OpenCommand));
    reg.register(Box::new(CloseCommand));
    reg.register(Box::new(PauseCommand));
    reg.register(Box::new(StatusCommand));
    reg.register(Box::new(QuitCommand));
    reg
}
