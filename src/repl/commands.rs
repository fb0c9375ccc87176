use crate::command::Integration;
use crate::error::{AppError, AppResult};
use crate::workflow::WorkflowStore;

/// A step given on the command line. Matched against step ids first, then
/// read as a 1-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRef(pub String);

impl StepRef {
    fn parse(arg: &str) -> Self {
        StepRef(arg.to_string())
    }

    /// Resolve against the open plan.
    pub fn resolve(&self, store: &WorkflowStore) -> AppResult<String> {
        if let Some(step) = store.step(&self.0) {
            return Ok(step.id);
        }
        match self.0.parse::<usize>() {
            Ok(n) => store
                .step_id_at(n)
                .ok_or_else(|| AppError::NotFound(format!("no step with id or position {n}"))),
            Err(_) => Err(AppError::NotFound(format!("step '{}'", self.0))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Search(String),
    Smart(String),
    Research(String),
    /// `None` toggles.
    Agent(Option<bool>),
    Plan,
    /// `None` runs the current step.
    Run(Option<StepRef>),
    Skip(StepRef),
    /// Target is a 1-based position.
    Move(StepRef, usize),
    Context(StepRef),
    Close,
    Hint(String),
    Help(Option<Integration>),
    Quit,
}

pub const HELP: &str = "\
Type a message to chat, or use an integration command:
  @docs <tool> key:value ...      Google Docs
  @gmail <tool> key:value ...     Gmail
  @calendar <tool> key:value ...  Google Calendar

Slash commands:
  /search <query>        web search
  /smart <query>         smart search
  /research <query>      deep research
  /agent [on|off]        toggle workflow planning for chat messages
  /plan                  show the open workflow
  /run [step]            run a step (default: current step)
  /skip <step>           mark a step skipped
  /move <step> <pos>     move a step to a 1-based position
  /context <step>        make a step the current one
  /close                 discard the open workflow
  /hint <partial>        suggest what to type next for an @ command
  /help [docs|gmail|calendar]
  /quit

A <step> is a step id or its position in the plan.";

/// Parse a `/command`. Returns `None` for lines that are not slash commands.
pub fn parse_slash(line: &str) -> Option<AppResult<SlashCommand>> {
    let line = line.trim();
    let body = line.strip_prefix('/')?;
    let (name, rest) = match body.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (body, ""),
    };
    Some(parse_named(name, rest))
}

fn parse_named(name: &str, rest: &str) -> AppResult<SlashCommand> {
    let args: Vec<&str> = rest.split_whitespace().collect();
    match name {
        "search" => Ok(SlashCommand::Search(required_text(name, rest)?)),
        "smart" => Ok(SlashCommand::Smart(required_text(name, rest)?)),
        "research" => Ok(SlashCommand::Research(required_text(name, rest)?)),
        "hint" => Ok(SlashCommand::Hint(required_text(name, rest)?)),
        "agent" => match args.as_slice() {
            [] => Ok(SlashCommand::Agent(None)),
            ["on"] => Ok(SlashCommand::Agent(Some(true))),
            ["off"] => Ok(SlashCommand::Agent(Some(false))),
            _ => Err(usage("/agent [on|off]")),
        },
        "plan" => Ok(SlashCommand::Plan),
        "run" => match args.as_slice() {
            [] => Ok(SlashCommand::Run(None)),
            [step] => Ok(SlashCommand::Run(Some(StepRef::parse(step)))),
            _ => Err(usage("/run [step]")),
        },
        "skip" => match args.as_slice() {
            [step] => Ok(SlashCommand::Skip(StepRef::parse(step))),
            _ => Err(usage("/skip <step>")),
        },
        "context" => match args.as_slice() {
            [step] => Ok(SlashCommand::Context(StepRef::parse(step))),
            _ => Err(usage("/context <step>")),
        },
        "move" => match args.as_slice() {
            [step, position] => {
                let position = position.parse::<usize>().map_err(|_| usage("/move <step> <position>"))?;
                Ok(SlashCommand::Move(StepRef::parse(step), position))
            }
            _ => Err(usage("/move <step> <position>")),
        },
        "close" => Ok(SlashCommand::Close),
        "help" => match args.as_slice() {
            [] => Ok(SlashCommand::Help(None)),
            [name] => Integration::from_name(name)
                .map(|i| SlashCommand::Help(Some(i)))
                .ok_or_else(|| usage("/help [docs|gmail|calendar]")),
            _ => Err(usage("/help [docs|gmail|calendar]")),
        },
        "quit" | "exit" => Ok(SlashCommand::Quit),
        other => Err(AppError::Validation(format!("Unknown command '/{other}'. Type /help for a list."))),
    }
}

fn required_text(name: &str, rest: &str) -> AppResult<String> {
    if rest.is_empty() {
        return Err(usage(&format!("/{name} <text>")));
    }
    Ok(rest.to_string())
}

fn usage(text: &str) -> AppError {
    AppError::Validation(format!("Usage: {text}"))
}
