use clap::{Parser, Subcommand, ValueEnum};
use guide_console_core::Command;

/// One line typed at the operator prompt.
#[derive(Parser, Debug)]
#[command(name = "console", no_binary_name = true, disable_version_flag = true)]
struct PromptLine {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Start the tour at the robot's current stop
    Start,
    /// Stop the tour and cancel any pending move
    Stop,
    /// Move on to the next stop
    Next,
    /// Open the voice session for visitor questions
    Ask,
    /// End questions and move on to the next stop
    Done,
    /// Play the current stop's audio again
    Replay,
    /// Turn simulation mode on or off
    Sim {
        #[arg(value_enum)]
        mode: Switch,
    },
    /// Connect the voice session
    Connect,
    /// Disconnect the voice session
    Disconnect,
    /// Toggle the microphone (only while connected)
    Mic,
    /// Clear both transcripts
    Clear,
    /// Clear the error log
    ClearErrors,
    /// Show the robot telemetry dashboard
    Telemetry,
    /// Show the full console state
    Status,
    /// Leave the console
    Quit,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

/// What the prompt loop should do with a line.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Console(Command),
    Telemetry,
    Status,
    Quit,
}

/// Parse one prompt line. Blank lines yield `None`; anything clap rejects
/// (including `help`) comes back as its rendered message.
pub fn parse(line: &str) -> Result<Option<Input>, clap::Error> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return Ok(None);
    }
    let parsed = PromptLine::try_parse_from(words)?;
    let input = match parsed.action {
        Action::Start => Input::Console(Command::Start),
        Action::Stop => Input::Console(Command::Stop),
        Action::Next => Input::Console(Command::NextBase),
        Action::Ask => Input::Console(Command::AskQuestions),
        Action::Done => Input::Console(Command::FinishQuestions),
        Action::Replay => Input::Console(Command::ReplayAudio),
        Action::Sim { mode } => Input::Console(Command::SetSimulation(matches!(mode, Switch::On))),
        Action::Connect => Input::Console(Command::Connect),
        Action::Disconnect => Input::Console(Command::Disconnect),
        Action::Mic => Input::Console(Command::ToggleMic),
        Action::Clear => Input::Console(Command::ClearTranscripts),
        Action::ClearErrors => Input::Console(Command::ClearErrors),
        Action::Telemetry => Input::Telemetry,
        Action::Status => Input::Status,
        Action::Quit => Input::Quit,
    };
    Ok(Some(input))
}
