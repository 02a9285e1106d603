//! Stdin line parsing.

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Plain text, sent as an instant message.
    Text(String),
    /// Feed text to the local recognizer as if it had been spoken.
    Say(String),
    MuteAll(bool),
    Lock(bool),
    Nick(String),
    Start,
    Stop,
    Participants,
    /// Reconnect to the room after it dropped.
    Rejoin,
    Leave,
    Help,
    Unknown(String),
}

pub const HELP: &str = "\
/start            start transcribing
/stop             stop transcribing
/say <text>       speak <text> into the recognizer
/nick <name>      change nickname
/mute-all         mute everyone else (host)
/unmute-all       unmute everyone else (host)
/lock, /unlock    lock or unlock the room (host)
/who              list participants
/rejoin           reconnect after the room connection dropped
/leave            leave and exit
<text>            send an instant message";

/// Parse one line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Input::Text(line.to_string()));
    };

    let (command, arg) = match rest.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (rest, ""),
    };
    let input = match (command, arg) {
        ("start", _) => Input::Start,
        ("stop", _) => Input::Stop,
        ("say", text) if !text.is_empty() => Input::Say(text.to_string()),
        ("nick", name) if !name.is_empty() => Input::Nick(name.to_string()),
        ("mute-all", _) => Input::MuteAll(true),
        ("unmute-all", _) => Input::MuteAll(false),
        ("lock", _) => Input::Lock(true),
        ("unlock", _) => Input::Lock(false),
        ("who", _) => Input::Participants,
        ("rejoin", _) => Input::Rejoin,
        ("leave" | "quit", _) => Input::Leave,
        ("help", _) => Input::Help,
        _ => Input::Unknown(line.to_string()),
    };
    Some(input)
}
