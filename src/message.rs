use crate::host::{CommandSource, Host};
use std::fmt;

pub const PLAYERS_ONLY: &str = "autoshutdown.error.playersonly";
pub const NO_VOTE_IN_PROGRESS: &str = "autoshutdown.error.novoteinprogress";
pub const VOTE_IN_PROGRESS: &str = "autoshutdown.error.voteinprogress";
pub const TOO_SOON: &str = "autoshutdown.error.toosoon";
pub const NOT_ENOUGH_PLAYERS: &str = "autoshutdown.error.notenoughplayers";
pub const VOTING_DISABLED: &str = "autoshutdown.error.votingdisabled";
pub const UNKNOWN_ARGUMENT: &str = "autoshutdown.error.unknownargument";

pub const VOTE_BEGUN: &str = "autoshutdown.msg.votebegun";
pub const VOTE_CLEARED: &str = "autoshutdown.msg.votecleared";
pub const VOTE_RECORDED: &str = "autoshutdown.msg.voterecorded";
pub const USER_SHUTDOWN: &str = "autoshutdown.msg.usershutdown";

pub const FAIL_NOT_ENOUGH_PLAYERS: &str = "autoshutdown.fail.notenoughplayers";
pub const FAIL_MAX_NO_VOTES: &str = "autoshutdown.fail.maxnovotes";

/// English templates. `%s` placeholders are filled from the message arguments
/// in order.
const EN_US: &[(&str, &str)] = &[
    (PLAYERS_ONLY, "Only players can use this command"),
    (NO_VOTE_IN_PROGRESS, "There is no shutdown vote in progress"),
    (VOTE_IN_PROGRESS, "A shutdown vote is already in progress"),
    (
        TOO_SOON,
        "Too soon since the last shutdown vote; please wait %s seconds",
    ),
    (
        NOT_ENOUGH_PLAYERS,
        "Not enough players online for a shutdown vote; %s are required",
    ),
    (VOTING_DISABLED, "Shutdown voting is disabled on this server"),
    (UNKNOWN_ARGUMENT, "Unknown argument '%s'; use /shutdown, /shutdown yes or /shutdown no"),
    (
        VOTE_BEGUN,
        "A vote to shut down the server has begun! Vote with /shutdown yes or /shutdown no",
    ),
    (VOTE_CLEARED, "Your previous vote has been cleared"),
    (VOTE_RECORDED, "Your vote has been recorded"),
    (USER_SHUTDOWN, "Server shut down by player vote"),
    (
        FAIL_NOT_ENOUGH_PLAYERS,
        "Shutdown vote failed; not enough players are online",
    ),
    (FAIL_MAX_NO_VOTES, "Shutdown vote failed; too many players voted no"),
];

/// User-visible text, either already final or a key the host may localize
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Literal(String),
    Translatable {
        key: &'static str,
        args: Vec<String>,
    },
}

impl Message {
    pub fn literal<S: Into<String>>(text: S) -> Self {
        Message::Literal(text.into())
    }

    pub fn translatable(key: &'static str) -> Self {
        Message::Translatable {
            key,
            args: Vec::new(),
        }
    }

    pub fn with_arg<T: ToString>(self, arg: T) -> Self {
        match self {
            Message::Translatable { key, mut args } => {
                args.push(arg.to_string());
                Message::Translatable { key, args }
            }
            literal => literal,
        }
    }

    pub fn key(&self) -> Option<&'static str> {
        match self {
            Message::Translatable { key, .. } => Some(key),
            Message::Literal(_) => None,
        }
    }

    /// Render using the built-in English table
    pub fn text(&self) -> String {
        match self {
            Message::Literal(text) => text.clone(),
            Message::Translatable { key, args } => translate(key, args),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Look up `key` and substitute `args`; unknown keys render as the key itself
pub fn translate(key: &str, args: &[String]) -> String {
    let Some((_, template)) = EN_US.iter().find(|(k, _)| *k == key) else {
        return key.to_string();
    };

    let mut rendered = String::with_capacity(template.len());
    let mut args = args.iter();
    let mut pieces = template.split("%s");
    if let Some(first) = pieces.next() {
        rendered.push_str(first);
    }
    for piece in pieces {
        if let Some(arg) = args.next() {
            rendered.push_str(arg);
        }
        rendered.push_str(piece);
    }
    rendered
}

/// Broadcast a translatable message to everyone on the server
pub fn to_all(host: &dyn Host, key: &'static str) {
    host.broadcast(&Message::translatable(key));
}

/// Send a translatable message to a command source
pub fn to(source: &CommandSource, key: &'static str) {
    source.send(&Message::translatable(key));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_substitutes_arguments() {
        let message = Message::translatable(TOO_SOON).with_arg(42);
        assert_eq!(
            message.text(),
            "Too soon since the last shutdown vote; please wait 42 seconds"
        );
    }

    #[test]
    fn test_unknown_key_renders_as_key() {
        assert_eq!(translate("autoshutdown.nope", &[]), "autoshutdown.nope");
    }

    #[test]
    fn test_literal_ignores_arguments() {
        let message = Message::literal("Scheduled server shutdown").with_arg("x");
        assert_eq!(message.text(), "Scheduled server shutdown");
        assert_eq!(message.key(), None);
    }

    #[test]
    fn test_every_key_has_a_template() {
        for key in [
            PLAYERS_ONLY,
            NO_VOTE_IN_PROGRESS,
            VOTE_IN_PROGRESS,
            TOO_SOON,
            NOT_ENOUGH_PLAYERS,
            VOTING_DISABLED,
            UNKNOWN_ARGUMENT,
            VOTE_BEGUN,
            VOTE_CLEARED,
            VOTE_RECORDED,
            USER_SHUTDOWN,
            FAIL_NOT_ENOUGH_PLAYERS,
            FAIL_MAX_NO_VOTES,
        ] {
            assert_ne!(translate(key, &[]), key);
        }
    }
}
