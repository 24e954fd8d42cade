use crate::host::{CommandSource, Host};
use crate::message::{self, Message};
use crate::vote::{VoteCoordinator, VoteError, VoteOutcome};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Shutdown voting is disabled")]
    Disabled,

    #[error("Unknown argument '{0}'")]
    UnknownArgument(String),

    #[error(transparent)]
    Vote(#[from] VoteError),
}

impl CommandError {
    pub fn message(&self) -> Message {
        match self {
            CommandError::Disabled => Message::translatable(message::VOTING_DISABLED),
            CommandError::UnknownArgument(arg) => {
                Message::translatable(message::UNKNOWN_ARGUMENT).with_arg(arg)
            }
            CommandError::Vote(err) => err.message(),
        }
    }
}

/// `/shutdown`, `/shutdown yes` and `/shutdown no`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCommand {
    Initiate,
    Vote(bool),
}

impl ShutdownCommand {
    pub const NAME: &'static str = "shutdown";

    /// Parse the arguments following the command name
    pub fn parse(args: &str) -> Result<Self, CommandError> {
        match args.trim().to_ascii_lowercase().as_str() {
            "" => Ok(ShutdownCommand::Initiate),
            "yes" => Ok(ShutdownCommand::Vote(true)),
            "no" => Ok(ShutdownCommand::Vote(false)),
            other => Err(CommandError::UnknownArgument(other.to_string())),
        }
    }

    /// Parse a whole command line such as `/shutdown yes`. Returns `None`
    /// when the line is some other command.
    pub fn parse_line(line: &str) -> Option<Result<Self, CommandError>> {
        let line = line.trim();
        let line = line.strip_prefix('/').unwrap_or(line);
        let (name, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        if !name.eq_ignore_ascii_case(Self::NAME) {
            return None;
        }
        Some(Self::parse(args))
    }

    pub fn execute(
        self,
        votes: &mut VoteCoordinator,
        host: &dyn Host,
        source: &CommandSource,
    ) -> Result<VoteOutcome, CommandError> {
        debug!("{:?} issued {:?}", source, self);
        let outcome = match self {
            ShutdownCommand::Initiate => votes.initiate_vote(host, source)?,
            ShutdownCommand::Vote(choice) => votes.cast_vote(host, source, choice)?,
        };
        Ok(outcome)
    }
}
