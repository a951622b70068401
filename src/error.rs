use std::fmt;

use backtrace::Backtrace;
use failure::Fail;

/// What went wrong while parsing user input. Every variant is an expected
/// user-facing outcome rather than an internal fault.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// `name` does not match any registered (sub)command.
    CommandNotFound { name: String },
    /// A flag token names no argument of `command`.
    NonExistingArgument { command: String, argument: String },
    /// A required argument (or the value of a named argument) is missing.
    MissingArgument { command: String, argument: String },
    /// `value` could not be converted to the argument's type.
    IllegalValue {
        command: String,
        argument: String,
        value: String,
        reason: String,
    },
    /// `value` was converted but rejected by the argument's validator.
    ValidationFailure {
        command: String,
        argument: String,
        value: String,
    },
    /// A non-repeatable named argument appeared more than once.
    DuplicateArgument { command: String, argument: String },
    /// The issuer is not allowed to use `command`.
    NoPermission { command: String, issuer: String },
    /// A quoted span is still open at the end of the input.
    UnmatchedQuote { input: String },
}

impl ErrorKind {
    /// Incomplete input is recoverable while the user is still typing.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ErrorKind::UnmatchedQuote { .. } => true,
            _ => false,
        }
    }

    /// The command the error refers to, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            ErrorKind::CommandNotFound { .. } | ErrorKind::UnmatchedQuote { .. } => None,
            ErrorKind::NonExistingArgument { command, .. }
            | ErrorKind::MissingArgument { command, .. }
            | ErrorKind::IllegalValue { command, .. }
            | ErrorKind::ValidationFailure { command, .. }
            | ErrorKind::DuplicateArgument { command, .. }
            | ErrorKind::NoPermission { command, .. } => Some(command),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::CommandNotFound { name } => write!(f, "command not found: `{}'", name),
            ErrorKind::NonExistingArgument { command, argument } => {
                write!(f, "{}: unknown argument: `{}'", command, argument)
            }
            ErrorKind::MissingArgument { command, argument } => {
                write!(f, "{}: missing argument: `{}'", command, argument)
            }
            ErrorKind::IllegalValue {
                command,
                argument,
                value,
                reason,
            } => write!(
                f,
                "{}: illegal value `{}' for `{}': {}",
                command, value, argument, reason
            ),
            ErrorKind::ValidationFailure {
                command,
                argument,
                value,
            } => write!(f, "{}: invalid value `{}' for `{}'", command, value, argument),
            ErrorKind::DuplicateArgument { command, argument } => {
                write!(f, "{}: argument `{}' given more than once", command, argument)
            }
            ErrorKind::NoPermission { command, issuer } => {
                write!(f, "{}: permission denied for `{}'", command, issuer)
            }
            ErrorKind::UnmatchedQuote { input } => write!(f, "unmatched quote in `{}'", input),
        }
    }
}

/// An error returned by parsing. The backtrace is only captured when the
/// parser is configured to do so.
#[derive(Debug, Fail)]
#[fail(display = "{}", kind)]
pub struct CommandError {
    kind: ErrorKind,
    trace: Option<Backtrace>,
}

impl CommandError {
    pub fn new(kind: ErrorKind) -> CommandError {
        CommandError { kind, trace: None }
    }

    pub fn with_diagnostics(kind: ErrorKind, capture: bool) -> CommandError {
        CommandError {
            kind,
            trace: if capture { Some(Backtrace::new()) } else { None },
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind.is_recoverable()
    }

    /// The captured backtrace, if diagnostics were enabled.
    pub fn diagnostics(&self) -> Option<&Backtrace> {
        self.trace.as_ref()
    }

    /// Writes the error and its backtrace (if any) to the log.
    pub fn log_diagnostics(&self) {
        warn!("{}", self.kind);
        if let Some(trace) = &self.trace {
            crate::logger::prettify_backtrace(trace);
        }
    }
}

impl PartialEq for CommandError {
    fn eq(&self, other: &CommandError) -> bool {
        self.kind == other.kind
    }
}

impl From<ErrorKind> for CommandError {
    fn from(kind: ErrorKind) -> CommandError {
        CommandError::new(kind)
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// An invalid command or argument declaration, reported once while the
/// registry is being built.
#[derive(Debug, Fail, Clone, PartialEq)]
pub enum DefinitionError {
    #[fail(display = "command name must not be empty or contain whitespace: `{}'", name)]
    InvalidCommandName { name: String },
    #[fail(display = "command `{}' is already registered", name)]
    DuplicateCommand { name: String },
    #[fail(display = "{}: invalid argument name: `{}'", command, argument)]
    InvalidArgumentName { command: String, argument: String },
    #[fail(display = "{}: argument name `{}' is declared twice", command, argument)]
    DuplicateArgument { command: String, argument: String },
    #[fail(display = "{}: argument `{}': {}", command, argument, reason)]
    InvalidArgument {
        command: String,
        argument: String,
        reason: String,
    },
    #[fail(display = "invalid parser configuration: {}", reason)]
    InvalidConfig { reason: String },
}
