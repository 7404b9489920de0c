use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("required tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("cannot read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no `{field}` field in input")]
    MissingField { field: String },

    #[error("label `{label}` not found in output")]
    LabelNotFound { label: String },

    #[error("cannot parse {field} from {value:?}")]
    ParseFailure { field: String, value: String },

    #[error("{numerator} cannot be split across zero processors")]
    DivisionByZero { numerator: String },
}

impl ProbeError {
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        ProbeError::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn parse_failure(field: impl Into<String>, value: impl Into<String>) -> Self {
        ProbeError::ParseFailure {
            field: field.into(),
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;
