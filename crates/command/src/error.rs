//! Errors raised while parsing commands and loading scenes.

use fieldgraph_core::ConstructionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Parse error on line {line}: {detail}")]
    Parse { line: usize, detail: String },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Unknown curve: {0}")]
    UnknownCurve(String),

    #[error("Unknown time keeper: {0}")]
    UnknownTimeKeeper(String),

    #[error("Construction error: {0}")]
    Construction(#[from] ConstructionError),

    #[error("Scene parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to read scene: {0}")]
    Io(#[from] std::io::Error),
}

impl CommandError {
    pub(crate) fn parse(detail: impl Into<String>) -> Self {
        Self::Parse {
            line: 1,
            detail: detail.into(),
        }
    }

    /// Attribute a parse error to `line` of a multi-command input.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            Self::Parse { detail, .. } => Self::Parse { line, detail },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_line_only_touches_parse_errors() {
        let err = CommandError::parse("bad token").at_line(7);
        assert_eq!(err.to_string(), "Parse error on line 7: bad token");
        let err = CommandError::UnknownField("x".into()).at_line(7);
        assert_eq!(err.to_string(), "Unknown field: x");
    }
}
