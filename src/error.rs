use serde::{Deserialize, Serialize};
use std::{error::Error, fmt, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    Precondition,
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViralflowError {
    pub code: ErrorCode,
    pub message: String,
}

impl ViralflowError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Precondition, message)
    }

    pub fn read(path: &Path, err: std::io::Error) -> Self {
        Self::new(
            ErrorCode::Io,
            format!("Could not read '{}': {err}", path.display()),
        )
    }

    pub fn write(path: &Path, err: std::io::Error) -> Self {
        Self::new(
            ErrorCode::Io,
            format!("Could not write '{}': {err}", path.display()),
        )
    }

    pub fn parse_json(path: &Path, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("Could not parse JSON '{}': {err}", path.display()),
        )
    }
}

impl fmt::Display for ViralflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for ViralflowError {}

impl From<serde_json::Error> for ViralflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorCode::Internal, format!("Could not serialize JSON: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ViralflowError>;
