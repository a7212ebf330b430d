use serde::Serialize;
use std::fmt;

pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_ENVIRONMENT: &str = "ERR_ENVIRONMENT";
pub const ERR_DEVICE: &str = "ERR_DEVICE";
pub const ERR_PARSE: &str = "ERR_PARSE";
pub const ERR_DEPENDENCY: &str = "ERR_DEPENDENCY";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    /// The adb executable could not be located or started.
    pub fn environment(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_ENVIRONMENT, message, trace_id)
    }

    /// The requested device is not in the current listing.
    pub fn device(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DEVICE, message, trace_id)
    }

    /// adb output did not have the expected shape.
    pub fn parse(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_PARSE, message, trace_id)
    }

    pub fn dependency(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DEPENDENCY, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }

    pub fn exit_code(&self) -> u8 {
        match self.code.as_str() {
            ERR_VALIDATION => 2,
            ERR_ENVIRONMENT => 3,
            ERR_DEVICE => 4,
            ERR_PARSE => 5,
            ERR_DEPENDENCY => 6,
            _ => 1,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
