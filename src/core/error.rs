use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Rejected before any trial runs. `field` uses the external camelCase name.
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

impl SimulationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        SimulationError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            SimulationError::InvalidParameter { field, .. } => *field,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulationError>;
