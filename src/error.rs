use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// A bulk entry point that only runs on a specific instruction set was
    /// called on a machine (or with a [`Capabilities`](crate::Capabilities)
    /// value) that does not advertise it. Nothing was written.
    UnsupportedHardware {
        operation: &'static str,
        required: &'static str,
    },
}

impl ConvertError {
    pub(crate) const fn unsupported(operation: &'static str, required: &'static str) -> Self {
        Self::UnsupportedHardware {
            operation,
            required,
        }
    }

    /// Name of the entry point that refused to run.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::UnsupportedHardware { operation, .. } => *operation,
        }
    }

    /// Instruction-set extension the refused entry point needs.
    pub fn required_feature(&self) -> &'static str {
        match self {
            Self::UnsupportedHardware { required, .. } => *required,
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedHardware {
                operation,
                required,
            } => write!(
                f,
                "{operation} requires {required}, which is not supported on this machine"
            ),
        }
    }
}

impl std::error::Error for ConvertError {}

pub type ConvertResult<T> = Result<T, ConvertError>;
