use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Entry not found: {path}")]
    NotFound { path: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unsupported environment: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// True for errors that mean "the entry is not there", as opposed to
    /// errors raised while trying to reach it.
    pub fn is_not_found(&self) -> bool {
        match self {
            BridgeError::NotFound { .. } => true,
            BridgeError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            BridgeError::PermissionDenied(_) => true,
            BridgeError::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        let err = BridgeError::NotFound {
            path: "MUSIC/a.mp3".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_permission_denied());

        let io = BridgeError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(io.is_not_found());
    }

    #[test]
    fn test_permission_classification() {
        let io = BridgeError::Io(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
        assert!(io.is_permission_denied());
        assert!(!BridgeError::OperationFailed("x".into()).is_permission_denied());
    }
}
