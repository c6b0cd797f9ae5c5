//! Client error types.

/// Errors that end a client session abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Address the connection was attempted to.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },
    /// The nickname was empty after trimming the line ending.
    #[error("nickname must not be empty")]
    EmptyNickname,
    /// Reading input or writing to the server failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_error_names_the_address() {
        let err = ClientError::Connect {
            addr: "10.0.0.1:8080".into(),
            source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("failed to connect to 10.0.0.1:8080"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_error_converts() {
        let err: ClientError = std::io::Error::other("broken pipe").into();
        assert!(err.to_string().contains("broken pipe"));
    }
}
