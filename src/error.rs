//! Frame graph error types.

/// Errors that can occur during graph construction or compilation.
///
/// Usage mistakes (missing `end_pass`, bad handles, ...) do not surface here;
/// they are reported through the [`ValidationSink`](crate::validation::ValidationSink)
/// so a degraded-but-functional graph can still execute.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The graph contains a cyclic pass dependency.
    #[error("frame graph contains cyclic dependency")]
    CyclicDependency,
    /// A frame graph build is already in progress on this device.
    #[error("a frame graph build is already in progress")]
    BuildInProgress,
    /// An operation required an active build but none was open.
    #[error("no frame graph build is active")]
    NoActiveBuild,
    /// A resource handle did not resolve (wrong registry or stale generation).
    #[error("invalid or stale resource handle")]
    InvalidHandle,
    /// A resource could not be created.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            GraphError::CyclicDependency.to_string(),
            "frame graph contains cyclic dependency"
        );
        assert_eq!(
            GraphError::ResourceCreationFailed("zero extent".into()).to_string(),
            "resource creation failed: zero extent"
        );
    }
}
