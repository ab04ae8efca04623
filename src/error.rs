pub type PreloadResult<T> = Result<T, PreloadError>;

/// Errors raised while configuring the preloader or preparing a media source.
///
/// Nothing in here ever reaches the host while a session runs: media problems are
/// folded into [`crate::AssetOutcome::Errored`] at the probe boundary.
#[derive(thiserror::Error, Debug)]
pub enum PreloadError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("media error: {0}")]
    Media(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PreloadError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            PreloadError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(PreloadError::media("x").to_string().contains("media error:"));
        assert!(PreloadError::config("x").to_string().contains("config error:"));
        assert!(
            PreloadError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = PreloadError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
