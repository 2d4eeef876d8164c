//! Gateway error types.

use promptgate_core::ScanError;

/// Invalid or missing process configuration. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// One or more required secrets are unset or blank.
    #[error("missing required environment variable(s): {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),

    /// A setting has an unusable value.
    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    /// The configuration file or environment overrides could not be read.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Failure of the downstream generation call after an allow verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// The request never produced an HTTP answer.
    #[error("generation request failed: {0}")]
    Request(String),

    /// The generation API answered with a non-success status.
    #[error("generation API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The reply contained no text.
    #[error("generation API returned an empty reply")]
    EmptyReply,

    /// The reply could not be decoded.
    #[error("generation response was malformed: {0}")]
    Malformed(String),
}

/// Errors raised while assembling a gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("scan client error: {0}")]
    Scan(#[from] ScanError),

    #[error("generation client error: {0}")]
    Generation(#[from] GenerationError),

    /// A required component was not supplied to the builder.
    #[error("gateway is missing a component: {0}")]
    MissingComponent(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variables_are_named() {
        let err = ConfigError::MissingVariables(vec![
            "PANW_AI_SEC_API_KEY",
            "OPENAI_API_KEY",
        ]);
        assert_eq!(
            err.to_string(),
            "missing required environment variable(s): PANW_AI_SEC_API_KEY, OPENAI_API_KEY"
        );
    }

    #[test]
    fn test_gateway_error_wraps_config() {
        let err: GatewayError = ConfigError::InvalidSetting {
            key: "scan.timeout_secs",
            reason: "must be greater than zero".to_string(),
        }
        .into();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains("scan.timeout_secs"));
    }
}
