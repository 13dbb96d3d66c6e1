//! Community scope gate.
//!
//! Rules:
//! - Deployment unscoped (no configured community) → allow every request
//! - Request unscoped (no community claimed) → allow
//! - Both scoped → allow only when they are equal
//!
//! The configured value is trimmed once at construction. The requested value
//! is compared as sent: only a missing or empty claim counts as unscoped.

use curator_config::AppConfig;
use tracing::warn;

/// A request claimed a community other than the one this deployment serves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Community mismatch: this agent serves '{configured}', request targets '{requested}'")]
pub struct ScopeMismatch {
    pub configured: String,
    pub requested: String,
}

/// Enforces the configured community scope on incoming requests.
#[derive(Debug, Clone, Default)]
pub struct RequestGate {
    configured: String,
}

impl RequestGate {
    pub fn new(configured: impl Into<String>) -> Self {
        Self {
            configured: configured.into().trim().to_string(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.community_id.as_str())
    }

    /// The community this deployment is pinned to, if any.
    pub fn configured_scope(&self) -> Option<&str> {
        if self.configured.is_empty() {
            None
        } else {
            Some(&self.configured)
        }
    }

    /// Check a request's claimed community against the configured one.
    pub fn check(&self, requested: Option<&str>) -> Result<(), ScopeMismatch> {
        let requested = requested.unwrap_or_default();

        if self.configured.is_empty() || requested.is_empty() || requested == self.configured {
            return Ok(());
        }

        warn!(
            configured = %self.configured,
            requested = %requested,
            "Rejected request for another community"
        );
        Err(ScopeMismatch {
            configured: self.configured.clone(),
            requested: requested.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_scope_allowed() {
        let gate = RequestGate::new("dao-1");
        assert!(gate.check(Some("dao-1")).is_ok());
    }

    #[test]
    fn mismatched_scope_denied() {
        let gate = RequestGate::new("dao-1");
        let err = gate.check(Some("dao-2")).unwrap_err();
        assert_eq!(err.configured, "dao-1");
        assert_eq!(err.requested, "dao-2");
        assert!(err.to_string().contains("dao-2"));
    }

    #[test]
    fn unscoped_deployment_allows_everything() {
        let gate = RequestGate::default();
        assert!(gate.configured_scope().is_none());
        assert!(gate.check(Some("anything")).is_ok());
        assert!(gate.check(None).is_ok());
    }

    #[test]
    fn unscoped_request_allowed() {
        let gate = RequestGate::new("dao-1");
        assert!(gate.check(None).is_ok());
        assert!(gate.check(Some("")).is_ok());
    }

    #[test]
    fn configured_scope_is_trimmed() {
        let gate = RequestGate::new(" dao-1\n");
        assert_eq!(gate.configured_scope(), Some("dao-1"));
        assert!(gate.check(Some("dao-1")).is_ok());
    }

    #[test]
    fn requested_scope_is_compared_as_sent() {
        let gate = RequestGate::new("dao-1");
        let err = gate.check(Some("   ")).unwrap_err();
        assert_eq!(err.requested, "   ");
        assert!(gate.check(Some(" dao-1")).is_err());
        assert!(gate.check(Some("dao-1 ")).is_err());
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let gate = RequestGate::new("dao-1");
        assert!(gate.check(Some("DAO-1")).is_err());
    }

    #[test]
    fn built_from_config() {
        let config = AppConfig {
            community_id: "guild".into(),
            ..AppConfig::default()
        };
        let gate = RequestGate::from_config(&config);
        assert_eq!(gate.configured_scope(), Some("guild"));
    }
}
