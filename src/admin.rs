//! Shared-password gate for the admin surface.
//!
//! This is a prototype gate, not authentication: one static credential
//! compared by exact string equality.

use crate::config::AdminConfig;

#[derive(Debug, Clone)]
pub struct AdminGate {
    password: String,
    authenticated: bool,
}

impl AdminGate {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
            authenticated: false,
        }
    }

    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.password.clone())
    }

    /// Try a password. Returns whether the session is now authenticated.
    pub fn login(&mut self, attempt: &str) -> bool {
        self.authenticated = !self.password.is_empty() && attempt == self.password;
        if self.authenticated {
            tracing::info!("Admin session opened");
        } else {
            tracing::warn!("Admin login rejected");
        }
        self.authenticated
    }

    pub fn logout(&mut self) {
        self.authenticated = false;
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        let mut gate = AdminGate::new("admin123");
        assert!(!gate.login("Admin123"));
        assert!(!gate.login("admin123 "));
        assert!(!gate.is_authenticated());

        assert!(gate.login("admin123"));
        assert!(gate.is_authenticated());

        gate.logout();
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn test_failed_attempt_ends_session() {
        let mut gate = AdminGate::new("secret");
        assert!(gate.login("secret"));
        assert!(!gate.login("wrong"));
        assert!(!gate.is_authenticated());
    }

    #[test]
    fn test_empty_password_never_matches() {
        let mut gate = AdminGate::new("");
        assert!(!gate.login(""));
    }

    #[test]
    fn test_default_config_password() {
        let mut gate = AdminGate::from_config(&AdminConfig::default());
        assert!(gate.login("admin123"));
    }
}
