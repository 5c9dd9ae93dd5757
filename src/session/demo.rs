//! Offline/demo identity.
//!
//! A fixed credential pair that signs in locally, without the backend ever
//! seeing it. There is no cryptographic backing: anyone who knows the pair
//! gets a chef identity. It is disabled unless `demo.enabled` is set, and
//! every use is logged at warn level.

use crate::config::DemoConfig;
use crate::session::{Identity, IdentityOrigin};

pub const DEMO_USER_ID: &str = "backup-chef-user";
pub const DEMO_ROLE: &str = "chef";

#[derive(Debug, Clone)]
pub struct DemoIdentity {
    email: String,
    password: String,
}

impl DemoIdentity {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &DemoConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(&config.email, &config.password))
    }

    /// Exact, case-sensitive match on both halves of the pair.
    pub fn matches(&self, email: &str, password: &str) -> bool {
        email == self.email && password == self.password
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: DEMO_USER_ID.to_string(),
            email: self.email.clone(),
            role: Some(DEMO_ROLE.to_string()),
            origin: IdentityOrigin::Demo,
        }
    }
}
