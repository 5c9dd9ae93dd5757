use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub project: ProjectConfig,
    pub auth: AuthConfig,
    pub demo: DemoConfig,
    pub visitors: VisitorConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Where the backend lives and the public key clients present to reach it.
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_seconds: i64,
}

/// Offline/demo identity. Off unless explicitly enabled.
#[derive(Debug, Deserialize, Clone)]
pub struct DemoConfig {
    pub enabled: bool,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisitorConfig {
    pub idle_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Self::builder()?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Defaults only, no file or environment. Used by tests.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::builder()?.build()?.try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("project.url", "sqlite://farm-chef.db?mode=rwc")?
            .set_default("project.anon_key", "farm-chef-anon-key")?
            .set_default("auth.jwt_secret", "change-me-in-production")?
            .set_default("auth.session_ttl_seconds", 3600)?
            .set_default("demo.enabled", false)?
            .set_default("demo.email", "chef@farmesilla.com")?
            .set_default("demo.password", "FARM1840!")?
            .set_default("visitors.idle_ttl_seconds", 60 * 60 * 12)?
            .set_default("visitors.sweep_interval_seconds", 300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_load() {
        let settings = Settings::defaults().unwrap();
        assert_eq!(settings.server.port, 3000);
        assert!(!settings.demo.enabled);
        assert_eq!(settings.auth.session_ttl_seconds, 3600);
    }
}
