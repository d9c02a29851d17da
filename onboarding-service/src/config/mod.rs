use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct OnboardingConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub keycloak: KeycloakConfig,
    pub token: TokenVerificationConfig,
    pub smtp: SmtpConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Realm, client and admin credentials for the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct KeycloakConfig {
    pub auth_server_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub admin_username: String,
    pub admin_password: SecretString,
    pub request_timeout_seconds: u64,
    pub admin_refresh_seconds: u64,
}

impl KeycloakConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn admin_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.admin_refresh_seconds)
    }

    /// `{base}/realms/{realm}/protocol/openid-connect/token`
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.auth_server_url.trim_end_matches('/'),
            self.realm
        )
    }

    /// `{base}/admin/realms/{realm}`
    pub fn admin_realm_url(&self) -> String {
        format!(
            "{}/admin/realms/{}",
            self.auth_server_url.trim_end_matches('/'),
            self.realm
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenVerificationConfig {
    /// Realm public key, either the bare base64 body or a full PEM block.
    pub public_key: String,
    pub issuer: String,
    pub audience: Vec<String>,
}

impl TokenVerificationConfig {
    pub fn public_key_pem(&self) -> String {
        let key = self.public_key.trim();
        if key.starts_with("-----BEGIN") {
            key.to_string()
        } else {
            format!("-----BEGIN PUBLIC KEY-----\n{}\n-----END PUBLIC KEY-----", key)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    /// Roles allowed to decide on and list applications.
    pub admin_roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

impl OnboardingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::Config(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = OnboardingConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("onboarding-service"), is_prod)?,
            service_version: get_env(
                "SERVICE_VERSION",
                Some(env!("CARGO_PKG_VERSION")),
                is_prod,
            )?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: SecretString::new(get_env("DATABASE_URL", None, is_prod)?),
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1")?,
            },
            keycloak: KeycloakConfig {
                auth_server_url: get_env(
                    "KEYCLOAK_AUTH_SERVER_URL",
                    Some("http://localhost:8080"),
                    is_prod,
                )?,
                realm: get_env("KEYCLOAK_REALM", None, is_prod)?,
                client_id: get_env("KEYCLOAK_CLIENT_ID", None, is_prod)?,
                client_secret: SecretString::new(get_env("KEYCLOAK_SECRET", None, is_prod)?),
                admin_username: get_env("KEYCLOAK_ADMIN_USERNAME", Some("admin"), is_prod)?,
                admin_password: SecretString::new(get_env(
                    "KEYCLOAK_ADMIN_PASSWORD",
                    Some(""),
                    is_prod,
                )?),
                request_timeout_seconds: parse_env("KEYCLOAK_REQUEST_TIMEOUT_SECONDS", "15")?,
                admin_refresh_seconds: parse_env("KEYCLOAK_ADMIN_REFRESH_SECONDS", "600")?,
            },
            token: TokenVerificationConfig {
                public_key: get_env("KEYCLOAK_PUBLIC_KEY", None, is_prod)?,
                issuer: get_env("JWT_ISSUER", None, is_prod)?,
                audience: split_list(&get_env(
                    "JWT_AUDIENCE",
                    Some("realm-management,broker,account"),
                    is_prod,
                )?),
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", None, is_prod)?,
                port: parse_env("SMTP_PORT", "587")?,
                user: get_env("SMTP_USER", None, is_prod)?,
                password: SecretString::new(get_env("SMTP_PASS", None, is_prod)?),
                from: get_env("SMTP_FROM", None, is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: split_list(&get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?),
                admin_roles: split_list(&get_env("ADMIN_ROLES", Some("realm-admin"), is_prod)?),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::Config(anyhow::anyhow!(e)))?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.keycloak.admin_refresh_seconds == 0 {
            return Err(AppError::Config(anyhow::anyhow!(
                "KEYCLOAK_ADMIN_REFRESH_SECONDS must be positive"
            )));
        }

        if self.keycloak.client_secret.expose_secret().is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "KEYCLOAK_SECRET must not be empty"
            )));
        }

        if self.token.audience.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "JWT_AUDIENCE must name at least one audience"
            )));
        }

        if self.security.admin_roles.is_empty() {
            return Err(AppError::Config(anyhow::anyhow!(
                "ADMIN_ROLES must name at least one role"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::Config(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger UI is publicly accessible in production");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::Config(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::Config(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Numeric knobs always fall back to their default, even in production.
fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default), false)?;
    raw.parse::<T>()
        .map_err(|e| AppError::Config(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
