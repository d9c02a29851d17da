//! Shared setup for onboarding-service integration tests.
//!
//! The identity provider is either simulated with `wiremock` or replaced by
//! the in-process mocks; the data store and mailer are always in memory.

#![allow(dead_code)]

use axum::{body::Body, http::Request, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use onboarding_service::{
    build_router,
    config::{
        DatabaseConfig, Environment, KeycloakConfig, OnboardingConfig, SecurityConfig, SmtpConfig,
        SwaggerConfig, SwaggerMode, TokenVerificationConfig,
    },
    services::{
        idp::{MockIdpAdminGateway, MockTokenIssuer},
        InMemoryApplicationStore, KeycloakJwtVerifier, MockEmailService, OnboardingService,
    },
    AppState,
};
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;
use secrecy::SecretString;
use serde_json::{json, Value};
use service_core::observability::MetricsHandle;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

pub const REALM: &str = "onboarding";
pub const ISSUER: &str = "http://kc.test/realms/onboarding";
pub const ADMIN_ROLE: &str = "realm-admin";

struct TestKeys {
    private_pem: String,
    public_pem: String,
}

fn keys() -> &'static TestKeys {
    static KEYS: OnceLock<TestKeys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("generate RSA key");
        TestKeys {
            private_pem: private
                .to_pkcs8_pem(LineEnding::LF)
                .expect("encode private key")
                .to_string(),
            public_pem: private
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .expect("encode public key"),
        }
    })
}

pub fn keycloak_config(base_url: &str) -> KeycloakConfig {
    KeycloakConfig {
        auth_server_url: base_url.to_string(),
        realm: REALM.to_string(),
        client_id: "onboarding-gateway".to_string(),
        client_secret: SecretString::new("gateway-secret".to_string()),
        admin_username: "admin".to_string(),
        admin_password: SecretString::new(String::new()),
        request_timeout_seconds: 5,
        admin_refresh_seconds: 600,
    }
}

pub fn test_config() -> OnboardingConfig {
    OnboardingConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "onboarding-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: SecretString::new("postgres://localhost/onboarding_test".to_string()),
            max_connections: 1,
            min_connections: 1,
        },
        keycloak: keycloak_config("http://kc.test"),
        token: TokenVerificationConfig {
            public_key: keys().public_pem.clone(),
            issuer: ISSUER.to_string(),
            audience: vec!["realm-management".to_string(), "account".to_string()],
        },
        smtp: SmtpConfig {
            host: "smtp.test".to_string(),
            port: 587,
            user: "mailer".to_string(),
            password: SecretString::new("mailer-pass".to_string()),
            from: "noreply@test".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_roles: vec![ADMIN_ROLE.to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
    }
}

/// Signs a realm token carrying `roles` as realm roles.
pub fn mint_token(subject: &str, roles: &[&str]) -> String {
    mint_claims(json!({
        "sub": subject,
        "preferred_username": subject,
        "email": format!("{}@test", subject),
        "iss": ISSUER,
        "aud": ["account"],
        "exp": Utc::now().timestamp() + 300,
        "realm_access": {"roles": roles},
        "resource_access": {"account": {"roles": ["view-profile"]}}
    }))
}

pub fn mint_claims(claims: Value) -> String {
    encode(
        &Header::new(Algorithm::RS256),
        &claims,
        &EncodingKey::from_rsa_pem(keys().private_pem.as_bytes()).expect("encoding key"),
    )
    .expect("sign token")
}

/// Token signed by a key the service does not trust.
pub fn foreign_token() -> String {
    static FOREIGN: OnceLock<String> = OnceLock::new();
    let pem = FOREIGN.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
            .expect("generate RSA key")
            .to_pkcs8_pem(LineEnding::LF)
            .expect("encode")
            .to_string()
    });
    encode(
        &Header::new(Algorithm::RS256),
        &json!({
            "sub": "intruder",
            "iss": ISSUER,
            "aud": ["account"],
            "exp": Utc::now().timestamp() + 300,
            "realm_access": {"roles": [ADMIN_ROLE]}
        }),
        &EncodingKey::from_rsa_pem(pem.as_bytes()).expect("encoding key"),
    )
    .expect("sign token")
}

/// Router wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: InMemoryApplicationStore,
    pub idp: MockIdpAdminGateway,
    pub tokens: MockTokenIssuer,
    pub mailer: MockEmailService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(MockEmailService::new())
    }

    pub fn with_mailer(mailer: MockEmailService) -> Self {
        let config = test_config();
        let store = InMemoryApplicationStore::new();
        let idp = MockIdpAdminGateway::new();
        let tokens = MockTokenIssuer::new();

        let onboarding = OnboardingService::new(
            Arc::new(store.clone()),
            Arc::new(idp.clone()),
            Arc::new(tokens.clone()),
            Arc::new(mailer.clone()),
        );
        let verifier = KeycloakJwtVerifier::new(&config.token).expect("verifier");

        let state = AppState {
            config: Arc::new(config),
            onboarding,
            store: Arc::new(store.clone()),
            verifier: Arc::new(verifier),
            metrics: MetricsHandle::detached(),
        };

        Self {
            router: build_router(state).expect("router"),
            store,
            idp,
            tokens,
            mailer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (u16, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router never fails");
        let status = response.status().as_u16();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (u16, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        self.send(builder.body(Body::empty()).expect("request")).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (u16, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        self.send(
            builder
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
    }

    pub fn admin_token(&self) -> String {
        mint_token("admin", &[ADMIN_ROLE, "offline_access"])
    }

    pub fn member_token(&self) -> String {
        mint_token("member", &["offline_access"])
    }

    /// Registers an applicant through the HTTP surface and returns its id.
    pub async fn register(&self, email: &str, phone: &str) -> String {
        let (status, body) = self
            .post(
                "/auth/register",
                None,
                json!({
                    "email": email,
                    "phoneNumber": phone,
                    "firstName": "A",
                    "lastName": "B"
                }),
            )
            .await;
        assert_eq!(status, 201, "register failed: {body}");
        body["application"]["id"]
            .as_str()
            .expect("application id")
            .to_string()
    }
}
