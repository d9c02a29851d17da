use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use crate::config::TokenVerificationConfig;
use crate::models::Principal;
use crate::services::ServiceError;

/// Pluggable bearer token verification.
///
/// `Ok(None)` means the token verified but carried no usable identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Option<Principal>, ServiceError>;
}

#[derive(Debug, Default, Deserialize)]
struct RoleClaim {
    #[serde(default)]
    roles: Vec<String>,
}

/// Claims issued by the realm.
#[derive(Debug, Deserialize)]
struct RealmClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    realm_access: Option<RoleClaim>,
    #[serde(default)]
    resource_access: HashMap<String, RoleClaim>,
}

impl RealmClaims {
    fn into_principal(self) -> Option<Principal> {
        let user_id = self.sub.filter(|s| !s.is_empty())?;

        let mut roles: BTreeSet<String> = self
            .realm_access
            .map(|r| r.roles.into_iter().collect())
            .unwrap_or_default();
        for client in self.resource_access.into_values() {
            roles.extend(client.roles);
        }

        Some(Principal {
            user_id,
            username: self.preferred_username,
            email: self.email,
            roles,
        })
    }
}

/// RS256 verification against the configured realm public key.
#[derive(Clone)]
pub struct KeycloakJwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl KeycloakJwtVerifier {
    pub fn new(config: &TokenVerificationConfig) -> Result<Self, anyhow::Error> {
        let decoding_key = DecodingKey::from_rsa_pem(config.public_key_pem().as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to parse realm public key: {}", e))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&config.audience);

        tracing::info!(
            issuer = %config.issuer,
            audience = ?config.audience,
            "JWT verifier initialized with RS256 realm key"
        );

        Ok(Self {
            decoding_key,
            validation,
        })
    }
}

#[async_trait]
impl TokenVerifier for KeycloakJwtVerifier {
    async fn verify(&self, token: &str) -> Result<Option<Principal>, ServiceError> {
        let data = decode::<RealmClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                tracing::debug!(error = %e, "Bearer token rejected");
                ServiceError::InvalidToken
            },
        )?;
        Ok(data.claims.into_principal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use std::sync::OnceLock;

    const ISSUER: &str = "http://kc.test/realms/onboarding";

    fn keys() -> &'static (String, String) {
        static KEYS: OnceLock<(String, String)> = OnceLock::new();
        KEYS.get_or_init(|| {
            let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
            let private_pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
            let public_pem = private
                .to_public_key()
                .to_public_key_pem(LineEnding::LF)
                .unwrap();
            (private_pem, public_pem)
        })
    }

    fn verifier() -> KeycloakJwtVerifier {
        KeycloakJwtVerifier::new(&TokenVerificationConfig {
            public_key: keys().1.clone(),
            issuer: ISSUER.to_string(),
            audience: vec!["account".to_string(), "broker".to_string()],
        })
        .unwrap()
    }

    fn mint(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &EncodingKey::from_rsa_pem(keys().0.as_bytes()).unwrap(),
        )
        .unwrap()
    }

    fn base_claims() -> serde_json::Value {
        json!({
            "sub": "user-1",
            "preferred_username": "admin",
            "email": "admin@x.com",
            "iss": ISSUER,
            "aud": ["account"],
            "exp": Utc::now().timestamp() + 300,
            "realm_access": {"roles": ["realm-admin", "offline_access"]},
            "resource_access": {
                "account": {"roles": ["manage-account"]},
                "broker": {"roles": ["read-token"]}
            }
        })
    }

    #[tokio::test]
    async fn valid_token_flattens_realm_and_client_roles() {
        let principal = verifier()
            .verify(&mint(base_claims()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(principal.user_id, "user-1");
        assert_eq!(principal.username.as_deref(), Some("admin"));
        let roles: Vec<&str> = principal.roles.iter().map(String::as_str).collect();
        assert_eq!(
            roles,
            vec!["manage-account", "offline_access", "read-token", "realm-admin"]
        );
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let mut claims = base_claims();
        claims["iss"] = json!("http://evil.test/realms/onboarding");
        let result = verifier().verify(&mint(claims)).await;
        assert!(matches!(result, Err(ServiceError::InvalidToken)));
    }

    #[tokio::test]
    async fn foreign_audience_is_rejected() {
        let mut claims = base_claims();
        claims["aud"] = json!(["some-other-client"]);
        let result = verifier().verify(&mint(claims)).await;
        assert!(matches!(result, Err(ServiceError::InvalidToken)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut claims = base_claims();
        claims["exp"] = json!(Utc::now().timestamp() - 3600);
        let result = verifier().verify(&mint(claims)).await;
        assert!(matches!(result, Err(ServiceError::InvalidToken)));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let token = mint(base_claims());
        let mut escalated = base_claims();
        escalated["realm_access"] = json!({"roles": ["realm-admin", "super-admin"]});
        let forged = mint(escalated);

        // Payload of one token, signature of another.
        let parts: Vec<&str> = token.split('.').collect();
        let forged_parts: Vec<&str> = forged.split('.').collect();
        let tampered = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

        let result = verifier().verify(&tampered).await;
        assert!(matches!(result, Err(ServiceError::InvalidToken)));
    }

    #[tokio::test]
    async fn hs256_token_is_rejected() {
        let token = encode(
            &Header::new(Algorithm::HS256),
            &base_claims(),
            &EncodingKey::from_secret(keys().1.as_bytes()),
        )
        .unwrap();
        assert!(verifier().verify(&token).await.is_err());
    }

    #[tokio::test]
    async fn token_without_subject_yields_no_principal() {
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("sub");
        let result = verifier().verify(&mint(claims)).await.unwrap();
        assert!(result.is_none());
    }
}
