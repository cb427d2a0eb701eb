//! services/api/src/auth/azure.rs
//!
//! Validates Azure AD ID tokens against the tenant's published signing keys.

use std::collections::HashMap;
use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::AuthError;
use crate::config::AzureConfig;

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AzureClaims {
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Who an Azure ID token says the caller is.
#[derive(Debug, Clone, PartialEq)]
pub struct AzureIdentity {
    pub email: String,
    pub name: Option<String>,
}

pub struct AzureVerifier {
    http: reqwest::Client,
    client_id: String,
    issuer: String,
    jwks_url: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl AzureVerifier {
    pub fn new(config: &AzureConfig) -> Result<Self, AuthError> {
        let jwks_url = format!(
            "https://login.microsoftonline.com/{}/discovery/v2.0/keys",
            config.tenant_id
        );
        Self::with_jwks_url(config, jwks_url)
    }

    pub fn with_jwks_url(config: &AzureConfig, jwks_url: String) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::Azure(e.to_string()))?;
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            issuer: format!("https://login.microsoftonline.com/{}/v2.0", config.tenant_id),
            jwks_url,
            keys: RwLock::new(HashMap::new()),
        })
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        debug!("Fetching Azure signing keys from {}", self.jwks_url);
        let set: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::Azure(format!("JWKS fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| AuthError::Azure(format!("JWKS unreadable: {}", e)))?;

        let mut keys = HashMap::new();
        for jwk in set.keys {
            if let (Some(kid), "RSA", Some(n), Some(e)) = (jwk.kid, jwk.kty.as_str(), jwk.n, jwk.e) {
                match DecodingKey::from_rsa_components(&n, &e) {
                    Ok(key) => {
                        keys.insert(kid, key);
                    }
                    Err(err) => debug!("Skipping unusable JWK {}: {}", kid, err),
                }
            }
        }
        info!("Loaded {} Azure signing keys", keys.len());
        *self.keys.write().await = keys;
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }
        // Keys rotate; an unknown kid triggers one refetch.
        self.refresh_keys().await?;
        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown signing key '{}'", kid)))
    }

    pub async fn verify(&self, id_token: &str) -> Result<AzureIdentity, AuthError> {
        let header = decode_header(id_token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token header has no kid".to_string()))?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<AzureClaims>(id_token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        let email = claims
            .preferred_username
            .or(claims.email)
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("token carries no username".to_string()))?;

        Ok(AzureIdentity {
            email,
            name: claims.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> AzureConfig {
        AzureConfig {
            tenant_id: "tenant".into(),
            client_id: "client".into(),
        }
    }

    fn token_with_kid(kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = kid.map(str::to_string);
        encode(&header, &json!({"sub": "x"}), &EncodingKey::from_secret(b"s")).unwrap()
    }

    #[test]
    fn issuer_follows_tenant() {
        let verifier = AzureVerifier::new(&config()).unwrap();
        assert_eq!(verifier.issuer, "https://login.microsoftonline.com/tenant/v2.0");
        assert_eq!(
            verifier.jwks_url,
            "https://login.microsoftonline.com/tenant/discovery/v2.0/keys"
        );
    }

    #[tokio::test]
    async fn token_without_kid_is_rejected() {
        let verifier = AzureVerifier::with_jwks_url(&config(), "http://127.0.0.1:9/keys".into()).unwrap();
        assert!(matches!(
            verifier.verify(&token_with_kid(None)).await,
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[tokio::test]
    async fn unknown_kid_is_rejected_after_refetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "RSA", "use": "sig", "kid": "known", "n": "sXch", "e": "AQAB"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verifier =
            AzureVerifier::with_jwks_url(&config(), format!("{}/keys", server.uri())).unwrap();
        let result = verifier.verify(&token_with_kid(Some("rotated-away"))).await;
        assert!(matches!(result, Err(AuthError::InvalidToken(msg)) if msg.contains("rotated-away")));
    }

    #[tokio::test]
    async fn unreachable_jwks_is_an_azure_error() {
        let verifier = AzureVerifier::with_jwks_url(&config(), "http://127.0.0.1:9/keys".into()).unwrap();
        assert!(matches!(
            verifier.verify(&token_with_kid(Some("k"))).await,
            Err(AuthError::Azure(_))
        ));
    }

    const SIGNING_KEY_PEM: &str = include_str!("testdata/azure_signing_key.pem");
    const SIGNING_KID: &str = "signing-key";

    /// Base64url modulus of `SIGNING_KEY_PEM`.
    fn signing_modulus() -> String {
        [
        "1YEnc4isTqScJKt9BqtSgXYDbxipq4Ev04cKYCY4R1aa0kpmOo_3LdWYuG7crQkUxb3c_aM0bNzne3D1",
        "8jrHDlDkKNiSUBb_lZAoLwWEgFwB6WccNf2qNKafPD4rNaKezCn9PLAlGeCFgnRtaUb9Uq0qk8ukkB_m",
        "DcKF716d8otfuSfBYAvTbDDnzfy5VE6JCaoiHkNOoU_auUXjOVg-pvifglWJwUmiuvQ01d0zP46E6FHG",
        "y92Q5MdUkACpGJV4M-ITGcpeGHCqU2llCW4_EhiZC75nVQmKKKCPg00e8RIAbMAXTf8hn6tz8rlc7OCI",
        "qhe0apuHkvx5j8BF_UWGQw",
        ]
        .concat()
    }

    fn id_token(claims: Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(SIGNING_KID.to_string());
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn claims() -> Value {
        json!({
            "aud": "client",
            "iss": "https://login.microsoftonline.com/tenant/v2.0",
            "exp": Utc::now().timestamp() + 600,
            "preferred_username": "  Ada@Contoso.com ",
            "name": "Ada",
        })
    }

    async fn verifier_with_signing_key() -> (AzureVerifier, MockServer) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "RSA", "use": "sig", "kid": SIGNING_KID, "n": signing_modulus(), "e": "AQAB"}]
            })))
            .mount(&server)
            .await;
        let verifier =
            AzureVerifier::with_jwks_url(&config(), format!("{}/keys", server.uri())).unwrap();
        (verifier, server)
    }

    #[tokio::test]
    async fn well_formed_token_yields_identity() {
        let (verifier, _server) = verifier_with_signing_key().await;
        let identity = verifier.verify(&id_token(claims())).await.unwrap();
        assert_eq!(
            identity,
            AzureIdentity {
                email: "ada@contoso.com".into(),
                name: Some("Ada".into()),
            }
        );
    }

    #[tokio::test]
    async fn wrong_audience_issuer_or_expiry_is_rejected() {
        let (verifier, _server) = verifier_with_signing_key().await;

        let mut wrong_audience = claims();
        wrong_audience["aud"] = json!("another-app");
        let mut wrong_issuer = claims();
        wrong_issuer["iss"] = json!("https://login.microsoftonline.com/other-tenant/v2.0");
        let mut expired = claims();
        expired["exp"] = json!(Utc::now().timestamp() - 3600);

        for bad in [wrong_audience, wrong_issuer, expired] {
            let result = verifier.verify(&id_token(bad.clone())).await;
            assert!(matches!(result, Err(AuthError::InvalidToken(_))), "{}", bad);
        }
    }

    #[tokio::test]
    async fn token_without_username_is_rejected() {
        let (verifier, _server) = verifier_with_signing_key().await;
        let mut anonymous = claims();
        anonymous.as_object_mut().unwrap().remove("preferred_username");
        assert!(matches!(
            verifier.verify(&id_token(anonymous)).await,
            Err(AuthError::InvalidToken(msg)) if msg.contains("username")
        ));
    }
}
