use std::fmt;

use log::{info, warn};
use secrecy::{ExposeSecret, SecretString};

use crate::keychain::{ProviderAccount, SecretStore};

pub const DEFAULT_UPLOAD_BASE: &str = "https://upload.uploadcare.com";
pub const DEFAULT_CDN_BASE: &str = "https://ucarecdn.com";
pub const DEFAULT_PREDICTION_BASE: &str = "https://api.replicate.com";

/// Environment variable holding the asset host public key
pub const ASSET_HOST_KEY_ENV: &str = "UPLOADCARE_PUBLIC_KEY";
/// Environment variable holding the prediction service bearer token
pub const PREDICTION_TOKEN_ENV: &str = "REPLICATE_API_TOKEN";

/// A required secret was found neither in the environment nor in the keychain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{secret} is not configured (set {env_var} or store it with `photomesh key set`)")]
pub struct MissingSecret {
    pub secret: &'static str,
    pub env_var: &'static str,
}

/// Secrets passed explicitly into the HTTP clients at construction
pub struct Credentials {
    pub asset_host_public_key: SecretString,
    pub prediction_token: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("asset_host_public_key", &"[REDACTED]")
            .field("prediction_token", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Resolve both secrets: environment first, then the keychain.
    ///
    /// Empty values count as missing. Keychain read failures are logged and
    /// treated as missing.
    pub fn resolve<F>(env: F, keychain: &dyn SecretStore) -> Result<Self, MissingSecret>
    where
        F: Fn(&str) -> Option<String>,
    {
        let asset_host_public_key = Self::resolve_one(
            &env,
            keychain,
            ASSET_HOST_KEY_ENV,
            ProviderAccount::AssetHost,
        )
        .ok_or(MissingSecret {
            secret: "Asset host public key",
            env_var: ASSET_HOST_KEY_ENV,
        })?;

        let prediction_token = Self::resolve_one(
            &env,
            keychain,
            PREDICTION_TOKEN_ENV,
            ProviderAccount::PredictionService,
        )
        .ok_or(MissingSecret {
            secret: "Prediction service token",
            env_var: PREDICTION_TOKEN_ENV,
        })?;

        Ok(Self {
            asset_host_public_key,
            prediction_token,
        })
    }

    fn resolve_one<F>(
        env: &F,
        keychain: &dyn SecretStore,
        env_var: &str,
        account: ProviderAccount,
    ) -> Option<SecretString>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = env(env_var).filter(|v| !v.trim().is_empty()) {
            info!("Using {} from environment", account);
            return Some(SecretString::from(value.trim().to_string()));
        }

        match keychain.load(account) {
            Ok(Some(value)) if !value.trim().is_empty() => {
                info!("Using {} from keychain", account);
                Some(SecretString::from(value.trim().to_string()))
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to read {} from keychain: {}", account, e);
                None
            }
        }
    }
}

/// Endpoints and secrets for the two remote services
pub struct ApiConfig {
    pub upload_base: String,
    pub cdn_base: String,
    pub prediction_base: String,
    pub credentials: Credentials,
}

impl ApiConfig {
    /// Config pointing at the public services
    pub fn with_defaults(credentials: Credentials) -> Self {
        Self {
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            cdn_base: DEFAULT_CDN_BASE.to_string(),
            prediction_base: DEFAULT_PREDICTION_BASE.to_string(),
            credentials,
        }
    }

    pub fn asset_host_key(&self) -> &str {
        self.credentials.asset_host_public_key.expose_secret()
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("upload_base", &self.upload_base)
            .field("cdn_base", &self.cdn_base)
            .field("prediction_base", &self.prediction_base)
            .field("credentials", &self.credentials)
            .finish()
    }
}
