use keyring::Entry;
use log::{error, info};

const SERVICE: &str = "app.photomesh";

/// One keychain account per secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ProviderAccount {
    #[strum(to_string = "asset host public key")]
    AssetHost,
    #[strum(to_string = "prediction service token")]
    PredictionService,
}

impl ProviderAccount {
    fn account_name(self) -> &'static str {
        match self {
            ProviderAccount::AssetHost => "asset_host_public_key",
            ProviderAccount::PredictionService => "prediction_api_token",
        }
    }
}

/// Storage for the two service secrets
pub trait SecretStore: Send + Sync {
    fn load(&self, account: ProviderAccount) -> Result<Option<String>, keyring::Error>;
    fn save(&self, account: ProviderAccount, value: &str) -> Result<(), keyring::Error>;
    fn delete(&self, account: ProviderAccount) -> Result<(), keyring::Error>;
}

/// OS keychain backed by `keyring`
#[derive(Debug, Default, Clone, Copy)]
pub struct Keychain;

impl SecretStore for Keychain {
    fn load(&self, account: ProviderAccount) -> Result<Option<String>, keyring::Error> {
        let entry = Entry::new(SERVICE, account.account_name())?;

        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => {
                error!("Error loading {} from keychain: {:?}", account, e);
                Err(e)
            }
        }
    }

    fn save(&self, account: ProviderAccount, value: &str) -> Result<(), keyring::Error> {
        let entry = Entry::new(SERVICE, account.account_name())?;

        match entry.set_password(value) {
            Ok(()) => {
                info!("Saved {} to keychain", account);
                Ok(())
            }
            Err(e) => {
                error!("Failed to save {} to keychain: {:?}", account, e);
                Err(e)
            }
        }
    }

    fn delete(&self, account: ProviderAccount) -> Result<(), keyring::Error> {
        let entry = Entry::new(SERVICE, account.account_name())?;

        match entry.delete_credential() {
            Ok(()) => {
                info!("Deleted {} from keychain", account);
                Ok(())
            }
            // Nothing stored is the state we wanted
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => {
                error!("Error deleting {} from keychain: {:?}", account, e);
                Err(e)
            }
        }
    }
}
