use std::{env, str::FromStr, time::Duration};

use solana_program::pubkey::Pubkey;
use tracing::debug;

use crate::{errors::ClientError, state::AddressCheck};

pub const PROGRAM_ID_ENV: &str = "FUND_PROGRAM_ID";
pub const NAME_DEBOUNCE_ENV: &str = "FUND_NAME_DEBOUNCE_MS";
pub const DEFAULT_NAME_CHECK_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    pub program_id: Pubkey,
    /// Quiet period before a fund-name availability check runs.
    pub name_check_debounce: Duration,
    pub address_check: AddressCheck,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: crate::PROGRAM_ID,
            name_check_debounce: DEFAULT_NAME_CHECK_DEBOUNCE,
            address_check: AddressCheck::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by `FUND_PROGRAM_ID` and `FUND_NAME_DEBOUNCE_MS` when set.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<L>(lookup: L) -> Result<Self, ClientError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(PROGRAM_ID_ENV) {
            config.program_id = Pubkey::from_str(raw.trim()).map_err(|err| {
                ClientError::Config(format!("{PROGRAM_ID_ENV}={raw:?} is not an address: {err}"))
            })?;
        }
        if let Some(raw) = lookup(NAME_DEBOUNCE_ENV) {
            let millis = raw.trim().parse::<u64>().map_err(|err| {
                ClientError::Config(format!("{NAME_DEBOUNCE_ENV}={raw:?}: {err}"))
            })?;
            config.name_check_debounce = Duration::from_millis(millis);
        }
        debug!(program_id = %config.program_id, debounce = ?config.name_check_debounce, "loaded client config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.program_id, crate::id());
        assert_eq!(config.name_check_debounce, Duration::from_millis(500));
        assert_eq!(config.address_check, AddressCheck::TrustStored);
    }

    #[test]
    fn overrides_from_variables() {
        let program = Pubkey::new_unique();
        let config = ClientConfig::from_lookup(lookup(&[
            (PROGRAM_ID_ENV, program.to_string().as_str()),
            (NAME_DEBOUNCE_ENV, " 250 "),
        ]))
        .unwrap();
        assert_eq!(config.program_id, program);
        assert_eq!(config.name_check_debounce, Duration::from_millis(250));
    }

    #[test]
    fn malformed_values_are_config_errors() {
        let err = ClientConfig::from_lookup(lookup(&[(PROGRAM_ID_ENV, "not-base58!")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));

        let err = ClientConfig::from_lookup(lookup(&[(NAME_DEBOUNCE_ENV, "-5")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
