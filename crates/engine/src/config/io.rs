//! Configuration IO: file loading and environment overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use daoscript_util::expand_tilde;
use tracing::debug;

use crate::config::{ConfigError, ConfigFile, HarnessConfig, vars};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "DAOSCRIPT_CONFIG_PATH";

/// Returns the default path for the harness configuration file.
pub fn default_config_path() -> PathBuf {
    env_config_path().unwrap_or_else(daoscript_util::default_config_path)
}

fn env_config_path() -> Option<PathBuf> {
    env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .map(|path| expand_tilde(&path))
}

/// Reads a config file. A missing file is an empty configuration.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file; using environment only");
        return Ok(ConfigFile::default());
    }
    read_config_file(path)
}

/// Reads a config file that must exist.
fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Replace file values with any non-empty environment variable of the
/// matching name.
pub fn apply_env_overrides(file: &mut ConfigFile) {
    override_with(&mut file.rpc_url, vars::RPC_URL);
    override_with(&mut file.contracts.space_factory, vars::DAO_SPACE_FACTORY_ADDRESS);
    override_with(&mut file.contracts.proposals, vars::DAO_PROPOSALS_ADDRESS);
    override_with(&mut file.contracts.invite_system, vars::INVITE_SYSTEM_ADDRESS);
    override_with(&mut file.contracts.profile_manager, vars::PROFILE_CONTRACT_ADDRESS);
    override_with(&mut file.contracts.join_method_directory, vars::JOIN_METHOD_DIRECTORY_ADDRESS);
    override_with(&mut file.space_id, vars::TEST_SPACE_ID);
    override_with(&mut file.target_space_id, vars::TARGET_SPACE_ID);
    // PROPOSAL_ID wins over the older TEST_PROPOSAL_ID.
    override_with(&mut file.proposal_id, vars::TEST_PROPOSAL_ID);
    override_with(&mut file.proposal_id, vars::PROPOSAL_ID);
    override_with(&mut file.join_method, vars::JOIN_METHOD);
    override_with(&mut file.proposal_interface, vars::PROPOSAL_INTERFACE);
    override_with(&mut file.space_interface, vars::SPACE_INTERFACE);
    override_with(&mut file.gas_limit, vars::GAS_LIMIT);
}

fn override_with(slot: &mut Option<String>, name: &str) {
    if let Ok(value) = env::var(name)
        && !value.trim().is_empty()
    {
        *slot = Some(value);
    }
}

/// Loads the file at `path` (or [`default_config_path`]), applies
/// environment overrides and resolves the result.
///
/// A path given explicitly, by argument or by `DAOSCRIPT_CONFIG_PATH`, must
/// exist; only the built-in default location may be absent.
pub fn load_config(path: Option<&Path>) -> Result<HarnessConfig, ConfigError> {
    let mut file = match path.map(Path::to_path_buf).or_else(env_config_path) {
        Some(path) => read_config_file(&path)?,
        None => load_config_file(&daoscript_util::default_config_path())?,
    };
    apply_env_overrides(&mut file);

    let funder_key = env::var(vars::PRIVATE_KEY).ok();
    let config = HarnessConfig::resolve(file, funder_key.as_deref())?;
    debug!(?config, "loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use alloy::primitives::{Address, U256};

    use super::*;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/daoscript/config.json";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let file = load_config_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn default_path_falls_back_to_the_user_config_dir() {
        temp_env::with_var(CONFIG_PATH_ENV, None::<&str>, || {
            assert_eq!(default_config_path(), daoscript_util::default_config_path());
        });
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("absent.json");
        temp_env::with_var(CONFIG_PATH_ENV, None::<&str>, || {
            assert!(matches!(load_config(Some(&absent)), Err(ConfigError::Io { .. })));
        });
        temp_env::with_var(CONFIG_PATH_ENV, Some(absent.to_str().unwrap()), || {
            assert!(matches!(load_config(None), Err(ConfigError::Io { .. })));
        });
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(load_config_file(file.path()), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rpcUrl": "https://file.example", "spaceId": "3", "contracts": {{"inviteSystem": "0x1111111111111111111111111111111111111111"}}}}"#
        )
        .unwrap();

        temp_env::with_vars(
            [
                (vars::RPC_URL, Some("http://127.0.0.1:8545")),
                (vars::TEST_SPACE_ID, Some("9")),
                (vars::TEST_PROPOSAL_ID, Some("4")),
                (vars::PROPOSAL_ID, None),
                (vars::INVITE_SYSTEM_ADDRESS, Some("")),
                (vars::PRIVATE_KEY, None),
            ],
            || {
                let config = load_config(Some(file.path())).unwrap();
                assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
                assert_eq!(config.space_id, Some(U256::from(9u64)));
                assert_eq!(config.proposal_id, Some(U256::from(4u64)));
                assert_eq!(config.contracts.invite_system, Some(Address::repeat_byte(0x11)));
            },
        );
    }

    #[test]
    fn proposal_id_wins_over_legacy_name() {
        temp_env::with_vars(
            [(vars::TEST_PROPOSAL_ID, Some("4")), (vars::PROPOSAL_ID, Some("7"))],
            || {
                let mut file = ConfigFile::default();
                apply_env_overrides(&mut file);
                assert_eq!(file.proposal_id.as_deref(), Some("7"));
            },
        );
    }
}
