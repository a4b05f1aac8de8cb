//! Shared utility functions for provider adapters.

use ac_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve an API key from the named environment variable.
pub fn resolve_api_key(env_var: &str) -> Result<String, Error> {
    std::env::var(env_var)
        .map_err(|_| Error::Auth(format!("environment variable '{env_var}' not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "AC_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        assert_eq!(resolve_api_key(var_name).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing() {
        let err = resolve_api_key("AC_TEST_NONEXISTENT_VAR_8888").unwrap_err();
        assert!(err.to_string().contains("AC_TEST_NONEXISTENT_VAR_8888"));
    }
}
