//! Shared-secret loading for the wire codec.
//!
//! `LATTICE_SECRET_HEX` (hex-encoded, preferred) or `LATTICE_SECRET`
//! (raw bytes) must decode to at least [`crate::wire::MIN_SECRET_LEN`]
//! bytes.

use crate::error::{Error, Result};
use crate::wire::MIN_SECRET_LEN;

const ENV_HEX: &str = "LATTICE_SECRET_HEX";
const ENV_RAW: &str = "LATTICE_SECRET";

/// Load the shared secret from the environment, preferring the hex form.
pub fn load_from_env() -> Result<Vec<u8>> {
    if let Ok(hex_str) = std::env::var(ENV_HEX) {
        let bytes = hex::decode(hex_str.trim()).map_err(|_| Error::SecretMissing)?;
        return validate_len(bytes);
    }
    if let Ok(raw) = std::env::var(ENV_RAW) {
        return validate_len(raw.into_bytes());
    }
    Err(Error::SecretMissing)
}

fn validate_len(bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.len() < MIN_SECRET_LEN {
        return Err(Error::SecretMissing);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation races across tests in the same
    // process; serialize access to LATTICE_SECRET(_HEX).
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn hex_secret_decodes() {
        let _guard = ENV_LOCK.lock().expect("lock poisoned");
        std::env::remove_var(ENV_RAW);
        std::env::set_var(ENV_HEX, "30313233343536373839616263646566");
        let secret = load_from_env().expect("should load");
        assert_eq!(secret, b"0123456789abcdef");
        std::env::remove_var(ENV_HEX);
    }

    #[test]
    fn short_secret_rejected() {
        let _guard = ENV_LOCK.lock().expect("lock poisoned");
        std::env::remove_var(ENV_HEX);
        std::env::set_var(ENV_RAW, "short");
        assert!(matches!(load_from_env(), Err(Error::SecretMissing)));
        std::env::remove_var(ENV_RAW);
    }

    #[test]
    fn missing_secret_rejected() {
        let _guard = ENV_LOCK.lock().expect("lock poisoned");
        std::env::remove_var(ENV_HEX);
        std::env::remove_var(ENV_RAW);
        assert!(matches!(load_from_env(), Err(Error::SecretMissing)));
    }
}
