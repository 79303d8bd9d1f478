//! The security policy seam. Cryptographic primitives are external
//! collaborators; this module carries the policy identity and the sizing
//! facts the chunk layer needs. Only `None` is concretely implemented,
//! signed and encrypted policies plug in behind the same interface.

use std::fmt;
use std::str::FromStr;

use uastack_types::ByteString;

/// URI of the None security policy.
pub const SECURITY_POLICY_NONE_URI: &str = "http://opcfoundation.org/UA/SecurityPolicy#None";

/// The security policy of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityPolicy {
    /// Policy could not be parsed or has not been set yet.
    #[default]
    Unknown,
    /// No signing or encryption.
    None,
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

impl FromStr for SecurityPolicy {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            SECURITY_POLICY_NONE_URI => Ok(SecurityPolicy::None),
            _ => Err(()),
        }
    }
}

impl SecurityPolicy {
    /// The URI identifying this policy on the wire.
    pub fn to_uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => SECURITY_POLICY_NONE_URI,
            SecurityPolicy::Unknown => "",
        }
    }

    /// Whether chunks on this policy carry a signature.
    pub fn is_signed(&self) -> bool {
        false
    }

    /// Whether chunks on this policy are encrypted.
    pub fn is_encrypted(&self) -> bool {
        false
    }

    /// Size in bytes of a symmetric signature under this policy.
    pub fn symmetric_signature_size(&self) -> usize {
        0
    }

    /// Cipher block size for symmetric encryption, 0 when not encrypting.
    pub fn plain_block_size(&self) -> usize {
        0
    }

    /// A fresh nonce of the length this policy requires. The None policy
    /// still exchanges a small nonce during channel open.
    pub fn random_nonce(&self) -> ByteString {
        use rand::RngCore;
        let mut bytes = vec![0u8; self.secure_channel_nonce_length()];
        rand::thread_rng().fill_bytes(&mut bytes);
        ByteString::from(bytes)
    }

    /// Length of secure channel nonces under this policy.
    pub fn secure_channel_nonce_length(&self) -> usize {
        match self {
            SecurityPolicy::None => 1,
            SecurityPolicy::Unknown => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{SecurityPolicy, SECURITY_POLICY_NONE_URI};

    #[test]
    fn uri_round_trip() {
        let policy = SecurityPolicy::from_str(SECURITY_POLICY_NONE_URI).unwrap();
        assert_eq!(policy, SecurityPolicy::None);
        assert_eq!(policy.to_uri(), SECURITY_POLICY_NONE_URI);
        assert!(SecurityPolicy::from_str("bogus").is_err());
    }
}
