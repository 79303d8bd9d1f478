//! The secure channel state: ids, tokens, nonces and the symmetric
//! security hooks applied to message chunks.

use std::time::{Duration, Instant};

use log::{debug, error};
use uastack_types::{
    encoding::{BinaryEncodable, DecodingOptions, EncodingResult, Error},
    service::{ChannelSecurityToken, MessageSecurityMode},
    ByteString, DateTime, StatusCode,
};

use super::{
    message_chunk::{MessageChunk, MessageChunkType},
    security_header::{AsymmetricSecurityHeader, SecurityHeader, SymmetricSecurityHeader},
    security_policy::SecurityPolicy,
};

/// Which side of the conversation this channel state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Channel state held by a client.
    Client,
    /// Channel state held by a server.
    Server,
}

// A renewed token becomes the only valid token once the old one has been
// out of force for a quarter of its lifetime.
fn overlap_window(lifetime: Duration) -> Duration {
    lifetime / 4
}

/// Holds the security state of one conversation: channel id, the token in
/// force (plus the previous one during a renewal overlap), nonces and the
/// negotiated policy. All chunk security passes through here.
pub struct SecureChannel {
    role: Role,
    security_policy: SecurityPolicy,
    security_mode: MessageSecurityMode,
    secure_channel_id: u32,
    token_id: u32,
    token_created_at: Instant,
    token_lifetime: Duration,
    /// The previous token and the deadline until which it still decrypts
    /// incoming chunks.
    previous_token: Option<(u32, Instant)>,
    local_nonce: ByteString,
    remote_nonce: ByteString,
    decoding_options: DecodingOptions,
}

impl SecureChannel {
    /// Create channel state for the given role.
    pub fn new(role: Role, decoding_options: DecodingOptions) -> SecureChannel {
        SecureChannel {
            role,
            security_policy: SecurityPolicy::Unknown,
            security_mode: MessageSecurityMode::Invalid,
            secure_channel_id: 0,
            token_id: 0,
            token_created_at: Instant::now(),
            token_lifetime: Duration::ZERO,
            previous_token: None,
            local_nonce: ByteString::null(),
            remote_nonce: ByteString::null(),
            decoding_options,
        }
    }

    /// True when this is the client side of the conversation.
    pub fn is_client_role(&self) -> bool {
        self.role == Role::Client
    }

    /// The negotiated security policy.
    pub fn security_policy(&self) -> SecurityPolicy {
        self.security_policy
    }

    /// Set the security policy.
    pub fn set_security_policy(&mut self, policy: SecurityPolicy) {
        self.security_policy = policy;
    }

    /// The negotiated security mode.
    pub fn security_mode(&self) -> MessageSecurityMode {
        self.security_mode
    }

    /// Set the security mode.
    pub fn set_security_mode(&mut self, mode: MessageSecurityMode) {
        self.security_mode = mode;
    }

    /// The server-assigned channel id, 0 before the channel is open.
    pub fn secure_channel_id(&self) -> u32 {
        self.secure_channel_id
    }

    /// Set the channel id.
    pub fn set_secure_channel_id(&mut self, id: u32) {
        self.secure_channel_id = id;
    }

    /// The id of the token currently in force.
    pub fn token_id(&self) -> u32 {
        self.token_id
    }

    /// The channel's decoding limits.
    pub fn decoding_options(&self) -> DecodingOptions {
        self.decoding_options.clone()
    }

    /// Replace the channel's decoding limits with negotiated values.
    pub fn set_decoding_options(&mut self, options: DecodingOptions) {
        self.decoding_options = options;
    }

    /// This side's nonce.
    pub fn local_nonce(&self) -> &ByteString {
        &self.local_nonce
    }

    /// Generate and store a fresh local nonce.
    pub fn create_random_nonce(&mut self) {
        self.local_nonce = self.security_policy.random_nonce();
    }

    /// Store the peer's nonce.
    pub fn set_remote_nonce(&mut self, nonce: ByteString) {
        self.remote_nonce = nonce;
    }

    /// The peer's nonce.
    pub fn remote_nonce(&self) -> &ByteString {
        &self.remote_nonce
    }

    /// True if the channel has been opened.
    pub fn is_open(&self) -> bool {
        self.secure_channel_id != 0 && self.token_id != 0
    }

    /// Issue a fresh token, or renew the current one keeping the old token
    /// valid for the overlap window. Returns the token to send back to the
    /// client; `revised_lifetime` is `min(requested, max)`.
    pub fn create_token(
        &mut self,
        channel_id: u32,
        requested_lifetime_ms: u32,
        max_lifetime_ms: u32,
    ) -> ChannelSecurityToken {
        let revised_lifetime = if requested_lifetime_ms == 0 {
            max_lifetime_ms
        } else {
            requested_lifetime_ms.min(max_lifetime_ms)
        };

        if self.token_id != 0 {
            // Renewal. The old token keeps decrypting incoming chunks for a
            // fraction of its lifetime.
            let deadline = Instant::now() + overlap_window(self.token_lifetime);
            self.previous_token = Some((self.token_id, deadline));
            debug!(
                "Channel {} token {} renewed, old token valid until {:?}",
                self.secure_channel_id, self.token_id, deadline
            );
        }

        self.secure_channel_id = channel_id;
        self.token_id += 1;
        self.token_created_at = Instant::now();
        self.token_lifetime = Duration::from_millis(revised_lifetime as u64);

        ChannelSecurityToken {
            channel_id,
            token_id: self.token_id,
            created_at: DateTime::now(),
            revised_lifetime,
        }
    }

    /// Adopt a token received from the server (client role).
    pub fn set_token(&mut self, token: &ChannelSecurityToken) {
        self.secure_channel_id = token.channel_id;
        self.token_id = token.token_id;
        self.token_created_at = Instant::now();
        self.token_lifetime = Duration::from_millis(token.revised_lifetime as u64);
    }

    /// True once the token in force has outlived its revised lifetime.
    pub fn token_has_expired(&self) -> bool {
        self.token_id != 0
            && !self.token_lifetime.is_zero()
            && self.token_created_at.elapsed() > self.token_lifetime
    }

    /// Time at which the token in force expires.
    pub fn token_renewal_deadline(&self) -> Instant {
        self.token_created_at + self.token_lifetime
    }

    /// Verify the token id on an incoming symmetric chunk. The current
    /// token always matches; the previous one matches during the renewal
    /// overlap window.
    pub fn verify_token_id(&self, token_id: u32) -> EncodingResult<()> {
        if token_id == self.token_id {
            if self.token_has_expired() {
                return Err(Error::new(
                    StatusCode::BadSecureChannelTokenUnknown,
                    format!("Token {} has expired", token_id),
                ));
            }
            return Ok(());
        }
        if let Some((previous_id, deadline)) = self.previous_token {
            if token_id == previous_id && Instant::now() < deadline {
                return Ok(());
            }
        }
        error!(
            "Channel {} received chunk with unknown token id {}, current is {}",
            self.secure_channel_id, token_id, self.token_id
        );
        Err(Error::new(
            StatusCode::BadSecureChannelTokenUnknown,
            format!("Token id {} is not valid on this channel", token_id),
        ))
    }

    /// The security header outgoing chunks of `message_type` must carry.
    pub fn make_security_header(&self, message_type: MessageChunkType) -> SecurityHeader {
        match message_type {
            MessageChunkType::OpenSecureChannel => {
                SecurityHeader::Asymmetric(AsymmetricSecurityHeader::default())
            }
            _ => SecurityHeader::Symmetric(SymmetricSecurityHeader {
                token_id: self.token_id,
            }),
        }
    }

    /// Verify an incoming chunk's security: the token id on symmetric
    /// chunks, and the signature and encryption once a real policy plugs
    /// in. Failures surface as `BadSecurityChecksFailed` or
    /// `BadSecureChannelTokenUnknown`.
    pub fn verify_chunk(&self, chunk: &MessageChunk) -> EncodingResult<()> {
        if self.security_policy.is_signed() || self.security_policy.is_encrypted() {
            // Cryptographic policies live behind the SecurityPolicy seam.
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "No signature implementation for the negotiated policy",
            ));
        }
        if let SecurityHeader::Symmetric(header) = &chunk.security_header {
            self.verify_token_id(header.token_id)?;
        }
        Ok(())
    }

    /// Produce the wire bytes of an outgoing chunk, signing and
    /// encrypting where the policy requires it. Plain serialization on
    /// the None policy.
    pub fn apply_security(&self, chunk: &MessageChunk) -> EncodingResult<Vec<u8>> {
        if self.security_policy.is_signed() || self.security_policy.is_encrypted() {
            return Err(Error::new(
                StatusCode::BadSecurityChecksFailed,
                "No signature implementation for the negotiated policy",
            ));
        }
        Ok(chunk.encode_to_vec())
    }
}

#[cfg(test)]
mod tests {
    use uastack_types::encoding::DecodingOptions;
    use uastack_types::StatusCode;

    use super::{Role, SecureChannel, SecurityPolicy};

    fn server_channel() -> SecureChannel {
        let mut channel = SecureChannel::new(Role::Server, DecodingOptions::default());
        channel.set_security_policy(SecurityPolicy::None);
        channel
    }

    #[test]
    fn token_issue_and_renew() {
        let mut channel = server_channel();
        let token = channel.create_token(7, 60_000, 300_000);
        assert_eq!(token.channel_id, 7);
        assert_eq!(token.token_id, 1);
        assert_eq!(token.revised_lifetime, 60_000);
        assert!(channel.is_open());
        assert!(channel.verify_token_id(1).is_ok());

        // Renewal honors the server maximum and keeps the old token alive.
        let renewed = channel.create_token(7, 600_000, 300_000);
        assert_eq!(renewed.token_id, 2);
        assert_eq!(renewed.revised_lifetime, 300_000);
        assert!(channel.verify_token_id(2).is_ok());
        assert!(channel.verify_token_id(1).is_ok());
        // A token never issued is rejected.
        let err = channel.verify_token_id(9).unwrap_err();
        assert_eq!(err.status(), StatusCode::BadSecureChannelTokenUnknown);
    }

    #[test]
    fn zero_lifetime_means_maximum() {
        let mut channel = server_channel();
        let token = channel.create_token(1, 0, 120_000);
        assert_eq!(token.revised_lifetime, 120_000);
        assert!(!channel.token_has_expired());
    }
}
