//! Validation of user identity tokens during session activation.

use log::warn;
use uastack_types::{
    encoding::DecodingOptions, AnonymousIdentityToken, ExtensionObject, ObjectId, StatusCode,
    UserNameIdentityToken,
};

use crate::config::ServerConfig;

/// The validated identity of a session's user. Transfers between sessions
/// require both sides to hold the same token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserToken {
    /// An anonymous user.
    Anonymous,
    /// A user authenticated by name and password.
    UserName(String),
}

impl UserToken {
    /// True if both tokens identify the same user with the same kind of
    /// credentials.
    pub fn is_same_user(&self, other: &UserToken) -> bool {
        self == other
    }
}

/// The identity token carried in an ActivateSession request.
#[derive(Debug, Clone)]
pub enum IdentityToken {
    /// No token was provided, treated as anonymous where allowed.
    None,
    /// An anonymous token.
    Anonymous(AnonymousIdentityToken),
    /// A user name token.
    UserName(UserNameIdentityToken),
    /// A token this server cannot process.
    Invalid,
}

impl IdentityToken {
    /// Decode the identity token from its extension object.
    pub fn new(object: &ExtensionObject, options: &DecodingOptions) -> IdentityToken {
        if object.is_empty() {
            return IdentityToken::None;
        }
        match object.object_id() {
            Some(ObjectId::AnonymousIdentityToken_Encoding_DefaultBinary) => {
                match object.decode_inner::<AnonymousIdentityToken>(options) {
                    Ok(token) => IdentityToken::Anonymous(token),
                    Err(_) => IdentityToken::Invalid,
                }
            }
            Some(ObjectId::UserNameIdentityToken_Encoding_DefaultBinary) => {
                match object.decode_inner::<UserNameIdentityToken>(options) {
                    Ok(token) => IdentityToken::UserName(token),
                    Err(_) => IdentityToken::Invalid,
                }
            }
            _ => IdentityToken::Invalid,
        }
    }
}

/// Validates identity tokens against the configured users.
pub struct Authenticator<'a> {
    config: &'a ServerConfig,
}

impl<'a> Authenticator<'a> {
    /// Create an authenticator over the server configuration.
    pub fn new(config: &'a ServerConfig) -> Authenticator<'a> {
        Authenticator { config }
    }

    /// Validate the token, returning the user it identifies.
    pub fn authenticate(&self, token: &IdentityToken) -> Result<UserToken, StatusCode> {
        match token {
            IdentityToken::None | IdentityToken::Anonymous(_) => {
                if self.config.allow_anonymous {
                    Ok(UserToken::Anonymous)
                } else {
                    warn!("Anonymous activation rejected, no anonymous policy");
                    Err(StatusCode::BadIdentityTokenRejected)
                }
            }
            IdentityToken::UserName(token) => {
                if !token.encryption_algorithm.is_null() {
                    // Password encryption belongs to the crypto layer; on
                    // the None policy passwords arrive in the clear.
                    return Err(StatusCode::BadIdentityTokenInvalid);
                }
                let user = token.user_name.as_ref();
                let password = String::from_utf8_lossy(token.password.as_slice());
                let found = self
                    .config
                    .users
                    .iter()
                    .any(|u| u.user == user && u.password == password);
                if found {
                    Ok(UserToken::UserName(user.to_string()))
                } else {
                    warn!("User {} failed to authenticate", user);
                    Err(StatusCode::BadUserAccessDenied)
                }
            }
            IdentityToken::Invalid => Err(StatusCode::BadIdentityTokenInvalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use uastack_types::encoding::DecodingOptions;
    use uastack_types::{ByteString, ExtensionObject, StatusCode, UserNameIdentityToken};

    use super::{Authenticator, IdentityToken, UserToken};
    use crate::config::{ServerConfig, ServerUser};

    fn config_with_user() -> ServerConfig {
        let mut config = ServerConfig::new("s", "urn:s");
        config.allow_anonymous = false;
        config.users.push(ServerUser {
            user: "sample".to_string(),
            password: "sample1".to_string(),
        });
        config
    }

    fn username_token(user: &str, password: &str) -> IdentityToken {
        let token = UserNameIdentityToken {
            policy_id: "username".into(),
            user_name: user.into(),
            password: ByteString::from(password.as_bytes()),
            encryption_algorithm: Default::default(),
        };
        IdentityToken::new(
            &ExtensionObject::from_message(&token),
            &DecodingOptions::default(),
        )
    }

    #[test]
    fn anonymous_rejected_when_disallowed() {
        let config = config_with_user();
        let auth = Authenticator::new(&config);
        assert_eq!(
            auth.authenticate(&IdentityToken::None).unwrap_err(),
            StatusCode::BadIdentityTokenRejected
        );
    }

    #[test]
    fn username_validation() {
        let config = config_with_user();
        let auth = Authenticator::new(&config);
        assert_eq!(
            auth.authenticate(&username_token("sample", "sample1")).unwrap(),
            UserToken::UserName("sample".to_string())
        );
        assert_eq!(
            auth.authenticate(&username_token("sample", "wrong")).unwrap_err(),
            StatusCode::BadUserAccessDenied
        );
    }

    #[test]
    fn same_user_check() {
        assert!(UserToken::Anonymous.is_same_user(&UserToken::Anonymous));
        assert!(!UserToken::Anonymous.is_same_user(&UserToken::UserName("x".into())));
    }
}
