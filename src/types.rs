use derive_more::{Display, Into};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Compact three-segment bearer credential (`header.payload.signature`).
///
/// Opaque to the client apart from the payload claims. Guaranteed non-empty and
/// made of visible ASCII only, so it always fits in an `Authorization` header.
/// Use `"a.b.c".parse::<BearerToken>()` or `BearerToken::try_from(string)`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Into)]
#[serde(try_from = "String", into = "String")]
pub struct BearerToken(String);

impl BearerToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl std::str::FromStr for BearerToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for BearerToken {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Err(Error::InvalidToken("empty token".into()));
        }
        if !s.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(Error::InvalidToken(
                "token contains characters not allowed in a header value".into(),
            ));
        }
        Ok(Self(s))
    }
}

/// Display identity read from a token's payload segment.
///
/// Not authenticated by the client: the signature is never checked here, so
/// these values are for display only and must not drive authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Token `sub` claim. Older persisted records call this `id`.
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl IdentityClaims {
    /// Best label for the signed-in user: name, then email, then subject.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .or(self.subject.as_deref())
    }
}

/// The authoritative record of whether, and as whom, the console is signed in.
///
/// `token` present means authenticated. `identity` is best-effort and may be
/// absent even when a token is held.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<BearerToken>,
    pub identity: Option<IdentityClaims>,
}

impl Session {
    /// Empty (unauthenticated) session.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn authenticated(token: BearerToken, identity: Option<IdentityClaims>) -> Self {
        Self {
            token: Some(token),
            identity,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_accepts_compact_token() {
        let token: BearerToken = "aaa.bbb.ccc".parse().unwrap();
        assert_eq!(token.as_str(), "aaa.bbb.ccc");
        assert_eq!(token.to_string(), "aaa.bbb.ccc");
    }

    #[test]
    fn bearer_token_rejects_empty_and_whitespace() {
        assert!("".parse::<BearerToken>().is_err());
        assert!("abc def".parse::<BearerToken>().is_err());
        assert!("abc\n".parse::<BearerToken>().is_err());
    }

    #[test]
    fn bearer_token_debug_is_redacted() {
        let token: BearerToken = "secret.payload.sig".parse().unwrap();
        assert!(!format!("{token:?}").contains("secret"));
    }

    #[test]
    fn bearer_token_serde_rejects_invalid() {
        assert!(serde_json::from_str::<BearerToken>("\"\"").is_err());
        let token: BearerToken = serde_json::from_str("\"a.b.c\"").unwrap();
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"a.b.c\"");
    }

    #[test]
    fn identity_accepts_legacy_id_field() {
        let identity: IdentityClaims =
            serde_json::from_str(r#"{"name":"Ada","email":"a@b.com","id":"123"}"#).unwrap();
        assert_eq!(identity.subject.as_deref(), Some("123"));
    }

    #[test]
    fn identity_serializes_only_present_fields() {
        let identity = IdentityClaims {
            subject: Some("123".into()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&identity).unwrap(),
            r#"{"subject":"123"}"#
        );
    }

    #[test]
    fn display_name_falls_back() {
        let identity = IdentityClaims {
            email: Some("a@b.com".into()),
            subject: Some("123".into()),
            ..Default::default()
        };
        assert_eq!(identity.display_name(), Some("a@b.com"));
        assert_eq!(IdentityClaims::default().display_name(), None);
    }

    #[test]
    fn session_authentication_follows_token() {
        assert!(!Session::empty().is_authenticated());
        let session = Session::authenticated("a.b.c".parse().unwrap(), None);
        assert!(session.is_authenticated());
    }
}
