use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use url::Url;

use super::manager::SessionManager;
use super::traits::KeyValueStore;
use crate::types::BearerToken;

/// Well-formed payloads accepted on the cross-window channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum AuthMessage {
    /// `{ "kind": "auth-token", "token": "<jwt>" }`
    AuthToken { token: String },
}

/// A raw cross-window message as delivered by the host, with its sender origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub origin: String,
    pub data: JsonValue,
}

/// Which sender origins may set the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Accept every sender.
    #[default]
    AnyOrigin,
    /// Accept only these origins (`scheme://host[:port]`).
    AllowList(Vec<String>),
}

impl OriginPolicy {
    /// Allow-list policy; entries are normalized to their origin form.
    ///
    /// Entries without a `scheme://host` origin (`localhost:4000`, `null`) are
    /// dropped with a warning. Use [`try_allow_list`](Self::try_allow_list) to
    /// reject them instead.
    #[must_use]
    pub fn allow_list<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::AllowList(
            origins
                .into_iter()
                .filter_map(|o| {
                    let normalized = normalize_origin(o.as_ref());
                    if normalized.is_none() {
                        tracing::warn!(
                            entry = o.as_ref(),
                            "Dropping allow-list entry with no origin"
                        );
                    }
                    normalized
                })
                .collect(),
        )
    }

    /// Allow-list policy that fails on the first entry without a
    /// `scheme://host` origin, returning that entry.
    pub fn try_allow_list<I, S>(origins: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        origins
            .into_iter()
            .map(|o| normalize_origin(o.as_ref()).ok_or_else(|| o.as_ref().to_string()))
            .collect::<Result<_, _>>()
            .map(Self::AllowList)
    }

    /// Also accept `origin`. No-op for [`AnyOrigin`](Self::AnyOrigin).
    #[must_use]
    pub fn including(self, origin: &str) -> Self {
        match self {
            Self::AnyOrigin => Self::AnyOrigin,
            Self::AllowList(mut allowed) => {
                if let Some(origin) = normalize_origin(origin) {
                    if !allowed.contains(&origin) {
                        allowed.push(origin);
                    }
                }
                Self::AllowList(allowed)
            }
        }
    }

    #[must_use]
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            Self::AnyOrigin => true,
            Self::AllowList(allowed) => {
                normalize_origin(origin).is_some_and(|origin| allowed.contains(&origin))
            }
        }
    }
}

/// `scheme://host[:port]` form of `origin`; `None` for opaque origins.
fn normalize_origin(origin: &str) -> Option<String> {
    let url = Url::parse(origin.trim()).ok()?;
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

/// Outcome of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Forwarded to [`SessionManager::complete_login`], which succeeded.
    Delivered,
    /// Not an auth-token message; dropped.
    Ignored,
    /// Sender origin not accepted by the [`OriginPolicy`]; dropped.
    Rejected,
    /// Forwarded, but the login could not be persisted.
    Failed,
}

/// Sending side of the cross-window channel.
///
/// Cloned into whatever delivers messages: the host's message-event bridge,
/// the OAuth completion window, or the manual token entry.
#[derive(Debug, Clone)]
pub struct MessagePort {
    sender: mpsc::UnboundedSender<ChannelMessage>,
}

impl MessagePort {
    /// Deliver `data` as if sent from `origin`.
    ///
    /// Returns `false` if the listener has shut down.
    pub fn post(&self, origin: impl Into<String>, data: JsonValue) -> bool {
        self.sender
            .send(ChannelMessage {
                origin: origin.into(),
                data,
            })
            .is_ok()
    }

    /// Deliver an `auth-token` message carrying `token`.
    pub fn post_auth_token(&self, origin: impl Into<String>, token: impl Into<String>) -> bool {
        let message = AuthMessage::AuthToken {
            token: token.into(),
        };
        match serde_json::to_value(&message) {
            Ok(data) => self.post(origin, data),
            Err(e) => {
                tracing::error!(error = %e, "Could not encode auth message");
                false
            }
        }
    }
}

/// Listener that turns inbound `auth-token` messages into logins.
///
/// Malformed messages never reach the [`SessionManager`] and never stop the
/// listener.
pub struct AuthChannel {
    receiver: mpsc::UnboundedReceiver<ChannelMessage>,
    policy: OriginPolicy,
}

/// Create a connected port/listener pair.
#[must_use]
pub fn auth_channel(policy: OriginPolicy) -> (MessagePort, AuthChannel) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (MessagePort { sender }, AuthChannel { receiver, policy })
}

impl AuthChannel {
    /// Handle messages one at a time until every [`MessagePort`] is dropped.
    pub async fn run<K: KeyValueStore>(self, manager: Arc<SessionManager<K>>) {
        let Self {
            mut receiver,
            policy,
        } = self;
        while let Some(message) = receiver.recv().await {
            dispatch_message(&policy, &message, &manager);
        }
        tracing::debug!("Auth channel closed");
    }

    /// Handle every message already queued, without waiting for more.
    pub fn drain<K: KeyValueStore>(&mut self, manager: &SessionManager<K>) -> Vec<Dispatch> {
        let mut outcomes = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            outcomes.push(dispatch_message(&self.policy, &message, manager));
        }
        outcomes
    }

    /// Handle a single message.
    pub fn dispatch<K: KeyValueStore>(
        &self,
        message: &ChannelMessage,
        manager: &SessionManager<K>,
    ) -> Dispatch {
        dispatch_message(&self.policy, message, manager)
    }

    #[must_use]
    pub fn policy(&self) -> &OriginPolicy {
        &self.policy
    }
}

fn dispatch_message<K: KeyValueStore>(
    policy: &OriginPolicy,
    message: &ChannelMessage,
    manager: &SessionManager<K>,
) -> Dispatch {
    if !policy.allows(&message.origin) {
        tracing::warn!(origin = %message.origin, "Auth message from untrusted origin dropped");
        return Dispatch::Rejected;
    }

    let Some(token) = parse_token(&message.data) else {
        tracing::debug!(origin = %message.origin, "Ignoring non-auth message");
        return Dispatch::Ignored;
    };

    match manager.complete_login(token) {
        Ok(()) => Dispatch::Delivered,
        Err(e) => {
            tracing::error!(error = %e, "Login from auth message failed");
            Dispatch::Failed
        }
    }
}

fn parse_token(data: &JsonValue) -> Option<BearerToken> {
    let AuthMessage::AuthToken { token } = AuthMessage::deserialize(data).ok()?;
    match BearerToken::try_from(token) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::debug!(error = %e, "Auth message carries an unusable token");
            None
        }
    }
}
