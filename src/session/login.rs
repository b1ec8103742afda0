use std::sync::Arc;

use serde_json::Value as JsonValue;
use url::Url;

use super::channel::MessagePort;
use super::config::ConsoleConfig;
use super::traits::{WindowFeatures, WindowOpener};
use crate::error::Error;

/// The login view's two entry points: the OAuth popup and manual token entry.
///
/// Neither awaits an outcome. Both end up on the same [`MessagePort`] the
/// [`AuthChannel`](super::AuthChannel) listens on, so the session manager has
/// a single way in.
pub struct LoginInitiator {
    opener: Arc<dyn WindowOpener>,
    port: MessagePort,
    oauth_url: Url,
    popup_name: String,
    popup_features: WindowFeatures,
    app_origin: String,
}

impl LoginInitiator {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the OAuth endpoint URL cannot be built.
    pub fn new(
        config: &ConsoleConfig,
        opener: Arc<dyn WindowOpener>,
        port: MessagePort,
    ) -> Result<Self, Error> {
        Ok(Self {
            opener,
            port,
            oauth_url: config.oauth_url()?,
            popup_name: config.popup_name().to_string(),
            popup_features: config.popup_features().clone(),
            app_origin: config.app_origin(),
        })
    }

    /// Open the external OAuth exchange in a second window.
    ///
    /// Returns `false` if the host blocked the window; the manual path is the
    /// fallback then.
    pub fn begin_oauth(&self) -> bool {
        let opened = self
            .opener
            .open(&self.oauth_url, &self.popup_name, &self.popup_features);
        if opened {
            tracing::debug!(url = %self.oauth_url, "OAuth window opened");
        } else {
            tracing::warn!(url = %self.oauth_url, "OAuth window was blocked");
        }
        opened
    }

    /// Feed a pasted token into the auth channel.
    ///
    /// Accepts either the JSON document shown by the backend (`{"token": "..."}`)
    /// or the bare token. Returns `false` when nothing was posted.
    pub fn manual_submit(&self, raw_input: &str) -> bool {
        let Some(token) = extract_manual_token(raw_input) else {
            return false;
        };
        self.port.post_auth_token(self.app_origin.as_str(), token)
    }

    #[must_use]
    pub fn oauth_url(&self) -> &Url {
        &self.oauth_url
    }
}

/// Token carried by pasted text: the `token` field of a JSON object, or the
/// whole (trimmed) input.
pub(crate) fn extract_manual_token(raw_input: &str) -> Option<String> {
    let input = raw_input.trim();
    if input.is_empty() {
        return None;
    }

    let from_json = serde_json::from_str::<JsonValue>(input)
        .ok()
        .and_then(|value| {
            value
                .get("token")
                .and_then(|t| t.as_str())
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
        });

    Some(from_json.unwrap_or_else(|| input.to_owned()))
}
