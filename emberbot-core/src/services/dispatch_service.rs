use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use emberbot_common::error::Error;
use emberbot_common::models::Session;

use crate::http::HttpClient;
use crate::repositories::HydratedTrigger;

/// Renders a trigger's url/body templates against a session and fires the
/// webhook. One POST per dispatch; the response body is not inspected beyond
/// its status class.
pub struct DispatchService {
    http: Arc<dyn HttpClient>,
    timeout: Option<Duration>,
}

impl DispatchService {
    /// No default timeout; production wiring should set one so a stuck
    /// endpoint cannot hold a handler task forever.
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http, timeout: None }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn dispatch(&self, entry: &HydratedTrigger, session: &Session) -> Result<(), Error> {
        let trigger = &entry.trigger;

        // Both templates must render before anything goes on the wire.
        let rendered_url =
            entry
                .compiled
                .render_url(&session.value, &session.matched, &trigger.secrets)?;
        let body =
            entry
                .compiled
                .render_body(&session.value, &session.matched, &trigger.secrets)?;

        let url = Url::parse(rendered_url.trim()).map_err(|e| {
            Error::InvalidUrl(format!(
                "{}: {}",
                trigger.mask_secret_values(&rendered_url),
                e
            ))
        })?;

        debug!(
            trigger_id = %trigger.trigger_id,
            url = %trigger.mask_secret_values(url.as_str()),
            "sending webhook request"
        );

        let status = self.http.post_json(&url, body, self.timeout).await?;
        if (200..300).contains(&status) {
            info!(trigger_id = %trigger.trigger_id, status, "webhook delivered");
            Ok(())
        } else {
            info!(trigger_id = %trigger.trigger_id, status, "webhook rejected");
            Err(Error::WebhookRejected(status))
        }
    }
}
