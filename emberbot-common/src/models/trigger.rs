use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder substituted for every secret value in any outward-facing
/// projection of a trigger. Never a legal secret value.
pub const SECRET_MASK: &str = "<SecretValue>";

/// A configured rule mapping a channel + text pattern to an outbound webhook
/// template, optionally gated by an interactive selection/confirmation
/// dialog. This struct is also the persisted record: secrets are stored in
/// clear at rest, masking applies only on the way out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique, immutable once assigned. The repository fills it in on first
    /// save when empty.
    pub trigger_id: String,
    /// Display label for admin listings; defaults to `trigger_id`.
    pub title: String,
    pub channels: Vec<String>,
    /// Source regex, matched against incoming message text.
    pub pattern: String,
    pub text_template: String,
    pub url_template: String,
    pub body_template: String,
    /// Ordered choices offered in the select dialog. Empty means the trigger
    /// dispatches on first match with no dialog.
    pub actions: Vec<String>,
    /// Insert an extra yes/no step after selection.
    pub confirm: bool,
    pub secrets: HashMap<String, String>,
    /// Opaque tag, passed through untouched.
    pub trigger_type: String,
}

impl Trigger {
    pub fn is_interactive(&self) -> bool {
        !self.actions.is_empty()
    }

    /// Outward projection with every secret value replaced by [`SECRET_MASK`].
    pub fn masked(&self) -> Trigger {
        let mut out = self.clone();
        for value in out.secrets.values_mut() {
            *value = SECRET_MASK.to_string();
        }
        out
    }

    /// Scrubs secret values out of arbitrary text, e.g. an error string about
    /// to be posted back into chat.
    pub fn mask_secret_values(&self, raw: &str) -> String {
        let mut result = raw.to_string();
        for value in self.secrets.values() {
            if !value.is_empty() {
                result = result.replace(value.as_str(), SECRET_MASK);
            }
        }
        result
    }
}
