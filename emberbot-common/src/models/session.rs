use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Ephemeral state for a single trigger match, alive only for the duration
/// of the select/confirm dialog. Expiry is tracked by the session table, not
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// Whole regex match followed by submatches, in capture order.
    pub matched: Vec<String>,
    /// Empty until a `select` action arrives.
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Separator between trigger id and session id in the wire form of a token.
pub const TOKEN_SEPARATOR: char = '@';

/// The externally visible handle for a dialog: a trigger id paired with a
/// session id, round-tripped verbatim through the chat gateway's callback
/// metadata as `"{trigger_id}@{session_id}"`. Kept a typed pair everywhere
/// inside the core; the string form exists only at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallbackToken {
    pub trigger_id: String,
    pub session_id: String,
}

impl CallbackToken {
    /// Fails if either component contains the separator, which would make the
    /// wire form ambiguous.
    pub fn new(trigger_id: impl Into<String>, session_id: impl Into<String>) -> Result<Self, Error> {
        let trigger_id = trigger_id.into();
        let session_id = session_id.into();
        if trigger_id.contains(TOKEN_SEPARATOR) || session_id.contains(TOKEN_SEPARATOR) {
            return Err(Error::MalformedRequest(format!(
                "callback token components must not contain '{}'",
                TOKEN_SEPARATOR
            )));
        }
        Ok(Self {
            trigger_id,
            session_id,
        })
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.trigger_id, TOKEN_SEPARATOR, self.session_id)
    }
}

impl FromStr for CallbackToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(TOKEN_SEPARATOR) {
            Some((trigger_id, session_id))
                if !trigger_id.is_empty()
                    && !session_id.is_empty()
                    && !session_id.contains(TOKEN_SEPARATOR) =>
            {
                Ok(Self {
                    trigger_id: trigger_id.to_string(),
                    session_id: session_id.to_string(),
                })
            }
            _ => Err(Error::MalformedRequest(format!(
                "malformed callback token: {:?}",
                s
            ))),
        }
    }
}
