//! One-shot messages carried in the session until the next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::constants::session::FLASH_KEY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Success,
    Info,
    Danger,
}

impl Category {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: Category,
    pub message: String,
}

/// Queue a message. Session failures are logged and otherwise ignored so a
/// broken session never hides the page itself.
pub async fn flash(session: &Session, category: Category, message: impl Into<String>) {
    let mut pending = session
        .get::<Vec<Flash>>(FLASH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();

    pending.push(Flash {
        category,
        message: message.into(),
    });

    if let Err(e) = session.insert(FLASH_KEY, pending).await {
        tracing::warn!("Failed to store flash message: {e}");
    }
}

pub async fn take_flashes(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(FLASH_KEY).await {
        Ok(flashes) => flashes.unwrap_or_default(),
        Err(e) => {
            tracing::warn!("Failed to read flash messages: {e}");
            Vec::new()
        }
    }
}
