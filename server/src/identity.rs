use shared::{color_for, IdentityConfirmation};
use uuid::Uuid;

/// A participant's identity for the lifetime of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub color: String,
}

impl Identity {
    pub fn confirmation(&self) -> IdentityConfirmation {
        IdentityConfirmation {
            id: self.id.clone(),
            color: self.color.clone(),
        }
    }

    /// First eight characters of the id, for log lines
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}

/// Resolves the identity for an identify request
///
/// A supplied identifier is reused verbatim; an absent or empty one gets a
/// fresh UUID v4. The color is always derived from the id, so a returning
/// participant recovers the same color without server-side storage.
pub fn resolve(supplied: Option<String>) -> Identity {
    let id = match supplied {
        Some(id) if !id.is_empty() => id,
        _ => Uuid::new_v4().to_string(),
    };
    let color = color_for(&id);
    Identity { id, color }
}
