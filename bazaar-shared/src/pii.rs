use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps customer contact data (phone numbers, e-mail addresses) so that it
/// never shows up verbatim in `Debug`/`Display` output, e.g. inside
/// `tracing::info!("{:?}", order)`.
///
/// Serialization still writes the real value: the wrapper exists to stop
/// leakage through log macros, not to redact persisted data.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl From<String> for Masked<String> {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_never_leaks() {
        let phone = Masked::new("01712345678".to_string());
        assert_eq!(format!("{:?}", phone), "********");
        assert_eq!(phone.to_string(), "********");
    }

    #[test]
    fn test_serialize_keeps_value() {
        let email = Masked::new("buyer@example.com".to_string());
        let json = serde_json::to_string(&email).unwrap();
        assert_eq!(json, "\"buyer@example.com\"");

        let back: Masked<String> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "buyer@example.com");
    }
}
