//! Document validation seam
//!
//! Schema validation belongs to whoever embeds the catalog. The catalog only
//! calls [`Validator::validate`] before every add and update and reports a
//! failure as `BadRequest`.

use super::entry::Entry;

/// Validates entries before they are written
pub trait Validator: Send + Sync + 'static {
    /// Return a human readable reason when the entry is invalid
    fn validate(&self, entry: &Entry) -> Result<(), String>;
}

/// Validator that accepts every document
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _entry: &Entry) -> Result<(), String> {
        Ok(())
    }
}

impl<F> Validator for F
where
    F: Fn(&Entry) -> Result<(), String> + Send + Sync + 'static,
{
    fn validate(&self, entry: &Entry) -> Result<(), String> {
        self(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_validator() {
        let requires_name = |entry: &Entry| {
            if entry.payload.contains_key("name") {
                Ok(())
            } else {
                Err("name is required".to_string())
            }
        };

        assert!(requires_name.validate(&Entry::new("a")).is_err());
        assert!(requires_name
            .validate(&Entry::new("a").with_field("name", "x"))
            .is_ok());
        assert!(AcceptAll.validate(&Entry::new("")).is_ok());
    }
}
