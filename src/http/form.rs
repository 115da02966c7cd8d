//! `application/x-www-form-urlencoded` field maps.
//!
//! Used for both query strings and browser form bodies. Decoding (percent
//! escapes and `+` as space) is delegated to [`url::form_urlencoded`].

use std::collections::HashMap;

/// Decoded form fields.
///
/// When a field is repeated, the last value wins, which is how browsers
/// expect a hidden-input-plus-checkbox pair to resolve.
///
/// # Examples
///
/// ```
/// use todoq::http::FormData;
///
/// let form = FormData::parse(b"title=Buy+milk&note=caf%C3%A9");
/// assert_eq!(form.get("title"), Some("Buy milk"));
/// assert_eq!(form.get("note"), Some("café"));
/// assert_eq!(form.get("missing"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: HashMap<String, String>,
}

impl FormData {
    /// Creates an empty field map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an urlencoded byte string.
    pub fn parse(input: &[u8]) -> Self {
        let fields = url::form_urlencoded::parse(input)
            .into_owned()
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { fields }
    }

    /// Returns the value of `name`, if it was submitted.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns `true` if `name` was submitted, even with an empty value.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_present() {
        let form = FormData::parse(b"title=&description=");
        assert!(form.contains("title"));
        assert_eq!(form.get("title"), Some(""));
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn last_repeated_value_wins() {
        let form = FormData::parse(b"completed=off&completed=on");
        assert_eq!(form.get("completed"), Some("on"));
    }

    #[test]
    fn empty_input() {
        assert!(FormData::parse(b"").is_empty());
    }

    #[test]
    fn nameless_pairs_are_dropped() {
        let form = FormData::parse(b"=orphan&title=x");
        assert_eq!(form.len(), 1);
    }
}
