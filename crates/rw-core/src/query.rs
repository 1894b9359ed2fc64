//! Query string editing
//!
//! An ordered list of decoded `name=value` pairs with the lookup and update
//! semantics browsers give `URLSearchParams`: `get` sees the first
//! occurrence, `delete` drops every occurrence, `set` rewrites the first
//! occurrence in place and drops the rest. Serialization uses
//! `application/x-www-form-urlencoded`, so an edited query may be re-encoded
//! differently from the original text.

use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse a raw query (without the leading `?`).
    pub fn parse(query: &str) -> Self {
        let pairs = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    #[inline]
    pub fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == name)
    }

    /// Value of the first pair named `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove every pair named `name`. Returns true if anything was removed.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.pairs.len();
        self.pairs.retain(|(k, _)| k != name);
        self.pairs.len() != before
    }

    pub fn set(&mut self, name: &str, value: &str) {
        let mut kept = Vec::with_capacity(self.pairs.len() + 1);
        let mut found = false;

        for (k, v) in self.pairs.drain(..) {
            if k != name {
                kept.push((k, v));
            } else if !found {
                found = true;
                kept.push((k, value.to_string()));
            }
        }

        if !found {
            kept.push((name.to_string(), value.to_string()));
        }
        self.pairs = kept;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize without the leading `?`. Empty when there are no pairs.
    pub fn serialize(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish()
    }
}
