//! Ordered multi-value parameter map shared by query strings, form bodies and
//! captured path parameters.

/// An insertion-ordered map from a name to one or more string values.
///
/// The same name may be added any number of times; values are never
/// overwritten, which is what lets a route template use one placeholder name
/// twice and keep both captures.
///
/// # Examples
///
/// ```
/// use rttp_route::http::Values;
///
/// let mut values = Values::new();
/// values.add("tag", "a");
/// values.add("tag", "b");
///
/// assert_eq!(values.get("tag"), Some("a"));
/// assert_eq!(values.get_all("tag"), ["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values {
    entries: Vec<(String, Vec<String>)>,
}

impl Values {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an `application/x-www-form-urlencoded` string.
    ///
    /// Percent-escapes and `+` are decoded. Malformed input yields an empty map
    /// rather than an error so a bad query string never blocks routing.
    pub fn parse(encoded: &str) -> Self {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded).unwrap_or_default();
        let mut values = Self::new();
        for (key, value) in pairs {
            values.add(key, value);
        }
        values
    }

    /// Appends `value` under `name`, after any values already present.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, list)) => list.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// Appends every value of `other`, preserving its order.
    pub fn extend(&mut self, other: &Values) {
        for (name, list) in other.iter() {
            for value in list {
                self.add(name, value.as_str());
            }
        }
    }

    /// Returns the first value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    /// Returns every value for `name` in insertion order.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, list)| list.as_slice())
            .unwrap_or(&[])
    }

    /// Returns `true` if at least one value exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, values)` in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Re-encodes the map as a query string.
    pub fn encode(&self) -> String {
        let pairs: Vec<(&str, &str)> = self
            .entries
            .iter()
            .flat_map(|(k, list)| list.iter().map(move |v| (k.as_str(), v.as_str())))
            .collect();
        serde_urlencoded::to_string(pairs).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_names_keep_every_value() {
        let mut v = Values::new();
        v.add("x", "foo");
        v.add("x", "bar");
        assert_eq!(v.get_all("x"), ["foo", "bar"]);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn parse_decodes_escapes() {
        let v = Values::parse("q=hello+world&path=%2Fa%2Fb&q=again");
        assert_eq!(v.get_all("q"), ["hello world", "again"]);
        assert_eq!(v.get("path"), Some("/a/b"));
    }

    #[test]
    fn missing_name_is_empty() {
        let v = Values::parse("a=1");
        assert_eq!(v.get("b"), None);
        assert!(v.get_all("b").is_empty());
        assert!(!v.contains("b"));
    }

    #[test]
    fn extend_appends_after_existing() {
        let mut base = Values::parse("id=query");
        let mut captured = Values::new();
        captured.add("id", "path");
        base.extend(&captured);
        assert_eq!(base.get("id"), Some("query"));
        assert_eq!(base.get_all("id"), ["query", "path"]);
    }

    #[test]
    fn encode_preserves_order() {
        let v = Values::parse("b=2&a=1&b=3");
        assert_eq!(v.encode(), "b=2&b=3&a=1");
    }
}
