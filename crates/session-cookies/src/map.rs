use std::collections::HashMap;

/// Name to value mapping of cookies.
///
/// Entries keep their insertion order so that a session serializes back in the
/// order it was parsed, with newly added names appended at the end. Names are
/// matched case-sensitively. Equality ignores order.
#[derive(Debug, Clone, Default)]
pub struct CookieMap {
    entries: Vec<(String, String)>,
    index_by_name: HashMap<String, usize>,
}

impl CookieMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a cookie, returning the previous value if any.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let name = name.into();
        let value = value.into();

        if let Some(&idx) = self.index_by_name.get(&name) {
            return Some(std::mem::replace(&mut self.entries[idx].1, value));
        }

        self.index_by_name.insert(name.clone(), self.entries.len());
        self.entries.push((name, value));
        None
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index_by_name
            .get(name)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl PartialEq for CookieMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl Eq for CookieMap {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CookieMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = CookieMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}
