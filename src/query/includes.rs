//! Include paths requested for eager loading.

use std::fmt;
use std::sync::Arc;

use super::RecordQuery;

/// Callback narrowing the query that loads one relation.
pub type RelationFilter = Arc<dyn for<'a> Fn(RecordQuery<'a>) -> RecordQuery<'a> + Send + Sync>;

/// One relation path (`"articles"` or `"articles.comments"`) with an
/// optional filter applied to the query of its last segment.
#[derive(Clone)]
pub struct Include {
    path: String,
    filter: Option<RelationFilter>,
}

impl Include {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filter: None,
        }
    }

    pub fn filtered<F>(path: impl Into<String>, filter: F) -> Self
    where
        F: for<'a> Fn(RecordQuery<'a>) -> RecordQuery<'a> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            filter: Some(Arc::new(filter)),
        }
    }

    pub(crate) fn from_parts(path: impl Into<String>, filter: Option<RelationFilter>) -> Self {
        Self {
            path: path.into(),
            filter,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn filter(&self) -> Option<&RelationFilter> {
        self.filter.as_ref()
    }
}

impl From<&str> for Include {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for Include {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl fmt::Debug for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Include")
            .field("path", &self.path)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Ordered set of include paths; one entry per path.
///
/// Removed paths are remembered as exclusions so that a relation the
/// related model includes by default can be switched off from above
/// (`"comments.author"`).
#[derive(Debug, Clone, Default)]
pub struct Includes {
    entries: Vec<Include>,
    excluded: Vec<String>,
}

impl Includes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path. An existing entry for the same path is dropped, so the
    /// newest filter (or the lack of one) wins and the path moves to the end.
    pub fn insert(&mut self, include: impl Into<Include>) {
        let include = include.into();
        self.entries.retain(|entry| entry.path != include.path);
        self.excluded.retain(|path| *path != include.path);
        self.entries.push(include);
    }

    /// Remove a path and every path nested beneath it, and remember the
    /// path as excluded.
    pub fn remove(&mut self, path: &str) {
        let nested = format!("{path}.");
        self.entries
            .retain(|entry| entry.path != path && !entry.path.starts_with(&nested));
        if !self.excluded.iter().any(|p| p == path) {
            self.excluded.push(path.to_owned());
        }
    }

    /// Apply the exclusions of `other`, then add its entries.
    pub fn merge(&mut self, other: Includes) {
        for path in &other.excluded {
            self.remove(path);
        }
        for include in other.entries {
            self.insert(include);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.excluded.clear();
    }

    /// Paths removed with [`remove`](Self::remove) and not added back.
    pub fn excluded(&self) -> &[String] {
        &self.excluded
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|entry| entry.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Include> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(Include::path).collect()
    }
}

impl<T: Into<Include>> FromIterator<T> for Includes {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut includes = Includes::new();
        for include in iter {
            includes.insert(include);
        }
        includes
    }
}

impl IntoIterator for Includes {
    type Item = Include;
    type IntoIter = std::vec::IntoIter<Include>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'i> IntoIterator for &'i Includes {
    type Item = &'i Include;
    type IntoIter = std::slice::Iter<'i, Include>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_entry_replaces_filtered_one() {
        let mut includes = Includes::new();
        includes.insert(Include::filtered("articles", |q| q.limit(1)));
        includes.insert("user");
        includes.insert("articles");

        assert_eq!(includes.paths(), vec!["user", "articles"]);
        assert!(includes.iter().all(|i| i.filter().is_none()));
    }

    #[test]
    fn test_remove_drops_nested_paths() {
        let mut includes: Includes = ["articles", "articles.comments", "articles_meta", "user"]
            .into_iter()
            .collect();
        includes.remove("articles");

        assert_eq!(includes.paths(), vec!["articles_meta", "user"]);
        assert!(!includes.contains("articles.comments"));
        assert_eq!(includes.excluded(), ["articles"]);
    }

    #[test]
    fn test_merge_applies_exclusions_before_entries() {
        let mut defaults: Includes = ["author", "replies"].into_iter().collect();
        let mut nested: Includes = ["replies.author"].into_iter().collect();
        nested.remove("author");
        defaults.merge(nested);

        assert_eq!(defaults.paths(), vec!["replies", "replies.author"]);

        defaults.insert("author");
        assert!(defaults.contains("author"));
        assert!(defaults.excluded().is_empty());
    }
}
