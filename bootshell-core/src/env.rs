use std::collections::BTreeMap;

/// An environment variable set, as passed to child processes.
///
/// Keys are kept sorted so that [`Environment::to_vec`] is deterministic.
/// On Windows variable names are case-insensitive and are normalised to
/// upper case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment.
    pub fn from_os() -> Self {
        std::env::vars_os()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect()
    }

    /// Parse `KEY=VALUE` entries. Entries without a `=` are ignored, later
    /// entries overwrite earlier ones.
    pub fn from_vec<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut env = Self::new();
        for entry in entries {
            if let Some((key, value)) = entry.as_ref().split_once('=') {
                env.set(key, value);
            }
        }
        env
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(&normalize_key(key)).map(String::as_str)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.vars.contains_key(&normalize_key(key))
    }

    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.vars.insert(normalize_key(key.as_ref()), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.vars.remove(&normalize_key(key))
    }

    /// Returns a new environment with `other` layered on top; `other` wins on
    /// key collisions.
    pub fn merge(&self, other: &Environment) -> Environment {
        let mut merged = self.clone();
        for (key, value) in &other.vars {
            merged.vars.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Flatten to `KEY=VALUE` entries, sorted by key.
    pub fn to_vec(&self) -> Vec<String> {
        self.vars
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut env = Self::new();
        for (key, value) in iter {
            env.set(key, value);
        }
        env
    }
}

#[cfg(windows)]
fn normalize_key(key: &str) -> String {
    key.to_uppercase()
}

#[cfg(not(windows))]
fn normalize_key(key: &str) -> String {
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_vec_splits_on_first_equals() {
        let env = Environment::from_vec(["A=1", "B=x=y", "broken", "C="]);

        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.get("B"), Some("x=y"));
        assert_eq!(env.get("C"), Some(""));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_merge_prefers_other() {
        let inherited = Environment::from_vec(["PATH=/usr/bin", "HOME=/home/agent"]);
        let extra = Environment::from_vec(["PATH=/opt/bin", "BUILD_ID=42"]);

        let merged = inherited.merge(&extra);

        assert_eq!(merged.get("PATH"), Some("/opt/bin"));
        assert_eq!(merged.get("HOME"), Some("/home/agent"));
        assert_eq!(merged.get("BUILD_ID"), Some("42"));
        // merge does not touch the receiver
        assert_eq!(inherited.get("PATH"), Some("/usr/bin"));
    }

    #[test]
    fn test_to_vec_is_sorted() {
        let env = Environment::from_vec(["Z=last", "A=first"]);
        assert_eq!(env.to_vec(), vec!["A=first".to_string(), "Z=last".to_string()]);
    }

    #[test]
    fn test_remove() {
        let mut env = Environment::from_vec(["A=1"]);
        assert_eq!(env.remove("A"), Some("1".to_string()));
        assert!(!env.exists("A"));
        assert!(env.is_empty());
    }
}
