//! Flat `key=value` sidecar files (`.skmap`, `.mat`).

use std::{collections::HashMap, fs, path::Path};

use corelib::{CoreError, CoreResult};

/// Parsed `key=value` mapping. Later duplicates replace earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyValueStore {
    entries: HashMap<String, String>,
}

impl KeyValueStore {
    /// Load and parse a sidecar file. Failing to read it is fatal for the caller.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| CoreError::io(path, e))?;
        let store = Self::parse(&bytes);
        log::debug!("Read {} entries from {:?}", store.len(), path);
        Ok(store)
    }

    /// Keys run up to the first `=`, values up to the next `\n`.
    /// There is no escaping; a final line without `=` becomes a key with an empty value.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut entries = HashMap::new();
        let mut rest = bytes;

        while !rest.is_empty() {
            let (key, after_key) = split_at_byte(rest, b'=');
            let (value, after_value) = split_at_byte(after_key, b'\n');
            let value = trim_line_end(value);

            entries.insert(
                String::from_utf8_lossy(key).into_owned(),
                String::from_utf8_lossy(value).into_owned(),
            );
            rest = after_value;
        }

        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries ordered by key.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValueStore {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Strip trailing NUL, CR and LF bytes.
pub(crate) fn trim_line_end(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| !matches!(b, 0 | b'\r' | b'\n'))
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Split at the first `sep`, dropping it. Without a separator everything is the head.
fn split_at_byte(bytes: &[u8], sep: u8) -> (&[u8], &[u8]) {
    match bytes.iter().position(|&b| b == sep) {
        Some(i) => (&bytes[..i], &bytes[i + 1..]),
        None => (bytes, &[]),
    }
}
