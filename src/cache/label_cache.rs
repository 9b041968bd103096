use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Thread-safe memo of type tag -> display label
///
/// Labels are a pure function of the tag, so entries are never evicted and a
/// racing duplicate insert is harmless: whichever value lands first is kept.
pub struct LabelCache {
    entries: RwLock<HashMap<String, Arc<str>>>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached label for `tag`, computing and storing it on first use
    pub fn get_or_insert_with<F>(&self, tag: &str, compute: F) -> Arc<str>
    where
        F: FnOnce(&str) -> String,
    {
        if let Some(label) = self.read().get(tag) {
            return Arc::clone(label);
        }

        let label: Arc<str> = Arc::from(compute(tag));
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(entries.entry(tag.to_string()).or_insert(label))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<str>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LabelCache {
    fn default() -> Self {
        Self::new()
    }
}

static LABELS: OnceLock<LabelCache> = OnceLock::new();

/// Process-wide label lookup: `work_orders` -> `Work Order`
pub fn type_label(tag: &str) -> Arc<str> {
    LABELS
        .get_or_init(LabelCache::new)
        .get_or_insert_with(tag, humanize)
}

fn humanize(tag: &str) -> String {
    let words: Vec<&str> = tag.split(|c| c == '_' || c == '-').filter(|w| !w.is_empty()).collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, word)| {
            let word = if i == last { singular(word) } else { (*word).to_string() };
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn singular(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if word.ends_with("sses") || word.ends_with("xes") {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}
