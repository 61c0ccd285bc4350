// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::fmt;

/// An ordered set of label name/value pairs attached to every entry.
///
/// Its [`fmt::Display`] output is the canonical Prometheus label-set string
/// (`{k1="v1", k2="v2"}`) which doubles as the stream key inside a batch.
/// Keys are always rendered in sorted order, so two sets with equal contents
/// render identically regardless of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LabelSet(BTreeMap<String, String>);

impl LabelSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a new set holding both sets' labels. On conflicting names the
    /// value from `other` wins.
    #[must_use]
    pub fn merge(&self, other: &LabelSet) -> LabelSet {
        let mut merged = self.0.clone();
        for (k, v) in &other.0 {
            merged.insert(k.clone(), v.clone());
        }
        LabelSet(merged)
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        LabelSet(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}=\"")?;
            for c in value.chars() {
                match c {
                    '\\' => f.write_str("\\\\")?,
                    '"' => f.write_str("\\\"")?,
                    '\n' => f.write_str("\\n")?,
                    c => write!(f, "{c}")?,
                }
            }
            f.write_str("\"")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sorted_regardless_of_insertion_order() {
        let mut a = LabelSet::new();
        a.insert("stream", "stdout");
        a.insert("nomad_alloc_id", "abc");
        let b: LabelSet = [("nomad_alloc_id", "abc"), ("stream", "stdout")]
            .into_iter()
            .collect();

        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), r#"{nomad_alloc_id="abc", stream="stdout"}"#);
    }

    #[test]
    fn escapes_values() {
        let labels: LabelSet = [("msg", "say \"hi\"\\\nbye")].into_iter().collect();
        assert_eq!(labels.to_string(), r#"{msg="say \"hi\"\\\nbye"}"#);
    }

    #[test]
    fn empty_set_renders_braces() {
        assert_eq!(LabelSet::new().to_string(), "{}");
    }

    #[test]
    fn merge_prefers_right_hand_side() {
        let base: LabelSet = [("a", "1"), ("b", "2")].into_iter().collect();
        let extra: LabelSet = [("b", "3"), ("c", "4")].into_iter().collect();

        let merged = base.merge(&extra);

        assert_eq!(merged.get("a"), Some("1"));
        assert_eq!(merged.get("b"), Some("3"));
        assert_eq!(merged.get("c"), Some("4"));
        assert_eq!(merged.len(), 3);
        // inputs untouched
        assert_eq!(base.get("b"), Some("2"));
    }
}
