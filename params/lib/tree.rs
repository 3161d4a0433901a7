use std::{
    collections::BTreeMap,
    ops::{Deref, DerefMut},
};

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A single value in a [`ParamTree`]: null, a boolean, a number, a string,
/// or a nested tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// The JSON/YAML `null`.
    Null,
    /// A boolean scalar.
    Bool(bool),
    /// A numeric scalar, kept as [`serde_json::Number`] so integers and
    /// floats round-trip exactly regardless of source format.
    Number(serde_json::Number),
    /// A string scalar.
    String(String),
    /// A nested parameter tree.
    Tree(ParamTree),
}

/// A recursive mapping from string keys to [`ParamValue`]s, addressable by
/// dotted path (`"a.b.c"`) rather than nested field access.
///
/// Keys are kept in a [`BTreeMap`] for deterministic serialization; `serde`
/// maps directly to/from a JSON or YAML object with no wrapper, via
/// `#[serde(transparent)]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamTree(BTreeMap<String, ParamValue>);

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ParamTree {
    /// Builds an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `dotted_path`, walking nested trees one segment at a time.
    /// Returns `None` if any segment is missing, or if a non-leaf segment
    /// names a scalar rather than a nested tree.
    pub fn get(&self, dotted_path: &str) -> Option<&ParamValue> {
        let mut segments = dotted_path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;

        for segment in segments {
            match current {
                ParamValue::Tree(tree) => current = tree.0.get(segment)?,
                _ => return None,
            }
        }

        Some(current)
    }

    /// Sets `dotted_path` to `value`, creating intermediate trees along the
    /// way and overwriting any non-tree value a path segment needs to
    /// descend through.
    pub fn set(&mut self, dotted_path: &str, value: ParamValue) {
        let mut segments = dotted_path.split('.').peekable();
        let mut current = self;

        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                current.0.insert(segment.to_string(), value);
                return;
            }

            let entry = current.0.entry(segment.to_string()).or_insert_with(|| ParamValue::Tree(ParamTree::new()));
            if !matches!(entry, ParamValue::Tree(_)) {
                *entry = ParamValue::Tree(ParamTree::new());
            }

            current = match entry {
                ParamValue::Tree(tree) => tree,
                _ => unreachable!("just normalized to a tree above"),
            };
        }
    }
}

impl Deref for ParamTree {
    type Target = BTreeMap<String, ParamValue>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ParamTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, ParamValue>> for ParamTree {
    fn from(map: BTreeMap<String, ParamValue>) -> Self {
        Self(map)
    }
}

/// Deep-merges `src` into `dst`: for every key present in both as a tree,
/// merges recursively; otherwise `src`'s value (of any type) overwrites
/// `dst`'s.
pub fn merge(dst: &mut ParamTree, src: ParamTree) {
    for (key, src_value) in src.0 {
        match (dst.0.get_mut(&key), src_value) {
            (Some(ParamValue::Tree(dst_tree)), ParamValue::Tree(src_tree)) => {
                merge(dst_tree, src_tree);
            }
            (_, src_value) => {
                dst.0.insert(key, src_value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: i64) -> ParamValue {
        ParamValue::Number(serde_json::Number::from(n))
    }

    #[test]
    fn get_walks_nested_trees() {
        let mut tree = ParamTree::new();
        tree.set("a.b.c", num(1));

        assert_eq!(tree.get("a.b.c"), Some(&num(1)));
    }

    #[test]
    fn get_returns_none_for_missing_segment() {
        let tree = ParamTree::new();
        assert_eq!(tree.get("missing"), None);
        assert_eq!(tree.get("a.b.c"), None);
    }

    #[test]
    fn get_returns_none_when_indexing_into_scalar() {
        let mut tree = ParamTree::new();
        tree.set("a", num(1));
        assert_eq!(tree.get("a.b"), None);
    }

    #[test]
    fn set_overwrites_scalar_with_tree_when_path_continues() {
        let mut tree = ParamTree::new();
        tree.set("a", num(1));
        tree.set("a.b", num(2));

        assert_eq!(tree.get("a.b"), Some(&num(2)));
    }

    #[test]
    fn merge_deep_merges_nested_trees() {
        let mut dst = ParamTree::new();
        dst.set("a.x", num(1));
        dst.set("a.y", num(2));

        let mut src = ParamTree::new();
        src.set("a.y", num(3));
        src.set("a.z", num(4));

        merge(&mut dst, src);

        assert_eq!(dst.get("a.x"), Some(&num(1)));
        assert_eq!(dst.get("a.y"), Some(&num(3)));
        assert_eq!(dst.get("a.z"), Some(&num(4)));
    }

    #[test]
    fn merge_scalar_from_src_overwrites_dst_tree() {
        let mut dst = ParamTree::new();
        dst.set("a.x", num(1));

        let mut src = ParamTree::new();
        src.set("a", ParamValue::String("scalar now".to_string()));

        merge(&mut dst, src);

        assert_eq!(dst.get("a"), Some(&ParamValue::String("scalar now".to_string())));
        assert_eq!(dst.get("a.x"), None);
    }

    #[test]
    fn roundtrips_through_json() {
        let mut tree = ParamTree::new();
        tree.set("a.b", num(42));
        tree.set("a.c", ParamValue::Bool(true));
        tree.set("s", ParamValue::String("hi".to_string()));

        let json = serde_json::to_string(&tree).unwrap();
        let back: ParamTree = serde_json::from_str(&json).unwrap();

        assert_eq!(tree, back);
    }

    #[test]
    fn roundtrips_through_yaml() {
        let mut tree = ParamTree::new();
        tree.set("a.b", num(42));
        tree.set("n", ParamValue::Null);

        let yaml = serde_yaml::to_string(&tree).unwrap();
        let back: ParamTree = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(tree, back);
    }
}
