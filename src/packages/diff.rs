// src/packages/diff.rs

//! Default revision diff over two entry maps

use crate::packages::models::{PackageDiff, PackageEntry};
use std::collections::{BTreeMap, BTreeSet};

/// Entries of one revision keyed by logical key
pub type EntryMap = BTreeMap<String, PackageEntry>;

/// Compare two revisions by logical key and entry hash
///
/// Keys only in `new` are added, keys only in `old` are deleted, and shared
/// keys whose hashes differ are modified. All three lists are sorted.
pub fn diff_entries(old: &EntryMap, new: &EntryMap) -> PackageDiff {
    let old_keys: BTreeSet<&String> = old.keys().collect();
    let new_keys: BTreeSet<&String> = new.keys().collect();

    let added = new_keys.difference(&old_keys).map(|k| k.to_string()).collect();
    let deleted = old_keys.difference(&new_keys).map(|k| k.to_string()).collect();
    let modified = old_keys
        .intersection(&new_keys)
        .filter(|k| old[k.as_str()].hash != new[k.as_str()].hash)
        .map(|k| k.to_string())
        .collect();

    PackageDiff {
        added,
        deleted,
        modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(items: &[(&str, &str)]) -> EntryMap {
        items
            .iter()
            .map(|(key, hash)| {
                let mut entry = PackageEntry::new(key.to_string(), format!("s3://b/{}", key));
                entry.hash = Some(hash.to_string());
                (key.to_string(), entry)
            })
            .collect()
    }

    #[test]
    fn test_diff_added_and_modified() {
        let old = entries(&[("x", "h1")]);
        let new = entries(&[("x", "h2"), ("y", "h3")]);

        let diff = diff_entries(&old, &new);
        assert_eq!(diff.added, vec!["y"]);
        assert!(diff.deleted.is_empty());
        assert_eq!(diff.modified, vec!["x"]);
    }

    #[test]
    fn test_diff_is_anti_symmetric() {
        let a = entries(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let b = entries(&[("b", "2"), ("c", "9"), ("d", "4"), ("e", "5")]);

        let forward = diff_entries(&a, &b);
        let backward = diff_entries(&b, &a);
        assert_eq!(forward.added, backward.deleted);
        assert_eq!(forward.deleted, backward.added);
        assert_eq!(forward.modified, backward.modified);
        assert_eq!(forward.added, vec!["d", "e"]);
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let a = entries(&[("a", "1")]);
        assert!(diff_entries(&a, &a).is_empty());
    }
}
