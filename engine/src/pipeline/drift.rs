//! Detection of hand edits to generated config files
//!
//! The hash of every well-known config file is stored after each run. On
//! regenerate the current remote content is hashed again; a mismatch means
//! the file was edited outside the engine.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::models::content::{GeneratedFile, GeneratedSite};
use crate::utils::config_hash;

/// Config files tracked for drift
pub const CONFIG_PATHS: [&str; 4] = ["docs.json", "package.json", "vercel.json", "theme.json"];

pub fn is_config_path(path: &str) -> bool {
    CONFIG_PATHS.contains(&path)
}

/// Hash of every tracked config file in a file set
pub fn compute_config_hashes(files: &[GeneratedFile]) -> BTreeMap<String, String> {
    files
        .iter()
        .filter(|f| is_config_path(&f.path))
        .map(|f| (f.path.clone(), config_hash(&f.content)))
        .collect()
}

/// Paths whose remote content no longer matches the stored hash
///
/// Files without a stored hash, and stored files missing remotely, are not
/// considered drifted.
pub fn detect_drift(stored: &BTreeMap<String, String>, remote: &[GeneratedFile]) -> BTreeSet<String> {
    remote
        .iter()
        .filter_map(|file| {
            let expected = stored.get(&file.path)?;
            (config_hash(&file.content) != *expected).then(|| file.path.clone())
        })
        .collect()
}

/// Leave drifted files out of a publish and keep their stored hashes
pub fn preserve_drifted(
    files: &mut Vec<GeneratedFile>,
    hashes: &mut BTreeMap<String, String>,
    drifted: &BTreeSet<String>,
    stored: &BTreeMap<String, String>,
) {
    files.retain(|f| !drifted.contains(&f.path));
    for path in drifted {
        match stored.get(path) {
            Some(hash) => hashes.insert(path.clone(), hash.clone()),
            None => hashes.remove(path),
        };
    }
}

/// Remote files under generator-owned prefixes that are no longer generated
pub fn stale_paths(
    remote_paths: &[String],
    generated: &GeneratedSite,
    keep: &BTreeSet<String>,
) -> Vec<String> {
    let fresh: HashSet<&str> = generated.files.iter().map(|f| f.path.as_str()).collect();

    remote_paths
        .iter()
        .filter(|path| {
            generated
                .owned_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
        })
        .filter(|path| !fresh.contains(path.as_str()) && !keep.contains(*path))
        .cloned()
        .collect()
}
