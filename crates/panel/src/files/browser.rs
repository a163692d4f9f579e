//! Directory listing within a server root.
//!
//! Listing is best effort: entries that disappear mid-listing, cannot be
//! stat-ed, or have names that are not valid UTF-8 are left out and counted
//! in [`Listing::skipped`] instead of failing the whole directory.

use std::cmp::Ordering;
use std::fs;

use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::error::FileError;
use super::guard::{join_relative, ConfinedPath};
use super::metadata::FileItem;

/// Result of listing a directory.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    /// Entries, directories first, then by name.
    pub items: Vec<FileItem>,
    /// Entries that could not be described.
    pub skipped: usize,
}

/// List the immediate children of a confined directory.
pub fn list_directory(dir: &ConfinedPath) -> Result<Listing, FileError> {
    let metadata = fs::metadata(dir.as_path()).map_err(|e| FileError::from_io(e, dir.relative()))?;
    if !metadata.is_dir() {
        return Err(FileError::NotADirectory(dir.relative().to_string()));
    }

    let entries = fs::read_dir(dir.as_path()).map_err(|e| FileError::from_io(e, dir.relative()))?;

    let mut listing = Listing::default();

    for entry_result in entries {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                debug!(dir = %dir.relative(), error = %e, "Skipping unreadable directory entry");
                listing.skipped += 1;
                continue;
            }
        };

        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                debug!(dir = %dir.relative(), name = ?raw, "Skipping entry with non UTF-8 name");
                listing.skipped += 1;
                continue;
            }
        };

        // Follows symlinks; dangling links fail here and are skipped
        let metadata = match fs::metadata(entry.path()) {
            Ok(m) => m,
            Err(e) => {
                debug!(dir = %dir.relative(), name = %name, error = %e, "Skipping entry we can't stat");
                listing.skipped += 1;
                continue;
            }
        };

        let path = join_relative(dir.relative(), &name);
        listing.items.push(FileItem::from_metadata(name, path, &metadata));
    }

    listing.items.sort_by(compare_items);

    Ok(listing)
}

/// Directories first, then locale-style name order.
pub fn compare_items(a: &FileItem, b: &FileItem) -> Ordering {
    match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => compare_names(&a.name, &b.name),
    }
}

/// Locale-style name collation.
///
/// Names compare first on their base letters: each name is decomposed to
/// NFD, combining marks are dropped and letters are lowercased, so `Ärger`
/// sorts beside `arger` rather than after `z`. Ties are broken by accents
/// (unaccented first), then by case (lowercase first), then by raw code
/// point so the order is total.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| accented_letters(a).cmp(accented_letters(b)))
        .then_with(|| compare_case(a, b))
        .then_with(|| a.cmp(b))
}

fn base_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
}

fn accented_letters(name: &str) -> impl Iterator<Item = char> + '_ {
    name.nfd().flat_map(char::to_lowercase)
}

fn compare_case(a: &str, b: &str) -> Ordering {
    for (ca, cb) in a.nfd().zip(b.nfd()) {
        if ca != cb {
            return match (ca.is_lowercase(), cb.is_lowercase()) {
                (true, false) => Ordering::Less,
                (false, true) => Ordering::Greater,
                _ => Ordering::Equal,
            };
        }
    }
    Ordering::Equal
}
