//! Word statistics over every regular stored file.
//!
//! A word is a maximal run of non-whitespace characters. File bytes are
//! decoded lossily, so binary content contributes replacement-character
//! words rather than failing the request.

use std::collections::HashMap;
use std::fs;
use std::io;

use fstore_core::protocol::WordCountPair;

use crate::storage::FileStore;

fn for_each_word(store: &FileStore, mut f: impl FnMut(&str)) -> io::Result<()> {
    for (_, path) in store.regular_files()? {
        let bytes = fs::read(&path)?;
        String::from_utf8_lossy(&bytes)
            .split_whitespace()
            .for_each(&mut f);
    }
    Ok(())
}

/// Total number of words across the store.
pub fn word_count(store: &FileStore) -> io::Result<u64> {
    let mut total = 0u64;
    for_each_word(store, |_| total += 1)?;
    Ok(total)
}

/// The `limit` most frequent words, highest count first. Equal counts are
/// ordered by word so the result is stable between calls.
pub fn frequent_words(store: &FileStore, limit: usize) -> io::Result<Vec<WordCountPair>> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for_each_word(store, |w| match counts.get_mut(w) {
        Some(n) => *n += 1,
        None => {
            counts.insert(w.to_string(), 1);
        }
    })?;

    let mut pairs: Vec<WordCountPair> = counts
        .into_iter()
        .map(|(word, count)| WordCountPair { word, count })
        .collect();
    pairs.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    pairs.truncate(limit);
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            fs::write(dir.path().join(name), text).unwrap();
        }
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn counts_words_across_files() {
        let (_dir, store) = store_with(&[
            ("a.txt", "the quick brown fox\n"),
            ("b.txt", "  jumps\tover\n\nthe lazy dog "),
        ]);
        assert_eq!(word_count(&store).unwrap(), 9);
    }

    #[test]
    fn empty_store_has_no_words() {
        let (_dir, store) = store_with(&[]);
        assert_eq!(word_count(&store).unwrap(), 0);
        assert!(frequent_words(&store, 10).unwrap().is_empty());
    }

    #[test]
    fn staging_files_are_not_counted() {
        let (_dir, store) = store_with(&[("a.txt", "one two")]);
        let mut staged = store.stage().unwrap();
        io::Write::write_all(&mut staged, b"three four five").unwrap();
        assert_eq!(word_count(&store).unwrap(), 2);
    }

    #[test]
    fn frequent_words_orders_by_count_then_word() {
        let (_dir, store) = store_with(&[
            ("a.txt", "b a c a b a"),
            ("b.txt", "d c"),
        ]);
        let top = frequent_words(&store, 10).unwrap();
        let got: Vec<(&str, u64)> = top.iter().map(|p| (p.word.as_str(), p.count)).collect();
        assert_eq!(got, vec![("a", 3), ("b", 2), ("c", 2), ("d", 1)]);
    }

    #[test]
    fn frequent_words_truncates_to_limit() {
        let text: String = (0..20).map(|i| format!("w{i:02} ")).collect();
        let (_dir, store) = store_with(&[("a.txt", text.as_str())]);
        let top = frequent_words(&store, 10).unwrap();
        assert_eq!(top.len(), 10);
        assert_eq!(top[0].word, "w00");
        assert_eq!(top[9].word, "w09");
    }
}
