// File: dropbot-common/src/models/clip.rs

use std::path::{Path, PathBuf};
use rand::Rng;
use rand::seq::IndexedRandom;

/// The encoded clips available for playback, ordered by file name.
///
/// Built once at startup from the output directory and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipInventory {
    clips: Vec<PathBuf>,
}

impl ClipInventory {
    /// Sorts by file name and drops duplicates.
    pub fn from_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut clips: Vec<PathBuf> = paths.into_iter().collect();
        clips.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
        clips.dedup();
        Self { clips }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.clips.iter().map(PathBuf::as_path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.clips.iter().any(|c| c == path)
    }

    /// Picks a clip uniformly at random, advancing `rng`.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Path> {
        self.clips.choose(rng).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn orders_by_file_name_and_dedups() {
        let inventory = ClipInventory::from_paths(vec![
            PathBuf::from("out/b.wav.dca"),
            PathBuf::from("out/a.wav.dca"),
            PathBuf::from("out/b.wav.dca"),
        ]);

        let names: Vec<_> = inventory.iter().collect();
        assert_eq!(names, vec![Path::new("out/a.wav.dca"), Path::new("out/b.wav.dca")]);
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn choose_on_empty_inventory_is_none() {
        let inventory = ClipInventory::default();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(inventory.is_empty());
        assert!(inventory.choose(&mut rng).is_none());
    }

    #[test]
    fn same_seed_picks_same_sequence() {
        let inventory = ClipInventory::from_paths(
            (0..8).map(|i| PathBuf::from(format!("out/{i}.wav.dca"))),
        );

        let mut first = StdRng::seed_from_u64(42);
        let mut second = StdRng::seed_from_u64(42);
        let a: Vec<_> = (0..16).map(|_| inventory.choose(&mut first).map(Path::to_path_buf)).collect();
        let b: Vec<_> = (0..16).map(|_| inventory.choose(&mut second).map(Path::to_path_buf)).collect();

        assert_eq!(a, b);
        assert!(a.iter().all(|p| p.as_deref().is_some_and(|p| inventory.contains(p))));
    }
}
