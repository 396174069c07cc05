//! Audio track selection.

use lf_core::MediaFile;
use rand::seq::SliceRandom;
use rand::Rng;

/// Pick `count` tracks from `candidates`.
///
/// With `randomize` the candidates are shuffled (Fisher-Yates) before taking
/// the first `count`; otherwise they are sorted by name. The result has
/// `min(count, candidates.len())` entries and never repeats a candidate.
pub fn select_audio(candidates: &[MediaFile], count: usize, randomize: bool) -> Vec<MediaFile> {
    let mut rng = rand::thread_rng();
    select_audio_with_rng(candidates, count, randomize, &mut rng)
}

/// [`select_audio`] with a caller-supplied random source.
pub fn select_audio_with_rng<R: Rng + ?Sized>(
    candidates: &[MediaFile],
    count: usize,
    randomize: bool,
    rng: &mut R,
) -> Vec<MediaFile> {
    let mut pool = candidates.to_vec();
    if randomize {
        pool.shuffle(rng);
    } else {
        pool.sort_by(|a, b| a.name.cmp(&b.name));
    }
    pool.truncate(count);
    pool
}
