use rayon::prelude::*;
use std::sync::OnceLock;

/// Chunk boundaries are rounded down to this many elements. A multiple of
/// the AVX2 batch, so only the final chunk ever reaches a scalar tail.
const PARALLEL_CHUNK_ALIGNMENT_ELEMENTS: usize = 4096;

/// Thresholds deciding when a bulk conversion is sharded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ParallelConfig {
    pub(crate) min_elements: usize,
    pub(crate) min_chunk_elements: usize,
    pub(crate) max_workers: usize,
}

impl ParallelConfig {
    /// Machine parallelism capped at `max_workers` (never below one).
    pub(crate) fn workers(&self) -> usize {
        machine_parallelism().min(self.max_workers.max(1))
    }

    /// Length of the chunks `element_count` elements should be split into,
    /// or `None` when the buffer is converted in one piece.
    pub(crate) fn chunk_len(&self, element_count: usize) -> Option<usize> {
        let workers = self.workers();
        if workers <= 1 {
            return None;
        }
        let threshold = self
            .min_elements
            .max(self.min_chunk_elements.saturating_mul(workers));
        if element_count < threshold {
            return None;
        }

        let per_worker = element_count / workers;
        let aligned = per_worker - per_worker % PARALLEL_CHUNK_ALIGNMENT_ELEMENTS;
        (aligned > 0 && element_count.div_ceil(aligned) >= 2).then_some(aligned)
    }
}

fn machine_parallelism() -> usize {
    static PARALLELISM: OnceLock<usize> = OnceLock::new();
    *PARALLELISM.get_or_init(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// The dedicated conversion pool, sized by the first caller. `None` when
/// only one worker is allowed or the pool could not be built.
fn conversion_pool(workers: usize) -> Option<&'static rayon::ThreadPool> {
    static POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();
    POOL.get_or_init(|| {
        if workers <= 1 {
            return None;
        }
        log::debug!("building conversion pool with {workers} workers");
        rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("halfcast-convert-{index}"))
            .build()
            .map_err(|err| log::debug!("conversion pool unavailable: {err}"))
            .ok()
    })
    .as_ref()
}

/// Builds the conversion pool ahead of the first large conversion.
pub(crate) fn warmup_pool(config: ParallelConfig) {
    let _ = conversion_pool(config.workers());
}

/// Applies `convert` to the paired prefix of `dst` and `src`, split into
/// disjoint aligned chunks on the conversion pool when the buffer is large
/// enough, or in one call otherwise. Returns the number of elements covered.
pub(crate) fn convert_chunked<S, D, F>(
    dst: &mut [D],
    src: &[S],
    config: ParallelConfig,
    convert: F,
) -> usize
where
    S: Sync,
    D: Send,
    F: Fn(&mut [D], &[S]) + Send + Sync,
{
    let count = dst.len().min(src.len());
    let dst = &mut dst[..count];
    let src = &src[..count];

    let plan = config
        .chunk_len(count)
        .and_then(|chunk| conversion_pool(config.workers()).map(|pool| (chunk, pool)));

    match plan {
        Some((chunk, pool)) => pool.install(|| {
            dst.par_chunks_mut(chunk)
                .zip(src.par_chunks(chunk))
                .for_each(|(dst_chunk, src_chunk)| convert(dst_chunk, src_chunk));
        }),
        None => convert(dst, src),
    }
    count
}
