//! Cache invalidation utilities for derived data of hierarchical spaces.

use once_cell::sync::OnceCell;

/// Anything that caches derived data (classifications, index maps, …)
/// should implement this.
pub trait InvalidateCache {
    /// Invalidate *all* internal caches so future queries recompute correctly.
    fn invalidate_cache(&mut self);
}

// Blanket impl for Box<T>
impl<T: InvalidateCache + ?Sized> InvalidateCache for Box<T> {
    #[inline]
    fn invalidate_cache(&mut self) {
        (**self).invalidate_cache();
    }
}

/// A lazily computed value tagged with the generation it was computed for.
///
/// Readers go through `&self`; the owner bumps its generation on every
/// mutation and a stale value is never handed out.
#[derive(Clone, Debug, Default)]
pub struct GenerationCache<T> {
    cell: OnceCell<(u64, T)>,
}

impl<T> GenerationCache<T> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Value for `generation`, computing it with `init` if missing or stale.
    ///
    /// A stale value can only be replaced through `&mut self`; here it is
    /// recomputed and returned without caching.
    pub fn get_or_try_init<E>(
        &self,
        generation: u64,
        init: impl FnOnce() -> Result<T, E>,
    ) -> Result<CacheRef<'_, T>, E> {
        match self.cell.get() {
            Some((g, v)) if *g == generation => Ok(CacheRef::Cached(v)),
            Some(_) => init().map(CacheRef::Fresh),
            None => {
                let (_, v) = self.cell.get_or_try_init(|| init().map(|v| (generation, v)))?;
                Ok(CacheRef::Cached(v))
            }
        }
    }

    /// Generation of the cached value, if any.
    pub fn generation(&self) -> Option<u64> {
        self.cell.get().map(|(g, _)| *g)
    }
}

impl<T> InvalidateCache for GenerationCache<T> {
    fn invalidate_cache(&mut self) {
        self.cell.take();
    }
}

/// Borrowed cached value or a freshly computed one.
#[derive(Debug)]
pub enum CacheRef<'a, T> {
    Cached(&'a T),
    Fresh(T),
}

impl<T> std::ops::Deref for CacheRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            CacheRef::Cached(v) => v,
            CacheRef::Fresh(v) => v,
        }
    }
}
