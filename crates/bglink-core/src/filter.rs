//! Recency filtering for repeatedly polled vendor windows.
//!
//! Vendor APIs return a rolling window (CareLink: the last 24 hours) on every
//! poll. [`RecencyFilter`] remembers the newest timestamp it has emitted so
//! each poll only surfaces records that are strictly newer.
//!
//! # Example
//!
//! ```
//! use bglink_core::RecencyFilter;
//!
//! let mut filter = RecencyFilter::new(|t: &i64| *t);
//!
//! assert_eq!(filter.filter(vec![2, 3, 4]), vec![2, 3, 4]);
//! assert!(filter.filter(vec![2, 3, 4]).is_empty());
//! assert_eq!(filter.filter(vec![2, 3, 4, 8, 6, 7, 5]), vec![8, 6, 7, 5]);
//! ```

/// Stateful filter that drops items at or before the newest time already emitted.
///
/// Items are returned in their input order, not re-sorted. Use one instance
/// per stream; the filter is driven through `&mut self` and is not shared.
pub struct RecencyFilter<T, F>
where
    F: Fn(&T) -> i64,
{
    time_of: F,
    last_seen: i64,
    _marker: std::marker::PhantomData<fn(&T)>,
}

impl<T, F> RecencyFilter<T, F>
where
    F: Fn(&T) -> i64,
{
    /// Create a filter that reads each item's time with `time_of`.
    pub fn new(time_of: F) -> Self {
        Self {
            time_of,
            last_seen: 0,
            _marker: std::marker::PhantomData,
        }
    }

    /// Newest time emitted so far (0 before anything has passed).
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    /// Keep only items strictly newer than anything emitted before.
    ///
    /// The high-water mark advances to the newest *returned* item, so items
    /// filtered out in this call never move it.
    pub fn filter<I>(&mut self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let kept = self.peek(items);
        self.commit(&kept);
        kept
    }

    /// Like [`filter`](Self::filter), but leaves the high-water mark alone.
    ///
    /// Pair with [`commit`](Self::commit) once the items have been handled,
    /// so a failed hand-off is retried on the next poll.
    pub fn peek<I>(&self, items: I) -> Vec<T>
    where
        I: IntoIterator<Item = T>,
    {
        let threshold = self.last_seen;
        items
            .into_iter()
            .filter(|item| (self.time_of)(item) > threshold)
            .collect()
    }

    /// Advance the high-water mark to the newest of `items`.
    ///
    /// Never moves it backwards.
    pub fn commit(&mut self, items: &[T]) {
        if let Some(newest) = items.iter().map(|item| (self.time_of)(item)).max() {
            self.last_seen = self.last_seen.max(newest);
        }
    }
}

impl<T, F> std::fmt::Debug for RecencyFilter<T, F>
where
    F: Fn(&T) -> i64,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecencyFilter")
            .field("last_seen", &self.last_seen)
            .finish_non_exhaustive()
    }
}
