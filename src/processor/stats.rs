use std::fmt;

use serde::Serialize;

use crate::cache::CacheStats;

/// Counters accumulated by a [`GraphProcessor`](super::GraphProcessor).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessorStats {
    /// Requests served (subgraph, graph-metrics and weight queries).
    pub requests: u64,
    /// Result cache counters.
    pub cache: CacheStats,
    /// Entries currently held by the cache.
    pub cached_entries: usize,
}

impl ProcessorStats {
    /// Share of subgraph lookups answered from the cache.
    pub fn cache_hit_rate(&self) -> f64 {
        self.cache.hit_rate()
    }
}

impl fmt::Display for ProcessorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Processor Stats ===")?;
        writeln!(f, "Requests:        {}", self.requests)?;
        writeln!(f, "Cache Hits:      {}", self.cache.hits)?;
        writeln!(f, "Cache Misses:    {}", self.cache.misses)?;
        writeln!(
            f,
            "Cache Hit Rate:  {:.2}%",
            self.cache_hit_rate() * 100.0
        )?;
        writeln!(f, "Computations:    {}", self.cache.computations)?;
        writeln!(f, "Invalidations:   {}", self.cache.invalidations)?;
        write!(f, "Cached Entries:  {}", self.cached_entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_hit_rate() {
        let stats = ProcessorStats {
            requests: 4,
            cache: CacheStats {
                hits: 3,
                misses: 1,
                computations: 1,
                invalidations: 0,
            },
            cached_entries: 1,
        };
        assert_eq!(stats.cache_hit_rate(), 0.75);
        assert!(stats.to_string().contains("Cache Hit Rate:  75.00%"));
    }
}
