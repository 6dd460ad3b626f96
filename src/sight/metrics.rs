/// 視線查詢統計
///
/// 計數器為原子操作，宿主可以在其他執行緒讀取或累加
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use super::provider::RayKind;

#[derive(Debug, Default)]
pub struct SightMetrics {
    pub calls: AtomicU64,
    pub pair_hits: AtomicU64,
    pub pair_puts: AtomicU64,
    pub grid_hits: AtomicU64,
    pub grid_puts: AtomicU64,
    pub ttl_hits: AtomicU64,
    pub ttl_puts: AtomicU64,
    pub dead_results: AtomicU64,
    pub multi_probes: AtomicU64,
    pub soft_probes: AtomicU64,
    pub path_segments: AtomicU64,
    pub ground_checks: AtomicU64,
    pub vertical_segments: AtomicU64,
    pub raw_segments: AtomicU64,
    pub base_rays: AtomicU64,
    pub filtered_rays: AtomicU64,
}

/// 某一時刻的統計快照
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub pair_hits: u64,
    pub pair_puts: u64,
    pub grid_hits: u64,
    pub grid_puts: u64,
    pub ttl_hits: u64,
    pub ttl_puts: u64,
    pub dead_results: u64,
    pub multi_probes: u64,
    pub soft_probes: u64,
    pub path_segments: u64,
    pub ground_checks: u64,
    pub vertical_segments: u64,
    pub raw_segments: u64,
    pub base_rays: u64,
    pub filtered_rays: u64,
}

#[inline]
fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl SightMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self) {
        bump(&self.calls);
    }

    pub fn record_ray(&self, kind: RayKind) {
        match kind {
            RayKind::Base => bump(&self.base_rays),
            RayKind::Filtered => bump(&self.filtered_rays),
            RayKind::Skipped => {}
        }
    }

    pub fn record(&self, counter: &AtomicU64) {
        bump(counter);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let r = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            calls: r(&self.calls),
            pair_hits: r(&self.pair_hits),
            pair_puts: r(&self.pair_puts),
            grid_hits: r(&self.grid_hits),
            grid_puts: r(&self.grid_puts),
            ttl_hits: r(&self.ttl_hits),
            ttl_puts: r(&self.ttl_puts),
            dead_results: r(&self.dead_results),
            multi_probes: r(&self.multi_probes),
            soft_probes: r(&self.soft_probes),
            path_segments: r(&self.path_segments),
            ground_checks: r(&self.ground_checks),
            vertical_segments: r(&self.vertical_segments),
            raw_segments: r(&self.raw_segments),
            base_rays: r(&self.base_rays),
            filtered_rays: r(&self.filtered_rays),
        }
    }

    pub fn reset(&self) {
        for c in [
            &self.calls,
            &self.pair_hits,
            &self.pair_puts,
            &self.grid_hits,
            &self.grid_puts,
            &self.ttl_hits,
            &self.ttl_puts,
            &self.dead_results,
            &self.multi_probes,
            &self.soft_probes,
            &self.path_segments,
            &self.ground_checks,
            &self.vertical_segments,
            &self.raw_segments,
            &self.base_rays,
            &self.filtered_rays,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

impl MetricsSnapshot {
    pub fn cache_hits(&self) -> u64 {
        self.pair_hits + self.grid_hits + self.ttl_hits
    }

    /// 三層合計命中率
    pub fn hit_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.cache_hits() as f64 / self.calls as f64
    }

    pub fn total_rays(&self) -> u64 {
        self.base_rays + self.filtered_rays
    }

    /// 人類可讀的統計輸出
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "calls            {}", self.calls);
        let _ = writeln!(
            out,
            "hit rate         {:.1}% ({} hits)",
            self.hit_rate() * 100.0,
            self.cache_hits()
        );
        let _ = writeln!(out, "pair   hit/put   {}/{}", self.pair_hits, self.pair_puts);
        let _ = writeln!(out, "grid   hit/put   {}/{}", self.grid_hits, self.grid_puts);
        let _ = writeln!(out, "ttl    hit/put   {}/{}", self.ttl_hits, self.ttl_puts);
        let _ = writeln!(out, "dead             {}", self.dead_results);
        let _ = writeln!(out, "multi probes     {}", self.multi_probes);
        let _ = writeln!(out, "soft probes      {}", self.soft_probes);
        let _ = writeln!(out, "path segments    {}", self.path_segments);
        let _ = writeln!(out, "ground checks    {}", self.ground_checks);
        let _ = writeln!(out, "vertical segs    {}", self.vertical_segments);
        let _ = writeln!(out, "raw segments     {}", self.raw_segments);
        let _ = writeln!(out, "rays base/filt   {}/{}", self.base_rays, self.filtered_rays);
        out
    }
}
