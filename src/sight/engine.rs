/// 視線查詢引擎
///
/// 把快照、探測幾何、提供者、三層緩存、統計與設定組合成對外的查詢介面。
/// 引擎是一個明確的上下文物件，由世界（World）持有，沒有全域狀態。
/// 所有會改動緩存的操作都需要 `&mut self`，單一寫入者由借用規則保證
use instant::Instant;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;
use vek::Vec3;

use crate::config::{SettingsOverrides, SightSettings};

use super::cache::{CacheSizes, GridCache, PairCache, PairKey, TtlCache, TtlKey};
use super::metrics::{MetricsSnapshot, SightMetrics};
use super::options::{QueryFlags, QueryOptions, QueryPreset, TraceFilter};
use super::probe;
use super::provider::{FilteredSegmentProbe, MaskedSegmentProbe, ProviderBinding, SegmentProbe};
use super::snapshot::TargetSnapshot;
use super::visibility::{SightReason, Visibility};

pub struct SightEngine {
    settings: SightSettings,
    provider: ProviderBinding,
    ttl: TtlCache,
    grid: GridCache,
    pair: PairCache,
    metrics: Arc<SightMetrics>,
}

impl SightEngine {
    pub fn new(settings: SightSettings) -> Self {
        let settings = settings.clamped();
        Self {
            ttl: TtlCache::new(settings.ttl(), settings.ttl_max_entries),
            grid: GridCache::new(settings.grid_cell_size),
            pair: PairCache::new(),
            metrics: Arc::new(SightMetrics::new()),
            provider: ProviderBinding::AliveOnly,
            settings,
        }
    }

    /// 註冊支援過濾與遮罩的提供者
    pub fn register_filtered<P: FilteredSegmentProbe + 'static>(&mut self, provider: P) {
        self.bind(ProviderBinding::Filtered(Box::new(provider)));
    }

    /// 註冊只支援遮罩的提供者
    pub fn register_masked<P: MaskedSegmentProbe + 'static>(&mut self, provider: P) {
        self.bind(ProviderBinding::Masked(Box::new(provider)));
    }

    /// 註冊只有基本線段檢測的提供者
    pub fn register_base<P: SegmentProbe + 'static>(&mut self, provider: P) {
        self.bind(ProviderBinding::Base(Box::new(provider)));
    }

    /// 移除提供者，退回「存活即可見」
    pub fn clear_provider(&mut self) {
        self.bind(ProviderBinding::AliveOnly);
    }

    fn bind(&mut self, binding: ProviderBinding) {
        log::info!("sight provider registered: {}", binding.level());
        self.provider = binding;
        // 不同提供者的結果不能混用
        self.clear_all_tiers();
    }

    pub fn provider_level(&self) -> &'static str {
        self.provider.level()
    }

    pub fn settings(&self) -> &SightSettings {
        &self.settings
    }

    /// 依目前設定建立查詢參數
    pub fn options(&self, flags: QueryFlags) -> QueryOptions {
        let s = &self.settings;
        QueryOptions {
            flags,
            filter: s.default_filter,
            mask: s.default_mask,
            ground_point: None,
            path_steps: s.path_steps,
            soft_fudge: s.soft_fudge,
            capsule_radius: s.capsule_radius,
            head_height: s.head_height,
        }
    }

    pub fn preset_options(&self, preset: QueryPreset) -> QueryOptions {
        self.options(preset.flags())
    }

    pub fn visible(
        &mut self,
        observer: &TargetSnapshot,
        subject: &TargetSnapshot,
        options: &QueryOptions,
    ) -> Visibility {
        self.visible_at(observer, subject, options, Instant::now())
    }

    pub fn visible_preset(
        &mut self,
        observer: &TargetSnapshot,
        subject: &TargetSnapshot,
        preset: QueryPreset,
    ) -> Visibility {
        let options = self.preset_options(preset);
        self.visible(observer, subject, &options)
    }

    pub fn visible_default(&mut self, observer: &TargetSnapshot, subject: &TargetSnapshot) -> Visibility {
        self.visible_preset(observer, subject, QueryPreset::Default)
    }

    /// 不使用軟性點雲
    pub fn visible_hard(&mut self, observer: &TargetSnapshot, subject: &TargetSnapshot) -> Visibility {
        self.visible_preset(observer, subject, QueryPreset::Hard)
    }

    pub fn visible_on_path(&mut self, observer: &TargetSnapshot, subject: &TargetSnapshot) -> Visibility {
        self.visible_preset(observer, subject, QueryPreset::OnPath)
    }

    /// 忽略所有單位，只看世界幾何
    pub fn visible_world_only_hard(&mut self, observer: &TargetSnapshot, subject: &TargetSnapshot) -> Visibility {
        self.visible_preset(observer, subject, QueryPreset::WorldOnlyHard)
    }

    /// 以指定時間點查詢，TTL 層依此判斷過期
    pub fn visible_at(
        &mut self,
        observer: &TargetSnapshot,
        subject: &TargetSnapshot,
        options: &QueryOptions,
        now: Instant,
    ) -> Visibility {
        self.metrics.record_call();
        let signature = options.cache_signature();
        // 地面點只有在地面檢查開啟時才影響結果
        let ground = options.ground_point.filter(|_| options.flags.contains(QueryFlags::GROUND_CHECK));
        let pair_key = PairKey::new(observer.identity, subject.identity, signature).map(|k| k.with_ground(ground));

        // 死亡的目標一律不可見，幾何緩存不能讓它復活
        if !subject.alive {
            self.metrics.record(&self.metrics.dead_results);
            let result = Visibility::blocked(SightReason::Dead);
            self.backfill_pair(pair_key, result);
            return result;
        }

        if let Some(key) = &pair_key {
            if let Some(result) = self.pair.get(key) {
                self.metrics.record(&self.metrics.pair_hits);
                return result;
            }
        }

        let grid_key = if self.settings.grid_enabled {
            Some(self.grid.key(observer.position, subject.position, ground, signature))
        } else {
            None
        };
        if let Some(key) = &grid_key {
            if let Some(result) = self.grid.get(key, options.is_orientation_free()) {
                self.metrics.record(&self.metrics.grid_hits);
                self.backfill_pair(pair_key, result);
                return result;
            }
        }

        let ttl_key = if self.settings.ttl_enabled && options.flags.contains(QueryFlags::USE_TTL_CACHE) {
            Some(TtlKey::new(observer.position, subject.position, ground, signature))
        } else {
            None
        };
        if let Some(key) = &ttl_key {
            if let Some(result) = self.ttl.get(key, now) {
                self.metrics.record(&self.metrics.ttl_hits);
                self.backfill_pair(pair_key, result);
                return result;
            }
        }

        let result = self.compute(observer, subject, options);

        if let Some(key) = grid_key {
            if self.grid.put(key, result) {
                self.metrics.record(&self.metrics.grid_puts);
            }
        }
        if let Some(key) = ttl_key {
            if self.ttl.put(key, result, now) {
                self.metrics.record(&self.metrics.ttl_puts);
            }
        }
        self.backfill_pair(pair_key, result);
        result
    }

    fn backfill_pair(&mut self, key: Option<PairKey>, result: Visibility) {
        if let Some(key) = key {
            if self.pair.put(key, result) {
                self.metrics.record(&self.metrics.pair_puts);
            }
        }
    }

    /// 不經過緩存的完整探測流程
    fn compute(&self, observer: &TargetSnapshot, subject: &TargetSnapshot, options: &QueryOptions) -> Visibility {
        let flags = options.flags;
        let head = options.head_height;
        let eye = observer.point_at_height(head);
        let m = &self.metrics;

        if flags.contains(QueryFlags::GROUND_CHECK) {
            m.record(&m.ground_checks);
            // 沒給地面點視為失敗
            let ground = match options.ground_point {
                Some(p) => TargetSnapshot::synthetic(p),
                None => return Visibility::blocked(SightReason::Ground),
            };
            if !self.trace(eye, ground.position, observer, options) {
                return Visibility::blocked(SightReason::Ground);
            }
        }

        if flags.contains(QueryFlags::PATH_CHECK) {
            // 每一段都從上一個取樣點出發，而不是從觀察者
            let mut prev = eye;
            for point in probe::path_samples(eye, subject.point_at_height(head), options.path_steps) {
                m.record(&m.path_segments);
                if !self.trace(prev, point, observer, options) {
                    return Visibility::blocked(SightReason::Path);
                }
                prev = point;
            }
        }

        if flags.contains(QueryFlags::MULTI_PROBE) {
            let capsule = if flags.contains(QueryFlags::CAPSULE_FALLBACK) {
                Some(options.capsule_radius)
            } else {
                None
            };
            for point in probe::body_probes(subject, head, capsule) {
                m.record(&m.multi_probes);
                if self.trace(eye, point, observer, options) {
                    return Visibility::VISIBLE;
                }
            }
        } else if self.trace(eye, subject.point_at_height(head), observer, options) {
            return Visibility::VISIBLE;
        }

        if flags.contains(QueryFlags::VERTICAL_EXTRA) {
            for (from, to) in probe::vertical_segments(eye, subject, head) {
                m.record(&m.vertical_segments);
                if self.trace(from, to, observer, options) {
                    return Visibility::VISIBLE;
                }
            }
        }

        if flags.contains(QueryFlags::SOFT_CLOUD) {
            for point in probe::soft_cloud(subject, head, options.soft_fudge) {
                m.record(&m.soft_probes);
                if self.trace(eye, point, observer, options) {
                    return Visibility::VISIBLE;
                }
            }
        }

        Visibility::blocked(SightReason::Blocked)
    }

    /// 單一線段，帶入查詢的過濾與遮罩
    fn trace(&self, from: Vec3<f32>, to: Vec3<f32>, observer: &TargetSnapshot, options: &QueryOptions) -> bool {
        let filter = TraceFilter {
            flags: options.effective_filter(),
            owner: observer.identity,
            owner_team: observer.team,
        };
        let (clear, kind) = self.provider.trace(from, to, &filter, options.effective_mask());
        self.metrics.record_ray(kind);
        clear
    }

    /// 給投射物與光束使用的原始線段查詢，不經過緩存
    pub fn segment_visible(
        &self,
        from: Vec3<f32>,
        to: Vec3<f32>,
        observer: &TargetSnapshot,
        options: &QueryOptions,
    ) -> bool {
        self.metrics.record(&self.metrics.raw_segments);
        self.trace(from, to, observer, options)
    }

    /// 清空三層緩存
    pub fn reset_cache(&mut self) {
        self.clear_all_tiers();
    }

    fn clear_all_tiers(&mut self) {
        log::debug!(
            "clearing sight caches (ttl {}, grid {}, pair {})",
            self.ttl.len(),
            self.grid.len(),
            self.pair.len()
        );
        self.ttl.clear();
        self.grid.clear();
        self.pair.clear();
    }

    /// 每個 tick 的第一次查詢前呼叫一次
    pub fn advance_epoch(&mut self, epoch: u64) {
        if self.pair.advance_epoch(epoch) {
            log::trace!("sight epoch -> {}", epoch);
        }
    }

    pub fn epoch(&self) -> u64 {
        self.pair.epoch()
    }

    /// 套用部分設定，TTL 與網格緩存整個重建
    pub fn apply_settings(&mut self, overrides: &SettingsOverrides) {
        let merged = self.settings.merged(overrides);
        self.replace_settings(merged);
    }

    pub fn replace_settings(&mut self, settings: SightSettings) {
        let settings = settings.clamped();
        self.ttl = TtlCache::new(settings.ttl(), settings.ttl_max_entries);
        self.grid = GridCache::new(settings.grid_cell_size);
        // 配對緩存的結果同樣依賴舊設定
        self.pair.clear();
        log::info!(
            "sight settings applied: head {:.1}, cell {:.1}, ttl {}ms/{}",
            settings.head_height,
            settings.grid_cell_size,
            settings.ttl_ms,
            settings.ttl_max_entries
        );
        self.settings = settings;
    }

    /// 共享的統計物件，其他執行緒也可以讀
    pub fn metrics(&self) -> Arc<SightMetrics> {
        self.metrics.clone()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    pub fn cache_sizes(&self) -> CacheSizes {
        CacheSizes {
            ttl: self.ttl.len(),
            grid: self.grid.len(),
            pair: self.pair.len(),
        }
    }

    pub fn debug_dump(&self) -> String {
        let sizes = self.cache_sizes();
        let mut out = String::new();
        let _ = writeln!(out, "provider         {}", self.provider.level());
        let _ = writeln!(out, "epoch            {}", self.pair.epoch());
        let _ = writeln!(out, "settings         {:?}", self.settings);
        let _ = writeln!(
            out,
            "cache sizes      ttl {} / grid {} / pair {}",
            sizes.ttl, sizes.grid, sizes.pair
        );
        out.push_str(&self.metrics.snapshot().render());
        out
    }
}

impl Default for SightEngine {
    fn default() -> Self {
        Self::new(SightSettings::default())
    }
}

impl fmt::Debug for SightEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SightEngine")
            .field("provider", &self.provider)
            .field("epoch", &self.pair.epoch())
            .field("caches", &self.cache_sizes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sight::options::{FilterFlags, TraceMask};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 依線段終點高度決定結果的提供者
    struct HeightProbe {
        calls: Arc<AtomicUsize>,
        clear_at: f32,
    }

    impl SegmentProbe for HeightProbe {
        fn segment_clear(&self, _from: Vec3<f32>, to: Vec3<f32>) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (to.z - self.clear_at).abs() < 1e-3
        }
    }

    fn observer() -> TargetSnapshot {
        TargetSnapshot::new(1, Vec3::zero(), 1).with_self(true)
    }

    fn subject() -> TargetSnapshot {
        TargetSnapshot::new(2, Vec3::new(500.0, 0.0, 0.0), 2)
    }

    fn engine_with(clear_at: f32) -> (SightEngine, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut engine = SightEngine::default();
        engine.register_base(HeightProbe { calls: calls.clone(), clear_at });
        (engine, calls)
    }

    #[test]
    fn single_probe_only_tests_head() {
        let (mut engine, calls) = engine_with(38.0);
        let options = engine.options(QueryFlags::NONE);
        let r = engine.visible(&observer(), &subject(), &options);
        assert_eq!(r.into_tuple(), (false, "blocked"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn capsule_ring_extends_multi_probe() {
        let (mut engine, calls) = engine_with(-1.0);
        let options = engine.options(QueryFlags::MULTI_PROBE | QueryFlags::CAPSULE_FALLBACK);
        engine.visible(&observer(), &subject(), &options);
        assert_eq!(calls.load(Ordering::SeqCst), 4 + probe::CAPSULE_RING_POINTS);
        assert_eq!(engine.metrics_snapshot().multi_probes, 12);
    }

    #[test]
    fn vertical_extra_runs_before_soft_cloud() {
        // 垂直線段底端在頭部下方 40
        let (mut engine, calls) = engine_with(24.0);
        let options = engine.options(QueryFlags::VERTICAL_EXTRA | QueryFlags::SOFT_CLOUD);
        let r = engine.visible(&observer(), &subject(), &options);
        assert!(r.visible);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let snap = engine.metrics_snapshot();
        assert_eq!(snap.vertical_segments, 1);
        assert_eq!(snap.soft_probes, 0);
    }

    #[test]
    fn soft_cloud_is_last_resort() {
        let (mut engine, _) = engine_with(64.0 * probe::SOFT_HEIGHT_SCALE);
        let options = engine.options(QueryFlags::SOFT_CLOUD);
        assert!(engine.visible(&observer(), &subject(), &options).visible);
        assert_eq!(engine.metrics_snapshot().soft_probes, 2);
    }

    #[test]
    fn ground_check_without_point_fails_closed() {
        let (mut engine, calls) = engine_with(64.0);
        let options = engine.options(QueryFlags::GROUND_CHECK);
        let r = engine.visible(&observer(), &subject(), &options);
        assert_eq!(r.into_tuple(), (false, "ground"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ground_check_short_circuits_probes() {
        let (mut engine, calls) = engine_with(64.0);
        let options = engine
            .options(QueryFlags::MULTI_PROBE)
            .with_ground_point(Vec3::new(250.0, 0.0, 0.0));
        let r = engine.visible(&observer(), &subject(), &options);
        assert_eq!(r.reason, SightReason::Ground);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metrics_snapshot().ground_checks, 1);
    }

    #[test]
    fn anonymous_snapshots_skip_pair_cache() {
        let (mut engine, _) = engine_with(64.0);
        let options = engine.options(QueryFlags::NONE);
        let anon = TargetSnapshot::synthetic(Vec3::new(300.0, 0.0, 0.0));
        assert!(engine.visible(&observer(), &anon, &options).visible);
        assert_eq!(engine.cache_sizes().pair, 0);
        assert_eq!(engine.cache_sizes().grid, 1);
    }

    #[test]
    fn ttl_tier_answers_when_grid_disabled() {
        let (mut engine, calls) = engine_with(64.0);
        engine.apply_settings(&SettingsOverrides {
            grid_enabled: Some(false),
            ttl_ms: Some(50),
            ..Default::default()
        });
        let options = engine.options(QueryFlags::USE_TTL_CACHE);
        let anon = TargetSnapshot::synthetic(Vec3::new(300.0, 0.0, 0.0));
        let t0 = Instant::now();
        engine.visible_at(&observer(), &anon, &options, t0);
        engine.visible_at(&observer(), &anon, &options, t0 + Duration::from_millis(10));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.metrics_snapshot().ttl_hits, 1);
        engine.visible_at(&observer(), &anon, &options, t0 + Duration::from_millis(60));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn orientation_sensitive_filter_disables_grid_symmetry() {
        let (mut engine, calls) = engine_with(64.0);
        let options = engine.options(QueryFlags::NONE).with_filter(FilterFlags::IGNORE_OWNER);
        let a = TargetSnapshot::synthetic(Vec3::new(0.0, 0.0, 0.0));
        let b = TargetSnapshot::synthetic(Vec3::new(500.0, 0.0, 0.0));
        engine.visible(&a, &b, &options);
        engine.visible(&b, &a, &options);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(engine.metrics_snapshot().grid_hits, 0);
    }

    #[test]
    fn no_provider_means_visible_when_alive() {
        let mut engine = SightEngine::default();
        assert_eq!(engine.provider_level(), "alive_only");
        assert!(engine.visible_hard(&observer(), &subject()).visible);
        assert!(!engine.visible_hard(&observer(), &subject().with_alive(false)).visible);
        assert_eq!(engine.metrics_snapshot().total_rays(), 0);
    }

    #[test]
    fn base_provider_counts_base_rays_even_with_mask() {
        let (engine, _) = engine_with(64.0);
        let options = engine.options(QueryFlags::NONE).with_mask(TraceMask::WorldOnly);
        engine.segment_visible(Vec3::zero(), Vec3::new(1.0, 0.0, 64.0), &observer(), &options);
        let snap = engine.metrics_snapshot();
        assert_eq!(snap.raw_segments, 1);
        assert_eq!(snap.base_rays, 1);
        assert_eq!(snap.filtered_rays, 0);
    }

    #[test]
    fn debug_dump_mentions_state() {
        let (mut engine, _) = engine_with(64.0);
        engine.advance_epoch(42);
        engine.visible_default(&observer(), &subject());
        let dump = engine.debug_dump();
        assert!(dump.contains("provider         base"));
        assert!(dump.contains("epoch            42"));
        assert!(dump.contains("calls            1"));
    }
}
