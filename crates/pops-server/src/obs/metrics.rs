//! In-process metrics registry for the inference service.
//!
//! Unlabelled families (`inference_requests_total`,
//! `inference_duration_seconds`) are plain atomics. Labelled families are
//! backed by `DashMap`; labels are flattened into sorted key vectors to keep
//! deterministic ordering. Histogram observations are kept as integer
//! microseconds in atomics (no float CAS loops) and rendered in seconds.
//!
//! Writers on an existing series only take a shard read lock, and `render`
//! copies values out before formatting, so a scrape never stalls a request.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `name{labels}`, or bare `name` when there are no labels.
fn sample_name(name: &str, labels: &str) -> String {
    if labels.is_empty() {
        name.to_string()
    } else {
        format!("{name}{{{labels}}}")
    }
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

fn micros_to_secs(micros: u64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Counter without labels.
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, value: AtomicU64::new(0) }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "counter");
        let _ = writeln!(out, "{} {}", self.name, self.get());
    }
}

pub struct CounterVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, map: DashMap::new() }
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let key = label_key(labels);
        if let Some(counter) = self.map.get(&key) {
            counter.fetch_add(v, Ordering::Relaxed);
            return;
        }
        // First sample for this label set.
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for one label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "counter");
        let mut rows: Vec<(String, u64)> = self
            .map
            .iter()
            .map(|r| (label_str(r.key()), r.value().load(Ordering::Relaxed)))
            .collect();
        rows.sort();
        for (labels, val) in rows {
            let _ = writeln!(out, "{} {}", sample_name(self.name, &labels), val);
        }
    }
}

// Fixed buckets in microseconds with their rendered `le` values (seconds).
const BUCKETS: [(u64, &str); 14] = [
    (5_000, "0.005"),
    (10_000, "0.01"),
    (25_000, "0.025"),
    (50_000, "0.05"),
    (75_000, "0.075"),
    (100_000, "0.1"),
    (250_000, "0.25"),
    (500_000, "0.5"),
    (750_000, "0.75"),
    (1_000_000, "1.0"),
    (2_500_000, "2.5"),
    (5_000_000, "5.0"),
    (7_500_000, "7.5"),
    (10_000_000, "10.0"),
];

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum_seconds: f64,
    /// Cumulative counts per `le` bound, `+Inf` excluded (that is `count`).
    pub buckets: Vec<(&'static str, u64)>,
}

impl HistogramSnapshot {
    fn render(&self, name: &str, labels: &str, out: &mut String) {
        let prefix = if labels.is_empty() { String::new() } else { format!("{labels},") };
        for (le, count) in &self.buckets {
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"{le}\"}} {count}");
        }
        let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {}", self.count);
        let _ = writeln!(out, "{} {}", sample_name(&format!("{name}_sum"), labels), self.sum_seconds);
        let _ = writeln!(out, "{} {}", sample_name(&format!("{name}_count"), labels), self.count);
    }
}

/// Write order: count, then buckets from the largest bound down.
/// Read order: buckets from the smallest bound up, then count.
/// A reader that sees an increment therefore also sees every larger bucket
/// and the count, so the snapshot stays cumulative.
#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum_micros: AtomicU64,
    buckets: [AtomicU64; BUCKETS.len()],
}

impl AtomicHistogram {
    fn observe(&self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);

        self.count.fetch_add(1, Ordering::Release);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);

        for (i, &(le, _)) in BUCKETS.iter().enumerate().rev() {
            if micros > le {
                break;
            }
            self.buckets[i].fetch_add(1, Ordering::Release);
        }
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let buckets = BUCKETS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&(_, le), c)| (le, c.load(Ordering::Acquire)))
            .collect();
        HistogramSnapshot {
            buckets,
            sum_seconds: micros_to_secs(self.sum_micros.load(Ordering::Relaxed)),
            count: self.count.load(Ordering::Acquire),
        }
    }
}

/// Histogram without labels.
pub struct Histogram {
    name: &'static str,
    help: &'static str,
    inner: AtomicHistogram,
}

impl Histogram {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, inner: AtomicHistogram::default() }
    }

    /// Observe a duration and increment cumulative buckets.
    pub fn observe(&self, duration: Duration) {
        self.inner.observe(duration);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        self.inner.snapshot()
    }

    /// Render in Prometheus text exposition format (unit: seconds).
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "histogram");
        self.snapshot().render(self.name, "", out);
    }
}

pub struct HistogramVec {
    name: &'static str,
    help: &'static str,
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    pub fn new(name: &'static str, help: &'static str) -> Self {
        Self { name, help, map: DashMap::new() }
    }

    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let key = label_key(labels);
        if let Some(hist) = self.map.get(&key) {
            hist.observe(duration);
            return;
        }
        self.map.entry(key).or_default().observe(duration);
    }

    /// Snapshot of one label set (empty if never observed).
    pub fn snapshot(&self, labels: &[(&str, &str)]) -> HistogramSnapshot {
        match self.map.get(&label_key(labels)) {
            Some(h) => h.snapshot(),
            None => AtomicHistogram::default().snapshot(),
        }
    }

    /// Render in Prometheus text exposition format (unit: seconds).
    fn render(&self, out: &mut String) {
        write_header(out, self.name, self.help, "histogram");
        let mut rows: Vec<(String, HistogramSnapshot)> = self
            .map
            .iter()
            .map(|r| (label_str(r.key()), r.value().snapshot()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        for (labels, snap) in rows {
            snap.render(self.name, &labels, out);
        }
    }
}

/// Aggregates the inference path exposes for programmatic checks.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub requests_total: u64,
    pub latency: HistogramSnapshot,
}

pub struct ServiceMetrics {
    pub inference_requests: Counter,
    pub inference_duration: Histogram,
    pub inference_errors: CounterVec,
    pub http_requests: CounterVec,
    pub http_request_duration: HistogramVec,
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self {
            inference_requests: Counter::new(
                "inference_requests_total",
                "Total number of inference requests",
            ),
            inference_duration: Histogram::new(
                "inference_duration_seconds",
                "Inference latency in seconds",
            ),
            inference_errors: CounterVec::new(
                "inference_errors_total",
                "Inference requests that returned an error, by kind",
            ),
            http_requests: CounterVec::new(
                "http_requests_total",
                "Total number of HTTP requests",
            ),
            http_request_duration: HistogramVec::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
        }
    }
}

impl ServiceMetrics {
    pub fn record_request(&self) {
        self.inference_requests.inc();
    }

    pub fn record_latency(&self, elapsed: Duration) {
        self.inference_duration.observe(elapsed);
    }

    pub fn record_error(&self, kind: &str) {
        self.inference_errors.inc(&[("kind", kind)]);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            requests_total: self.inference_requests.get(),
            latency: self.inference_duration.snapshot(),
        }
    }

    /// Render all registered metrics plus any extra gauge lines provided by callers.
    pub fn render(&self, extra: &[(&str, &str, u64)]) -> String {
        let mut out = String::new();
        self.inference_requests.render(&mut out);
        self.inference_duration.render(&mut out);
        self.inference_errors.render(&mut out);
        self.http_requests.render(&mut out);
        self.http_request_duration.render(&mut out);

        for (name, help, v) in extra {
            write_header(&mut out, name, help, "gauge");
            let _ = writeln!(out, "{name} {v}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::mpsc;

    #[test]
    fn fresh_registry_renders_zero_series() {
        let m = ServiceMetrics::default();
        let out = m.render(&[]);
        assert!(out.contains("# HELP inference_requests_total Total number of inference requests\n"));
        assert!(out.contains("# TYPE inference_requests_total counter\n"));
        assert!(out.contains("\ninference_requests_total 0\n"));
        assert!(out.contains("inference_duration_seconds_bucket{le=\"+Inf\"} 0\n"));
        assert!(out.contains("inference_duration_seconds_count 0\n"));
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let h = Histogram::new("t_seconds", "test");
        h.observe(Duration::from_millis(3));
        h.observe(Duration::from_millis(60));
        h.observe(Duration::from_secs(20));

        let s = h.snapshot();
        assert_eq!(s.count, 3);
        assert_eq!(s.buckets[0], ("0.005", 1));
        assert_eq!(s.buckets[4], ("0.075", 2));
        assert_eq!(s.buckets[13], ("10.0", 2));
        assert!((s.sum_seconds - 20.063).abs() < 1e-9);
    }

    #[test]
    fn labelled_histogram_renders_each_series() {
        let h = HistogramVec::new("h_seconds", "h");
        h.observe(&[("endpoint", "/b")], Duration::from_millis(1));
        h.observe(&[("endpoint", "/a")], Duration::from_millis(1));
        h.observe(&[("endpoint", "/a")], Duration::from_millis(1));

        let mut out = String::new();
        h.render(&mut out);
        assert!(out.contains("h_seconds_bucket{endpoint=\"/a\",le=\"0.005\"} 2\n"));
        assert!(out.contains("h_seconds_count{endpoint=\"/b\"} 1\n"));
        assert!(out.find("endpoint=\"/a\"") < out.find("endpoint=\"/b\""));
    }

    #[test]
    fn labels_are_sorted_and_escaped() {
        let c = CounterVec::new("x_total", "x");
        c.inc(&[("status", "200"), ("endpoint", "/a\"b")]);
        let mut out = String::new();
        c.render(&mut out);
        assert!(out.contains("x_total{endpoint=\"/a\\\"b\",status=\"200\"} 1\n"));
    }

    #[test]
    fn extra_gauges_get_headers() {
        let out = ServiceMetrics::default().render(&[("pops_model_loaded", "1 when loaded", 1)]);
        assert!(out.ends_with("# HELP pops_model_loaded 1 when loaded\n# TYPE pops_model_loaded gauge\npops_model_loaded 1\n"));
    }

    #[test]
    fn writers_do_not_wait_on_a_scrape_in_progress() {
        let m = ServiceMetrics::default();
        let labels = [("endpoint", "/predict"), ("method", "GET")];
        m.http_requests.inc(&labels);
        m.http_request_duration.observe(&labels, Duration::from_millis(1));

        let m = &m;
        let (tx, rx) = mpsc::channel();
        std::thread::scope(|s| {
            // Shard guards held as if a render were mid-iteration.
            let held_counter = m.http_requests.map.iter().next();
            let held_hist = m.http_request_duration.map.iter().next();
            assert!(held_counter.is_some() && held_hist.is_some());

            s.spawn(move || {
                m.record_request();
                m.record_latency(Duration::from_millis(2));
                m.http_requests.inc(&labels);
                m.http_request_duration.observe(&labels, Duration::from_millis(2));
                let _ = tx.send(());
            });

            let finished = rx.recv_timeout(Duration::from_secs(2)).is_ok();
            drop(held_counter);
            drop(held_hist);
            assert!(finished, "writer blocked behind an in-progress scrape");
        });

        assert_eq!(m.snapshot().requests_total, 1);
        assert_eq!(m.http_requests.get(&labels), 2);
        assert_eq!(m.http_request_duration.snapshot(&labels).count, 2);
    }

    #[test]
    fn concurrent_snapshots_stay_cumulative() {
        let h = Histogram::new("c_seconds", "c");
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            let writers: Vec<_> = (0..4u64)
                .map(|w| {
                    let h = &h;
                    s.spawn(move || {
                        for i in 0..20_000u64 {
                            // Spread observations over every bucket and +Inf.
                            h.observe(Duration::from_micros((i * 7919 + w) % 12_000_000));
                        }
                    })
                })
                .collect();

            let reader = s.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let snap = h.snapshot();
                    for pair in snap.buckets.windows(2) {
                        assert!(pair[0].1 <= pair[1].1, "{snap:?}");
                    }
                    let last = snap.buckets.last().map(|b| b.1).unwrap_or(0);
                    assert!(last <= snap.count, "{snap:?}");
                }
            });

            for w in writers {
                w.join().unwrap();
            }
            done.store(true, Ordering::Relaxed);
            reader.join().unwrap();
        });

        assert_eq!(h.snapshot().count, 80_000);
    }
}
