use web_time::Instant;

use strand_core::{NodeSnapshot, NodeStatus, ProviderContainer};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    pub nodes: usize,
    pub dirty: usize,
    pub loading: usize,
    pub errors: usize,
    pub total_recomputes: u64,
}

impl Metrics {
    pub fn from_snapshot(snapshot: &[NodeSnapshot]) -> Self {
        let mut m = Metrics {
            nodes: snapshot.len(),
            ..Default::default()
        };
        for n in snapshot {
            if n.dirty {
                m.dirty += 1;
            }
            match n.status {
                NodeStatus::Loading => m.loading += 1,
                NodeStatus::Error => m.errors += 1,
                _ => {}
            }
            m.total_recomputes += n.recomputes;
        }
        m
    }
}

/// One line per node: `key [status] deps=a,b listeners=n recomputes=n`.
pub fn render(snapshot: &[NodeSnapshot]) -> Vec<String> {
    snapshot
        .iter()
        .map(|n| {
            let deps: Vec<String> = n.dependencies.iter().map(|d| d.to_string()).collect();
            let mut line = format!(
                "{} [{:?}] deps={} listeners={} recomputes={}",
                n.key,
                n.status,
                if deps.is_empty() {
                    "-".to_string()
                } else {
                    deps.join(",")
                },
                n.listeners,
                n.recomputes
            );
            if n.dirty {
                line.push_str(" *dirty");
            }
            line
        })
        .collect()
}

/// Periodic graph summary, meant to be called from the host loop.
pub struct GraphInspector {
    pub enabled: bool,
    captures: u64,
    last_capture: Option<Instant>,
    last_total: u64,
    rate_smooth: f32,
    pub metrics: Option<Metrics>,
}

impl Default for GraphInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphInspector {
    pub fn new() -> Self {
        Self {
            enabled: false,
            captures: 0,
            last_capture: None,
            last_total: 0,
            rate_smooth: 0.0,
            metrics: None,
        }
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    /// Recomputations per second, smoothed across captures.
    pub fn recompute_rate(&self) -> f32 {
        self.rate_smooth
    }

    /// Takes a snapshot and updates metrics. Returns the rendered summary
    /// while enabled.
    pub fn capture(&mut self, container: &ProviderContainer) -> Option<Vec<String>> {
        if !self.enabled {
            return None;
        }
        self.captures += 1;
        let snapshot = container.snapshot();
        let metrics = Metrics::from_snapshot(&snapshot);

        let now = Instant::now();
        if let Some(prev) = self.last_capture.replace(now) {
            let dt = (now - prev).as_secs_f32();
            if dt > 0.0 {
                let rate = metrics.total_recomputes.saturating_sub(self.last_total) as f32 / dt;
                // simple EMA
                let a = 0.2;
                self.rate_smooth = if self.rate_smooth == 0.0 {
                    rate
                } else {
                    (1.0 - a) * self.rate_smooth + a * rate
                };
            }
        }
        self.last_total = metrics.total_recomputes;

        let mut lines = vec![format!(
            "capture: {}  |  nodes: {}  |  dirty: {}  |  loading: {}  |  errors: {}",
            self.captures, metrics.nodes, metrics.dirty, metrics.loading, metrics.errors
        )];
        lines.extend(render(&snapshot));
        self.metrics = Some(metrics);
        Some(lines)
    }

    /// Logs the current graph at debug level.
    pub fn log_dump(&mut self, container: &ProviderContainer) {
        if let Some(lines) = self.capture(container) {
            for line in lines {
                log::debug!(target: "strand::graph", "{line}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::LocalPool;
    use strand_core::{FutureProvider, Provider};

    #[test]
    fn test_disabled_inspector_captures_nothing() {
        let pool = LocalPool::new();
        let c = ProviderContainer::new(pool.spawner());
        let mut inspector = GraphInspector::new();
        assert!(inspector.capture(&c).is_none());
        assert!(inspector.metrics.is_none());
    }

    #[test]
    fn test_metrics_and_render() {
        let pool = LocalPool::new();
        let c = ProviderContainer::new(pool.spawner());
        let items = FutureProvider::new("items", |_| async { Ok(vec![1, 2]) });
        let count = Provider::new("count", {
            let items = items.clone();
            move |r| r.watch_async(&items).data_or_default().len()
        });
        assert_eq!(c.read(&count), 0);

        let mut inspector = GraphInspector::new();
        inspector.toggle();
        let lines = inspector.capture(&c).unwrap();
        let metrics = inspector.metrics.clone().unwrap();
        assert_eq!(metrics.nodes, 2);
        assert_eq!(metrics.loading, 1);
        assert_eq!(metrics.total_recomputes, 2);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "count [Data] deps=items listeners=0 recomputes=1");
        assert_eq!(lines[2], "items [Loading] deps=- listeners=1 recomputes=1");
    }

    #[test]
    fn test_log_dump_tracks_dirty_nodes() {
        let mut pool = LocalPool::new();
        let c = ProviderContainer::new(pool.spawner());
        let items = FutureProvider::new("items", |_| async { Ok(vec![1, 2]) });
        let count = Provider::new("count", {
            let items = items.clone();
            move |r| r.watch_async(&items).data_or_default().len()
        });
        c.read(&count);
        pool.run_until_stalled();

        let mut inspector = GraphInspector::new();
        inspector.toggle();
        inspector.log_dump(&c);
        let metrics = inspector.metrics.clone().unwrap();
        assert_eq!(metrics.dirty, 1, "count is stale once items settled");
        assert_eq!(metrics.loading, 0);

        assert_eq!(c.read(&count), 2);
        let lines = inspector.capture(&c).unwrap();
        assert!(lines[0].starts_with("capture: 2  |  nodes: 2  |  dirty: 0"));
    }
}
