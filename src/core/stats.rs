use crate::logging::{log, LogLevel};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Run-wide outcome counters. Shared across workers; every mutation is a single atomic add.
#[derive(Debug, Default)]
pub struct RunCounters {
    updated: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CounterSnapshot {
    pub fn total(&self) -> usize {
        self.updated + self.skipped + self.failed
    }
}

impl RunCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_updated(&self, n: usize) {
        self.updated.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_skipped(&self, n: usize) {
        self.skipped.fetch_add(n, Ordering::Relaxed);
    }
    pub fn add_failed(&self, n: usize) {
        self.failed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            updated: self.updated.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Progress and final summary for one task run.
pub struct RunReport {
    task: String,
    counters: Arc<RunCounters>,
    observed: usize,
    pages: usize,
    started: Instant,
    notes: Vec<(String, String)>,
}

impl RunReport {
    pub fn new(task: &str, counters: Arc<RunCounters>) -> Self {
        RunReport {
            task: task.to_string(),
            counters,
            observed: 0,
            pages: 0,
            started: Instant::now(),
            notes: Vec::new(),
        }
    }

    pub fn counters(&self) -> &Arc<RunCounters> {
        &self.counters
    }

    pub fn observed(&self) -> usize {
        self.observed
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Called once per fetched page, after the page's workers have all finished.
    pub fn record_page(&mut self, records: usize) {
        self.pages += 1;
        self.observed += records;
        let s = self.snapshot();
        log(
            LogLevel::Info,
            &format!(
                "Page {}: {} record(s) processed [Updated: {}, Skipped: {}, Failed: {}]",
                self.pages, self.observed, s.updated, s.skipped, s.failed
            ),
        );
    }

    pub fn add_note(&mut self, label: &str, value: impl ToString) {
        self.notes.push((label.to_string(), value.to_string()));
    }

    pub fn note(&self, label: &str) -> Option<&str> {
        self.notes
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn print_summary(&self) {
        let s = self.snapshot();
        let sep = "=".repeat(60);
        let title = format!("Run Summary ({})", self.task);
        println!("\n{}\n{:^60}\n{}", sep, title, sep);
        println!("{:<22} {:.3?}", "Total Run Time:", self.elapsed());
        println!("{:<22} {}", "Pages:", self.pages);
        println!("{:<22} {}", "Records observed:", self.observed);
        println!("{}", "-".repeat(60));
        println!("{:<22} {:>8}", "Updated", s.updated);
        println!("{:<22} {:>8}", "Skipped", s.skipped);
        println!("{:<22} {:>8}", "Failed", s.failed);
        println!("{}", "-".repeat(60));
        println!("{:<22} {:>8}", "Total", s.total());
        for (label, value) in &self.notes {
            println!("{:<22} {:>8}", format!("{}:", label), value);
        }
        println!("{}", sep);

        if s.failed > 0 {
            log(
                LogLevel::Error,
                &format!(
                    "Run completed with errors: {} record(s) could not be written. Check logs.",
                    s.failed
                ),
            );
        } else if s.updated == 0 {
            log(LogLevel::Success, "Run completed; nothing needed correcting.");
        } else {
            log(LogLevel::Success, "Run completed successfully.");
        }

        let end_ts_str = chrono::Utc::now()
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string();
        log(
            LogLevel::Step,
            &format!("--- Run Finished at {} ---", end_ts_str),
        );
    }

    pub fn exit_code(&self) -> i32 {
        determine_exit_code(&self.snapshot())
    }
}

pub fn determine_exit_code(snapshot: &CounterSnapshot) -> i32 {
    if snapshot.failed > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_totals_every_outcome() {
        let counters = RunCounters::new();
        counters.add_updated(3);
        counters.add_skipped(2);
        counters.add_failed(1);
        let s = counters.snapshot();
        assert_eq!(s, CounterSnapshot { updated: 3, skipped: 2, failed: 1 });
        assert_eq!(s.total(), 6);
        assert_eq!(determine_exit_code(&s), 1);
    }

    #[test]
    fn report_accumulates_observed_records() {
        let mut report = RunReport::new("test", RunCounters::new());
        report.record_page(1000);
        report.record_page(12);
        assert_eq!(report.observed(), 1012);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn fresh_counters_are_independent() {
        let a = RunCounters::new();
        a.add_updated(5);
        let b = RunCounters::new();
        assert_eq!(b.snapshot(), CounterSnapshot::default());
    }
}
