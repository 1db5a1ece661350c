//! GC Logging - Cycle Event Reporting
//!
//! Structured reporting for collector operations, useful for:
//! - Performance analysis
//! - Debugging
//! - Production monitoring
//!
//! Events are rendered either as human-readable lines with a local
//! timestamp, or as single-line JSON objects, and always flow through the
//! `log` facade so the embedding application keeps control of the sink.

use crate::stats::CycleStats;

/// GC event types
#[derive(Debug, Clone)]
pub enum GcEvent {
    /// Collection cycle started
    CycleStart {
        cycle: u64,
        reason: &'static str,
        live: usize,
    },

    /// Collection cycle completed
    CycleEnd { cycle: u64, stats: CycleStats },

    /// Shutdown drain finished; `still_rooted` objects remain referenced
    ShutdownReport { still_rooted: usize },
}

/// Slim event logger for the collector
///
/// Formatting is decided once at heap construction from
/// [`GcConfig::log_json`](crate::GcConfig).
#[derive(Debug, Clone)]
pub struct GcLogger {
    json: bool,
}

impl GcLogger {
    /// Create a new logger
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Emit one event through the `log` facade
    pub fn emit(&self, event: &GcEvent) {
        if self.json {
            self.emit_json(event);
        } else {
            self.emit_text(event);
        }
    }

    fn emit_text(&self, event: &GcEvent) {
        let now = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f");
        match event {
            GcEvent::CycleStart {
                cycle,
                reason,
                live,
            } => {
                log::debug!("[{now}] gc cycle {cycle} start: reason={reason} live={live}");
            }
            GcEvent::CycleEnd { cycle, stats } => {
                log::debug!(
                    "[{now}] gc cycle {cycle} end: examined={} marked={} freed={} ({} bytes) in {:.3}ms",
                    stats.examined,
                    stats.marked,
                    stats.freed,
                    stats.bytes_freed,
                    stats.duration_ms(),
                );
            }
            GcEvent::ShutdownReport { still_rooted } => {
                if *still_rooted > 0 {
                    log::warn!("[{now}] gc shutdown: {still_rooted} objects still rooted");
                } else {
                    log::debug!("[{now}] gc shutdown: heap fully drained");
                }
            }
        }
    }

    fn emit_json(&self, event: &GcEvent) {
        let value = match event {
            GcEvent::CycleStart {
                cycle,
                reason,
                live,
            } => serde_json::json!({
                "event": "cycle_start",
                "cycle": cycle,
                "reason": reason,
                "live": live,
            }),
            GcEvent::CycleEnd { cycle, stats } => serde_json::json!({
                "event": "cycle_end",
                "cycle": cycle,
                "examined": stats.examined,
                "marked": stats.marked,
                "freed": stats.freed,
                "bytes_freed": stats.bytes_freed,
                "duration_ns": stats.duration_ns,
            }),
            GcEvent::ShutdownReport { still_rooted } => serde_json::json!({
                "event": "shutdown",
                "still_rooted": still_rooted,
            }),
        };
        log::debug!("{value}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_does_not_panic() {
        for json in [false, true] {
            let logger = GcLogger::new(json);
            logger.emit(&GcEvent::CycleStart {
                cycle: 1,
                reason: "explicit",
                live: 3,
            });
            logger.emit(&GcEvent::CycleEnd {
                cycle: 1,
                stats: CycleStats::default(),
            });
            logger.emit(&GcEvent::ShutdownReport { still_rooted: 0 });
        }
    }
}
