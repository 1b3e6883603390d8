//! # Runner snapshots and the periodic stats report.
//!
//! [`RunnerStatus`] is a point-in-time copy of one runner's counters and
//! flags. [`stats_report`] renders a list of them as the block the watcher
//! logs:
//!
//! ```text
//! warmvisor stats:
//! ---
//!  * warmer=echo-1 iteration=10 success=10 failure=0 start_millis=1700000000000 duration_millis=3 timeout_millis=1000 initialized=true running=false stopped=true
//! ---
//! ```

use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

/// Snapshot of a single runner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunnerStatus {
    /// Runner identity: `<policy name>-<instance>`.
    pub name: String,
    /// Policy class the runner was built from.
    pub class: String,
    pub iteration: u64,
    pub successful_rounds: u64,
    pub failed_rounds: u64,
    /// Wall-clock start time (unix millis); `0` until the runner starts.
    pub started_at_millis: u64,
    /// Accumulated time spent inside steps, including the one in flight.
    pub duration: Duration,
    pub timeout: Option<Duration>,
    pub required: bool,
    pub initialized: bool,
    pub running: bool,
    pub completed: bool,
    pub stopped: bool,
}

/// Renders the multi-line stats block for `statuses`.
pub fn stats_report(statuses: &[RunnerStatus]) -> String {
    let mut out = String::from("warmvisor stats:\n---\n");
    for s in statuses {
        let timeout = match s.timeout {
            Some(t) => t.as_millis().to_string(),
            None => "none".to_string(),
        };
        let _ = writeln!(
            out,
            " * warmer={} iteration={} success={} failure={} start_millis={} duration_millis={} timeout_millis={} initialized={} running={} stopped={}",
            s.name,
            s.iteration,
            s.successful_rounds,
            s.failed_rounds,
            s.started_at_millis,
            s.duration.as_millis(),
            timeout,
            s.initialized,
            s.running,
            s.stopped,
        );
    }
    out.push_str("---");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(name: &str, timeout: Option<Duration>) -> RunnerStatus {
        RunnerStatus {
            name: name.into(),
            class: "echo".into(),
            iteration: 10,
            successful_rounds: 10,
            failed_rounds: 0,
            started_at_millis: 42,
            duration: Duration::from_millis(7),
            timeout,
            required: true,
            initialized: true,
            running: false,
            completed: true,
            stopped: true,
        }
    }

    #[test]
    fn empty_report_has_frame_only() {
        assert_eq!(stats_report(&[]), "warmvisor stats:\n---\n---");
    }

    #[test]
    fn renders_one_line_per_runner() {
        let report = stats_report(&[
            status("echo-1", Some(Duration::from_secs(1))),
            status("echo-2", None),
        ]);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[2],
            " * warmer=echo-1 iteration=10 success=10 failure=0 start_millis=42 duration_millis=7 timeout_millis=1000 initialized=true running=false stopped=true"
        );
        assert!(lines[3].contains("timeout_millis=none"));
    }

    #[test]
    fn serializes_to_json() {
        let json = serde_json::to_value(status("echo-1", None)).unwrap();
        assert_eq!(json["name"], "echo-1");
        assert_eq!(json["iteration"], 10);
        assert!(json["timeout"].is_null());
    }
}
