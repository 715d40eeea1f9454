//! Plain-text progress output.

use ciplat_core::{JobId, JobSpec, JobState, PlatformSnapshot, ProgressSink};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

#[derive(Default)]
struct Lines {
    progress: HashMap<JobId, u8>,
}

/// Prints one line per state change. Holds its own output lock, which is
/// never taken while the scheduling monitor is held.
pub struct ConsoleSink {
    names: HashMap<JobId, String>,
    lines: Mutex<Lines>,
}

impl ConsoleSink {
    pub fn new(jobs: &[JobSpec]) -> Self {
        Self {
            names: jobs.iter().map(|j| (j.id, j.name.clone())).collect(),
            lines: Mutex::new(Lines::default()),
        }
    }

    fn name(&self, job: JobId) -> &str {
        self.names.get(&job).map(String::as_str).unwrap_or("?")
    }

    /// Print a summary of the queue, cores and files.
    pub fn print_snapshot(&self, snap: &PlatformSnapshot) {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = std::io::stdout().lock();

        let queue: Vec<String> = snap.queue.iter().map(|j| j.to_string()).collect();
        let _ = writeln!(out, "Task queue: {}", queue.join(" "));
        for core in &snap.cores {
            let id = core.id.to_string();
            let _ = match core.owner {
                Some(job) => writeln!(out, "Core {:<3} is busy with job {}", id, job),
                None => writeln!(out, "Core {:<3} is free", id),
            };
        }
        for file in &snap.files {
            let holder = match file.owner {
                Some(job) => format!("held by job {}", job),
                None => "released".to_string(),
            };
            let _ = writeln!(
                out,
                "{:<20} modified: {} times, last: {}  is {}",
                file.name,
                file.change_count,
                file.last_changed.format("%Y-%m-%d %H:%M:%S"),
                holder
            );
        }
        let mut running: Vec<_> = lines.progress.iter().filter(|(_, p)| **p < 100).collect();
        running.sort();
        for (job, percent) in running {
            let _ = writeln!(out, "{}. {:<28} {:>3}%", job, self.name(*job), percent);
        }
    }
}

impl ProgressSink for ConsoleSink {
    fn report_state(&self, job: JobId, state: JobState) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        if state != JobState::Executing {
            lines.progress.remove(&job);
        }
        let _ = writeln!(
            std::io::stdout().lock(),
            "{}. {:<28} {}",
            job,
            self.name(job),
            state.label()
        );
    }

    fn report_progress(&self, job: JobId, percent: u8) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.progress.insert(job, percent);
    }
}
