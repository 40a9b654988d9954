use crate::utils::error::Result;
use crate::utils::format::{format_bytes, ByteUnit};
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "cli")]
use crate::utils::error::ExeggutorError;
#[cfg(feature = "cli")]
use std::collections::HashMap;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Tracks the resident memory of a process and all of its descendants.
#[cfg(feature = "cli")]
pub struct MemoryMonitor {
    system: System,
    root: Pid,
    peak: u64,
}

#[cfg(feature = "cli")]
impl MemoryMonitor {
    pub fn new(pid: u32) -> Self {
        Self {
            system: System::new(),
            root: Pid::from_u32(pid),
            peak: 0,
        }
    }

    pub fn current_process() -> Result<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| ExeggutorError::ConfigError {
            message: format!("Cannot determine current PID: {}", e),
        })?;
        Ok(Self::new(pid.as_u32()))
    }

    /// Refreshes the process table and returns the tree's current RSS in bytes.
    pub fn sample(&mut self) -> u64 {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        let mut children: HashMap<Pid, Vec<Pid>> = HashMap::new();
        for (pid, process) in self.system.processes() {
            // threads share their leader's address space
            if process.thread_kind().is_some() {
                continue;
            }
            if let Some(parent) = process.parent() {
                children.entry(parent).or_default().push(*pid);
            }
        }

        let mut total = 0;
        let mut stack = vec![self.root];
        while let Some(pid) = stack.pop() {
            if let Some(process) = self.system.process(pid) {
                total += process.memory();
            }
            if let Some(kids) = children.get(&pid) {
                stack.extend(kids.iter().copied());
            }
        }

        if total > self.peak {
            self.peak = total;
        }
        total
    }

    pub fn peak_bytes(&self) -> u64 {
        self.peak
    }
}

// Without sysinfo there is nothing to sample.
#[cfg(not(feature = "cli"))]
pub struct MemoryMonitor;

#[cfg(not(feature = "cli"))]
impl MemoryMonitor {
    pub fn new(_pid: u32) -> Self {
        Self
    }

    pub fn current_process() -> Result<Self> {
        Ok(Self)
    }

    pub fn sample(&mut self) -> u64 {
        0
    }

    pub fn peak_bytes(&self) -> u64 {
        0
    }
}

/// Awaits `future` while sampling this process's memory every `interval`.
///
/// Returns the future's output together with the observed peak in bytes.
pub async fn profile_peak_memory<F, T>(label: &str, interval: Duration, future: F) -> Result<(T, u64)>
where
    F: Future<Output = T>,
{
    let mut monitor = MemoryMonitor::current_process()?;
    let mut ticker = tokio::time::interval(interval);
    tokio::pin!(future);

    let output = loop {
        tokio::select! {
            output = &mut future => break output,
            _ = ticker.tick() => {
                monitor.sample();
            }
        }
    };
    monitor.sample();

    let peak = monitor.peak_bytes();
    tracing::info!(
        "Peak memory usage for {}: {}",
        label,
        format_bytes(peak, ByteUnit::Auto)
    );
    Ok((output, peak))
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_has_memory() {
        let mut monitor = MemoryMonitor::current_process().unwrap();
        let current = monitor.sample();
        assert!(current > 0);
        assert_eq!(monitor.peak_bytes(), current);
    }

    #[test]
    fn test_peak_never_decreases() {
        let mut monitor = MemoryMonitor::current_process().unwrap();
        let first = monitor.sample();
        monitor.sample();
        assert!(monitor.peak_bytes() >= first);
    }

    #[test]
    fn test_unknown_pid_reports_zero() {
        let mut monitor = MemoryMonitor::new(u32::MAX - 1);
        assert_eq!(monitor.sample(), 0);
    }

    #[tokio::test]
    async fn test_profile_peak_memory_returns_output() {
        let (value, peak) = profile_peak_memory("allocation", Duration::from_millis(5), async {
            let buffer = vec![1u8; 4 * 1024 * 1024];
            tokio::time::sleep(Duration::from_millis(30)).await;
            buffer.iter().map(|b| *b as usize).sum::<usize>()
        })
        .await
        .unwrap();
        assert_eq!(value, 4 * 1024 * 1024);
        assert!(peak > 0);
    }
}
