#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// 單一階段結束時的資源快照
#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct StageSample {
    pub stage: String,
    pub cpu_usage: f32,
    pub memory_mb: u64,
    /// 與上一個快照之間的時間
    pub stage_time: Duration,
}

/// 分析流程各階段的 CPU / 記憶體紀錄（`--monitor`）
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    samples: Mutex<Vec<StageSample>>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        if enabled {
            if let Some(pid) = pid {
                system.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[pid]),
                    true,
                    ProcessRefreshKind::everything(),
                );
            }
        }

        Self {
            system: Mutex::new(system),
            pid,
            start_time: Instant::now(),
            samples: Mutex::new(Vec::new()),
            enabled,
        }
    }

    fn sample(&self, stage: &str) -> Option<StageSample> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;
        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        let process = system.process(pid)?;

        let mut samples = self.samples.lock().ok()?;
        let elapsed = self.start_time.elapsed();
        let previous: Duration = samples.iter().map(|s| s.stage_time).sum();
        let sample = StageSample {
            stage: stage.to_string(),
            cpu_usage: process.cpu_usage(),
            memory_mb: process.memory() / 1024 / 1024,
            stage_time: elapsed.saturating_sub(previous),
        };
        samples.push(sample.clone());
        Some(sample)
    }

    pub fn log_stats(&self, stage: &str) {
        if let Some(sample) = self.sample(stage) {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Stage time: {:?}",
                sample.stage,
                sample.cpu_usage,
                sample.memory_mb,
                sample.stage_time
            );
        }
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        let Ok(samples) = self.samples.lock() else {
            return;
        };
        let peak = samples.iter().map(|s| s.memory_mb).max().unwrap_or(0);
        let slowest = samples.iter().max_by_key(|s| s.stage_time);
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak Memory: {}MB, Slowest stage: {}",
            self.start_time.elapsed(),
            peak,
            slowest.map(|s| s.stage.as_str()).unwrap_or("-")
        );
    }

    pub fn samples(&self) -> Vec<StageSample> {
        self.samples
            .lock()
            .map(|samples| samples.clone())
            .unwrap_or_default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _stage: &str) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
