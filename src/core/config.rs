/*!
 * Emulator Configuration
 *
 * Immutable configuration snapshot consumed by the scheduler, the memory manager,
 * and the process pipeline. Two sources are supported:
 * - JSON objects with the kebab-case keys below
 * - The line-oriented `key value` format of `config.txt`
 *
 * ```text
 * num-cpu 4
 * scheduler "rr"
 * quantum-cycles 5
 * batch-process-freq 1
 * min-ins 1000
 * max-ins 2000
 * delay-per-exec 0
 * max-overall-mem 16384
 * mem-per-frame 16
 * min-mem-per-proc 4096
 * max-mem-per-proc 4096
 * ```
 */

use super::errors::{ConfigError, ConfigResult};
use super::types::Size;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

/// Keys understood by the key/value parser
const KNOWN_KEYS: &[&str] = &[
    "num-cpu",
    "scheduler",
    "quantum-cycles",
    "batch-process-freq",
    "min-ins",
    "max-ins",
    "delay-per-exec",
    "max-overall-mem",
    "mem-per-frame",
    "min-mem-per-proc",
    "max-mem-per-proc",
    "reclaim-finished",
];

/// Dispatch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerAlgorithm {
    /// First-come-first-served, non-preemptive
    Fcfs,
    /// Round-robin with instruction-count quantum
    Rr,
}

impl std::str::FromStr for SchedulerAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_matches('"').to_ascii_lowercase().as_str() {
            "fcfs" => Ok(SchedulerAlgorithm::Fcfs),
            "rr" => Ok(SchedulerAlgorithm::Rr),
            other => Err(ConfigError::UnknownScheduler(other.to_string())),
        }
    }
}

impl std::fmt::Display for SchedulerAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SchedulerAlgorithm::Fcfs => write!(f, "fcfs"),
            SchedulerAlgorithm::Rr => write!(f, "rr"),
        }
    }
}

/// Memory manager mode, derived from the memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// One contiguous address range
    Flat,
    /// Fixed-size frames
    Paging,
}

impl std::fmt::Display for MemoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryMode::Flat => write!(f, "flat"),
            MemoryMode::Paging => write!(f, "paging"),
        }
    }
}

/// Emulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EmulatorConfig {
    pub num_cpu: u32,
    pub scheduler: SchedulerAlgorithm,
    #[serde(default)]
    pub quantum_cycles: u32,
    /// Seconds between two synthetic processes in batch mode
    pub batch_process_freq: f64,
    pub min_ins: u64,
    pub max_ins: u64,
    /// Seconds per executed instruction
    pub delay_per_exec: f64,
    pub max_overall_mem: Size,
    pub mem_per_frame: Size,
    pub min_mem_per_proc: Size,
    pub max_mem_per_proc: Size,
    /// Release a process's memory as soon as it finishes
    #[serde(default)]
    pub reclaim_finished: bool,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            num_cpu: 4,
            scheduler: SchedulerAlgorithm::Rr,
            quantum_cycles: 5,
            batch_process_freq: 1.0,
            min_ins: 100,
            max_ins: 500,
            delay_per_exec: 0.01,
            max_overall_mem: 16384,
            mem_per_frame: 16384,
            min_mem_per_proc: 1024,
            max_mem_per_proc: 4096,
            reclaim_finished: false,
        }
    }
}

impl EmulatorConfig {
    /// Load and validate a configuration file.
    /// `.json` files are parsed as JSON; anything else uses the key/value format.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::parse_key_values(&text)?
        };

        info!(
            "Loaded configuration from {}: {} cores, {} scheduler, {:?} memory",
            path.display(),
            config.num_cpu,
            config.scheduler,
            config.memory_mode()
        );
        Ok(config)
    }

    /// Parse and validate a JSON configuration object
    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate the whitespace-separated `key value` format
    pub fn parse_key_values(text: &str) -> ConfigResult<Self> {
        let mut object = serde_json::Map::new();

        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            if key.starts_with('#') {
                continue;
            }
            if !KNOWN_KEYS.contains(&key) {
                warn!("Ignoring unknown configuration key '{}'", key);
                continue;
            }
            let raw = tokens.next().ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                value: String::new(),
            })?;
            object.insert(key.to_string(), parse_scalar(raw));
        }

        let config: Self = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every bound the emulator relies on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.num_cpu < 1 {
            return Err(invalid("num-cpu", self.num_cpu));
        }

        if self.min_ins < 1 {
            return Err(invalid("min-ins", self.min_ins));
        }
        if self.min_ins > self.max_ins {
            return Err(ConfigError::InvalidBounds {
                key: "min-ins/max-ins".into(),
                min: self.min_ins,
                max: self.max_ins,
            });
        }

        if self.scheduler == SchedulerAlgorithm::Rr && self.quantum_cycles < 1 {
            return Err(invalid("quantum-cycles", self.quantum_cycles));
        }

        if Duration::try_from_secs_f64(self.delay_per_exec).is_err() {
            return Err(invalid("delay-per-exec", self.delay_per_exec));
        }
        if Duration::try_from_secs_f64(self.batch_process_freq).is_err() {
            return Err(invalid("batch-process-freq", self.batch_process_freq));
        }

        if self.max_overall_mem == 0 {
            return Err(invalid("max-overall-mem", self.max_overall_mem));
        }
        if self.mem_per_frame == 0 || self.mem_per_frame > self.max_overall_mem {
            return Err(ConfigError::MemoryLayout(format!(
                "frame size {} must be within 1..={}",
                self.mem_per_frame, self.max_overall_mem
            )));
        }
        if self.memory_mode() == MemoryMode::Paging
            && self.max_overall_mem % self.mem_per_frame != 0
        {
            return Err(ConfigError::MemoryLayout(format!(
                "total memory {} is not a multiple of frame size {}",
                self.max_overall_mem, self.mem_per_frame
            )));
        }

        if self.min_mem_per_proc > self.max_mem_per_proc {
            return Err(ConfigError::InvalidBounds {
                key: "min-mem-per-proc/max-mem-per-proc".into(),
                min: self.min_mem_per_proc as u64,
                max: self.max_mem_per_proc as u64,
            });
        }
        let exponents = power_of_two_range(self.min_mem_per_proc, self.max_mem_per_proc)?;
        let smallest = 1usize << exponents.start();
        if smallest > self.max_overall_mem {
            return Err(ConfigError::MemoryLayout(format!(
                "smallest process size {} exceeds total memory {}",
                smallest, self.max_overall_mem
            )));
        }

        Ok(())
    }

    /// Flat if the whole memory is a single frame, paging otherwise
    pub fn memory_mode(&self) -> MemoryMode {
        if self.max_overall_mem == self.mem_per_frame {
            MemoryMode::Flat
        } else {
            MemoryMode::Paging
        }
    }

    /// Number of frames in paging mode
    pub fn num_frames(&self) -> usize {
        if self.mem_per_frame == 0 {
            0
        } else {
            self.max_overall_mem / self.mem_per_frame
        }
    }

    /// Quantum slice handed to each core (0 = run to completion)
    pub fn quantum_slice(&self) -> u32 {
        match self.scheduler {
            SchedulerAlgorithm::Fcfs => 0,
            SchedulerAlgorithm::Rr => self.quantum_cycles,
        }
    }

    /// Zero for values `validate` rejects
    pub fn delay_per_exec(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_per_exec).unwrap_or_default()
    }

    /// Zero for values `validate` rejects
    pub fn batch_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.batch_process_freq).unwrap_or_default()
    }

    pub fn with_num_cpu(mut self, num_cpu: u32) -> Self {
        self.num_cpu = num_cpu;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerAlgorithm, quantum_cycles: u32) -> Self {
        self.scheduler = scheduler;
        self.quantum_cycles = quantum_cycles;
        self
    }

    pub fn with_instructions(mut self, min: u64, max: u64) -> Self {
        self.min_ins = min;
        self.max_ins = max;
        self
    }

    pub fn with_delay_per_exec(mut self, seconds: f64) -> Self {
        self.delay_per_exec = seconds;
        self
    }

    pub fn with_batch_process_freq(mut self, seconds: f64) -> Self {
        self.batch_process_freq = seconds;
        self
    }

    pub fn with_memory(mut self, total: Size, frame: Size) -> Self {
        self.max_overall_mem = total;
        self.mem_per_frame = frame;
        self
    }

    pub fn with_process_memory(mut self, min: Size, max: Size) -> Self {
        self.min_mem_per_proc = min;
        self.max_mem_per_proc = max;
        self
    }

    pub fn with_reclaim_finished(mut self, reclaim: bool) -> Self {
        self.reclaim_finished = reclaim;
        self
    }
}

/// Exponents `e` with `min <= 2^e <= max`.
/// A `min` of zero is treated as one.
pub fn power_of_two_range(min: Size, max: Size) -> ConfigResult<RangeInclusive<u32>> {
    let no_power = || ConfigError::NoPowerOfTwo { min, max };

    if max == 0 {
        return Err(no_power());
    }
    let min_exp = min
        .max(1)
        .checked_next_power_of_two()
        .ok_or_else(no_power)?
        .trailing_zeros();
    let max_exp = Size::BITS - 1 - max.leading_zeros();

    if min_exp > max_exp {
        return Err(no_power());
    }
    Ok(min_exp..=max_exp)
}

fn invalid(key: &str, value: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Numbers stay numbers; everything else becomes an unquoted string
fn parse_scalar(raw: &str) -> serde_json::Value {
    if let Ok(n) = raw.parse::<u64>() {
        return serde_json::Value::from(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return serde_json::Value::from(f);
        }
    }
    match raw {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(raw.trim_matches('"').to_string()),
    }
}
