/*!
 * Process Sampling
 * Random instruction counts and power-of-two memory sizes for new processes
 */

use crate::core::config::{power_of_two_range, EmulatorConfig};
use crate::core::errors::ConfigResult;
use crate::core::types::Size;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;

/// Values drawn for one new process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessShape {
    pub total_instructions: u64,
    pub memory_size: Size,
    pub page_size: Size,
}

/// Seedable sampler for process shapes
#[derive(Debug)]
pub struct ProcessSampler {
    rng: StdRng,
    instructions: RangeInclusive<u64>,
    memory_exponents: RangeInclusive<u32>,
    page_exponents: RangeInclusive<u32>,
}

impl ProcessSampler {
    /// Fails when a memory range admits no power of two
    pub fn new(config: &EmulatorConfig, seed: Option<u64>) -> ConfigResult<Self> {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            instructions: config.min_ins..=config.max_ins,
            memory_exponents: power_of_two_range(config.min_mem_per_proc, config.max_mem_per_proc)?,
            page_exponents: power_of_two_range(1, config.mem_per_frame)?,
        })
    }

    pub fn sample(&mut self) -> ProcessShape {
        let total_instructions = self.rng.gen_range(self.instructions.clone());
        let memory_exp = self.rng.gen_range(self.memory_exponents.clone());
        let page_exp = self.rng.gen_range(self.page_exponents.clone());
        ProcessShape {
            total_instructions,
            memory_size: 1 << memory_exp,
            page_size: 1 << page_exp,
        }
    }
}
