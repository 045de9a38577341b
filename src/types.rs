//! 类型定义模块
//! Types definition module
//!
//! 本模块定义了核心的数据结构：采集配置 (HarvestConfig)、子区间 (SubRange)、
//! 素数批次 (Batch) 以及一次运行的结果汇总 (HarvestSummary)。
//! 同时包含配置和批次的校验逻辑。

use crate::error::Error;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 默认输出目录。
pub const DEFAULT_OUT_DIR: &str = "out.primes.64";
/// 默认素数区间下界：2^32 - 1。
pub const DEFAULT_PRIME_MIN: u64 = u32::MAX as u64;
/// 默认素数区间上界：2^64 - 1。
pub const DEFAULT_PRIME_MAX: u64 = u64::MAX;
pub const DEFAULT_THREADS: usize = 2;
pub const DEFAULT_LOOPS: usize = 4;
pub const DEFAULT_PRIMES_PER_BATCH: usize = 4096;
/// 起点选择的默认重试上限，超过后走回退路径。
pub const DEFAULT_MAX_START_ATTEMPTS: u64 = 1 << 16;

/// 采集配置结构体。
/// Immutable run configuration, shared read-only by every worker.
///
/// 使用 `derive_builder` 生成 `HarvestConfigBuilder`，每个字段都带默认值，
/// 命令行只需要覆盖用户给出的那几项。
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[builder(pattern = "owned")]
pub struct HarvestConfig {
    /// 批次文件的输出目录，必须已经存在。
    #[builder(setter(into), default = "PathBuf::from(DEFAULT_OUT_DIR)")]
    pub out_dir: PathBuf,

    /// 全局素数区间下界。
    #[builder(default = "DEFAULT_PRIME_MIN")]
    pub prime_min: u64,

    /// 全局素数区间上界。
    #[builder(default = "DEFAULT_PRIME_MAX")]
    pub prime_max: u64,

    /// 工作线程数 (T)。
    #[builder(default = "DEFAULT_THREADS")]
    pub threads: usize,

    /// 每个线程的循环次数 (L)，每次循环写出一个批次文件。
    #[builder(default = "DEFAULT_LOOPS")]
    pub loops: usize,

    /// 每个批次包含的素数个数 (P)。
    #[builder(default = "DEFAULT_PRIMES_PER_BATCH")]
    pub primes_per_batch: usize,

    /// 起点选择在回退之前最多拒绝多少次随机数。
    #[builder(default = "DEFAULT_MAX_START_ATTEMPTS")]
    pub max_start_attempts: u64,

    /// 固定的主种子；为 `None` 时从时钟读取。
    #[builder(default)]
    pub seed: Option<u64>,
}

impl HarvestConfig {
    /// 每个子区间的宽度（整除，余数丢弃）。
    pub fn span(&self) -> u64 {
        self.prime_max.saturating_sub(self.prime_min) / self.threads.max(1) as u64
    }

    /// 验证配置参数的有效性。
    ///
    /// 除了基本的非零检查之外，还要拒绝会让起点选择永远找不到内部点的区间：
    /// 子区间的开区间 `(min, max)` 至少要包含一个整数，即 `span >= 2`。
    pub fn validate(&self) -> Result<(), Error> {
        if self.threads == 0 {
            return Err(Error::InvalidConfig("threads must be >= 1".into()));
        }
        if self.loops == 0 {
            return Err(Error::InvalidConfig("loops must be >= 1".into()));
        }
        if self.primes_per_batch == 0 {
            return Err(Error::InvalidConfig("primes_per_batch must be >= 1".into()));
        }
        if self.out_dir.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("out_dir must not be empty".into()));
        }
        if self.prime_max <= self.prime_min {
            return Err(Error::InvalidConfig(format!(
                "prime_max ({}) must be greater than prime_min ({})",
                self.prime_max, self.prime_min
            )));
        }
        // 主线程按 `threads x loops` 计数批次，乘积必须能用 usize 表示。
        if self.threads.checked_mul(self.loops).is_none() {
            return Err(Error::InvalidConfig(format!(
                "threads ({}) x loops ({}) overflows the batch count",
                self.threads, self.loops
            )));
        }
        let span = self.span();
        if span < 2 {
            return Err(Error::InvalidConfig(format!(
                "range [{}, {}) split across {} threads leaves sub-ranges of width {}, need at least 2",
                self.prime_min, self.prime_max, self.threads, span
            )));
        }
        Ok(())
    }
}

impl HarvestConfigBuilder {
    /// 构建并验证配置。
    /// 相比默认的 `build()`，错误统一映射为 `Error::InvalidConfig`。
    pub fn build_validated(self) -> Result<HarvestConfig, Error> {
        let config = self
            .build()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// 半开子区间 `[range_min, range_max)`，每个工作线程一个。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRange {
    pub range_min: u64,
    pub range_max: u64,
}

impl SubRange {
    /// `p` 是否严格位于区间内部（两个边界都不算）。
    #[inline]
    pub fn contains_strictly(&self, p: u64) -> bool {
        self.range_min < p && p < self.range_max
    }

    /// 开区间 `(range_min, range_max)` 中整数的个数。
    pub fn interior_len(&self) -> u64 {
        self.range_max
            .saturating_sub(self.range_min)
            .saturating_sub(1)
    }
}

/// 素数批次。
/// An owned, ascending run of primes produced by one request to the prime source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    primes: Vec<u64>,
}

impl Batch {
    pub fn new(primes: Vec<u64>) -> Self {
        Self { primes }
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }

    /// 批次中的第一个素数，也决定了输出文件名。
    pub fn first(&self) -> Option<u64> {
        self.primes.first().copied()
    }

    pub fn last(&self) -> Option<u64> {
        self.primes.last().copied()
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.primes
    }

    pub fn into_inner(self) -> Vec<u64> {
        self.primes
    }

    /// 检查批次是否满足请求 `(count, lower_bound)` 的约定。
    ///
    /// # 验证步骤
    /// 1. 数量必须恰好等于 `count`。
    /// 2. 第一个元素不小于 `lower_bound`。
    /// 3. 严格递增（同时也排除了重复值）。
    pub fn verify(&self, count: usize, lower_bound: u64) -> Result<(), Error> {
        if self.primes.len() != count {
            return Err(Error::MalformedBatch(format!(
                "expected {} primes, got {}",
                count,
                self.primes.len()
            )));
        }
        match self.first() {
            Some(first) if first < lower_bound => {
                return Err(Error::MalformedBatch(format!(
                    "first prime {first} is below lower bound {lower_bound}"
                )));
            }
            None => return Err(Error::MalformedBatch("batch is empty".into())),
            Some(_) => {}
        }
        if let Some(pair) = self.primes.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::MalformedBatch(format!(
                "primes not strictly ascending: {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(())
    }
}

impl From<Vec<u64>> for Batch {
    fn from(primes: Vec<u64>) -> Self {
        Self::new(primes)
    }
}

/// 一个已写出批次文件的记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub worker: usize,
    /// 从 0 开始的循环序号。
    pub iteration: usize,
    /// 交给素数来源的随机起点。
    pub start: u64,
    pub first_prime: u64,
    pub last_prime: u64,
    pub path: PathBuf,
    /// 起点是否来自回退路径。
    pub fallback: bool,
}

/// 一次完整运行的结果汇总。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSummary {
    /// 按 (worker, iteration) 排序的批次记录。
    pub batches: Vec<BatchRecord>,
}

impl HarvestSummary {
    /// 写出的批次数。
    ///
    /// 两个批次的第一个素数相同时会写到同一个文件（后写者覆盖），
    /// 所以磁盘上的文件数可能少于这个值。
    pub fn batches_written(&self) -> usize {
        self.batches.len()
    }

    /// 起点走了回退路径的批次数。
    pub fn fallbacks(&self) -> usize {
        self.batches.iter().filter(|b| b.fallback).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_command_line_defaults() {
        let config = HarvestConfigBuilder::default()
            .build_validated()
            .expect("defaults should validate");
        assert_eq!(config.out_dir, PathBuf::from("out.primes.64"));
        assert_eq!(config.prime_min, 4_294_967_295);
        assert_eq!(config.prime_max, u64::MAX);
        assert_eq!(config.threads, 2);
        assert_eq!(config.loops, 4);
        assert_eq!(config.primes_per_batch, 4096);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn rejects_inverted_or_empty_range() {
        for (min, max) in [(200, 100), (100, 100)] {
            let err = HarvestConfigBuilder::default()
                .prime_min(min)
                .prime_max(max)
                .build_validated()
                .expect_err("range must be rejected");
            assert!(matches!(err, Error::InvalidConfig(_)));
        }
    }

    #[test]
    fn rejects_threads_that_truncate_span() {
        // 10 / 6 = 1：开区间 (min, min + 1) 没有整数。
        let err = HarvestConfigBuilder::default()
            .prime_min(100)
            .prime_max(110)
            .threads(6)
            .build_validated()
            .expect_err("span of 1 must be rejected");
        assert!(matches!(err, Error::InvalidConfig(_)));

        // 10 / 20 = 0
        let err = HarvestConfigBuilder::default()
            .prime_min(100)
            .prime_max(110)
            .threads(20)
            .build_validated()
            .expect_err("span of 0 must be rejected");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn rejects_zero_counts() {
        let builders = [
            HarvestConfigBuilder::default().threads(0),
            HarvestConfigBuilder::default().loops(0),
            HarvestConfigBuilder::default().primes_per_batch(0),
        ];
        for builder in builders {
            let err = builder.build_validated().expect_err("zero must be rejected");
            assert!(matches!(err, Error::InvalidConfig(_)));
        }
    }

    #[test]
    fn rejects_batch_count_overflow() {
        let err = HarvestConfigBuilder::default()
            .threads(2)
            .loops(usize::MAX)
            .build_validated()
            .expect_err("threads x loops must fit in usize");
        assert!(matches!(err, Error::InvalidConfig(_)));

        // 乘积能表示时，巨大的循环次数本身是合法的。
        HarvestConfigBuilder::default()
            .threads(2)
            .loops(i32::MAX as usize)
            .build_validated()
            .expect("large loop count should validate");
    }

    #[test]
    fn batch_verify_accepts_valid_batch() {
        let batch = Batch::from(vec![151, 157, 163, 167, 173]);
        batch.verify(5, 150).expect("batch should verify");
        assert_eq!(batch.first(), Some(151));
        assert_eq!(batch.last(), Some(173));
    }

    #[test]
    fn batch_verify_rejects_wrong_size_order_and_bound() {
        let short = Batch::from(vec![151, 157]);
        assert!(matches!(short.verify(3, 150), Err(Error::MalformedBatch(_))));

        let unordered = Batch::from(vec![151, 163, 157]);
        assert!(matches!(unordered.verify(3, 150), Err(Error::MalformedBatch(_))));

        let duplicated = Batch::from(vec![151, 151, 157]);
        assert!(matches!(duplicated.verify(3, 150), Err(Error::MalformedBatch(_))));

        let below = Batch::from(vec![149, 151, 157]);
        assert!(matches!(below.verify(3, 150), Err(Error::MalformedBatch(_))));
    }

    #[test]
    fn summary_counts_fallbacks() {
        let record = |fallback| BatchRecord {
            worker: 0,
            iteration: 0,
            start: 150,
            first_prime: 151,
            last_prime: 173,
            path: PathBuf::from("151.primes.u64.bin"),
            fallback,
        };
        let summary = HarvestSummary {
            batches: vec![record(false), record(true), record(false)],
        };
        // 三条记录指向同一个文件：计数的是批次，不是磁盘上的文件。
        assert_eq!(summary.batches_written(), 3);
        assert_eq!(summary.fallbacks(), 1);
    }
}
