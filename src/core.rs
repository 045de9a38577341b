//! 核心工具函数模块
//! Core utilities module
//!
//! 本模块包含区间划分、随机起点选择以及每个工作线程的种子派生逻辑。
//! 这些函数都不做 I/O，也不访问任何共享状态。

use crate::error::Error;
use crate::rng::{RandomSource, SEED_MUL_X, SEED_MUL_Y};
use crate::types::SubRange;
use blake3::Hasher as Blake3Hasher;

/// 根据主种子 (master seed) 和工作线程编号派生该线程的生成器状态。
///
/// # 目的
/// 所有线程共用同一个生成器会产生数据竞争；让每个线程各自播种，
/// 又要保证它们的序列互不相同。这里把主种子和线程编号一起哈希，
/// 再分别乘以两个奇数常量得到 `x` 和 `y`。
///
/// # 返回值
/// * `(u64, u64)`: 可直接交给 [`crate::rng::XorShiftRng::from_words`] 的两个状态字。
pub fn derive_worker_seed(master_seed: u64, worker: usize) -> (u64, u64) {
    let mut hasher = Blake3Hasher::new();
    // 域分隔符，避免与其它用途的哈希输入混淆。
    hasher.update(b"primeharvest:worker-seed:v1|");
    hasher.update(&master_seed.to_le_bytes());
    hasher.update(&(worker as u64).to_le_bytes());
    let digest: [u8; 32] = hasher.finalize().into();

    let mut x = [0u8; 8];
    let mut y = [0u8; 8];
    x.copy_from_slice(&digest[..8]);
    y.copy_from_slice(&digest[8..16]);
    (
        u64::from_le_bytes(x).wrapping_mul(SEED_MUL_X),
        u64::from_le_bytes(y).wrapping_mul(SEED_MUL_Y),
    )
}

/// 计算第 `index` 个线程负责的子区间。
///
/// `span = (prime_max - prime_min) / threads`，余数直接丢弃，
/// 所以最后一个子区间可能在 `prime_max` 之前就结束了。
/// 子区间按线程编号首尾相接、互不重叠。
pub fn partition(prime_min: u64, prime_max: u64, threads: usize, index: usize) -> SubRange {
    let span = prime_max.saturating_sub(prime_min) / threads.max(1) as u64;
    let range_min = prime_min + index as u64 * span;
    SubRange {
        range_min,
        range_max: range_min + span,
    }
}

/// 一次起点选择的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPoint {
    /// 选中的起点，严格位于子区间内部。
    pub value: u64,
    /// 消耗的随机数个数（包括回退时的那一次）。
    pub attempts: u64,
    /// 是否因为超过重试上限而走了回退路径。
    pub fallback: bool,
}

/// 在子区间的开区间 `(range_min, range_max)` 内选择一个随机起点。
///
/// # 逻辑
/// 1. 不断抽取 64 位随机数，只接受严格落在开区间内的值（边界值本身被拒绝）。
/// 2. 被拒绝 `max_attempts` 次之后，不再拒绝采样，而是把下一次抽取取模映射进开区间。
///    这样即使子区间相对 64 位空间非常窄，也不会无限自旋。
///
/// 开区间为空时返回 `Error::InvalidConfig`；正常情况下配置校验已经排除了这种输入。
pub fn select_start<R>(range: SubRange, rng: &mut R, max_attempts: u64) -> Result<StartPoint, Error>
where
    R: RandomSource + ?Sized,
{
    let interior = range.interior_len();
    if interior == 0 {
        return Err(Error::InvalidConfig(format!(
            "sub-range [{}, {}) has no interior point",
            range.range_min, range.range_max
        )));
    }

    for attempt in 1..=max_attempts {
        let p = rng.next_u64();
        if range.contains_strictly(p) {
            return Ok(StartPoint {
                value: p,
                attempts: attempt,
                fallback: false,
            });
        }
    }

    let value = range.range_min + 1 + rng.next_u64() % interior;
    Ok(StartPoint {
        value,
        attempts: max_attempts.saturating_add(1),
        fallback: true,
    })
}
