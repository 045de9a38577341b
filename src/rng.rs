//! 伪随机数模块
//! Pseudo-random source module
//!
//! 每个工作线程拥有自己独立播种的生成器，线程之间不共享任何可变的随机状态。
//! 生成器只追求速度和足够长的周期，不提供任何密码学保证。

use std::time::{SystemTime, UNIX_EPOCH};

/// 用于播种 `x` 的奇数乘数 (来自 xxHash 的 PRIME64_1)。
pub const SEED_MUL_X: u64 = 0x9E37_79B1_85EB_CA87;
/// 用于播种 `y` 的奇数乘数 (来自 xxHash 的 PRIME64_2)。
pub const SEED_MUL_Y: u64 = 0xC2B2_AE3D_27D4_EB4F;

/// 随机数来源特征。
/// Anything that can hand out uniformly distributed 64-bit values.
///
/// 起点选择器只依赖这个接口，测试可以用固定序列替换真实的生成器。
pub trait RandomSource {
    /// 推进内部状态并返回下一个 64 位随机值。
    fn next_u64(&mut self) -> u64;
}

impl<R: RandomSource + ?Sized> RandomSource for Box<R> {
    fn next_u64(&mut self) -> u64 {
        (**self).next_u64()
    }
}

/// xorshift128+ 生成器。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XorShiftRng {
    x: u64,
    y: u64,
}

impl XorShiftRng {
    /// 从两个时钟读数播种。
    ///
    /// 两次读数分别乘以不同的奇数常量，即使两个进程几乎同时启动，
    /// 得到的状态也会不同。
    pub fn from_clock() -> Self {
        let first = clock_ticks();
        let second = clock_ticks();
        Self::from_words(
            first.wrapping_mul(SEED_MUL_X),
            second.wrapping_mul(SEED_MUL_Y),
        )
    }

    /// 直接用两个状态字构造生成器。
    ///
    /// 全零状态是 xorshift 的不动点，这种情况下改用乘数本身作为状态。
    pub fn from_words(x: u64, y: u64) -> Self {
        if x == 0 && y == 0 {
            return Self {
                x: SEED_MUL_X,
                y: SEED_MUL_Y,
            };
        }
        Self { x, y }
    }

    /// 当前状态，便于日志和测试。
    pub fn state(&self) -> (u64, u64) {
        (self.x, self.y)
    }
}

impl RandomSource for XorShiftRng {
    #[inline]
    fn next_u64(&mut self) -> u64 {
        let mut t = self.x;
        let s = self.y;
        self.x = s;
        t ^= t << 23;
        t ^= t >> 17;
        t ^= s ^ (s >> 26);
        self.y = t;
        t.wrapping_add(s)
    }
}

/// 读取高精度时钟 (纳秒)，截断为 64 位。
///
/// 系统时钟早于 Unix 纪元时仍然返回差值，播种只需要一个变化的数。
pub fn clock_ticks() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_nanos() as u64,
        Err(err) => err.duration().as_nanos() as u64,
    }
}
