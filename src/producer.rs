//! 素数来源模块
//! Prime source module
//!
//! 工作线程只通过 [`PrimeSource`] 请求素数批次，并不关心具体算法。
//! 本模块附带一个基于确定性 Miller-Rabin 的默认实现，覆盖整个 64 位范围。

use crate::error::Error;
use crate::types::Batch;

/// 素数来源特征。
/// Given `(count, lower_bound)`, returns the first `count` primes `>= lower_bound`.
///
/// 实现必须可以在多个线程之间共享。闭包也实现了该特征，测试可以直接传入确定性的桩。
pub trait PrimeSource: Send + Sync {
    fn generate(&self, count: usize, lower_bound: u64) -> Result<Batch, Error>;
}

impl<F> PrimeSource for F
where
    F: Fn(usize, u64) -> Result<Vec<u64>, Error> + Send + Sync,
{
    fn generate(&self, count: usize, lower_bound: u64) -> Result<Batch, Error> {
        // 闭包只返回 Vec，这里包装成 Batch；校验留给调用方。
        self(count, lower_bound).map(Batch::new)
    }
}

/// 逐个测试候选数的素数来源。
///
/// 对 64 位整数，以前 12 个素数为底的 Miller-Rabin 检测是确定性的，不会有伪素数。
#[derive(Debug, Clone, Copy, Default)]
pub struct MillerRabinSource;

impl PrimeSource for MillerRabinSource {
    fn generate(&self, count: usize, lower_bound: u64) -> Result<Batch, Error> {
        // 预先分配好整批的空间，批次大小在请求时就已知。
        let mut primes = Vec::with_capacity(count);
        // 下界本身也是候选：请求的是 >= lower_bound 的素数。
        let mut candidate = Some(lower_bound);

        while primes.len() < count {
            let Some(n) = candidate else {
                // 已经越过 u64::MAX，剩下的素数无法用 64 位表示。
                return Err(Error::PrimeDomainExhausted {
                    lower_bound,
                    requested: count,
                    found: primes.len(),
                });
            };
            if is_prime(n) {
                primes.push(n);
            }
            // checked_add 溢出时得到 None，下一轮就报告素数耗尽。
            candidate = next_candidate(n);
        }

        Ok(Batch::new(primes))
    }
}

/// 下一个值得测试的候选数：2 之后只看奇数。
fn next_candidate(n: u64) -> Option<u64> {
    match n {
        0..=2 => Some(n + 1),
        _ if n % 2 == 0 => n.checked_add(1),
        _ => n.checked_add(2),
    }
}

const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// 64 位确定性素性检测。
pub fn is_prime(n: u64) -> bool {
    // 0 和 1 都不是素数。
    if n < 2 {
        return false;
    }
    // 先用小素数试除：既处理了 n 本身是小素数的情况，也快速排除大部分合数。
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }

    // n - 1 = d * 2^s，d 为奇数
    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;

    'witness: for &a in &WITNESSES {
        // a^d mod n 为 1 或 n-1 时，这个底无法证明 n 是合数。
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        // 反复平方，检查序列 a^(d*2^r) 中是否出现 n-1。
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        // 这个底是合数的见证。
        return false;
    }
    true
}

#[inline]
fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    // 在 u128 中相乘，两个 64 位数的乘积不会溢出。
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut result = 1u64;
    base %= m;
    // 二进制快速幂：逐位处理指数。
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn small_numbers_match_trial_division() {
        let trial = |n: u64| n >= 2 && (2..n).take_while(|d| d * d <= n).all(|d| n % d != 0);
        for n in 0..5_000u64 {
            assert_eq!(is_prime(n), trial(n), "mismatch at {n}");
        }
    }

    #[rstest]
    #[case(4_294_967_311, true)] // 2^32 之后的第一个素数
    #[case(18_446_744_073_709_551_557, true)] // 最大的 64 位素数
    #[case(18_446_744_073_709_551_615, false)]
    #[case(3_215_031_751, false)] // 对底 2,3,5,7 的强伪素数
    #[case(3_825_123_056_546_413_051, false)] // 对前 9 个素数底的强伪素数
    fn large_values(#[case] n: u64, #[case] expected: bool) {
        assert_eq!(is_prime(n), expected);
    }

    #[test]
    fn first_primes_from_150() {
        let batch = MillerRabinSource.generate(5, 150).expect("should generate");
        assert_eq!(batch.as_slice(), &[151, 157, 163, 167, 173]);
    }

    #[test]
    fn lower_bound_is_inclusive() {
        let batch = MillerRabinSource.generate(3, 2).expect("should generate");
        assert_eq!(batch.as_slice(), &[2, 3, 5]);
        let batch = MillerRabinSource.generate(2, 0).expect("should generate");
        assert_eq!(batch.as_slice(), &[2, 3]);
    }

    #[test]
    fn batches_are_sized_and_ascending() {
        let lower = 1u64 << 40;
        let batch = MillerRabinSource.generate(64, lower).expect("should generate");
        batch.verify(64, lower).expect("batch should honour contract");
    }

    #[test]
    fn runs_out_near_the_ceiling() {
        let err = MillerRabinSource
            .generate(2, 18_446_744_073_709_551_557)
            .expect_err("only one 64-bit prime remains");
        match err {
            Error::PrimeDomainExhausted { found, requested, .. } => {
                assert_eq!(found, 1);
                assert_eq!(requested, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn closures_are_prime_sources() {
        let stub = |count: usize, lower: u64| -> Result<Vec<u64>, Error> {
            Ok((0..count as u64).map(|i| lower + i).collect())
        };
        let batch = stub.generate(3, 10).expect("stub should generate");
        assert_eq!(batch.as_slice(), &[10, 11, 12]);
    }
}
