//! 并发控制模块
//! Concurrency control module
//!
//! 工作线程之间唯一共享的可变状态就是这里的停止标志。
//! 某个线程遇到致命错误后，主线程设置标志，其余线程在两次循环之间看到它并退出。

use std::sync::atomic::{AtomicBool, Ordering};

/// 停止标志。
/// Cooperative cancellation signal polled by workers between iterations.
#[derive(Debug)]
pub struct StopFlag {
    stop: AtomicBool,
}

impl StopFlag {
    /// 创建一个新的 StopFlag，初始状态为 false (不停止)。
    pub const fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
        }
    }

    /// 检查是否应该停止工作。
    ///
    /// 每次循环只检查一次，稍晚看到停止信号最多多写一个批次，所以用 Relaxed 即可。
    #[inline]
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// 设置停止标志。
    pub fn force_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}
