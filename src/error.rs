//! 错误处理模块
//! Error handling module
//!
//! 本文件定义了采集过程中可能出现的错误类型。
//! 所有错误对一次运行而言都是致命的：调用者拿到错误后应当终止，
//! 但已经写入磁盘的批次文件会保留。

use std::path::PathBuf;
use thiserror::Error; // `thiserror` 帮我们为错误枚举派生 `std::error::Error` 和 `Display`。

/// 库的一般性错误。
/// General errors for the library, covering configuration, worker lifecycle and I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// 配置参数无效（例如线程数为 0，或者素数区间为空）。
    /// 在任何工作线程启动之前返回。
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// 操作系统拒绝创建工作线程。
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// 工作线程发生 panic，join 时才被发现。
    #[error("worker {worker} panicked")]
    WorkerPanicked { worker: usize },

    /// 批次文件无法打开、写入或读取。
    #[error("i/o failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 在 64 位整数范围内已经找不到足够多的素数。
    #[error("ran out of 64-bit primes: found {found} of {requested} at or above {lower_bound}")]
    PrimeDomainExhausted {
        lower_bound: u64,
        requested: usize,
        found: usize,
    },

    /// 素数来源返回的批次不满足约定（数量、顺序或下界）。
    #[error("malformed batch: {0}")]
    MalformedBatch(String),

    /// 外部素数来源报告的其它失败。
    #[error("prime source failed: {0}")]
    ProducerFailed(String),

    /// 工作线程与主线程之间的通道被意外关闭。
    #[error("worker channel closed")]
    ChannelClosed,
}

impl Error {
    /// 为 I/O 错误附加出错的文件路径。
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
