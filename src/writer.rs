//! 批次文件写出模块
//! Batch file writer module
//!
//! 文件格式：没有文件头、文件尾或校验和，只是按顺序排列的原生字节序 `u64`。
//! 文件名由批次中的第一个素数决定：`<out_dir>/<first>.primes.u64.bin`。

use crate::error::Error;
use crate::types::Batch;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 批次文件名后缀。
pub const FILE_SUFFIX: &str = ".primes.u64.bin";

const WORD: usize = std::mem::size_of::<u64>();

/// 把批次写到输出目录下。
///
/// 不加锁：两个批次的第一个素数相同时会写同一个路径，后写者覆盖先写者。
/// 子区间互不重叠时这种情况不会发生。
#[derive(Debug, Clone)]
pub struct BatchWriter {
    out_dir: PathBuf,
}

impl BatchWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// 以第一个素数命名的文件路径（十进制，无符号）。
    pub fn path_for(&self, first_prime: u64) -> PathBuf {
        self.out_dir.join(format!("{first_prime}{FILE_SUFFIX}"))
    }

    /// 创建（或截断）文件，一次性写入全部素数并刷新。
    ///
    /// # 返回值
    /// * `PathBuf`: 实际写入的文件路径。
    pub fn write(&self, batch: &Batch) -> Result<PathBuf, Error> {
        let first = batch
            .first()
            .ok_or_else(|| Error::MalformedBatch("cannot name an empty batch".into()))?;
        let path = self.path_for(first);

        let mut bytes = Vec::with_capacity(batch.len() * WORD);
        for prime in batch.as_slice() {
            bytes.extend_from_slice(&prime.to_ne_bytes());
        }

        let mut file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        file.write_all(&bytes).map_err(|e| Error::io(&path, e))?;
        file.flush().map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }
}

/// 读回一个批次文件。
///
/// 文件长度必须是 8 字节的整数倍，否则视为损坏。
pub fn read_batch_file(path: impl AsRef<Path>) -> Result<Vec<u64>, Error> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    if bytes.len() % WORD != 0 {
        return Err(Error::MalformedBatch(format!(
            "{} has {} bytes, not a multiple of {WORD}",
            path.display(),
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(WORD)
        .map(|chunk| {
            let mut word = [0u8; WORD];
            word.copy_from_slice(chunk);
            u64::from_ne_bytes(word)
        })
        .collect())
}
