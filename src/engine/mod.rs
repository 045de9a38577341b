//! 核心引擎模块
//! Core engine module
//!
//! 本模块实现了素数采集引擎 (Harvester)。
//! 它负责校验配置、为每个线程派生独立的随机种子、启动固定数量的工作线程、
//! 收集它们写出的批次，并在任何一个线程失败时通知其余线程停止。

use crate::control::StopFlag;
use crate::core::{derive_worker_seed, partition, select_start};
use crate::error::Error;
use crate::producer::{MillerRabinSource, PrimeSource};
use crate::rng::{RandomSource, XorShiftRng};
use crate::types::{BatchRecord, HarvestConfig, HarvestSummary, SubRange};
use crate::writer::BatchWriter;
use flume::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info, warn};

/// 采集引擎特征 (Trait)。
pub trait HarvestEngine {
    /// 运行一次完整的采集：`threads x loops` 个批次文件，或者第一个致命错误。
    fn harvest(&mut self) -> Result<HarvestSummary, Error>;
}

/// 随机来源工厂类型别名。
/// 给定线程编号，返回该线程独占的随机来源。
type RngFactory = dyn Fn(usize) -> Box<dyn RandomSource + Send> + Send + Sync;

/// 工作线程发回主线程的事件。
#[derive(Debug)]
enum WorkerEvent {
    Written(BatchRecord),
    Failed { worker: usize, error: Error },
}

/// 素数采集引擎。
pub struct Harvester {
    config: Arc<HarvestConfig>,
    source: Arc<dyn PrimeSource>,
    /// 已写出的批次数，运行过程中可以从其它线程读取。
    progress: Arc<AtomicU64>,
    rng_factory: Option<Arc<RngFactory>>,
}

impl Harvester {
    /// 使用默认的 Miller-Rabin 素数来源创建引擎。
    pub fn new(config: HarvestConfig) -> Self {
        Self {
            config: Arc::new(config),
            source: Arc::new(MillerRabinSource),
            progress: Arc::new(AtomicU64::new(0)),
            rng_factory: None,
        }
    }

    /// 替换素数来源。
    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: PrimeSource + 'static,
    {
        self.source = Arc::new(source);
        self
    }

    /// 共享一个外部的进度计数器。
    pub fn with_progress(mut self, progress: Arc<AtomicU64>) -> Self {
        self.progress = progress;
        self
    }

    /// 替换每个线程的随机来源，主要用于确定性测试。
    /// 默认情况下每个线程使用由主种子派生的 [`XorShiftRng`]。
    pub fn with_rng_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(usize) -> Box<dyn RandomSource + Send> + Send + Sync + 'static,
    {
        self.rng_factory = Some(Arc::new(factory));
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn progress(&self) -> Arc<AtomicU64> {
        self.progress.clone()
    }

    /// 在启动任何线程之前完成的检查。
    fn preflight(&self) -> Result<(), Error> {
        self.config.validate()?;
        if !self.config.out_dir.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "output directory {} does not exist",
                self.config.out_dir.display()
            )));
        }
        Ok(())
    }

    /// 默认的随机来源工厂：主种子只读一次时钟，然后按线程编号派生。
    fn seeded_factory(&self) -> Arc<RngFactory> {
        let master_seed = self
            .config
            .seed
            .unwrap_or_else(|| XorShiftRng::from_clock().next_u64());
        debug!(master_seed, "seeding workers");
        Arc::new(move |worker| {
            let (x, y) = derive_worker_seed(master_seed, worker);
            Box::new(XorShiftRng::from_words(x, y)) as Box<dyn RandomSource + Send>
        })
    }
}

impl HarvestEngine for Harvester {
    fn harvest(&mut self) -> Result<HarvestSummary, Error> {
        self.preflight()?;

        let config = &self.config;
        info!(
            out_dir = %config.out_dir.display(),
            prime_min = config.prime_min,
            prime_max = config.prime_max,
            threads = config.threads,
            loops = config.loops,
            primes_per_batch = config.primes_per_batch,
            "using configuration"
        );

        // 重置进度计数器
        self.progress.store(0, Ordering::SeqCst);

        let factory = match &self.rng_factory {
            Some(factory) => factory.clone(),
            None => self.seeded_factory(),
        };

        harvest_with(
            self.config.clone(),
            self.source.clone(),
            self.progress.clone(),
            factory,
        )
    }
}

/// 工作线程需要的全部上下文，整体移动进线程。
struct WorkerContext {
    worker: usize,
    config: Arc<HarvestConfig>,
    source: Arc<dyn PrimeSource>,
    stop: Arc<StopFlag>,
    tx: Sender<WorkerEvent>,
}

/// 核心并行采集逻辑。
///
/// 架构：Master-Worker 模式
/// - 主线程：收集批次记录，更新进度；收到错误时发出停止信号。
/// - Worker 线程：在自己的子区间内循环 {选起点 -> 取素数 -> 写文件}。
fn harvest_with(
    config: Arc<HarvestConfig>,
    source: Arc<dyn PrimeSource>,
    progress: Arc<AtomicU64>,
    rng_factory: Arc<RngFactory>,
) -> Result<HarvestSummary, Error> {
    let threads = config.threads;
    // 配置校验已经保证乘积不会溢出；这里再饱和一次，避免未经校验的调用者触发 panic。
    let expected = threads.saturating_mul(config.loops);

    // 初始化并发原语
    let stop = Arc::new(StopFlag::new());

    // 创建通信通道 (Channel)
    // 缓冲区大小设为线程数的 2 倍，主线程稍慢时 worker 也不会立刻阻塞
    let (tx, rx): (Sender<WorkerEvent>, Receiver<WorkerEvent>) =
        flume::bounded(threads.saturating_mul(2).max(1));

    let mut joins = Vec::with_capacity(threads);

    // 启动 Worker 线程，每个线程绑定自己的编号
    for worker in 0..threads {
        let ctx = WorkerContext {
            worker,
            config: config.clone(),
            source: source.clone(),
            stop: stop.clone(),
            tx: tx.clone(),
        };
        // 随机来源在主线程里创建，然后整体移动进 worker，线程之间不共享。
        let rng = rng_factory(worker);

        let spawned = thread::Builder::new()
            .name(format!("harvest-{worker}"))
            .spawn(move || worker_loop(ctx, rng));

        match spawned {
            Ok(join) => joins.push((worker, join)),
            Err(err) => {
                // 已经启动的线程看到停止标志后会在下一轮退出。
                stop.force_stop();
                drop(tx);
                drop(rx);
                if let Err(joined) = join_handles(joins) {
                    // 返回的是创建失败的错误，但已启动线程的 panic 也要留下记录。
                    error!(worker, error = %joined, "worker failed while aborting spawn");
                }
                return Err(Error::Spawn {
                    worker,
                    source: err,
                });
            }
        }
    }

    // 主线程必须丢弃自己的发送端，否则所有 worker 退出后 rx 也收不到 EOF。
    drop(tx);

    // 只预留少量空间：循环次数可能非常大，记录随批次写出逐步增长。
    let mut batches = Vec::with_capacity(expected.min(1024));
    let mut failure = None;

    // 主循环：收集结果，直到所有发送端都被 drop
    for event in rx.iter() {
        match event {
            WorkerEvent::Written(record) => {
                // 更新进度
                progress.fetch_add(1, Ordering::SeqCst);
                batches.push(record);
            }
            WorkerEvent::Failed { worker, error } => {
                error!(worker, %error, "worker failed, stopping remaining workers");
                // 第一个错误生效：通知其余线程在下一轮循环前退出
                stop.force_stop();
                failure = Some(error);
                break;
            }
        }
    }

    // 关闭接收端：仍阻塞在 send 上的 worker 会立刻返回并退出。
    drop(rx);
    let joined = join_handles(joins);

    // worker 报告的错误优先于 join 发现的 panic。
    if let Some(err) = failure {
        return Err(err);
    }
    joined?;

    // 所有线程都正常结束却缺少批次，说明事件在通道中丢失了。
    if batches.len() < expected {
        return Err(Error::ChannelClosed);
    }

    batches.sort_by_key(|b| (b.worker, b.iteration));
    info!(files = batches.len(), "harvest complete");
    Ok(HarvestSummary { batches })
}

/// Worker 线程的主循环。
fn worker_loop(ctx: WorkerContext, mut rng: Box<dyn RandomSource + Send>) {
    let config = &ctx.config;
    // 子区间只在启动时计算一次，之后不再改变。
    let range = partition(config.prime_min, config.prime_max, config.threads, ctx.worker);
    let writer = BatchWriter::new(config.out_dir.clone());

    info!(
        worker = ctx.worker,
        range_min = range.range_min,
        range_max = range.range_max,
        "worker starting"
    );

    for iteration in 0..config.loops {
        // 协作式取消：只在两次循环之间检查，正在进行的写入总会完成。
        if ctx.stop.should_stop() {
            debug!(worker = ctx.worker, iteration, "stop requested, leaving early");
            break;
        }

        let event = match run_iteration(&ctx, &writer, range, &mut *rng, iteration) {
            Ok(record) => {
                info!(
                    worker = ctx.worker,
                    iteration = iteration + 1,
                    loops = config.loops,
                    first_prime = record.first_prime,
                    "completed loop"
                );
                WorkerEvent::Written(record)
            }
            Err(error) => WorkerEvent::Failed {
                worker: ctx.worker,
                error,
            },
        };

        let failed = matches!(event, WorkerEvent::Failed { .. });
        if failed {
            // 先设置停止标志，其它 worker 不必等主线程收到错误才停下。
            ctx.stop.force_stop();
        }
        if ctx.tx.send(event).is_err() || failed {
            // 接收端已关闭，或者本线程已经失败。
            break;
        }
    }
}

/// 单次循环：选起点、生成批次、校验、写文件。
/// 批次在函数返回时释放。
fn run_iteration<R>(
    ctx: &WorkerContext,
    writer: &BatchWriter,
    range: SubRange,
    rng: &mut R,
    iteration: usize,
) -> Result<BatchRecord, Error>
where
    R: RandomSource + ?Sized,
{
    let config = &ctx.config;

    // 1. 在子区间内部选一个随机起点
    let start = select_start(range, rng, config.max_start_attempts)?;
    if start.fallback {
        warn!(
            worker = ctx.worker,
            attempts = start.attempts,
            start = start.value,
            "start point retry ceiling reached, used fallback draw"
        );
    } else {
        debug!(worker = ctx.worker, start = start.value, attempts = start.attempts, "start point selected");
    }

    // 2. 向素数来源请求批次，并检查它是否遵守约定
    let count = config.primes_per_batch;
    let batch = ctx.source.generate(count, start.value)?;
    batch.verify(count, start.value)?;

    let (first_prime, last_prime) = batch
        .first()
        .zip(batch.last())
        .ok_or_else(|| Error::MalformedBatch("batch is empty".into()))?;

    // 3. 以第一个素数命名写出文件
    let path = writer.write(&batch)?;

    Ok(BatchRecord {
        worker: ctx.worker,
        iteration,
        start: start.value,
        first_prime,
        last_prime,
        path,
        fallback: start.fallback,
    })
}

/// 等待所有线程结束 (Join)。
/// 所有线程都会被 join；返回第一个 panic 的线程对应的错误。
fn join_handles(joins: Vec<(usize, thread::JoinHandle<()>)>) -> Result<(), Error> {
    let mut result = Ok(());
    for (worker, handle) in joins {
        // 即使前面已经有线程 panic，也继续 join 剩下的线程，不留下游离线程。
        match handle.join() {
            Ok(()) => info!(worker, "worker completed"),
            Err(_) => {
                error!(worker, "worker panicked");
                if result.is_ok() {
                    result = Err(Error::WorkerPanicked { worker });
                }
            }
        }
    }
    result
}
