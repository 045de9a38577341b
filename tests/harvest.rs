use primeharvest::core::partition;
use primeharvest::{
    read_batch_file, HarvestConfigBuilder, HarvestEngine, Harvester, RandomSource,
};
use rstest::rstest;
use std::fs;

struct Constant(u64);

impl RandomSource for Constant {
    fn next_u64(&mut self) -> u64 {
        self.0
    }
}

#[test]
fn single_worker_single_loop_writes_one_named_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = HarvestConfigBuilder::default()
        .out_dir(dir.path())
        .prime_min(100)
        .prime_max(200)
        .threads(1)
        .loops(1)
        .primes_per_batch(5)
        .build_validated()
        .expect("config");

    Harvester::new(config)
        .with_rng_factory(|_| Box::new(Constant(150)))
        .harvest()
        .expect("harvest");

    let entries: Vec<_> = fs::read_dir(dir.path())
        .expect("read_dir")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(entries, vec![dir.path().join("151.primes.u64.bin")]);
    assert_eq!(
        read_batch_file(&entries[0]).expect("read back"),
        vec![151, 157, 163, 167, 173]
    );
}

#[rstest]
#[case(2, 3, 16)]
#[case(4, 2, 32)]
fn full_run_produces_threads_times_loops_files(
    #[case] threads: usize,
    #[case] loops: usize,
    #[case] primes: usize,
) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = HarvestConfigBuilder::default()
        .out_dir(dir.path())
        .threads(threads)
        .loops(loops)
        .primes_per_batch(primes)
        .seed(Some(threads as u64 * 1_000 + loops as u64))
        .build_validated()
        .expect("config");

    let mut harvester = Harvester::new(config);
    let summary = harvester.harvest().expect("harvest");

    assert_eq!(summary.batches_written(), threads * loops);
    assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), threads * loops);
    for record in &summary.batches {
        let values = read_batch_file(&record.path).expect("read back");
        assert_eq!(values.len(), primes);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }
    assert_eq!(
        harvester.progress().load(std::sync::atomic::Ordering::SeqCst),
        (threads * loops) as u64
    );
}

#[test]
fn four_way_partition_covers_range_in_order() {
    let (min, max) = (u32::MAX as u64, u64::MAX);
    let ranges: Vec<_> = (0..4).map(|i| partition(min, max, 4, i)).collect();
    let span = (max - min) / 4;

    assert_eq!(ranges[0].range_min, min);
    for (i, r) in ranges.iter().enumerate() {
        assert_eq!(r.range_min, min + i as u64 * span);
        assert_eq!(r.range_max, r.range_min + span);
    }
    assert!(max - ranges[3].range_max < 4);
}

#[test]
fn degenerate_ranges_are_rejected_up_front() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (min, max, threads) in [(500, 500, 1), (500, 400, 1), (500, 503, 4)] {
        let result = HarvestConfigBuilder::default()
            .out_dir(dir.path())
            .prime_min(min)
            .prime_max(max)
            .threads(threads)
            .build_validated();
        assert!(result.is_err(), "({min}, {max}, {threads}) should be rejected");
    }
    assert_eq!(fs::read_dir(dir.path()).expect("read_dir").count(), 0);
}
