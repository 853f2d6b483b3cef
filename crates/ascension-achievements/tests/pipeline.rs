//! End-to-end pipeline tests against a scripted fetcher (no network)

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc;
use std::time::Duration;

use ascension_achievements::{
    Config, FetchOutcome, Fetcher, ResultRecord, merge_stores, read_records, run_with_fetcher,
};
use ascension_core::{ProgressContext, RetryPolicy};
use tempfile::TempDir;

/// Plays back per-ID outcome lists; an ID with nothing left is `NotFound`.
struct ScriptedFetcher {
    script: Mutex<HashMap<u32, Vec<FetchOutcome>>>,
    calls: Mutex<HashMap<u32, usize>>,
}

impl ScriptedFetcher {
    fn new(script: impl IntoIterator<Item = (u32, Vec<FetchOutcome>)>) -> Self {
        let script = script
            .into_iter()
            .map(|(id, mut outcomes)| {
                outcomes.reverse();
                (id, outcomes)
            })
            .collect();
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn empty() -> Self {
        Self::new(Vec::<(u32, Vec<FetchOutcome>)>::new())
    }

    fn calls(&self, id: u32) -> usize {
        self.calls.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, id: u32) -> FetchOutcome {
        *self.calls.lock().unwrap().entry(id).or_default() += 1;
        self.script
            .lock()
            .unwrap()
            .get_mut(&id)
            .and_then(|outcomes| outcomes.pop())
            .unwrap_or(FetchOutcome::NotFound)
    }
}

fn found(name: &str) -> FetchOutcome {
    FetchOutcome::Found(name.to_string())
}

fn test_config(output: &Path, start_id: u32, end_id: u32, workers: usize) -> Config {
    Config {
        start_id,
        end_id,
        workers,
        output: output.to_path_buf(),
        flush_interval: Duration::from_millis(10),
        maintenance_backoff: Duration::ZERO,
        retry: RetryPolicy {
            max_retries: 2,
            fixed_delay: Some(Duration::ZERO),
        },
        ..Default::default()
    }
}

fn assert_strictly_ascending(records: &[ResultRecord]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].id < pair[1].id,
            "IDs out of order: {} then {}",
            pair[0].id,
            pair[1].id
        );
    }
}

#[test]
fn alpha_missing_gamma_scenario() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    let fetcher = ScriptedFetcher::new([
        (1, vec![found("Alpha")]),
        (2, vec![FetchOutcome::NotFound]),
        (3, vec![FetchOutcome::Maintenance, found("Gamma")]),
    ]);

    let summary = run_with_fetcher(
        &test_config(&output, 1, 3, 4),
        &fetcher,
        &ProgressContext::hidden(),
    )
    .unwrap();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "ID,Name\n1,Alpha\n3,Gamma\n"
    );
    assert_eq!(summary.total_ids, 3);
    assert_eq!(summary.found, 2);
    assert_eq!(summary.not_found, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.maintenance_retries, 1);
    assert_eq!(summary.rows_written, 2);
    assert!(!summary.aborted);
    assert_eq!(fetcher.calls(3), 2);
}

#[test]
fn row_exists_iff_last_attempt_found() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");

    // Mix of every outcome, including retries that end in success or failure
    let script: Vec<(u32, Vec<FetchOutcome>)> = (1..=60)
        .map(|id| {
            let outcomes = match id % 6 {
                0 => vec![found(&format!("Name {id}"))],
                1 => vec![FetchOutcome::NotFound],
                2 => vec![FetchOutcome::Maintenance, FetchOutcome::Maintenance, found(&format!("Late {id}"))],
                3 => vec![FetchOutcome::TransientError("timeout".into()), found(&format!("Retry {id}"))],
                4 => vec![FetchOutcome::TransientError("a".into()); 3],
                _ => vec![FetchOutcome::FatalError("HTTP 500".into())],
            };
            (id, outcomes)
        })
        .collect();
    let fetcher = ScriptedFetcher::new(script);

    let summary = run_with_fetcher(
        &test_config(&output, 1, 60, 8),
        &fetcher,
        &ProgressContext::hidden(),
    )
    .unwrap();

    let records = read_records(&output).unwrap();
    assert_strictly_ascending(&records);
    let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
    let expected: Vec<u32> = (1..=60).filter(|id| matches!(id % 6, 0 | 2 | 3)).collect();
    assert_eq!(ids, expected);

    assert_eq!(summary.found, 30);
    assert_eq!(summary.not_found, 10);
    // Exhausted transient (10) + fatal (10)
    assert_eq!(summary.failed, 20);
    assert_eq!(summary.resolved(), 60);
    assert_eq!(summary.maintenance_retries, 20);
    // id%6==3 retried once, id%6==4 retried twice before giving up
    assert_eq!(summary.transient_retries, 30);
    assert_eq!(fetcher.calls(4), 3);
}

#[test]
fn maintenance_then_found_appears_once() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    let script: Vec<(u32, Vec<FetchOutcome>)> = (1..=200)
        .map(|id| (id, vec![FetchOutcome::Maintenance, found(&format!("A{id}"))]))
        .collect();
    let fetcher = ScriptedFetcher::new(script);

    let summary = run_with_fetcher(
        &test_config(&output, 1, 200, 16),
        &fetcher,
        &ProgressContext::hidden(),
    )
    .unwrap();

    let records = read_records(&output).unwrap();
    assert_eq!(records.len(), 200);
    assert_strictly_ascending(&records);
    assert_eq!(summary.found, 200);
    assert_eq!(summary.maintenance_retries, 200);
}

#[test]
fn disjoint_runs_merge_to_union_run() {
    let dir = TempDir::new().unwrap();
    let script = || {
        (1..=40).map(|id| {
            let outcomes = if id % 3 == 0 {
                vec![FetchOutcome::NotFound]
            } else {
                vec![FetchOutcome::Maintenance, found(&format!("Ach {id}"))]
            };
            (id, outcomes)
        })
    };

    let low = dir.path().join("low.csv");
    let high = dir.path().join("high.csv");
    let union = dir.path().join("union.csv");
    let merged = dir.path().join("merged.csv");
    let progress = ProgressContext::hidden();

    run_with_fetcher(&test_config(&low, 1, 20, 3), &ScriptedFetcher::new(script()), &progress)
        .unwrap();
    run_with_fetcher(&test_config(&high, 21, 40, 3), &ScriptedFetcher::new(script()), &progress)
        .unwrap();
    run_with_fetcher(&test_config(&union, 1, 40, 5), &ScriptedFetcher::new(script()), &progress)
        .unwrap();
    merge_stores(&[high, low], &merged).unwrap();

    assert_eq!(
        std::fs::read_to_string(&merged).unwrap(),
        std::fs::read_to_string(&union).unwrap()
    );
}

#[test]
fn resume_skips_stored_ids_and_keeps_rows() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    std::fs::write(&output, "ID,Name\n2,Beta\n").unwrap();

    let fetcher = ScriptedFetcher::new([(1, vec![found("Alpha")]), (3, vec![found("Gamma")])]);
    let config = Config {
        resume: true,
        ..test_config(&output, 1, 3, 2)
    };
    let summary = run_with_fetcher(&config, &fetcher, &ProgressContext::hidden()).unwrap();

    assert_eq!(fetcher.calls(2), 0);
    assert_eq!(summary.skipped_ids, 1);
    assert_eq!(summary.total_ids, 2);
    assert_eq!(summary.rows_written, 3);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "ID,Name\n1,Alpha\n2,Beta\n3,Gamma\n"
    );
}

#[test]
fn resume_refetches_row_cut_mid_append() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    std::fs::write(&output, "ID,Name\n1,Full name 1\n2,Full na").unwrap();

    let fetcher = ScriptedFetcher::new([
        (1, vec![found("Full name 1")]),
        (2, vec![found("Full name 2")]),
        (3, vec![found("Full name 3")]),
    ]);
    let config = Config {
        resume: true,
        ..test_config(&output, 1, 3, 2)
    };
    let summary = run_with_fetcher(&config, &fetcher, &ProgressContext::hidden()).unwrap();

    assert_eq!(fetcher.calls(1), 0);
    assert_eq!(fetcher.calls(2), 1);
    assert_eq!(summary.skipped_ids, 1);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "ID,Name\n1,Full name 1\n2,Full name 2\n3,Full name 3\n"
    );
}

#[test]
fn resume_survives_cut_id_only_row() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    std::fs::write(&output, "ID,Name\n1,Alpha\n2").unwrap();

    let fetcher = ScriptedFetcher::new([(2, vec![found("Beta")])]);
    let config = Config {
        resume: true,
        ..test_config(&output, 1, 2, 1)
    };
    run_with_fetcher(&config, &fetcher, &ProgressContext::hidden()).unwrap();

    assert_eq!(fetcher.calls(2), 1);
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "ID,Name\n1,Alpha\n2,Beta\n"
    );
}

#[test]
fn fresh_run_truncates_old_store() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    std::fs::write(&output, "ID,Name\n99,Stale\n").unwrap();

    let fetcher = ScriptedFetcher::new([(1, vec![found("Alpha")])]);
    run_with_fetcher(&test_config(&output, 1, 1, 1), &fetcher, &ProgressContext::hidden())
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "ID,Name\n1,Alpha\n"
    );
}

/// Finds every ID immediately except `hold`, which blocks until released.
struct HoldingFetcher {
    hold: u32,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Fetcher for HoldingFetcher {
    fn fetch(&self, id: u32) -> FetchOutcome {
        if id == self.hold {
            let _ = self.release.lock().unwrap().recv();
        }
        FetchOutcome::Found(format!("Name {id}"))
    }
}

#[test]
fn flushed_rows_are_durable_before_completion() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("achievements.csv");
    let (tx, rx) = mpsc::channel();
    let fetcher = HoldingFetcher {
        hold: 1,
        release: Mutex::new(rx),
    };
    let config = test_config(&output, 1, 10, 2);

    std::thread::scope(|s| {
        let run = s.spawn(|| run_with_fetcher(&config, &fetcher, &ProgressContext::hidden()));

        // Wait until every ID but the held one has been flushed
        let mut on_disk = Vec::new();
        for _ in 0..500 {
            on_disk = read_records(&output).unwrap_or_default();
            if on_disk.len() == 9 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        // What a crash now would leave behind: complete rows, header intact, ID 1 absent
        assert_eq!(on_disk.len(), 9);
        assert!(on_disk.iter().all(|r| r.id != 1 && r.name == format!("Name {}", r.id)));
        assert!(std::fs::read_to_string(&output).unwrap().starts_with("ID,Name\n"));

        tx.send(()).unwrap();
        let summary = run.join().unwrap().unwrap();
        assert_eq!(summary.rows_written, 10);
    });

    let records = read_records(&output).unwrap();
    assert_eq!(records.len(), 10);
    assert_strictly_ascending(&records);
}

#[test]
fn invalid_range_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fetcher = ScriptedFetcher::empty();
    let config = test_config(&dir.path().join("x.csv"), 9, 3, 2);
    let err = run_with_fetcher(&config, &fetcher, &ProgressContext::hidden()).unwrap_err();
    assert!(err.to_string().contains("Invalid ID range"));
}

#[test]
fn unwritable_store_is_fatal() {
    let dir = TempDir::new().unwrap();
    // A directory where the file should be
    let output = dir.path().join("taken");
    std::fs::create_dir(&output).unwrap();
    let fetcher = ScriptedFetcher::empty();
    let result = run_with_fetcher(
        &test_config(&output, 1, 2, 1),
        &fetcher,
        &ProgressContext::hidden(),
    );
    assert!(result.is_err());
    assert_eq!(fetcher.calls(1), 0);
}
