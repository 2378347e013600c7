//! Threshold state machine behaviour driven through real timers.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use upstream_health::upstream::HealthFlag;
use upstream_health::HealthChecker;

mod common;
use common::{checker_with_events, cluster_with_hosts, first_host, health_config, CheckEvent, ScriptedProbe, Step};

const INTERVAL: Duration = Duration::from_secs(1);

fn event(changed: bool, flagged: bool) -> CheckEvent {
    CheckEvent { changed, flagged }
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_then_recovered() {
    use Step::*;
    let cluster = cluster_with_hosts("web", 1);
    let host = first_host(&cluster);
    let probe = ScriptedProbe::new(&[Pass, Fail, Fail, Fail, Pass, Pass]);
    let (checker, mut events) = checker_with_events(health_config(2, 3, INTERVAL), cluster, probe);

    checker.start().unwrap();
    // The first success confirms the host; only then is it counted.
    let expected = [
        (event(false, false), 1),
        (event(false, false), 1),
        (event(false, false), 1),
        (event(true, true), 0),
        (event(false, true), 0),
        (event(true, false), 1),
    ];

    for (want, healthy) in expected {
        let got = events.recv().await.unwrap();
        assert_eq!(got, want);
        assert_eq!(checker.local_process_healthy(), healthy);
        assert_eq!(checker.stats().healthy, healthy);

        let counters = checker.session_counters(host.id()).unwrap();
        assert!(counters.num_healthy == 0 || counters.num_unhealthy == 0);
    }

    let stats = checker.stats();
    assert_eq!(stats.attempt, 6);
    assert_eq!(stats.success, 3);
    assert_eq!(stats.failure, 3);
    assert_eq!(stats.network_failure, 3);
    assert_eq!(stats.passive_failure, 0);
    assert!(!host.contain_health_flag(HealthFlag::FailedActiveHc));

    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_successes_on_healthy_host_never_change_state() {
    let cluster = cluster_with_hosts("web", 1);
    let host = first_host(&cluster);
    let probe = ScriptedProbe::new(&[Step::Pass; 6]);
    let (checker, mut events) = checker_with_events(health_config(2, 3, INTERVAL), cluster, probe);

    checker.start().unwrap();
    for _ in 0..6 {
        assert_eq!(events.recv().await.unwrap(), event(false, false));
        assert_eq!(checker.local_process_healthy(), 1);
        assert_eq!(checker.session_counters(host.id()).unwrap().num_healthy, 0);
    }
    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_healthy_count_matches_unflagged_hosts() {
    let cluster = cluster_with_hosts("web", 3);
    let probe = ScriptedProbe::new(&[Step::Pass; 6]);
    let (checker, mut events) = checker_with_events(health_config(2, 3, INTERVAL), cluster.clone(), probe);

    checker.start().unwrap();
    // First round of probes already confirmed every host.
    assert_eq!(checker.local_process_healthy(), 3);
    for _ in 0..6 {
        events.recv().await.unwrap();
    }

    let unflagged = cluster.priority_set().all_hosts().filter(|h| h.is_healthy()).count() as i64;
    assert_eq!(unflagged, 3);
    assert_eq!(checker.local_process_healthy(), unflagged);
    assert_eq!(checker.stats().healthy, unflagged);

    checker.stop();
    assert_eq!(checker.local_process_healthy(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reserved_host_failing_is_not_counted() {
    use Step::*;
    let cluster = cluster_with_hosts("web", 1);
    let probe = ScriptedProbe::new(&[Fail, Fail, Fail, Pass, Pass]);
    let (checker, mut events) = checker_with_events(health_config(2, 3, INTERVAL), cluster, probe);

    checker.start().unwrap();
    let mut healthy = Vec::new();
    for _ in 0..5 {
        events.recv().await.unwrap();
        healthy.push(checker.local_process_healthy());
    }
    assert_eq!(healthy, vec![-1, -1, 0, 0, 1]);
    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_flagged_host_recovers_once() {
    use Step::*;
    let cluster = cluster_with_hosts("web", 1);
    let host = first_host(&cluster);
    host.set_health_flag(HealthFlag::FailedActiveHc);

    let probe = ScriptedProbe::new(&[Pass, Pass, Pass, Pass]);
    let (checker, mut events) = checker_with_events(health_config(2, 3, INTERVAL), cluster, probe);

    checker.start().unwrap();
    // Flagged hosts are not reserved at creation.
    assert_eq!(checker.local_process_healthy(), 0);

    assert_eq!(events.recv().await.unwrap(), event(false, true));
    assert_eq!(events.recv().await.unwrap(), event(true, false));
    assert_eq!(checker.local_process_healthy(), 1);

    assert_eq!(events.recv().await.unwrap(), event(false, false));
    assert_eq!(events.recv().await.unwrap(), event(false, false));
    assert_eq!(checker.local_process_healthy(), 1);

    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_failure_streak_broken_by_success() {
    use Step::*;
    let cluster = cluster_with_hosts("web", 1);
    let host = first_host(&cluster);
    let probe = ScriptedProbe::new(&[Fail, Fail, Pass, Fail, Fail, Fail]);
    let (checker, mut events) = checker_with_events(health_config(2, 3, INTERVAL), cluster, probe);

    checker.start().unwrap();
    let changed: Vec<bool> = {
        let mut out = Vec::new();
        for _ in 0..6 {
            out.push(events.recv().await.unwrap().changed);
        }
        out
    };

    assert_eq!(changed, vec![false, false, false, false, false, true]);
    assert!(host.contain_health_flag(HealthFlag::FailedActiveHc));
    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_timeout_is_network_failure_and_cadence_continues() {
    use Step::*;
    let cluster = cluster_with_hosts("web", 1);
    let probe = ScriptedProbe::new(&[Hang, Pass]);
    let (checker, mut events) = checker_with_events(health_config(2, 1, INTERVAL), cluster, probe.clone());

    let started = Instant::now();
    checker.start().unwrap();

    // Deadline is one jittered interval.
    assert_eq!(events.recv().await.unwrap(), event(true, true));
    assert_eq!(started.elapsed(), INTERVAL);
    let stats = checker.stats();
    assert_eq!((stats.failure, stats.network_failure), (1, 1));

    // The answer to the timed-out attempt arrives late and is ignored.
    for reporter in probe.take_held() {
        reporter.success();
    }
    assert_eq!(checker.stats().success, 0);

    assert_eq!(events.recv().await.unwrap(), event(false, true));
    assert_eq!(started.elapsed(), INTERVAL * 2);
    assert_eq!(checker.stats().attempt, 2);

    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_jitter_is_redrawn_per_attempt() {
    let cluster = cluster_with_hosts("web", 1);
    let probe = ScriptedProbe::new(&[Step::Pass; 20]);
    let mut config = health_config(2, 3, INTERVAL);
    config.interval_jitter_ms = 500;
    let (checker, mut events) = checker_with_events(config, cluster, probe);

    checker.start().unwrap();
    events.recv().await.unwrap();

    let mut last = Instant::now();
    for _ in 0..19 {
        events.recv().await.unwrap();
        let gap = last.elapsed();
        assert!(gap >= INTERVAL, "gap {:?} below interval", gap);
        assert!(gap < INTERVAL + Duration::from_millis(500), "gap {:?} beyond jitter", gap);
        last = Instant::now();
    }
    checker.stop();
}

#[tokio::test(start_paused = true)]
async fn test_callbacks_may_read_checker_totals() {
    use Step::*;
    let cluster = cluster_with_hosts("web", 2);
    let checker = Arc::new(
        HealthChecker::new("web", health_config(1, 1, INTERVAL))
            .unwrap()
            .with_cluster(cluster)
            .with_probe(ScriptedProbe::new(&[Pass, Fail])),
    );

    let (tx, mut totals) = mpsc::unbounded_channel();
    let weak = Arc::downgrade(&checker);
    checker.add_host_check_complete_cb(move |_, _| {
        if let Some(checker) = weak.upgrade() {
            let _ = tx.send((checker.local_process_healthy(), checker.stats().attempt));
        }
    });
    checker.start().unwrap();

    // Confirmed host counted; failed host only releases its reservation.
    assert_eq!(totals.recv().await.unwrap(), (0, 1));
    assert_eq!(totals.recv().await.unwrap(), (1, 2));
    checker.stop();
}
