//! End-to-end scheduler behavior against a real roadmap file and scripted
//! handlers, notifier, committer and clock.

use std::fs;
use std::time::Duration;

use autopilot::core::mode::COOLING_PERIOD;
use autopilot::core::types::{Category, HandlerResult, Mode};
use autopilot::io::roadmap_store::RoadmapStore;
use autopilot::io::session::load_session;
use autopilot::scheduler::{Scheduler, StopSignal, Tick};
use autopilot::test_support::{
    ManualClock, RecordingCommitter, RecordingNotifier, ScriptedHandlers, TestProject, at,
};

type TestScheduler =
    Scheduler<ManualClock, ScriptedHandlers, RecordingNotifier, RecordingCommitter>;

fn scheduler(
    project: &TestProject,
    handlers: ScriptedHandlers,
    committer: RecordingCommitter,
) -> TestScheduler {
    Scheduler::new(
        &project.config,
        &project.paths,
        handlers,
        RecordingNotifier::default(),
        committer,
        ManualClock::new(at(1_000)),
        StopSignal::new(),
    )
}

const THREE_ITEMS: &str = "# Roadmap

<!-- phase id=\"core\" name=\"Core\" -->
- [ ] Define schema for audit events
- [ ] Register a status command
- [ ] Create src/engine.rs skeleton
<!-- /phase -->
";

#[test]
fn dispatches_highest_score_first_and_marks_done() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());

    let tick = sched.tick();
    assert_eq!(
        tick,
        Tick::Dispatched {
            text: "Create src/engine.rs skeleton".to_string(),
            category: Some(Category::Scaffold),
            success: true,
        }
    );
    assert_eq!(tick.mode(), Mode::Active);
    assert!(
        project
            .read_roadmap()
            .expect("roadmap")
            .contains("- [x] Create src/engine.rs skeleton\n")
    );

    let session = load_session(&project.paths.session_path).expect("session");
    assert_eq!(session.completed_count, 1);
    assert_eq!(session.total_duration_ms, 10);
    assert_eq!(session.completed_texts, vec!["Create src/engine.rs skeleton".to_string()]);

    let log = project.read_activity_log().expect("log");
    assert!(log.contains("scan: 3 actionable"));
    assert!(log.contains("done [scaffold] Create src/engine.rs skeleton (10 ms)"));
    assert_eq!(
        sched.notifier().messages(),
        vec!["done: Create src/engine.rs skeleton".to_string()]
    );
}

#[test]
fn third_success_commits_the_batch_once() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());

    for _ in 0..3 {
        assert!(matches!(sched.tick(), Tick::Dispatched { success: true, .. }));
    }
    let commits = sched.committer().commits();
    assert_eq!(commits.len(), 1);
    assert!(commits[0].starts_with("autopilot: complete 3 roadmap items"));
    assert!(commits[0].contains("- Register a status command\n"));
    assert_eq!(sched.state().commit.pending(), 0);

    assert!(matches!(sched.tick(), Tick::Idle { .. }));
    assert_eq!(sched.committer().stages(), 1);
    assert!(project.read_activity_log().expect("log").contains("commit: autopilot: complete 3"));
}

#[test]
fn clean_tree_and_disabled_commits_never_commit() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::default());
    for _ in 0..3 {
        sched.tick();
    }
    assert_eq!(sched.committer().stages(), 1);
    assert!(sched.committer().commits().is_empty());

    let mut project = TestProject::new(THREE_ITEMS).expect("project");
    project.config.scheduler.auto_commit = false;
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());
    for _ in 0..3 {
        sched.tick();
    }
    assert_eq!(sched.committer().stages(), 0);
    assert!(sched.committer().commits().is_empty());
}

#[test]
fn commit_errors_do_not_stop_the_loop() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::failing());
    for _ in 0..3 {
        assert!(matches!(sched.tick(), Tick::Dispatched { success: true, .. }));
    }
    assert_eq!(sched.stats().completed_count, 3);
    assert!(project.read_activity_log().expect("log").contains("commit failed: staging failed"));
}

#[test]
fn unhandled_item_fails_once_and_is_not_retried() {
    let project = TestProject::new(
        "<!-- phase id=\"misc\" name=\"Misc\" -->\n- [ ] Polish the landing page copy\n<!-- /phase -->\n",
    )
    .expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());

    let tick = sched.tick();
    assert_eq!(
        tick,
        Tick::Dispatched {
            text: "Polish the landing page copy".to_string(),
            category: None,
            success: false,
        }
    );
    assert!(sched.handlers().calls().is_empty());
    assert!(sched.state().failed.contains("Polish the landing page copy"));
    assert_eq!(sched.stats().failed_count, 1);
    assert_eq!(sched.stats().consecutive_failures, 1);
    assert!(
        project
            .read_activity_log()
            .expect("log")
            .contains("failed [unhandled] Polish the landing page copy (exit 1): no handler matches item: Polish the landing page copy")
    );

    assert!(matches!(sched.tick(), Tick::Idle { .. }));
    assert!(
        project
            .read_roadmap()
            .expect("roadmap")
            .contains("- [ ] Polish the landing page copy")
    );
}

#[test]
fn breaker_cools_then_resumes_dispatch() {
    let project = TestProject::new(
        "<!-- phase id=\"misc\" name=\"Misc\" -->
- [ ] Polish the landing page copy
- [ ] Refresh the marketing screenshots
- [ ] Rename the mascot in the readme
- [ ] Tidy the changelog headings
<!-- /phase -->
",
    )
    .expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());

    for _ in 0..3 {
        assert!(matches!(sched.tick(), Tick::Dispatched { success: false, .. }));
    }
    assert_eq!(sched.stats().consecutive_failures, 3);

    let before = sched.stats().failed_count;
    assert_eq!(sched.tick(), Tick::Cooling);
    assert_eq!(sched.stats().failed_count, before);
    assert_eq!(sched.stats().consecutive_failures, 0);
    let session = load_session(&project.paths.session_path).expect("session");
    assert_eq!(session.consecutive_failures, 0);

    assert_eq!(
        sched.tick(),
        Tick::Dispatched {
            text: "Tidy the changelog headings".to_string(),
            category: None,
            success: false,
        }
    );
    assert!(
        sched
            .notifier()
            .messages()
            .iter()
            .any(|m| m.starts_with("autopilot cooling down after 3"))
    );
}

#[test]
fn cooling_waits_the_fixed_period() {
    let mut project = TestProject::new(
        "<!-- phase id=\"misc\" name=\"Misc\" -->\n- [ ] Polish the landing page copy\n<!-- /phase -->\n",
    )
    .expect("project");
    project.config.scheduler.max_consecutive_failures = 1;
    let mut sched = Scheduler::new(
        &project.config,
        &project.paths,
        ScriptedHandlers::new(),
        RecordingNotifier::default(),
        RecordingCommitter::dirty(),
        ManualClock::new(at(0)),
        StopSignal::new(),
    );

    assert!(matches!(sched.tick(), Tick::Dispatched { success: false, .. }));
    assert_eq!(sched.tick(), Tick::Cooling);
    assert_eq!(sched.clock().slept(), COOLING_PERIOD);
    assert_eq!(sched.delay_after(&Tick::Cooling), Duration::ZERO);

    let log = project.read_activity_log().expect("log");
    assert!(log.contains(&format!("pausing {}s", COOLING_PERIOD.as_secs())));
    assert!(log.contains("[1970-01-01T00:05:00.000Z] cooling finished, failure counter reset"));

    // The only item already failed this session, so nothing is left to do.
    assert!(matches!(sched.tick(), Tick::Idle { .. }));
}

#[test]
fn vague_item_is_subdivided_instead_of_dispatched() {
    let project = TestProject::new(
        "<!-- phase id=\"qa\" name=\"QA\" -->\n- [ ] Add tests etc\n<!-- /phase -->\n",
    )
    .expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());

    assert_eq!(
        sched.tick(),
        Tick::Subdivided {
            text: "Add tests etc".to_string(),
            added: 3,
        }
    );
    assert!(sched.handlers().calls().is_empty());
    assert_eq!(sched.stats().skipped_count, 1);
    assert_eq!(
        project.read_roadmap().expect("roadmap"),
        "<!-- phase id=\"qa\" name=\"QA\" -->
- [x] Add tests etc
- [ ] Test roadmap parsing of phase blocks
- [ ] Test priority ordering of actionable items
- [ ] Verify idle heartbeat cadence
<!-- /phase -->
"
    );

    assert!(matches!(
        sched.tick(),
        Tick::Dispatched {
            category: Some(Category::Shell),
            success: true,
            ..
        }
    ));
}

#[test]
fn vague_item_without_expansion_is_dispatched() {
    let roadmap =
        "<!-- phase id=\"ops\" name=\"Ops\" -->\n- [ ] Register channel ops-alerts\n<!-- /phase -->\n";
    let project = TestProject::new(roadmap).expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());

    assert_eq!(
        sched.tick(),
        Tick::Dispatched {
            text: "Register channel ops-alerts".to_string(),
            category: Some(Category::Channel),
            success: true,
        }
    );
    assert_eq!(
        sched.handlers().calls(),
        vec![(Category::Channel, "Register channel ops-alerts".to_string())]
    );
    assert_eq!(sched.stats().skipped_count, 0);
    assert_eq!(sched.stats().completed_count, 1);
    assert_eq!(
        project.read_roadmap().expect("roadmap"),
        "<!-- phase id=\"ops\" name=\"Ops\" -->\n- [x] Register channel ops-alerts\n<!-- /phase -->\n"
    );
}

#[test]
fn future_phases_are_skipped_unless_included() {
    let roadmap = "<!-- phase id=\"later\" name=\"Later\" future=\"true\" -->
- [ ] Create src/later.rs skeleton
- [ ] Create src/now.rs skeleton <!-- now -->
<!-- /phase -->
";
    let project = TestProject::new(roadmap).expect("project");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());
    assert!(matches!(
        sched.tick(),
        Tick::Dispatched { ref text, .. } if text == "Create src/now.rs skeleton"
    ));
    assert!(matches!(sched.tick(), Tick::Idle { .. }));

    let mut project = TestProject::new(roadmap).expect("project");
    project.config.scheduler.skip_future_phases = false;
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());
    sched.tick();
    assert!(matches!(
        sched.tick(),
        Tick::Dispatched { ref text, .. } if text == "Create src/now.rs skeleton"
    ));
}

#[test]
fn scripted_handler_failure_feeds_the_failed_set() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    let handlers = ScriptedHandlers::new()
        .with_result("Create src/engine.rs skeleton", HandlerResult::failed("disk full", 2));
    let mut sched = scheduler(&project, handlers, RecordingCommitter::dirty());

    assert!(matches!(sched.tick(), Tick::Dispatched { success: false, .. }));
    assert!(matches!(
        sched.tick(),
        Tick::Dispatched { ref text, success: true, .. } if text == "Register a status command"
    ));
    assert_eq!(sched.stats().consecutive_failures, 0);
    assert_eq!(sched.stats().failed_count, 1);
    assert_eq!(
        sched.handlers().calls(),
        vec![
            (Category::Scaffold, "Create src/engine.rs skeleton".to_string()),
            (Category::Command, "Register a status command".to_string()),
        ]
    );
}

#[test]
fn idle_heartbeat_fires_at_most_once_per_interval() {
    let project = TestProject::new("# Nothing to do\n").expect("project");
    let stop = StopSignal::new();
    let clock = ManualClock::new(at(0)).stop_at(at(1_800), stop.clone());
    let mut sched = Scheduler::new(
        &project.config,
        &project.paths,
        ScriptedHandlers::new(),
        RecordingNotifier::default(),
        RecordingCommitter::dirty(),
        clock,
        stop,
    );

    let ticks = sched.run();
    assert_eq!(ticks, 30);
    assert_eq!(sched.notifier().count_starting_with("heartbeat"), 3);
    assert_eq!(sched.notifier().count_starting_with("autopilot started"), 1);
    let log = project.read_activity_log().expect("log");
    assert!(log.contains("[1970-01-01T00:10:00.000Z] heartbeat: idle"));
    assert!(log.ends_with("stopped\n"));
}

#[test]
fn day_rollover_emits_one_summary() {
    let project = TestProject::new("# Nothing to do\n").expect("project");
    let mut sched = Scheduler::new(
        &project.config,
        &project.paths,
        ScriptedHandlers::new(),
        RecordingNotifier::default(),
        RecordingCommitter::dirty(),
        ManualClock::new(at(86_400 - 90)),
        StopSignal::new(),
    );

    assert_eq!(
        sched.tick(),
        Tick::Idle {
            heartbeat: true,
            summary: false
        }
    );
    sched_clock_advance(&sched, 120);
    assert_eq!(
        sched.tick(),
        Tick::Idle {
            heartbeat: false,
            summary: true
        }
    );
    sched_clock_advance(&sched, 120);
    assert_eq!(
        sched.tick(),
        Tick::Idle {
            heartbeat: false,
            summary: false
        }
    );
    assert_eq!(sched.notifier().count_starting_with("summary for 1970-01-01"), 1);
}

fn sched_clock_advance(sched: &TestScheduler, secs: u64) {
    sched.clock().advance(Duration::from_secs(secs));
}

#[test]
fn nightly_summary_can_be_disabled() {
    let mut project = TestProject::new("# Nothing to do\n").expect("project");
    project.config.scheduler.nightly_summary = false;
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());
    sched.tick();
    sched_clock_advance(&sched, 2 * 86_400);
    assert!(matches!(sched.tick(), Tick::Idle { summary: false, .. }));
}

#[test]
fn stop_sentinel_ends_run_and_is_consumed() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    fs::create_dir_all(&project.paths.state_dir).expect("state dir");
    fs::write(&project.paths.stop_path, "").expect("sentinel");

    let mut sched = Scheduler::new(
        &project.config,
        &project.paths,
        ScriptedHandlers::new(),
        RecordingNotifier::default(),
        RecordingCommitter::dirty(),
        ManualClock::new(at(0)),
        StopSignal::with_sentinel(&project.paths.stop_path),
    );
    assert_eq!(sched.run(), 0);
    assert!(!project.paths.stop_path.exists());
    assert!(sched.handlers().calls().is_empty());
}

#[test]
fn prior_session_snapshot_is_not_reloaded() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    fs::create_dir_all(&project.paths.state_dir).expect("state dir");
    fs::write(
        &project.paths.session_path,
        "{\"started_at\":\"1970-01-01T00:00:00Z\",\"completed_count\":41,\"failed_count\":0,\"skipped_count\":0,\"consecutive_failures\":0,\"total_duration_ms\":0,\"last_activity_at\":null,\"completed_texts\":[]}\n",
    )
    .expect("seed session");

    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());
    sched.tick();
    let session = load_session(&project.paths.session_path).expect("session");
    assert_eq!(session.completed_count, 1);
}

#[test]
fn missing_roadmap_idles() {
    let project = TestProject::new(THREE_ITEMS).expect("project");
    fs::remove_file(project.roadmap_path()).expect("remove");
    let mut sched = scheduler(&project, ScriptedHandlers::new(), RecordingCommitter::dirty());
    assert!(matches!(sched.tick(), Tick::Idle { .. }));
    assert!(RoadmapStore::new(project.roadmap_path()).list_items().is_empty());
}
