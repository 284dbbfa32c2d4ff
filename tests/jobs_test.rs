use std::{
    cell::RefCell,
    rc::Rc,
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use anima_ngin::{
    error::JobError,
    jobs::{JobPriority, JobSystem, JobType},
};

/// Calls `update` until `done` holds or a second has passed.
fn pump(jobs: &mut JobSystem, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(1);
    while !done() && Instant::now() < deadline {
        jobs.update();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn zero_workers_is_rejected() {
    assert!(matches!(JobSystem::new(0, 16, true), Err(JobError::NoWorkers)));
}

#[test]
fn results_reach_callbacks_on_update() {
    let mut jobs = JobSystem::new(2, 16, true).unwrap();
    let results = Rc::new(RefCell::new(Vec::new()));

    for i in 0..5u32 {
        let results = Rc::clone(&results);
        jobs.submit(
            JobType::GENERAL,
            JobPriority::Normal,
            move || Ok(i * 10),
            move |outcome: anyhow::Result<u32>| results.borrow_mut().push(outcome.unwrap()),
        )
        .unwrap();
    }

    pump(&mut jobs, || results.borrow().len() == 5);
    let mut got = results.borrow().clone();
    got.sort();
    assert_eq!(got, vec![0, 10, 20, 30, 40]);
    assert_eq!(jobs.in_flight(), 0);
    jobs.shutdown();
}

#[test]
fn failures_are_delivered_to_the_callback() {
    let mut jobs = JobSystem::new(1, 4, true).unwrap();
    let failed = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&failed);
    jobs.submit(
        JobType::GENERAL,
        JobPriority::High,
        || -> anyhow::Result<()> { Err(anyhow::anyhow!("no such file")) },
        move |outcome| *sink.borrow_mut() = Some(outcome.unwrap_err().to_string()),
    )
    .unwrap();

    pump(&mut jobs, || failed.borrow().is_some());
    assert_eq!(failed.borrow().as_deref(), Some("no such file"));
}

#[test]
fn gpu_jobs_run_on_the_owner_for_single_threaded_backends() {
    let mut jobs = JobSystem::new(2, 8, false).unwrap();
    let owner = thread::current().id();
    let ran_on = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&ran_on);

    jobs.submit(
        JobType::GPU_RESOURCE,
        JobPriority::Normal,
        move || {
            *slot.lock().unwrap() = Some(thread::current().id());
            Ok(())
        },
        |_: anyhow::Result<()>| {},
    )
    .unwrap();

    assert_eq!(jobs.pending(), 1);
    jobs.update();
    assert_eq!(*ran_on.lock().unwrap(), Some(owner));
    assert_eq!(jobs.pending(), 0);
}

#[test]
fn resource_loads_have_a_dedicated_worker() {
    let jobs = JobSystem::new(3, 8, true).unwrap();
    let loaders = jobs
        .worker_masks()
        .iter()
        .filter(|mask| mask.contains(JobType::RESOURCE_LOAD))
        .count();
    assert_eq!(loaders, 1);
}

#[test]
fn submit_after_shutdown_fails() {
    let mut jobs = JobSystem::new(1, 4, true).unwrap();
    jobs.shutdown();
    let err = jobs
        .submit(JobType::GENERAL, JobPriority::Low, || Ok(()), |_: anyhow::Result<()>| {})
        .unwrap_err();
    assert!(matches!(err, JobError::ShutDown));
}

#[test]
fn idle_workers_always_wake_for_shutdown() {
    let (done_tx, done_rx) = std::sync::mpsc::channel();
    thread::spawn(move || {
        for _ in 0..500 {
            let mut jobs = JobSystem::new(8, 4, true).unwrap();
            jobs.shutdown();
        }
        let _ = done_tx.send(());
    });
    assert!(
        done_rx.recv_timeout(Duration::from_secs(30)).is_ok(),
        "shutdown hung on a sleeping worker"
    );
}
