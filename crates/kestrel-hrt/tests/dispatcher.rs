use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kestrel_hrt::{now_us, HrtWorkQueue, WorkHandle, WorkMgr};

fn framework_pair() -> (Arc<HrtWorkQueue>, Arc<WorkMgr>) {
    let queue = HrtWorkQueue::start().expect("dispatcher start");
    let work_mgr = Arc::new(WorkMgr::new(Arc::clone(&queue)));
    (queue, work_mgr)
}

#[test]
fn one_shot_item_fires_once() {
    let (queue, work_mgr) = framework_pair();
    let fires = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fires);
    let handle = work_mgr.create(
        20_000,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(work_mgr.schedule(handle));

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(fires.load(Ordering::SeqCst), 1, "no reschedule, no repeat");

    queue.shutdown();
    queue.join();
}

#[test]
fn rescheduling_callback_fires_periodically() {
    let (queue, work_mgr) = framework_pair();
    let fires = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fires);
    let rescheduler = Arc::clone(&work_mgr);
    let mut handle = work_mgr.create(
        10_000,
        Box::new(move |wh: WorkHandle| {
            counter.fetch_add(1, Ordering::SeqCst);
            rescheduler.schedule(wh);
        }),
    );
    assert!(work_mgr.schedule(handle));

    std::thread::sleep(Duration::from_secs(1));
    let stats = work_mgr.stats(handle).expect("item still live");
    work_mgr.destroy(&mut handle);

    let count = fires.load(Ordering::SeqCst);
    assert!(
        (85..=115).contains(&count),
        "expected ~100 fires at 10ms over 1s, got {count}"
    );

    // Pacing counters describe inter-fire spacing around the 10ms target.
    let avg = stats.avg().expect("fires recorded");
    assert!(
        (8_000..=14_000).contains(&avg),
        "average spacing {avg}us off a 10ms cadence"
    );
    assert!(stats.min >= 8_000, "min spacing {}us", stats.min);

    queue.shutdown();
    queue.join();
}

#[test]
fn destroy_dequeues_a_pending_item() {
    let (queue, work_mgr) = framework_pair();
    let fires = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fires);
    let mut handle = work_mgr.create(
        50_000,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(work_mgr.schedule(handle));
    work_mgr.destroy(&mut handle);
    assert_eq!(handle, WorkHandle::NONE);

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(fires.load(Ordering::SeqCst), 0, "destroyed item must not fire");

    queue.shutdown();
    queue.join();
}

#[test]
fn clear_all_drops_pending_entries_without_touching_items() {
    let (queue, work_mgr) = framework_pair();
    let fires = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fires);
    let handle = work_mgr.create(
        30_000,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(work_mgr.schedule(handle));
    queue.clear_all();

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fires.load(Ordering::SeqCst), 0);

    // The item itself survived and can be scheduled again.
    assert!(work_mgr.schedule(handle));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fires.load(Ordering::SeqCst), 1);

    queue.shutdown();
    queue.join();
}

#[test]
fn shutdown_leaves_pending_items_unexecuted() {
    let (queue, work_mgr) = framework_pair();
    let fires = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fires);
    let handle = work_mgr.create(
        40_000,
        Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );
    assert!(work_mgr.schedule(handle));

    queue.shutdown();
    queue.join();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fires.load(Ordering::SeqCst), 0);

    // Scheduling after shutdown enqueues but nothing dispatches.
    assert!(work_mgr.schedule(handle));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(fires.load(Ordering::SeqCst), 0);
}

#[test]
fn two_items_share_the_dispatcher_fairly() {
    let (queue, work_mgr) = framework_pair();
    let fast_times = Arc::new(Mutex::new(Vec::new()));
    let slow_fires = Arc::new(AtomicU32::new(0));

    let times = Arc::clone(&fast_times);
    let fast_mgr = Arc::clone(&work_mgr);
    let mut fast = work_mgr.create(
        10_000,
        Box::new(move |wh| {
            times.lock().unwrap().push(now_us());
            fast_mgr.schedule(wh);
        }),
    );

    let slow_counter = Arc::clone(&slow_fires);
    let slow_mgr = Arc::clone(&work_mgr);
    let mut slow = work_mgr.create(
        30_000,
        Box::new(move |wh| {
            slow_counter.fetch_add(1, Ordering::SeqCst);
            slow_mgr.schedule(wh);
        }),
    );

    assert!(work_mgr.schedule(fast));
    assert!(work_mgr.schedule(slow));
    std::thread::sleep(Duration::from_millis(1_500));
    work_mgr.destroy(&mut fast);
    work_mgr.destroy(&mut slow);

    let fast_count = fast_times.lock().unwrap().len() as u32;
    let slow_count = slow_fires.load(Ordering::SeqCst);
    assert!(
        (120..=180).contains(&fast_count),
        "fast item fired {fast_count} times over 1.5s"
    );
    assert!(
        (35..=65).contains(&slow_count),
        "slow item fired {slow_count} times over 1.5s"
    );

    // Neither item starved the other: inter-fire gaps on the fast item stay
    // bounded even while the slow item shares the thread.
    let times = fast_times.lock().unwrap();
    let max_gap = times
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .max()
        .expect("at least two fires");
    assert!(max_gap < 40_000, "max inter-fire gap {max_gap}us");

    queue.shutdown();
    queue.join();
}
