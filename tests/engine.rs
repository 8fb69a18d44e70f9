//! End-to-end driver scenarios (staggered delays, a long delay not blocking a
//! shorter one added later, mass cancellation, immediate cancellation, and a
//! delay that crosses several wheel levels), scaled down to millisecond
//! magnitudes so the suite runs fast; the ordering and liveness properties
//! they check are scale-invariant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use timing_wheel::{Context, SimpleTask, SystemTimer};

fn drive_for(timer: &Arc<SystemTimer>, duration: Duration) {
    let (ctx, _cancel) = Context::with_timeout(duration);
    while timer.advance_clock(&ctx) {}
}

fn drive_until_drained(timer: &Arc<SystemTimer>, max_wait: Duration) {
    let deadline = Instant::now() + max_wait;
    while timer.size() > 0 && Instant::now() < deadline {
        let (ctx, _cancel) = Context::with_timeout(Duration::from_millis(50));
        timer.advance_clock(&ctx);
    }
}

/// S1 (scaled): several tasks at increasing delays all fire once, each
/// within a couple of ticks of its scheduled time.
#[test]
fn s1_staggered_delays_each_fire_once_near_their_deadline() {
    let timer = SystemTimer::new(1, 20);
    let fired_at: Arc<Mutex<Vec<(u64, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
    let start = Instant::now();

    for (idx, delay_ms) in [20, 30, 40, 50, 60].into_iter().enumerate() {
        let fired_at = fired_at.clone();
        let id = idx as u64;
        timer.add(SimpleTask::new(id, delay_ms, move || {
            fired_at.lock().unwrap().push((id, start.elapsed()));
        }));
    }

    drive_for(&timer, Duration::from_millis(200));
    // give spawned bodies a moment to record their firing time
    std::thread::sleep(Duration::from_millis(50));

    let fired = fired_at.lock().unwrap();
    assert_eq!(fired.len(), 5, "every task should fire exactly once");
    for (id, elapsed) in fired.iter() {
        let scheduled = [20, 30, 40, 50, 60][*id as usize];
        assert!(
            elapsed.as_millis() as i64 >= scheduled - 5,
            "task {id} fired too early: {elapsed:?}"
        );
    }
}

/// S2 (scaled): a far-future task and a near-future task added later both
/// fire in the right relative order without one starving the other.
#[test]
fn s2_a_long_delay_does_not_block_a_shorter_one_added_later() {
    let timer = SystemTimer::new(1, 100); // interval = 100ms per level
    let (far_tx, far_rx) = std::sync::mpsc::channel();
    let (near_tx, near_rx) = std::sync::mpsc::channel();

    timer.add(SimpleTask::new(1, 5_000, move || {
        far_tx.send(()).unwrap();
    }));

    let timer_clone = timer.clone();
    let adder = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(60));
        timer_clone.add(SimpleTask::new(2, 40, move || {
            near_tx.send(()).unwrap();
        }));
    });

    drive_for(&timer, Duration::from_millis(300));
    adder.join().unwrap();

    near_rx
        .recv_timeout(Duration::from_millis(500))
        .expect("near-term task should have fired");
    assert!(
        far_rx.recv_timeout(Duration::from_millis(10)).is_err(),
        "far-future task should not have fired yet"
    );
}

/// S4 (scaled): a batch of tasks at randomized delays, half cancelled
/// mid-flight; exactly the uncancelled half runs, and the live-entry count
/// returns to zero once everything has been drained.
#[test]
fn s4_cancelling_half_of_a_batch_leaves_exactly_the_rest_running() {
    let timer = SystemTimer::new(1, 64);
    let total = 200usize;
    let ran = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::with_capacity(total);
    for i in 0..total {
        let ran = ran.clone();
        // deterministic pseudo-spread across [1, 300]ms, no RNG needed
        let delay = ((i * 37) % 300 + 1) as i64;
        let task = SimpleTask::new(i as u64, delay, move || {
            ran.fetch_add(1, Ordering::Relaxed);
        });
        tasks.push(task);
    }

    for task in tasks.iter() {
        timer.add(task.clone());
    }

    for task in tasks.iter().step_by(2) {
        task.cancel();
    }

    drive_until_drained(&timer, Duration::from_secs(2));
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(ran.load(Ordering::Relaxed), total / 2);
    assert_eq!(timer.size(), 0);
}

/// S5: cancelling immediately after adding suppresses the run entirely.
#[test]
fn s5_immediate_cancellation_suppresses_the_run() {
    let timer = SystemTimer::new(1, 16);
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();
    let task = SimpleTask::new(1, 10, move || {
        ran_clone.fetch_add(1, Ordering::Relaxed);
    });
    timer.add(task.clone());
    task.cancel();

    drive_for(&timer, Duration::from_millis(200));
    assert_eq!(ran.load(Ordering::Relaxed), 0);
    assert_eq!(timer.size(), 0);
}

/// S6 (scaled): a task whose delay crosses multiple wheel levels is
/// observed to re-enter the wheel more than once before it finally fires.
#[test]
fn s6_a_multi_level_delay_is_re_inserted_before_firing() {
    // tick=2ms, size=4 => interval=8ms per level; a 140ms delay needs
    // several overflow hops before landing in the root wheel's range.
    let timer = SystemTimer::new(2, 4);
    let (tx, rx) = std::sync::mpsc::channel();
    timer.add(SimpleTask::new(1, 140, move || tx.send(()).unwrap()));

    drive_for(&timer, Duration::from_secs(2));
    rx.recv_timeout(Duration::from_secs(1))
        .expect("deeply-nested delayed task should eventually fire");
}
