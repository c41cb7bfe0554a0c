use std::sync::{mpsc, Mutex};

use phone_core::store::{MemoryStore, MessageStore};

use super::*;
use crate::timer::{ThreadScheduler, TimeoutScheduler, TimerId, TimerTask};

/// Ignores `cancel`: every scheduled task stays runnable, the way a task
/// already dequeued by the timer thread still runs after a cancel.
#[derive(Default)]
struct LaggingScheduler {
    tasks: Mutex<Vec<Option<TimerTask>>>,
}

impl LaggingScheduler {
    fn run(&self, index: usize) {
        let task = self.tasks.lock().unwrap()[index].take();
        if let Some(task) = task {
            task();
        }
    }
}

impl TimeoutScheduler for LaggingScheduler {
    fn schedule(&self, _delay: Duration, task: TimerTask) -> TimerId {
        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(Some(task));
        TimerId(tasks.len() as u64 - 1)
    }

    fn cancel(&self, _id: TimerId) {}
}

fn lagging_session() -> (Arc<PhoneSession>, Arc<LaggingScheduler>) {
    let sched = Arc::new(LaggingScheduler::default());
    let session = PhoneSession::new(
        "lag",
        Arc::new(KeyMap::standard()),
        sched.clone(),
        IDLE,
        None,
    );
    (session, sched)
}

#[test]
fn test_text_changed_events() {
    let (session, _sched) = manual_session("a");
    let sub = session.subscribe();
    assert_eq!(session.decode("33#"), "E");
    assert_eq!(
        drain(&sub.events),
        vec![changed("D"), changed("E"), completed("E")]
    );
}

#[test]
fn test_decode_examples_fire_completion() {
    let cases = [
        ("222 2 22#", "CAB"),
        ("33#", "E"),
        ("227*#", "B"),
        ("4433555 555666#", "HELLO"),
        ("8 88777444666*664#", "TURING"),
    ];
    for (input, expected) in cases {
        let (session, _sched) = manual_session("a");
        let sub = session.subscribe();
        assert_eq!(session.decode(input), expected);
        let last = drain(&sub.events).pop();
        assert_eq!(last, Some(completed(expected)), "input {input:?}");
        assert_eq!(session.current_text(), "");
    }
}

#[test]
fn test_idle_timeout_commits_letter() {
    let (session, sched) = manual_session("a");
    session.process_key('2');
    session.process_key('2');
    assert!(session.has_pending_timeout());

    assert_eq!(sched.advance(IDLE), 1);
    assert!(!session.has_pending_timeout());
    assert_eq!(session.state(), DecoderState::Idle);

    session.process_key('2');
    assert_eq!(session.current_text(), "BA");
}

#[test]
fn test_timeout_emits_nothing() {
    let (session, sched) = manual_session("a");
    session.process_key('4');
    let sub = session.subscribe();
    sched.advance(IDLE);
    assert!(drain(&sub.events).is_empty());
    assert_eq!(session.current_text(), "G");
}

#[test]
fn test_key_press_restarts_idle_timer() {
    let (session, sched) = manual_session("a");
    session.process_key('7');
    sched.advance(IDLE - Duration::from_millis(1));
    session.process_key('7');

    // The first timer was cancelled; the second is not due yet
    assert_eq!(sched.advance(Duration::from_millis(500)), 0);
    session.process_key('7');
    assert_eq!(session.current_text(), "R");

    assert_eq!(sched.advance(IDLE), 1);
    session.process_key('7');
    assert_eq!(session.current_text(), "RP");
}

#[test]
fn test_superseded_timer_fire_ignored() {
    let (session, sched) = lagging_session();
    session.process_key('2');
    session.process_key('2');

    // Timer armed by the first press fires after the second press
    sched.run(0);
    assert_eq!(
        session.state(),
        DecoderState::Cycling {
            key: '2',
            press_count: 1
        }
    );
    assert!(session.has_pending_timeout());

    session.process_key('2');
    assert_eq!(session.current_text(), "C");

    sched.run(1);
    assert_eq!(session.current_text(), "C");
    assert!(session.state().active_key().is_some());

    // The latest timer still commits the letter
    sched.run(2);
    assert_eq!(session.state(), DecoderState::Idle);
    session.process_key('2');
    assert_eq!(session.current_text(), "CA");
}

#[test]
fn test_cancelled_timer_fire_ignored() {
    let (session, sched) = lagging_session();
    session.process_key('2');
    session.process_backspace();
    session.process_key('3');

    sched.run(0);
    session.process_key('3');
    assert_eq!(session.current_text(), "E");
}

#[test]
fn test_only_one_timer_outstanding() {
    let (session, sched) = manual_session("a");
    for key in "2222337".chars() {
        session.process_key(key);
        assert_eq!(sched.pending(), 1);
    }
}

#[test]
fn test_backspace_complete_clean_cancel_timer() {
    let (session, sched) = manual_session("a");

    session.process_key('2');
    session.process_backspace();
    assert_eq!(sched.pending(), 0);

    session.process_key('2');
    session.process_complete();
    assert_eq!(sched.pending(), 0);

    session.process_key('2');
    session.process_cleaning();
    assert_eq!(sched.pending(), 0);

    session.process_key('2');
    session.process_timeout();
    assert_eq!(sched.pending(), 0);
    assert_eq!(sched.advance(IDLE * 2), 0);
}

#[test]
fn test_pause_in_decode_cancels_timer() {
    let (session, sched) = manual_session("a");
    assert_eq!(session.decode("22 "), "B");
    assert!(!session.has_pending_timeout());
    assert_eq!(sched.pending(), 0);
}

#[test]
fn test_cleaning_emits_nothing() {
    let (session, _sched) = manual_session("a");
    session.process_key('2');
    let sub = session.subscribe();
    session.process_cleaning();
    assert!(drain(&sub.events).is_empty());
    assert_eq!(session.current_text(), "");
}

#[test]
fn test_backspace_on_empty_emits_nothing() {
    let (session, _sched) = manual_session("a");
    let sub = session.subscribe();
    session.process_backspace();
    assert!(drain(&sub.events).is_empty());
}

#[test]
fn test_complete_on_empty_emits_empty() {
    let (session, _sched) = manual_session("a");
    let sub = session.subscribe();
    session.process_complete();
    assert_eq!(drain(&sub.events), vec![completed("")]);
}

#[test]
fn test_unsubscribe_stops_events() {
    let (session, _sched) = manual_session("a");
    let first = session.subscribe();
    let second = session.subscribe();
    assert_eq!(session.subscriber_count(), 2);

    assert!(session.unsubscribe(first.id));
    assert!(!session.unsubscribe(first.id));
    session.process_key('2');

    assert!(matches!(
        first.events.try_recv(),
        Err(mpsc::TryRecvError::Disconnected)
    ));
    assert_eq!(drain(&second.events), vec![changed("A")]);
}

#[test]
fn test_dropped_subscriber_pruned() {
    let (session, _sched) = manual_session("a");
    let sub = session.subscribe();
    drop(sub);
    session.process_key('2');
    assert_eq!(session.subscriber_count(), 0);
}

#[test]
fn test_close_cancels_timer_and_ignores_ops() {
    let (session, sched) = manual_session("a");
    let sub = session.subscribe();
    session.process_key('2');
    drain(&sub.events);

    session.close();
    session.close();
    assert!(session.is_closed());
    assert_eq!(sched.pending(), 0);
    assert_eq!(sched.advance(IDLE), 0);

    session.process_key('3');
    session.process_complete();
    assert_eq!(session.current_text(), "A");
    assert_eq!(session.decode("33#"), "");
    assert!(matches!(
        sub.events.try_recv(),
        Err(mpsc::TryRecvError::Disconnected)
    ));
}

#[test]
fn test_timer_after_session_dropped_is_harmless() {
    let (session, sched) = manual_session("a");
    session.process_key('2');
    drop(session);
    assert_eq!(sched.advance(IDLE), 1);
}

#[test]
fn test_completion_persisted_to_store() {
    let store = Arc::new(MemoryStore::new());
    let sched = Arc::new(ManualScheduler::new());
    let session = PhoneSession::new(
        "room-1",
        Arc::new(KeyMap::standard()),
        sched,
        IDLE,
        Some(store.clone() as Arc<dyn MessageStore>),
    );

    session.decode("4433555 555666#");
    session.process_complete(); // empty completion is not stored
    session.decode("33#");

    let records = store.get_all().unwrap();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["HELLO", "E"]);
    assert!(records.iter().all(|r| r.session_id == "room-1"));
}

#[test]
fn test_real_timer_commits_letter() {
    let sched = Arc::new(ThreadScheduler::new());
    let session = PhoneSession::new(
        "live",
        Arc::new(KeyMap::standard()),
        sched,
        Duration::from_millis(30),
        None,
    );
    session.process_key('2');
    session.process_key('2');

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while session.has_pending_timeout() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(session.state(), DecoderState::Idle);
    session.process_key('2');
    assert_eq!(session.current_text(), "BA");
}
