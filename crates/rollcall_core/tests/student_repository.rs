use rollcall_core::{
    channel, Callback, Student, StoreError, StoreResult, StudentId, StudentRepository,
    StudentStore,
};
use rusqlite::Connection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn memory_repo() -> StudentRepository {
    let store = Arc::new(StudentStore::open_in_memory(1).unwrap());
    StudentRepository::with_store(store, 2).unwrap()
}

fn create(repo: &StudentRepository, name: &str) -> StudentId {
    let (callback, receiver) = channel();
    repo.create_async(Student::new(name), callback);
    receiver.recv_timeout(WAIT).unwrap().unwrap()
}

/// Records which branch fired and how many times.
struct CountingCallback {
    successes: Arc<AtomicUsize>,
    errors: Arc<AtomicUsize>,
    done: mpsc::Sender<()>,
}

impl<T: Send + 'static> Callback<T> for CountingCallback {
    fn on_success(self, _value: T) {
        self.successes.fetch_add(1, Ordering::SeqCst);
        self.done.send(()).unwrap();
    }

    fn on_error(self, _error: StoreError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        self.done.send(()).unwrap();
    }
}

#[test]
fn read_after_write_through_chained_callbacks() {
    let repo = Arc::new(memory_repo());
    let (tx, rx) = mpsc::channel();

    let chained = Arc::clone(&repo);
    repo.create_async(
        Student::new("Alice"),
        move |created: StoreResult<StudentId>| {
            let id = created.unwrap();
            chained.read_async(id, move |read: StoreResult<Option<Student>>| {
                tx.send((id, read)).unwrap();
            });
        },
    );

    let (id, read) = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(read.unwrap(), Some(Student::with_id(id, "Alice")));
}

#[test]
fn reading_unknown_id_succeeds_with_none() {
    let repo = memory_repo();
    let (callback, receiver) = channel();

    repo.read_async(12_345, callback);

    let result = receiver.recv_timeout(WAIT).unwrap();
    assert!(matches!(result, Ok(None)));
}

#[test]
fn updating_unknown_id_succeeds_with_zero() {
    let repo = memory_repo();
    let (callback, receiver) = channel();

    repo.update_async(Student::with_id(777, "Ghost"), callback);

    assert_eq!(receiver.recv_timeout(WAIT).unwrap().unwrap(), 0);
}

#[test]
fn update_existing_row_succeeds_with_one() {
    let repo = memory_repo();
    let id = create(&repo, "Alice");

    let (callback, receiver) = channel();
    repo.update_async(Student::with_id(id, "Alicia"), callback);
    assert_eq!(receiver.recv_timeout(WAIT).unwrap().unwrap(), 1);

    let (callback, receiver) = channel();
    repo.read_async(id, callback);
    let loaded = receiver.recv_timeout(WAIT).unwrap().unwrap().unwrap();
    assert_eq!(loaded.name, "Alicia");
}

#[test]
fn second_delete_succeeds_with_false() {
    let repo = memory_repo();
    let id = create(&repo, "Alice");

    let (callback, receiver) = channel();
    repo.delete_async(id, callback);
    assert!(receiver.recv_timeout(WAIT).unwrap().unwrap());

    let (callback, receiver) = channel();
    repo.delete_async(id, callback);
    assert!(!receiver.recv_timeout(WAIT).unwrap().unwrap());
}

#[test]
fn chained_inserts_list_sorted_by_name() {
    let repo = Arc::new(memory_repo());
    let (tx, rx) = mpsc::channel();

    let after_bob = Arc::clone(&repo);
    repo.create_async(Student::new("Bob"), move |bob: StoreResult<StudentId>| {
        bob.unwrap();
        let after_alice = Arc::clone(&after_bob);
        after_bob.create_async(
            Student::new("Alice"),
            move |alice: StoreResult<StudentId>| {
                alice.unwrap();
                after_alice.read_all_async(move |all: StoreResult<Vec<Student>>| {
                    tx.send(all).unwrap();
                });
            },
        );
    });

    let names: Vec<_> = rx
        .recv_timeout(WAIT)
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|student| student.name)
        .collect();
    assert_eq!(names, ["Alice", "Bob"]);
}

#[test]
fn count_matches_read_all_when_quiescent() {
    let repo = memory_repo();
    for name in ["Carol", "Alice", "Bob", "Dave"] {
        create(&repo, name);
    }

    let (count_cb, count_rx) = channel();
    repo.count_async(count_cb);
    let (all_cb, all_rx) = channel();
    repo.read_all_async(all_cb);

    let count = count_rx.recv_timeout(WAIT).unwrap().unwrap();
    let all = all_rx.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(count, 4);
    assert_eq!(count, all.len() as i64);
}

#[test]
fn callbacks_run_on_worker_threads() {
    let repo = memory_repo();
    let (tx, rx) = mpsc::channel();

    repo.count_async(move |_: StoreResult<i64>| {
        let name = std::thread::current().name().map(str::to_string);
        tx.send(name).unwrap();
    });

    let name = rx.recv_timeout(WAIT).unwrap().unwrap_or_default();
    assert!(name.starts_with("rollcall-worker-"), "ran on `{name}`");
}

#[test]
fn exactly_one_branch_fires_per_operation() {
    let repo = memory_repo();
    let successes = Arc::new(AtomicUsize::new(0));
    let errors = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = mpsc::channel();
    let callback = || CountingCallback {
        successes: Arc::clone(&successes),
        errors: Arc::clone(&errors),
        done: done_tx.clone(),
    };

    repo.create_async(Student::new("Alice"), callback());
    repo.create_async(Student::new(""), callback());
    repo.read_async(1, callback());
    repo.delete_async(99, callback());

    for _ in 0..4 {
        done_rx.recv_timeout(WAIT).unwrap();
    }
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert_eq!(successes.load(Ordering::SeqCst), 3);
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[test]
fn store_faults_arrive_through_error_branch() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    let store = Arc::new(StudentStore::from_connection(conn, 1).unwrap());
    let repo = StudentRepository::with_store(store, 2).unwrap();

    let (callback, receiver) = channel();
    repo.read_all_async(callback);

    let err = receiver.recv_timeout(WAIT).unwrap().unwrap_err();
    assert!(err.is_schema(), "unexpected error: {err}");
}

#[test]
fn rejected_write_arrives_as_storage_fault() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE students (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             name TEXT NOT NULL CHECK (length(name) < 3)
         );
         PRAGMA user_version = 1;",
    )
    .unwrap();
    let store = Arc::new(StudentStore::from_connection(conn, 1).unwrap());
    let repo = StudentRepository::with_store(store, 1).unwrap();

    let (callback, receiver) = channel();
    repo.create_async(Student::new("Alice"), callback);

    let err = receiver.recv_timeout(WAIT).unwrap().unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)), "unexpected error: {err}");
    assert!(!err.is_schema());

    let (callback, receiver) = channel();
    repo.count_async(callback);
    assert_eq!(receiver.recv_timeout(WAIT).unwrap().unwrap(), 0);
}

#[test]
fn submissions_after_shutdown_fail_with_closed() {
    let repo = memory_repo();
    repo.shutdown();
    assert!(repo.is_shutdown());

    let (callback, receiver) = channel();
    repo.create_async(Student::new("Late"), callback);

    let err = receiver.try_recv().unwrap().unwrap_err();
    assert!(err.is_closed());
    assert_eq!(repo.store().count().unwrap(), 0);
}

#[test]
fn work_queued_before_shutdown_still_completes() {
    let repo = memory_repo();
    let receivers: Vec<_> = (0..10)
        .map(|n| {
            let (callback, receiver) = channel();
            repo.create_async(Student::new(format!("student {n}")), callback);
            receiver
        })
        .collect();

    repo.shutdown();
    repo.shutdown();
    assert!(repo.await_termination(WAIT));

    for receiver in receivers {
        assert!(receiver.recv_timeout(WAIT).unwrap().is_ok());
    }
    assert_eq!(repo.store().count().unwrap(), 10);
}

#[test]
fn repositories_can_share_one_store() {
    let store = Arc::new(StudentStore::open_in_memory(1).unwrap());
    let first = StudentRepository::with_store(Arc::clone(&store), 2).unwrap();
    let second = StudentRepository::with_store(Arc::clone(&store), 1).unwrap();

    let id = create(&first, "Alice");
    first.shutdown();

    let (callback, receiver) = channel();
    second.read_async(id, callback);
    assert_eq!(
        receiver.recv_timeout(WAIT).unwrap().unwrap(),
        Some(Student::with_id(id, "Alice"))
    );
}

#[test]
fn zero_pool_size_is_rejected() {
    let store = Arc::new(StudentStore::open_in_memory(1).unwrap());
    let result = StudentRepository::with_store(store, 0);
    assert!(matches!(result, Err(StoreError::Config(_))));
}

#[test]
fn dropping_repository_inside_its_own_callback_does_not_deadlock() {
    let repo = Arc::new(memory_repo());
    let (tx, rx) = mpsc::channel();

    let held = Arc::clone(&repo);
    repo.count_async(move |_: StoreResult<i64>| {
        drop(held);
        tx.send(()).unwrap();
    });
    drop(repo);

    rx.recv_timeout(WAIT).unwrap();
}
