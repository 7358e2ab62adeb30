//! Bootstrap smoke probe for `rollcall_core`.
//!
//! # Responsibility
//! - Open the shared store from `ROLLCALL_*` environment settings.
//! - Run the bootstrap sequence: insert "Alice" then list everyone, and
//!   insert "Bob" independently.
//! - Shut the repository down and wait for its workers before exiting.

use rollcall_core::{
    init_logging, LoggingConfig, Student, StoreConfig, StoreResult, StudentId, StudentRepository,
};
use std::process::ExitCode;
use std::sync::{mpsc, Arc};
use std::time::Duration;

const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> ExitCode {
    let logging = LoggingConfig::from_env()
        .and_then(|config| config.as_ref().map_or(Ok(()), init_logging));
    if let Err(err) = logging {
        eprintln!("logging disabled: {err}");
    }

    let config = match StoreConfig::from_env(std::env::temp_dir().join("rollcall")) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    let repo = match StudentRepository::open(&config) {
        Ok(repo) => Arc::new(repo),
        Err(err) => {
            eprintln!("failed to open store at {}: {err}", config.db_path().display());
            return ExitCode::FAILURE;
        }
    };
    println!("rollcall_core version={}", rollcall_core::core_version());

    let (done_tx, done_rx) = mpsc::channel::<bool>();

    let chained = Arc::clone(&repo);
    let after_alice = done_tx.clone();
    repo.create_async(
        Student::new("Alice"),
        move |result: StoreResult<StudentId>| match result {
            Ok(id) => {
                println!("added Alice id={id}");
                chained.read_all_async(move |students: StoreResult<Vec<Student>>| {
                    match students {
                        Ok(students) => {
                            println!("retrieved {} students:", students.len());
                            for student in &students {
                                println!("  {student}");
                            }
                            let _ = after_alice.send(true);
                        }
                        Err(err) => {
                            eprintln!("failed to load students: {err}");
                            let _ = after_alice.send(false);
                        }
                    }
                });
            }
            Err(err) => {
                eprintln!("failed to add Alice: {err}");
                let _ = after_alice.send(false);
            }
        },
    );

    repo.create_async(
        Student::new("Bob"),
        move |result: StoreResult<StudentId>| {
            match &result {
                Ok(id) => println!("added Bob id={id}"),
                Err(err) => eprintln!("failed to add Bob: {err}"),
            }
            let _ = done_tx.send(result.is_ok());
        },
    );

    let mut ok = true;
    for _ in 0..2 {
        match done_rx.recv_timeout(COMPLETION_TIMEOUT) {
            Ok(success) => ok &= success,
            Err(_) => {
                eprintln!("timed out waiting for storage operations");
                ok = false;
                break;
            }
        }
    }

    repo.shutdown();
    if !repo.await_termination(COMPLETION_TIMEOUT) {
        eprintln!("workers did not stop within {COMPLETION_TIMEOUT:?}");
        ok = false;
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
