use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use task_manager::{
    start_task_in_thread, Catch, ManagerError, TaskManager, TaskOptions, TaskStatus,
};

fn open_manager() -> TaskManager {
    let manager = TaskManager::new();
    manager.open().unwrap();
    manager
}

#[tokio::test]
async fn test_thread_task_success() {
    let manager = open_manager();
    let task = manager
        .start_task_in_thread(|| Ok::<_, String>(40 + 2), TaskOptions::new())
        .await
        .unwrap();
    manager.close().await;

    assert_eq!(task.status(), TaskStatus::Success);
    assert_eq!(task.ok(), Some(&42));
}

#[tokio::test]
async fn test_thread_task_failure() {
    let manager = open_manager();
    let task = manager
        .start_task_in_thread(|| Err::<i32, _>("bad".to_string()), TaskOptions::new())
        .await
        .unwrap();
    manager.close().await;

    assert_eq!(task.status(), TaskStatus::Failure);
    assert_eq!(task.err().map(String::as_str), Some("bad"));
}

#[tokio::test]
async fn test_thread_task_panic_is_an_exception() {
    let manager = open_manager();
    let task = manager
        .start_task_in_thread(
            || -> Result<i32, String> { panic!("in thread") },
            TaskOptions::new(),
        )
        .await
        .unwrap();
    manager.close().await;

    assert_eq!(task.status(), TaskStatus::Exception);
    assert_eq!(
        task.exception().map(ToString::to_string).as_deref(),
        Some("task panicked: in thread")
    );
}

#[tokio::test]
async fn test_thread_task_rejects_deadline() {
    let manager = open_manager();
    let started = manager
        .start_task_in_thread(
            || Ok::<_, String>(1),
            TaskOptions::new().with_timeout(Duration::from_secs(1)),
        )
        .await;
    assert!(matches!(started, Err(ManagerError::DeadlineNotSupported)));
    assert!(!manager.cancelled());
    manager.close().await;

    let started = start_task_in_thread(
        || Ok::<_, String>(1),
        TaskOptions::new().with_timeout(Duration::from_secs(1)),
    )
    .await;
    assert!(matches!(started, Err(ManagerError::DeadlineNotSupported)));
}

#[tokio::test]
async fn test_thread_task_catching() {
    let manager = open_manager();
    let task = manager
        .start_task_in_thread_catching(
            || Err::<i32, _>(anyhow::Error::new(std::io::Error::other("disk"))),
            Catch::error::<std::io::Error>(),
            TaskOptions::new(),
        )
        .await
        .unwrap();
    manager.close().await;

    assert_eq!(task.status(), TaskStatus::Failure);
    assert!(task.exception().is_none());
}

#[tokio::test]
async fn test_running_thread_task_is_not_interrupted() {
    let manager = open_manager();
    let task = manager
        .start_task_in_thread(
            || {
                std::thread::sleep(Duration::from_millis(100));
                Ok::<_, String>("done")
            },
            TaskOptions::new(),
        )
        .await
        .unwrap();

    manager.cancel();
    manager.close().await;
    assert_eq!(task.status(), TaskStatus::Success);
    assert_eq!(task.ok(), Some(&"done"));
}

#[tokio::test]
async fn test_thread_task_cancelled_by_failed_sibling_never_runs() {
    let manager = open_manager();
    let ran = Arc::new(AtomicBool::new(false));
    let failing = manager
        .submit_task(|| async { Err::<i32, _>("BOOM".to_string()) }, TaskOptions::new())
        .unwrap();
    let thread = {
        let ran = Arc::clone(&ran);
        manager
            .submit_task_in_thread(
                move || {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, String>(1)
                },
                TaskOptions::new(),
            )
            .unwrap()
    };
    manager.close().await;

    assert_eq!(failing.status(), TaskStatus::Failure);
    assert_eq!(thread.status(), TaskStatus::Cancelled);
    assert!(thread.result().is_none());
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_thread_task_cancelled_while_starting_never_runs() {
    let manager = open_manager();
    let ran = Arc::new(AtomicBool::new(false));
    let thread = {
        let ran = Arc::clone(&ran);
        manager
            .submit_task_in_thread(
                move || {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, String>(1)
                },
                TaskOptions::new(),
            )
            .unwrap()
    };
    assert_eq!(thread.status(), TaskStatus::Starting);
    assert_eq!(thread.cancel(), None);
    manager.close().await;

    assert_eq!(thread.status(), TaskStatus::Cancelled);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_thread_task_submitted_to_cancelled_manager_never_runs() {
    let manager = open_manager();
    manager.cancel();
    let ran = Arc::new(AtomicBool::new(false));
    let thread = {
        let ran = Arc::clone(&ran);
        manager
            .start_task_in_thread(
                move || {
                    ran.store(true, Ordering::SeqCst);
                    Ok::<_, String>(1)
                },
                TaskOptions::new(),
            )
            .await
            .unwrap()
    };
    manager.close().await;

    assert_eq!(thread.status(), TaskStatus::Cancelled);
    assert!(!ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_free_thread_task_join() {
    let task = start_task_in_thread(|| Ok::<_, String>(7), TaskOptions::new())
        .await
        .unwrap();
    assert_eq!(task.join().await, Ok(TaskStatus::Success));
    assert_eq!(task.ok(), Some(&7));
}

#[cfg(unix)]
mod process {
    use std::time::{Duration, Instant};

    use tokio::process::Command;

    use task_manager::{start_task_in_process, CommandError, TaskManager, TaskOptions, TaskStatus};

    fn open_manager() -> TaskManager {
        let manager = TaskManager::new();
        manager.open().unwrap();
        manager
    }

    #[tokio::test]
    async fn test_process_task_success() {
        let mut command = Command::new("echo");
        command.arg("hello");
        let task = start_task_in_process(command, TaskOptions::new()).await.unwrap();

        assert_eq!(task.join().await, Ok(TaskStatus::Success));
        let output = task.ok().unwrap();
        assert_eq!(output.stdout, b"hello\n");
    }

    #[tokio::test]
    async fn test_process_non_zero_exit_is_a_failure() {
        let manager = open_manager();
        let mut command = Command::new("sh");
        command.args(["-c", "exit 3"]);
        let task = manager
            .start_task_in_process(command, TaskOptions::new())
            .await
            .unwrap();
        manager.close().await;

        assert_eq!(task.status(), TaskStatus::Failure);
        let error = task.err().unwrap();
        assert!(matches!(error, CommandError::Exit(_)));
        assert_eq!(error.output().and_then(|output| output.status.code()), Some(3));
    }

    #[tokio::test]
    async fn test_missing_program_is_a_failure() {
        let manager = open_manager();
        let task = manager
            .start_task_in_process(
                Command::new("definitely-not-a-real-program"),
                TaskOptions::new(),
            )
            .await
            .unwrap();
        manager.close().await;

        assert_eq!(task.status(), TaskStatus::Failure);
        assert!(matches!(task.err(), Some(CommandError::Io(_))));
    }

    #[tokio::test]
    async fn test_process_timeout_kills_child() {
        let started = Instant::now();
        let manager = open_manager();
        let mut command = Command::new("sleep");
        command.arg("10");
        let task = manager
            .start_task_in_process(
                command,
                TaskOptions::new().with_timeout(Duration::from_millis(50)),
            )
            .await
            .unwrap();
        manager.close().await;

        assert_eq!(task.status(), TaskStatus::Timeout);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
