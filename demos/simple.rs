use std::time::Duration;

use task_manager::{TaskManager, TaskOptions};

async fn ticker(emoji: char, ticks: u32) -> Result<u32, String> {
    for tick in 1..=ticks {
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!("{emoji} Task is running! ({tick})");
    }
    Ok(ticks)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let manager = TaskManager::builder().with_concurrent_limit(3).build();

    let (steady, sleepy, failing) = manager
        .scope(|tm| async move {
            let steady = tm
                .start_task(|| ticker('🥴', 10), TaskOptions::new().with_name("steady"))
                .await?;
            let sleepy = tm
                .start_task(
                    || ticker('🧑', 10),
                    TaskOptions::new()
                        .with_name("sleepy")
                        .with_timeout(Duration::from_secs(8)),
                )
                .await?;
            // Fails after three seconds and takes its siblings down with it.
            let failing = tm.submit_task(
                || async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    println!("🆕 Task is failing...");
                    Err::<u32, _>("Task failed after 3 seconds".to_string())
                },
                TaskOptions::new().with_name("failing"),
            )?;
            Ok::<_, anyhow::Error>((steady, sleepy, failing))
        })
        .await?;

    for task in [&steady, &sleepy, &failing] {
        println!("{:?} ended as {}", task.name(), task.status());
    }
    println!("All tasks died! 🫡");
    Ok(())
}
