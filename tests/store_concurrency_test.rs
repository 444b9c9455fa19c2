use std::collections::HashSet;

use tasklists::config::Config;
use tasklists::store::Store;
use tokio::task::JoinSet;

const WRITERS: usize = 200;

async fn open_file_store(dir: &tempfile::TempDir) -> Store {
    let url = format!("sqlite://{}", dir.path().join("tasklists.db").display());
    let config = Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(url.clone()),
        _ => None,
    })
    .expect("Failed to build config");
    Store::connect(&config).await.expect("Failed to open store")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_writes_on_file_store() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = open_file_store(&dir).await;

    let keep = store.create_list("Keep").await.unwrap();
    let mut doomed = Vec::new();
    for i in 0..20 {
        let id = store.create_list(&format!("Doomed {}", i)).await.unwrap();
        store.create_task(id, "goes away").await.unwrap();
        doomed.push(id);
    }

    let mut writes = JoinSet::new();
    for i in 0..WRITERS {
        let store = store.clone();
        writes.spawn(async move { store.create_task(keep, &format!("task {}", i)).await.map(Some) });
    }
    for &id in &doomed {
        let store = store.clone();
        writes.spawn(async move { store.delete_list(id).await.map(|_| None) });
    }

    let mut created = HashSet::new();
    while let Some(joined) = writes.join_next().await {
        match joined.expect("writer panicked") {
            Ok(Some(id)) => assert!(created.insert(id), "task id {} handed out twice", id),
            Ok(None) => {}
            Err(e) => panic!("concurrent write failed: {}", e),
        }
    }

    assert_eq!(created.len(), WRITERS);
    assert_eq!(store.list_tasks_for_list(keep).await.unwrap().len(), WRITERS);
    let remaining: Vec<_> = store.list_all_lists().await.unwrap().into_iter().map(|l| l.id).collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&keep));
    for id in doomed {
        assert!(store.list_tasks_for_list(id).await.unwrap().is_empty());
    }

    store.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_tasks_racing_a_list_delete_leave_no_orphans() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = open_file_store(&dir).await;
    let list = store.create_list("Short lived").await.unwrap();

    let mut writes = JoinSet::new();
    for i in 0..50 {
        let store = store.clone();
        writes.spawn(async move { store.create_task(list, &format!("task {}", i)).await.err() });
    }
    let deleter = store.clone();
    writes.spawn(async move { deleter.delete_list(list).await.err() });

    while let Some(joined) = writes.join_next().await {
        if let Some(e) = joined.expect("writer panicked") {
            // tasks arriving after the delete see a missing list, nothing else
            assert!(
                matches!(e, tasklists::error::AppError::NotFound { id, .. } if id == list),
                "unexpected error: {}",
                e
            );
        }
    }

    assert!(store.get_list(list).await.is_err());
    assert!(store.list_tasks_for_list(list).await.unwrap().is_empty());

    store.close().await;
}
