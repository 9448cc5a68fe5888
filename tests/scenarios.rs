mod common;

use std::collections::HashMap;
use std::time::Duration;

use common::{start_server, wait_until};
use ledgerchat::Client;
use tempfile::TempDir;

#[tokio::test]
async fn uploaded_file_is_saved_and_recorded() {
    let files = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let (addr, context) = start_server(files.path()).await;

    let path = source.path().join("notes.txt");
    std::fs::write(&path, "hello").unwrap();

    let mut client = Client::connect(addr, "alice".to_string()).await.unwrap();
    let hash = client.upload(&path).await.unwrap();

    let watched = context.clone();
    wait_until(move || {
        let context = watched.clone();
        async move {
            context
                .ledger
                .records()
                .await
                .map(|records| !records.is_empty())
                .unwrap_or(false)
        }
    })
    .await;

    assert_eq!(std::fs::read(files.path().join("notes.txt")).unwrap(), b"hello");
    assert_eq!(
        std::fs::read_to_string(context.ledger.path()).unwrap(),
        format!("Merkel File\nnotes.txt:{hash}\n")
    );
}

#[tokio::test]
async fn large_upload_arrives_whole() {
    let files = TempDir::new().unwrap();
    let source = TempDir::new().unwrap();
    let (addr, context) = start_server(files.path()).await;

    let contents: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let path = source.path().join("big.bin");
    std::fs::write(&path, &contents).unwrap();

    let mut client = Client::connect(addr, "bob".to_string()).await.unwrap();
    let hash = client.upload(&path).await.unwrap();

    let watched = context.clone();
    wait_until(move || {
        let context = watched.clone();
        async move {
            context
                .ledger
                .records()
                .await
                .map(|records| records.iter().any(|(name, _)| name == "big.bin"))
                .unwrap_or(false)
        }
    })
    .await;

    assert_eq!(std::fs::read(files.path().join("big.bin")).unwrap(), contents);
    assert_eq!(
        context.ledger.records().await.unwrap(),
        vec![("big.bin".to_string(), hash)]
    );
}

#[tokio::test]
async fn concurrent_chat_lines_stay_whole() {
    let files = TempDir::new().unwrap();
    let (addr, context) = start_server(files.path()).await;
    let mut feed = context.subscribe_chat();

    let mut tasks = Vec::new();
    for name in ["alice", "bob"] {
        let input: String = (0..100).map(|i| format!("line {i} from {name}\n")).collect();
        tasks.push(tokio::spawn(async move {
            let client = Client::connect(addr, name.to_string()).await.unwrap();
            client.run(input.as_bytes(), tokio::io::sink()).await.unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let mut per_peer: HashMap<_, Vec<String>> = HashMap::new();
    for _ in 0..200 {
        let line = tokio::time::timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("chat line not received in time")
            .unwrap();
        per_peer.entry(line.peer).or_default().push(line.text);
    }

    assert_eq!(per_peer.len(), 2);
    for lines in per_peer.values() {
        let name = lines[0].split(':').next().unwrap().to_string();
        let expected: Vec<String> = (0..100)
            .map(|i| format!("{name}: line {i} from {name}"))
            .collect();
        assert_eq!(lines, &expected);
    }
}

#[tokio::test]
async fn exit_closes_the_connection() {
    let files = TempDir::new().unwrap();
    let (addr, context) = start_server(files.path()).await;
    let mut feed = context.subscribe_chat();

    let client = Client::connect(addr, "carol".to_string()).await.unwrap();
    client
        .run(&b"hi\nexit\nafter exit\n"[..], tokio::io::sink())
        .await
        .unwrap();

    let line = tokio::time::timeout(Duration::from_secs(5), feed.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.text, "carol: hi");

    let registry = context.registry.clone();
    wait_until(move || {
        let registry = registry.clone();
        async move { registry.is_empty().await }
    })
    .await;

    assert!(feed.try_recv().is_err());
}
