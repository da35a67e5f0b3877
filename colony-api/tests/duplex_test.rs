// Integration tests for colony_api::duplex across async tasks

use std::time::Duration;

use colony_api::{CancelWorkSignal, Duplex};

#[tokio::test]
async fn test_reader_ends_when_duplex_closed() {
    let duplex = Duplex::<usize>::new(8);
    let reader = duplex.reader();

    let consumer = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Ok(item) = reader.recv_async().await {
            seen.push(item);
        }
        seen
    });

    let writer = duplex.writer().expect("open duplex");
    for i in 0..5 {
        writer.send_async(i).await.unwrap();
    }
    drop(writer);
    duplex.close();

    let seen = tokio::time::timeout(Duration::from_secs(1), consumer)
        .await
        .expect("consumer should finish")
        .unwrap();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_writer_view_keeps_channel_open() {
    let duplex = Duplex::<CancelWorkSignal>::new(1);
    let writer = duplex.writer().unwrap();
    duplex.close();

    writer.send_async(CancelWorkSignal).await.unwrap();
    assert_eq!(duplex.reader().recv_async().await.unwrap(), CancelWorkSignal);

    drop(writer);
    assert!(duplex.reader().recv_async().await.is_err());
}
