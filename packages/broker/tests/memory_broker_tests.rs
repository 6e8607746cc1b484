use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use broker::{Broker, BrokerError, MemoryBroker};

#[tokio::test]
async fn pop_takes_from_the_head() -> Result<(), Box<dyn Error>> {
    let broker = MemoryBroker::new();
    broker.enqueue("in", "first");
    broker.enqueue("in", "second");

    assert_eq!(broker.pop("in", Duration::from_millis(10)).await?, Some(b"first".to_vec()));
    assert_eq!(broker.pop("in", Duration::from_millis(10)).await?, Some(b"second".to_vec()));
    assert!(broker.is_empty("in"));
    Ok(())
}

#[tokio::test]
async fn push_prepends_like_lpush() -> Result<(), Box<dyn Error>> {
    let broker = MemoryBroker::new();
    broker.push("out", b"a").await?;
    broker.push("out", b"b").await?;

    assert_eq!(broker.drain("out"), vec![b"b".to_vec(), b"a".to_vec()]);
    assert_eq!(broker.len("out"), 0);
    Ok(())
}

#[tokio::test]
async fn pop_times_out_on_empty_list() -> Result<(), Box<dyn Error>> {
    let broker = MemoryBroker::new();
    let popped = broker.pop("in", Duration::from_millis(20)).await?;
    assert_eq!(popped, None);
    Ok(())
}

#[tokio::test]
async fn blocked_pop_wakes_on_push() -> Result<(), Box<dyn Error>> {
    let broker = Arc::new(MemoryBroker::new());

    let waiter = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.pop("in", Duration::ZERO).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    broker.push("in", b"job").await?;

    let popped = tokio::time::timeout(Duration::from_secs(2), waiter).await???;
    assert_eq!(popped, Some(b"job".to_vec()));
    Ok(())
}

#[tokio::test]
async fn scripted_faults_apply_in_order() -> Result<(), Box<dyn Error>> {
    let broker = MemoryBroker::new();
    broker.enqueue("in", "job");
    broker.time_out_next_pops(1);
    broker.fail_next_pops(1);

    assert_eq!(broker.pop("in", Duration::from_secs(5)).await?, None);
    let err = broker
        .pop("in", Duration::from_secs(5))
        .await
        .expect_err("scripted pop failure");
    assert!(matches!(err, BrokerError::Injected(_)));
    assert!(!err.is_connection());
    assert_eq!(broker.pop("in", Duration::from_secs(5)).await?, Some(b"job".to_vec()));
    Ok(())
}

#[tokio::test]
async fn failing_pushes_leave_the_list_untouched() -> Result<(), Box<dyn Error>> {
    let broker = MemoryBroker::new();
    broker.fail_next_pushes(1);

    assert!(broker.push("out", b"x").await.is_err());
    assert!(broker.is_empty("out"));

    broker.push("out", b"x").await?;
    assert_eq!(broker.list_names(), vec!["out".to_string()]);
    Ok(())
}
