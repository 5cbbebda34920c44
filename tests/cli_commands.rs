//! `consume` and `produce` commands against the in-process broker.

use kfktools::consume::{self, ConsumeArgs, OutputFormat};
use kfktools::produce::{self, ProduceArgs};
use kfktools_client::memory::MemoryBroker;
use kfktools_client::{ConsumerClient, ProducerClient};
use kfktools_syntax::SyntaxError;
use std::io::Cursor;
use std::time::Duration;

fn produce_args(topic: &str, key_delimiter: Option<char>, batch_size: usize) -> ProduceArgs {
    ProduceArgs {
        topic: topic.to_string(),
        key_delimiter,
        batch_size,
        input: None,
    }
}

fn consume_args(topic: &str, max_messages: Option<u64>) -> ConsumeArgs {
    ConsumeArgs {
        topic: topic.to_string(),
        max_messages,
        format: OutputFormat::Text,
        key_delimiter: Some(':'),
    }
}

#[tokio::test]
async fn test_produce_then_consume() {
    let broker = MemoryBroker::new();
    let producer = ProducerClient::with_backend(broker.producer());

    let input = "user_001:login\nuser_002:signup\nuser_001:purchase\n";
    let sent = produce::run(&producer, &produce_args("events", Some(':'), 2), Cursor::new(input))
        .await
        .unwrap();
    assert_eq!(sent, 3);
    producer.close().unwrap();

    let consumer = ConsumerClient::with_backend(broker.consumer());
    let mut out = Vec::new();
    let count = consume::run(&consumer, &consume_args("events", Some(3)), &mut out)
        .await
        .unwrap();
    assert_eq!(count, 3);
    assert_eq!(String::from_utf8(out).unwrap(), input);
}

#[tokio::test]
async fn test_malformed_line_stops_before_its_batch() {
    let broker = MemoryBroker::new();
    let producer = ProducerClient::with_backend(broker.producer());

    let input = "a:1\nb:2\nc:3\nbroken\n";
    let err = produce::run(&producer, &produce_args("t", Some(':'), 2), Cursor::new(input))
        .await
        .unwrap_err();

    let syntax = err
        .downcast_ref::<SyntaxError>()
        .expect("expected a syntax error");
    assert_eq!(syntax.position(), Some((4, 7)));
    assert!(format!("{err:#}").contains("missing key delimiter ':' at 4:7"));

    // First batch went out, the one holding the bad line did not
    assert_eq!(broker.messages("t").len(), 2);
}

#[tokio::test]
async fn test_consume_ends_when_closed() {
    let broker = MemoryBroker::new();
    broker.create_topic("quiet", 1);
    let consumer = ConsumerClient::with_backend(broker.consumer());
    let closer = consumer.close_handle();

    let mut out = Vec::<u8>::new();
    let args = consume_args("quiet", None);
    let (count, ()) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(
            consume::run(&consumer, &args, &mut out),
            async {
                // The command subscribes and parks on the empty topic first
                tokio::task::yield_now().await;
                closer.close();
            }
        )
    })
    .await
    .expect("closing must end the command");
    let count = count.unwrap();
    assert_eq!(count, 0);
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_consume_closed_before_subscribing() {
    let broker = MemoryBroker::new();
    broker.create_topic("quiet", 1);
    let consumer = ConsumerClient::with_backend(broker.consumer());
    consumer.close();

    let mut out = Vec::<u8>::new();
    let count = consume::run(&consumer, &consume_args("quiet", None), &mut out)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_consume_unknown_topic_fails() {
    let broker = MemoryBroker::new();
    let consumer = ConsumerClient::with_backend(broker.consumer());

    let err = consume::run(&consumer, &consume_args("missing", Some(1)), &mut Vec::<u8>::new())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Failed to subscribe to topic 'missing'"));
}

#[tokio::test]
async fn test_produce_after_close_fails() {
    let broker = MemoryBroker::new();
    let producer = ProducerClient::with_backend(broker.producer());
    producer.close().unwrap();

    let err = produce::run(&producer, &produce_args("t", None, 10), Cursor::new("x\n"))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("Client is closed"));
}
