use kfktools_client::{ConnectionConfig, ConsumerClient, Error, Message, ProducerClient};

/// Example sending a few keyed messages and reading them back
///
/// This example shows how to:
/// 1. Build a connection config
/// 2. Send a batch of keyed messages with a producer client
/// 3. Subscribe with a consumer client and read the messages back
/// 4. Stop the consumer from a Ctrl+C handler through its close handle
///
/// To run this example:
/// 1. Start Kafka with Docker
///   docker run -d --name kafka -p 9092:9092 apache/kafka:latest
/// 2. Run the example
///   cargo run -p kfktools-client --example round_trip

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    match run_main().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e} ({})", e.kind());
            std::process::exit(1);
        }
    }
}

async fn run_main() -> kfktools_client::Result<()> {
    let topic = "user-events";
    let config = ConnectionConfig::new().with("bootstrap.servers", "localhost:9092");

    let producer = ProducerClient::new(&config)?;
    let batch = vec![
        Message::keyed(topic, "user_001", "login"),
        Message::keyed(topic, "user_002", "signup"),
        Message::keyed(topic, "user_001", "purchase"),
    ];
    producer.send(&batch).await?;
    producer.close()?;
    println!("Published {} messages to '{topic}'", batch.len());

    let consumer = ConsumerClient::new(
        &config
            .clone()
            .with("group.id", "round-trip-example")
            .with("auto.offset.reset", "earliest"),
    )?;
    let closer = consumer.close_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            closer.close();
        }
    });

    println!("Listening on '{topic}'. Press Ctrl+C to stop.");
    let mut subscription = consumer.listen_to(topic).await?;
    loop {
        match subscription.next_message().await {
            Ok(message) => println!(
                "[Partition {:?} Offset {:?}] {} => {}",
                message.partition,
                message.offset,
                String::from_utf8_lossy(message.key().unwrap_or_default()),
                String::from_utf8_lossy(message.value())
            ),
            Err(Error::Closed) => break,
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
