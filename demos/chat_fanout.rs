//! Chat fan-out demo
//!
//! Run with: cargo run --example chat_fanout [READERS] [MESSAGES]
//!
//! Examples:
//!   cargo run --example chat_fanout            # 3 readers, 5 messages
//!   cargo run --example chat_fanout 10 100     # 10 readers, 100 messages
//!
//! Each reader runs the same delivery loop a server-streaming handler
//! would, forwarding new message IDs into its own mpsc "connection". One
//! reader hangs up half way to show that the others keep receiving and
//! that the channel's topic is reclaimed once everyone has left.
//!
//! Set `RUST_LOG=chat_fanout=trace` to watch registrations and teardown.

use std::time::Duration;

use chat_fanout::chat::{ChannelId, ChatService, MemoryStore, MessageBroker, MessageId, UserId};
use chat_fanout::{DeliveryPolicy, RegistryConfig};
use tokio::sync::{mpsc, oneshot};

fn print_usage() {
    eprintln!("Usage: chat_fanout [READERS] [MESSAGES]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  READERS     Number of streaming readers (default: 3)");
    eprintln!("  MESSAGES    Number of messages to send (default: 5)");
}

fn parse_count(arg: Option<&String>, default: usize) -> Result<usize, String> {
    match arg {
        Some(s) => s
            .parse()
            .map_err(|_| format!("Invalid count: '{}'. Expected a positive integer", s)),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let (readers, messages) = match (parse_count(args.get(1), 3), parse_count(args.get(2), 5)) {
        (Ok(r), Ok(m)) => (r, m),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_fanout=debug".parse()?),
        )
        .init();

    let broker = MessageBroker::with_config(
        RegistryConfig::default()
            .subscriber_capacity(messages.max(1))
            .delivery(DeliveryPolicy::DropNewest),
    );
    let service = std::sync::Arc::new(ChatService::new(MemoryStore::new(), broker));
    let channel = ChannelId::new();
    let author = UserId::new();

    println!("Channel {} with {} readers", channel, readers);
    println!();

    let mut hangups = Vec::with_capacity(readers);
    let mut handles = Vec::with_capacity(readers);

    for reader in 0..readers {
        let (hangup_tx, hangup_rx) = oneshot::channel::<()>();
        let (mut conn_tx, mut conn_rx) = mpsc::channel::<MessageId>(16);
        hangups.push(Some(hangup_tx));

        let service = std::sync::Arc::clone(&service);
        let channel_text = channel.to_string();
        handles.push(tokio::spawn(async move {
            let stream = async move {
                let report = service
                    .stream_new_messages(&channel_text, &mut conn_tx, async {
                        let _ = hangup_rx.await;
                    })
                    .await;
                // Closing the connection lets the printer finish
                drop(conn_tx);
                report
            };
            let print = async {
                while let Some(id) = conn_rx.recv().await {
                    println!("[reader {}] new message {}", reader, id);
                }
            };

            let (report, ()) = tokio::join!(stream, print);
            report
        }));
    }

    // Wait for every stream to be registered
    while service
        .broker()
        .topic_stats(&channel)
        .map_or(0, |stats| stats.outputs)
        < readers
    {
        tokio::task::yield_now().await;
    }

    for n in 0..messages {
        if n == messages / 2 {
            if let Some(hangup) = hangups.first_mut().and_then(Option::take) {
                println!("[reader 0] hanging up");
                let _ = hangup.send(());
            }
        }

        let id = service
            .send_message(author, channel, format!("message {}", n))
            .await?;
        println!("[sender] posted {}", id);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    for hangup in hangups.iter_mut().filter_map(Option::take) {
        let _ = hangup.send(());
    }

    for (reader, handle) in handles.into_iter().enumerate() {
        let report = handle.await??;
        println!(
            "[reader {}] stopped ({:?}) after {} messages",
            reader, report.stop, report.forwarded
        );
    }

    println!();
    println!(
        "Topics left: {}, messages stored: {}",
        service.broker().topic_count(),
        service.store().len().await
    );

    Ok(())
}
