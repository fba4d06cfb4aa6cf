use anyhow::Context;
use bytes::Bytes;
use ferrumkv::{parse_command, Engine, EngineConfig, Reply, Subscription, Transaction};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

/// Shell session state: an open transaction, if any
#[derive(Default)]
struct Session {
    transaction: Option<Transaction>,
    in_multi: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so replies stay readable on stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path))?,
        None => EngineConfig::default(),
    };

    let engine = Engine::new(config).context("failed to start engine")?;
    info!("FerrumKV ready, reading commands from stdin");

    let mut session = Session::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt(&session)?;
    while let Some(line) = lines.next_line().await? {
        let args: Vec<Bytes> = line
            .split_whitespace()
            .map(|word| Bytes::from(word.to_string()))
            .collect();

        if !args.is_empty() {
            let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
            if name == "QUIT" || name == "EXIT" {
                break;
            }
            handle_line(&engine, &mut session, &name, &args);
        }
        prompt(&session)?;
    }

    engine.shutdown();
    Ok(())
}

fn prompt(session: &Session) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    if session.in_multi {
        write!(stdout, "ferrumkv(TX)> ")?;
    } else {
        write!(stdout, "ferrumkv> ")?;
    }
    stdout.flush()
}

fn handle_line(engine: &Engine, session: &mut Session, name: &str, args: &[Bytes]) {
    debug!("Shell command {}", name);

    match name {
        "PING" => println!("PONG"),
        "INFO" => match serde_json::to_string_pretty(&engine.stats()) {
            Ok(json) => println!("{}", json),
            Err(e) => println!("(error) ERR {}", e),
        },
        "PUBLISH" => match args {
            [_, channel, payload] => {
                let receivers = engine.publish(channel.clone(), payload.clone());
                println!("{}", Reply::count(receivers));
            }
            _ => println!("(error) ERR wrong number of arguments for 'publish' command"),
        },
        "SUBSCRIBE" | "PSUBSCRIBE" if args.len() > 1 => {
            for topic in &args[1..] {
                let subscription = if name == "SUBSCRIBE" {
                    engine.subscribe(topic.clone())
                } else {
                    engine.psubscribe(topic.clone())
                };
                println!("Subscribed to {}", String::from_utf8_lossy(topic));
                tokio::spawn(print_messages(subscription));
            }
        }
        "WATCH" if args.len() > 1 => {
            if session.in_multi {
                println!("(error) ERR WATCH inside MULTI is not allowed");
                return;
            }
            session
                .transaction
                .get_or_insert_with(|| engine.transaction())
                .watch(args[1..].iter().cloned());
            println!("OK");
        }
        "UNWATCH" => {
            if !session.in_multi {
                session.transaction = None;
            }
            println!("OK");
        }
        "MULTI" => {
            if session.in_multi {
                println!("(error) ERR MULTI calls can not be nested");
                return;
            }
            session.in_multi = true;
            session.transaction.get_or_insert_with(|| engine.transaction());
            println!("OK");
        }
        "DISCARD" => match (session.in_multi, session.transaction.take()) {
            (true, Some(mut tx)) => {
                tx.discard();
                session.in_multi = false;
                println!("OK");
            }
            _ => println!("(error) ERR DISCARD without MULTI"),
        },
        "EXEC" => match (session.in_multi, session.transaction.take()) {
            (true, Some(tx)) => {
                session.in_multi = false;
                match tx.exec() {
                    Ok(replies) => println!("{}", Reply::Array(replies)),
                    Err(e) => println!("(error) {}", e),
                }
            }
            _ => println!("(error) ERR EXEC without MULTI"),
        },
        _ => match parse_command(args) {
            Ok(command) => match session.transaction.as_mut() {
                Some(tx) if session.in_multi => {
                    tx.queue(command);
                    println!("QUEUED");
                }
                _ => match engine.execute(command) {
                    Ok(reply) => println!("{}", reply),
                    Err(e) => println!("(error) {}", e),
                },
            },
            Err(e) => println!("(error) {}", e),
        },
    }
}

/// Print every message of a subscription until it closes
async fn print_messages(mut subscription: Subscription) {
    while let Some(message) = subscription.recv().await {
        let channel = String::from_utf8_lossy(&message.channel);
        let payload = String::from_utf8_lossy(&message.payload);
        match &message.pattern {
            Some(pattern) => println!(
                "pmessage {} {} {}",
                String::from_utf8_lossy(pattern),
                channel,
                payload
            ),
            None => println!("message {} {}", channel, payload),
        }
    }
}
