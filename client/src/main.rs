//! Confab Terminal Client
//!
//! Line-oriented chat surface over [`confab_client::ChatClient`]: reads a
//! line from stdin, streams the reply to stdout as it arrives.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local daemon
//! confab
//!
//! # Talk to a remote daemon
//! CONFAB_SERVER=https://relay.example.net confab
//! ```
//!
//! # Environment Variables
//!
//! - `CONFAB_SERVER`: daemon base URL (default: http://127.0.0.1:3000)
//! - `RUST_LOG`: log level (trace, debug, info, warn, error)

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use confab_client::{ChatClient, HttpTransport};
use confab_core::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("confab_client=warn".parse()?),
        )
        .init();

    let transport = HttpTransport::from_env();
    let mut client = ChatClient::new(transport);

    if let Some(greeting) = client.conversation().first() {
        println!("assistant> {}", greeting.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "/quit" {
            break;
        }

        print!("assistant> ");
        std::io::stdout().flush()?;

        // Print only what the last refresh hasn't printed yet
        let mut printed = 0;
        client
            .send_turn(text, |messages| match messages.last() {
                Some(m) if m.role == Role::System => {
                    println!();
                    println!("{}", m.content);
                }
                _ => {
                    if let Some(m) = messages.iter().rev().find(|m| m.role == Role::Assistant) {
                        let delta = &m.content[printed..];
                        if !delta.is_empty() {
                            print!("{delta}");
                            std::io::stdout().flush().ok();
                            printed = m.content.len();
                        }
                    }
                }
            })
            .await;
        println!();
    }

    Ok(())
}
