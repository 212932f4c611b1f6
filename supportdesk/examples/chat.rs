//! Interactive streaming chat against a running backend.
//!
//! Run with:
//! ```bash
//! SUPPORTDESK_API_BASE_URL=http://localhost:8000 cargo run --example chat -- "Where is my order?"
//! ```

use std::io::{self, Write};
use supportdesk::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&TelemetryConfig::default())?;

    let message = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let message = if message.trim().is_empty() {
        "Hello!".to_string()
    } else {
        message
    };

    let config = ClientConfig::from_env()?;
    let controller = ChatStreamController::from_config(&config)?;

    println!("> {message}\n");

    let handle = controller.open(
        ChatRequest::new(config.user_id.clone(), message),
        Callbacks::new(
            |chunk| {
                print!("{chunk}");
                let _ = io::stdout().flush();
            },
            || println!("\n\n[done]"),
            |err| eprintln!("\n[error] {err}"),
        )
        .with_thinking(|phase, text| eprintln!("[{}] {text}", phase.label())),
    );

    tokio::select! {
        state = handle.finished() => println!("session ended: {state}"),
        _ = tokio::signal::ctrl_c() => println!("\ninterrupted"),
    }
    Ok(())
}
