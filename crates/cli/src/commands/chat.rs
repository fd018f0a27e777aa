//! `careerchat chat` — Interactive or single-message chat mode.

use careerchat_agent::ChatService;
use careerchat_core::draft::TurnReply;
use careerchat_core::message::SessionId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::{load_config, require_api_key};

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    require_api_key(&config)?;

    let service = ChatService::from_config(&config).map_err(|e| format!("Startup failed: {e}"))?;
    let session = SessionId::new();

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let reply = service.handle_turn(&session, &msg).await?;
        eprint!("\r              \r");
        println!("{}", reply.reply_text);
        print_flags(&reply);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  careerchat — Interactive Mode");
    println!();
    println!("  Persona:   {}", service.persona().name);
    println!("  Model:     {} ({})", config.default_model, config.default_provider);
    let (evaluator_provider, evaluator_model) = config.evaluator_target();
    println!("  Evaluator: {evaluator_model} ({evaluator_provider})");
    println!(
        "  Tools:     {}",
        service
            .enabled_tools()
            .iter()
            .map(|k| k.name())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Context:   version {} (~{} tokens)",
        service.context().version,
        service.context().estimated_tokens()
    );
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if !line.is_empty() {
            eprint!("  ...");
            match service.handle_turn(&session, line).await {
                Ok(reply) => {
                    eprint!("\r     \r");
                    println!();
                    for text in reply.reply_text.lines() {
                        println!("  {} > {text}", service.persona().name);
                    }
                    print_flags(&reply);
                    println!();
                }
                Err(e) => {
                    eprint!("\r     \r");
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    service.end_session(&session).await;
    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn print_flags(reply: &TurnReply) {
    if reply.forced_accept {
        eprintln!("  [released after {} attempts without passing review]", reply.attempts);
    }
    if reply.degraded {
        eprintln!("  [backend unavailable; fallback reply]");
    }
}
