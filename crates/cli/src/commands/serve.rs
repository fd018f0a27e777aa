//! `careerchat serve` — Start the HTTP chat API.

use careerchat_agent::ChatService;
use careerchat_core::event::DomainEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{load_config, require_api_key};

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;
    require_api_key(&config)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    let service = Arc::new(ChatService::from_config(&config).map_err(|e| format!("Startup failed: {e}"))?);
    tokio::spawn(log_events(service.events().subscribe()));

    println!("careerchat gateway");
    println!("   Persona:   {}", service.persona().name);
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);

    careerchat_gateway::serve(service, &config.gateway).await?;

    Ok(())
}

/// Mirror domain events into the log.
async fn log_events(mut rx: broadcast::Receiver<Arc<DomainEvent>>) {
    loop {
        match rx.recv().await {
            Ok(event) => match event.as_ref() {
                DomainEvent::DraftGenerated {
                    session_id,
                    attempt,
                    chars,
                    tool_calls,
                    ..
                } => debug!(%session_id, attempt, chars, tool_calls, "event: draft"),
                DomainEvent::VerdictIssued {
                    session_id,
                    attempt,
                    outcome,
                    ..
                } => debug!(%session_id, attempt, %outcome, "event: verdict"),
                DomainEvent::ToolExecuted {
                    session_id,
                    tool_name,
                    success,
                    deduplicated,
                    duration_ms,
                    ..
                } => info!(%session_id, tool = %tool_name, success, deduplicated, duration_ms, "event: tool"),
                DomainEvent::BackendFailure {
                    session_id,
                    stage,
                    error_message,
                    ..
                } => warn!(%session_id, stage = %stage, error = %error_message, "event: backend failure"),
                DomainEvent::TurnCompleted {
                    session_id,
                    attempts,
                    forced_accept,
                    degraded,
                    duration_ms,
                    ..
                } => info!(%session_id, attempts, forced_accept, degraded, duration_ms, "event: turn"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event log fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
