//! Voice agent session driven by a callback.
//!
//! Demonstrates:
//! - Sending custom `Settings` on connect
//! - Answering client-side function calls from a callback
//! - Injecting an agent message
//!
//! Usage:
//!   cargo run --example 002_voice_agent
//!   cargo run --example 002_voice_agent -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;
use common::Args;
use serde_json::json;
use tokio::sync::mpsc;
use voxstream::agent::{
    AgentCallback, AgentClient, AgentSettings, ConversationTextResponse, FunctionCallRequest,
    FunctionCallResponse, FunctionDefinition, WelcomeResponse,
};
use voxstream::{ClientOptions, ErrorResponse};

// ============================================================================
// Callback
// ============================================================================

/// Prints the conversation and queues client-side function calls.
struct Console {
    calls: mpsc::UnboundedSender<FunctionCallResponse>,
}

#[async_trait]
impl AgentCallback for Console {
    async fn welcome(&self, welcome: WelcomeResponse) -> voxstream::Result<()> {
        println!("    [welcome] {}", welcome.request_id);
        Ok(())
    }

    async fn conversation_text(&self, text: ConversationTextResponse) -> voxstream::Result<()> {
        println!("    [{}] {}", text.role, text.content);
        Ok(())
    }

    async fn function_call_request(&self, request: FunctionCallRequest) -> voxstream::Result<()> {
        for call in request.functions.into_iter().filter(|f| f.client_side) {
            let content = json!({"city": call.arguments, "forecast": "sunny"}).to_string();
            let _ = self
                .calls
                .send(FunctionCallResponse::new(call.id, call.name, content));
        }
        Ok(())
    }

    async fn audio(&self, audio: Bytes) -> voxstream::Result<()> {
        tracing::debug!(bytes = audio.len(), "agent audio");
        Ok(())
    }

    async fn error(&self, error: ErrorResponse) -> voxstream::Result<()> {
        eprintln!("    [error] {} {}", error.err_code, error.description);
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== 002: Voice Agent ===\n");

    let options = ClientOptions::builder()
        .keep_alive(true)
        .verbosity(common::verbosity(args.debug))
        .build()?;
    let settings = AgentSettings::new()
        .with_prompt("You are a weather assistant. Keep answers short.")
        .with_greeting("Hello! Ask me about the weather.")
        .with_function(FunctionDefinition {
            name: "get_weather".into(),
            description: "Current weather for a city".into(),
            parameters: json!({
                "type": "object",
                "properties": {"city": {"type": "string"}},
                "required": ["city"]
            }),
            endpoint: None,
        });

    let (calls_tx, mut calls_rx) = mpsc::unbounded_channel();
    let client = AgentClient::with_callback(options, settings, Console { calls: calls_tx });
    let client = Arc::new(client);

    println!("[1] Connecting...");
    if !client.connect().await? {
        bail!("could not connect");
    }
    println!("    ✓ Connected\n");

    let responder = tokio::spawn({
        let client = Arc::clone(&client);
        async move {
            while let Some(response) = calls_rx.recv().await {
                if let Err(e) = client.function_call_response(&response).await {
                    eprintln!("    [error] function response: {e}");
                }
            }
        }
    });

    println!("[2] Injecting a message...");
    client
        .inject_agent_message("What city would you like the weather for?")
        .await?;

    tokio::time::sleep(Duration::from_secs(10)).await;
    client.stop().await;
    responder.abort();

    println!("\n=== Done ===");
    Ok(())
}
