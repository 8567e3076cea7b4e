//! One-shot question

use colored::*;
use recall_core::ai::ChatMessage;

use super::print_memories;
use crate::app::Components;

pub async fn run(components: &Components, user: &str, message: &str, json: bool) -> anyhow::Result<()> {
    let orchestrator = components.orchestrator();
    let result = orchestrator
        .process_message(&[ChatMessage::user(message)], user)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_memories(&result.memories_used);
        if result.is_error() {
            println!("{}", result.response.red());
        } else {
            println!("{}", result.response);
        }
    }

    if result.is_error() {
        anyhow::bail!("no response generated");
    }
    Ok(())
}
