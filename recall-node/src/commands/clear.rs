//! Clear a user's memories

use colored::*;

use crate::app::Components;

pub async fn run(components: &Components, user: &str, json: bool) -> anyhow::Result<()> {
    let orchestrator = components.orchestrator();
    let cleared = orchestrator.clear_memories(user).await;

    if json {
        println!(
            "{}",
            serde_json::json!({ "user_id": user, "cleared": cleared })
        );
    } else if cleared {
        println!("{} Memories cleared for {}", "✓".green(), user);
    }

    if !cleared {
        anyhow::bail!("failed to clear memories for {}", user);
    }
    Ok(())
}
