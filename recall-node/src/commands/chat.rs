//! Interactive chat session
//!
//! 逐行读取 stdin，保留会话历史。支持的命令：
//!
//! - `/clear`: 删除当前用户的全部记忆
//! - `/stats`: 打印性能与缓存统计
//! - `/quit`: 退出

use std::io::Write;
use std::sync::Arc;

use colored::*;
use recall_core::ai::ChatMessage;
use recall_core::memory::{MemoryCache, MemoryOrchestrator};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use super::{print_memories, print_statistics};
use crate::app::Components;

/// 会话内命令
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    Clear,
    Stats,
    Quit,
    Empty,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/clear" => Input::Clear,
        "/stats" => Input::Stats,
        "/quit" | "/exit" => Input::Quit,
        cmd if cmd.starts_with('/') => Input::Unknown(cmd),
        text => Input::Message(text),
    }
}

/// 定期清理过期缓存条目，缓存禁用时不启动
fn spawn_cache_sweeper(cache: &Arc<MemoryCache>) -> Option<JoinHandle<()>> {
    let config = cache.config();
    if config.effective_capacity() == 0 {
        return None;
    }
    Some(Arc::clone(cache).start_expiration_task(config.default_ttl))
}

fn prompt() -> std::io::Result<()> {
    print!("{} ", "you>".green().bold());
    std::io::stdout().flush()
}

pub async fn run(
    components: &Components,
    user: &str,
    show_memories: bool,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = components.orchestrator();
    let sweeper = spawn_cache_sweeper(orchestrator.cache());
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if !json {
        println!("Chatting as {} (/clear, /stats, /quit)", user.bold());
        prompt()?;
    }

    while let Some(line) = lines.next_line().await? {
        match parse_input(&line) {
            Input::Quit => break,
            Input::Empty => {}
            Input::Clear => clear(&orchestrator, user, &mut history, json).await,
            Input::Stats => {
                if json {
                    let report = serde_json::json!({
                        "operations": orchestrator.monitor().all_statistics(),
                        "cache": orchestrator.cache_stats(),
                    });
                    println!("{}", report);
                } else {
                    print_statistics(orchestrator.monitor(), &orchestrator.cache_stats());
                }
            }
            Input::Unknown(cmd) => eprintln!("{} unknown command {}", "Warning:".yellow().bold(), cmd),
            Input::Message(text) => {
                history.push(ChatMessage::user(text));
                let result = orchestrator.process_message(&history, user).await;

                if result.is_error() {
                    // keep the failed turn out of the next prompt
                    history.pop();
                } else {
                    history.push(ChatMessage::assistant(result.response.clone()));
                }

                if json {
                    println!("{}", serde_json::to_string(&result)?);
                } else {
                    if show_memories {
                        print_memories(&result.memories_used);
                    }
                    let label = "recall>".cyan().bold();
                    if result.is_error() {
                        println!("{} {}", label, result.response.red());
                    } else {
                        println!("{} {}", label, result.response);
                    }
                }
            }
        }

        if !json {
            prompt()?;
        }
    }

    if let Some(handle) = sweeper {
        handle.abort();
    }

    if !json {
        println!();
        print_statistics(orchestrator.monitor(), &orchestrator.cache_stats());
    }
    Ok(())
}

async fn clear(
    orchestrator: &MemoryOrchestrator,
    user: &str,
    history: &mut Vec<ChatMessage>,
    json: bool,
) {
    let cleared = orchestrator.clear_memories(user).await;
    if cleared {
        history.clear();
    }

    if json {
        println!("{}", serde_json::json!({ "user_id": user, "cleared": cleared }));
    } else if cleared {
        println!("{} Memories cleared", "✓".green());
    } else {
        println!("{} Failed to clear memories", "Error:".red().bold());
    }
}
