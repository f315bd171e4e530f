//! System-instruction construction for the round loop.

use kite_mcp::{McpServerConfig, ToolDescriptor};

/// Instruction advertising the built-in app-developer tool.
pub const APP_DEV_INSTRUCTION: &str = "\
You can build small self-contained HTML mini-apps with the built-in `app_developer` tool.
To use it, emit a block exactly like:
<mcp_call>{\"toolName\": \"app_developer\", \"arguments\": {\"mode\": \"create\", \"name\": \"...\", \"description\": \"...\", \"style\": \"...\", \"features\": [\"...\"]}}</mcp_call>
For changes to an existing app use mode \"edit\" with \"targetAppId\" (or \"targetAppName\", or \"latest\") and \"editRequest\".
Only call the tool when the user asks for an app; answer normally otherwise.";

/// Instruction advertising the currently available MCP tools.
pub fn mcp_instruction(servers: &[(McpServerConfig, Vec<ToolDescriptor>)]) -> Option<String> {
    let mut listing = String::new();
    for (server, tools) in servers {
        if !server.enabled || tools.is_empty() {
            continue;
        }
        for tool in tools {
            listing.push_str(&format!(
                "- serverId: {}, toolName: {}{}\n",
                server.id,
                tool.name,
                tool.description
                    .as_deref()
                    .map(|d| format!(" — {d}"))
                    .unwrap_or_default()
            ));
        }
    }
    if listing.is_empty() {
        return None;
    }
    Some(format!(
        "You can call external tools. Available tools:\n{listing}\
To call one, emit a block exactly like:\n\
<mcp_call>{{\"serverId\": \"...\", \"toolName\": \"...\", \"arguments\": {{...}}}}</mcp_call>\n\
You may emit several blocks. Results will be provided before you answer. Do not invent tools."
    ))
}

/// Self-correction message sent when extracted call blocks failed to parse.
pub fn corrective_message(raw_sample: &str) -> String {
    let sample: String = raw_sample.chars().take(200).collect();
    format!(
        "Your previous tool call could not be parsed: `{sample}`. \
Emit a single <mcp_call> block containing valid JSON with the fields \
\"toolName\", \"serverId\" and \"arguments\", and nothing else inside the block."
    )
}

/// Prompt for the detached conversation-title task.
pub fn title_prompt(first_user: &str, first_answer: &str) -> String {
    format!(
        "Write a title of at most six words for this conversation. \
Reply with the title only, no quotes.\n\nUser: {first_user}\n\nAssistant: {first_answer}"
    )
}

/// Prompt for the detached memory-candidate task.
pub fn memory_prompt(user_text: &str, answer_text: &str) -> String {
    format!(
        "Extract one short durable fact about the user from this exchange, \
useful for future conversations (preferences, context, ongoing projects). \
Reply with the fact as a single sentence, or exactly NONE if there is nothing worth keeping.\n\n\
User: {user_text}\n\nAssistant: {answer_text}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_instruction_lists_enabled_servers_only() {
        let servers = vec![
            (
                McpServerConfig {
                    id: "fs".to_string(),
                    name: "Files".to_string(),
                    enabled: true,
                    endpoint: String::new(),
                },
                vec![ToolDescriptor {
                    name: "read".to_string(),
                    description: Some("Read a file".to_string()),
                    parameters: serde_json::json!({}),
                }],
            ),
            (
                McpServerConfig {
                    id: "off".to_string(),
                    name: "Disabled".to_string(),
                    enabled: false,
                    endpoint: String::new(),
                },
                vec![ToolDescriptor {
                    name: "x".to_string(),
                    description: None,
                    parameters: serde_json::json!({}),
                }],
            ),
        ];
        let text = mcp_instruction(&servers).unwrap();
        assert!(text.contains("serverId: fs, toolName: read — Read a file"));
        assert!(!text.contains("off"));
    }

    #[test]
    fn no_tools_means_no_instruction() {
        assert!(mcp_instruction(&[]).is_none());
    }

    #[test]
    fn corrective_message_truncates_sample() {
        let msg = corrective_message(&"y".repeat(500));
        assert!(msg.len() < 450);
        assert!(msg.contains("could not be parsed"));
    }
}
