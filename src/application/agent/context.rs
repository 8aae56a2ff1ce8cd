use crate::types::{PromptDescriptor, ResourceDescriptor, ToolDescriptor};

/// Everything the registry advertises, fetched once per conversation turn.
pub struct CapabilityListings {
    pub tools: Vec<ToolDescriptor>,
    pub prompts: Vec<PromptDescriptor>,
    pub resources: Vec<ResourceDescriptor>,
}

/// Builds the system message that teaches the model which capabilities
/// exist and how to request them. Listing order is tools, prompts,
/// resources; within each section the registry's advertised order is kept.
pub fn compose_system_context(listings: &CapabilityListings) -> String {
    let mut context = String::from(
        "You are a helpful library assistant. You have access to the following capabilities:\n",
    );

    context.push_str("\nTOOLS (use these to perform actions):\n");
    for tool in &listings.tools {
        context.push_str(&format!("\n- {}: {}\n", tool.name, tool.description));
        if let Ok(schema) = serde_json::to_string(&tool.input_schema) {
            context.push_str(&format!("  Input: {schema}\n"));
        }
    }

    context.push_str("\nPROMPTS (use these for specialized templates):\n");
    for prompt in &listings.prompts {
        context.push_str(&format!("\n- {}: {}\n", prompt.name, prompt.description));
        context.push_str(&format!("  Arguments: {}\n", describe_arguments(prompt)));
    }

    context.push_str("\nRESOURCES (available data):\n");
    for resource in &listings.resources {
        context.push_str(&format!("\n- {}: {}\n", resource.uri, resource.description));
    }

    context.push_str(
        r#"
IMPORTANT: When you need to use a tool, respond with JSON in this exact format:
{"action": "tool", "tool_name": "<name>", "arguments": {<key>: <value>}}

When you need to use a prompt template, respond with:
{"action": "prompt", "prompt_name": "<name>", "arguments": {<key>: <value>}}

When you have a final answer for the user, respond normally without JSON.
"#,
    );

    context
}

fn describe_arguments(prompt: &PromptDescriptor) -> String {
    if prompt.arguments.is_empty() {
        return "none".to_string();
    }
    prompt
        .arguments
        .iter()
        .map(|arg| {
            if arg.required {
                arg.name.clone()
            } else {
                format!("{} (optional)", arg.name)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
