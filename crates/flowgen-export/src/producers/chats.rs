// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The `main()` entry point starting the workflow's conversations.

use minijinja::context;
use serde::Serialize;

use super::ProducerContext;
use crate::content::{ExportResult, Section};
use crate::error::Result;
use crate::imports::ImportOrigin;

const MAIN: &str = r#"def main():
    """Start chatting."""
{% if chats | length == 0 %}
    return None
{% elif chats | length == 1 %}
{% set chat = chats[0] %}
    results = {{ chat.sender }}.initiate_chat(
        {{ chat.recipient }},
{% if chat.message %}
        message={{ chat.message | pystr }},
{% endif %}
{% if chat.max_turns %}
        max_turns={{ chat.max_turns }},
{% endif %}
        summary_method={{ chat.summary_method | pystr }},
    )
    return results
{% else %}
    results = initiate_chats(
        [
{% for chat in chats %}
            {
                "sender": {{ chat.sender }},
                "recipient": {{ chat.recipient }},
{% if chat.message %}
                "message": {{ chat.message | pystr }},
{% endif %}
{% if chat.max_turns %}
                "max_turns": {{ chat.max_turns }},
{% endif %}
                "summary_method": {{ chat.summary_method | pystr }},
            },
{% endfor %}
        ]
    )
    return results
{% endif %}
"#;

pub(crate) const TEMPLATES: &[(&str, &str)] = &[("main", MAIN)];

#[derive(Serialize)]
struct ChatView<'a> {
    sender: &'a str,
    recipient: &'a str,
    message: Option<&'a str>,
    max_turns: Option<String>,
    summary_method: &'static str,
}

pub(crate) fn produce(ctx: &ProducerContext<'_>) -> Result<ExportResult> {
    let graph = ctx.graph();
    let mut result = ExportResult::new();

    let chats = graph
        .chats
        .iter()
        .map(|chat| {
            Ok(ChatView {
                sender: ctx.name_of(&chat.source_id)?,
                recipient: ctx.name_of(&chat.target_id)?,
                message: chat.message.as_deref(),
                max_turns: chat.max_turns.map(|t| t.to_string()),
                summary_method: chat.summary_method.as_str(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let text = ctx.render("main", context! { chats => chats })?;
    result.push(ctx.fragment(text, Section::Chats).owned_by(&graph.id).build()?);
    if chats.len() > 1 {
        result.import(
            ctx.runtime_import(None, "initiate_chats"),
            ImportOrigin::ThirdParty,
        );
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;
    use crate::producers::test_support::Harness;
    use serde_json::json;

    fn flow(chats: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "wf",
            "name": "Flow",
            "agents": [
                {"id": "u", "name": "User", "kind": "user_proxy"},
                {"id": "w", "name": "Writer", "kind": "assistant"},
                {"id": "c", "name": "Critic", "kind": "assistant"}
            ],
            "chats": chats
        })
    }

    #[test]
    fn test_no_chats() {
        let harness = Harness::new(flow(json!([])));
        let result = produce(&harness.ctx()).unwrap();
        assert_eq!(
            result.fragments[0].text(),
            "def main():\n    \"\"\"Start chatting.\"\"\"\n    return None"
        );
        assert!(result.imports.is_empty());
    }

    #[test]
    fn test_single_chat() {
        let harness = Harness::new(flow(json!([
            {"id": "ch1", "name": "Draft", "sourceId": "u", "targetId": "w",
             "message": "Write a \"haiku\"", "maxTurns": 2}
        ])));
        let result = produce(&harness.ctx()).unwrap();
        assert_eq!(
            result.fragments[0].text(),
            "def main():\n    \"\"\"Start chatting.\"\"\"\n    results = user.initiate_chat(\n        writer,\n        message=\"Write a \\\"haiku\\\"\",\n        max_turns=2,\n        summary_method=\"last_msg\",\n    )\n    return results"
        );
        assert!(result.imports.is_empty());
    }

    #[test]
    fn test_sequential_chats() {
        let harness = Harness::new(flow(json!([
            {"id": "ch1", "name": "Draft", "sourceId": "u", "targetId": "w", "message": "Draft"},
            {"id": "ch2", "name": "Review", "sourceId": "u", "targetId": "c",
             "summaryMethod": "reflection_with_llm"}
        ])));
        let result = produce(&harness.ctx()).unwrap();
        let text = result.fragments[0].text();
        assert!(text.contains("    results = initiate_chats(\n        [\n            {\n                \"sender\": user,\n                \"recipient\": writer,\n                \"message\": \"Draft\",\n"));
        assert!(text.contains("\"recipient\": critic,\n                \"summary_method\": \"reflection_with_llm\",\n            },\n        ]\n    )"));
        assert_eq!(result.imports[0].raw(), "from autogen import initiate_chats");
        assert_eq!(result.fragments[0].owner(), Some("wf"));
    }

    #[test]
    fn test_unknown_chat_participant() {
        let harness = Harness::new(flow(json!([
            {"id": "ch1", "name": "Draft", "sourceId": "u", "targetId": "ghost"}
        ])));
        let err = produce(&harness.ctx()).unwrap_err();
        assert!(matches!(err, ExportError::UnknownEntityReference { .. }));
    }
}
