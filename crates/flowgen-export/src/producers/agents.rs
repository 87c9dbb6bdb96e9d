// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Agent definitions.
//!
//! One invocation renders everything placed relative to a single agent:
//! the code executor and group chat it needs before its definition, the
//! constructor call itself, and its nested-chat registration after all
//! agents exist.

use flowgen_dsl::{Agent, AgentKind, GroupSettings};
use minijinja::context;
use serde::Serialize;

use super::{NESTED_CHAT_ORDER, ProducerContext, executor_key, group_chat_key, indent};
use crate::content::{ExportResult, Section, SubPosition};
use crate::error::Result;
use crate::imports::ImportOrigin;

const CODE_EXECUTOR: &str = r#"{{ executor }} = LocalCommandLineCodeExecutor(
    work_dir={{ work_dir | pystr }},
    timeout={{ timeout }},
)
"#;

const GROUP_CHAT: &str = r#"{{ group_chat }} = GroupChat(
    agents=[{{ members | join(", ") }}],
    messages=[],
    max_round={{ max_round }},
    speaker_selection_method={{ speaker_selection | pystr }},
)
"#;

const DEFINITION: &str = r#"{{ name }} = {{ class_name }}(
    name={{ name | pystr }},
{% if system_message %}
    system_message={{ system_message | pystr }},
{% endif %}
{% if description %}
    description={{ description | pystr }},
{% endif %}
    human_input_mode={{ human_input_mode | pystr }},
{% if max_consecutive_auto_reply %}
    max_consecutive_auto_reply={{ max_consecutive_auto_reply }},
{% endif %}
{% if groupchat %}
    groupchat={{ groupchat }},
{% endif %}
{% if code_execution_config %}
    code_execution_config={{ code_execution_config }},
{% endif %}
{% if not has_models %}
    llm_config=False,
{% endif %}
{% for argument in arguments %}
{{ argument }},
{% endfor %}
)
"#;

const NESTED_CHATS: &str = r#"{{ name }}.register_nested_chats(
    [
{% for chat in chats %}
        {
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
    ],
    trigger=[{{ triggers | join(", ") }}],
)
"#;

pub(crate) const TEMPLATES: &[(&str, &str)] = &[
    ("code_executor", CODE_EXECUTOR),
    ("group_chat", GROUP_CHAT),
    ("agent", DEFINITION),
    ("nested_chats", NESTED_CHATS),
];

#[derive(Serialize)]
struct NestedChatView<'a> {
    recipient: &'a str,
    message: Option<&'a str>,
    max_turns: Option<String>,
    summary_method: &'static str,
}

pub(crate) fn produce(agent: &Agent, ctx: &ProducerContext<'_>) -> Result<ExportResult> {
    let name = ctx.name_of(&agent.id)?;
    let mut result = ExportResult::new();
    result.import(
        ctx.runtime_import(None, agent.kind.class_name()),
        ImportOrigin::ThirdParty,
    );

    let code_execution_config = match &agent.code_execution {
        Some(execution) => {
            let executor = ctx.name_of(&executor_key(&agent.id))?;
            let text = ctx.render(
                "code_executor",
                context! {
                    executor => executor,
                    work_dir => execution.work_dir,
                    timeout => execution.timeout,
                },
            )?;
            result.push(
                ctx.fragment(text, Section::Agents)
                    .sub_position(SubPosition::Before)
                    .owned_by(&agent.id)
                    .build()?,
            );
            result.import(
                ctx.runtime_import(Some("coding"), "LocalCommandLineCodeExecutor"),
                ImportOrigin::ThirdParty,
            );
            Some(format!("{{\"executor\": {}}}", executor))
        }
        // A user proxy executes code unless told otherwise
        None if agent.kind == AgentKind::UserProxy => Some("False".to_string()),
        None => None,
    };

    let groupchat = if agent.kind == AgentKind::GroupManager {
        let fallback = GroupSettings::default();
        let group = agent.group.as_ref().unwrap_or(&fallback);
        let group_chat = ctx.name_of(&group_chat_key(&agent.id))?;
        let members = group
            .members
            .iter()
            .map(|member| ctx.name_of(member))
            .collect::<Result<Vec<_>>>()?;
        let text = ctx.render(
            "group_chat",
            context! {
                group_chat => group_chat,
                members => members,
                max_round => group.max_round,
                speaker_selection => group.speaker_selection.as_str(),
            },
        )?;
        result.push(
            ctx.fragment(text, Section::Agents)
                .sub_position(SubPosition::Before)
                .owned_by(&agent.id)
                .build()?,
        );
        result.import(ctx.runtime_import(None, "GroupChat"), ImportOrigin::ThirdParty);
        Some(group_chat)
    } else {
        None
    };

    let arguments: Vec<String> = ctx
        .arguments_for(&agent.id)?
        .into_iter()
        .map(|argument| indent(argument, 4))
        .collect();
    let text = ctx.render(
        "agent",
        context! {
            name => name,
            class_name => agent.kind.class_name(),
            system_message => agent.system_message,
            description => agent.description,
            human_input_mode => agent.human_input_mode.as_str(),
            max_consecutive_auto_reply => agent.max_consecutive_auto_reply.map(|n| n.to_string()),
            groupchat => groupchat,
            code_execution_config => code_execution_config,
            has_models => !agent.model_ids.is_empty(),
            arguments => arguments,
        },
    )?;
    result.push(ctx.fragment(text, Section::Agents).owned_by(&agent.id).build()?);

    if let Some(nested) = &agent.nested_chats
        && !nested.chats.is_empty()
    {
        let chats = nested
            .chats
            .iter()
            .map(|chat| {
                Ok(NestedChatView {
                    recipient: ctx.name_of(&chat.recipient_id)?,
                    message: chat.message.as_deref(),
                    max_turns: chat.max_turns.map(|t| t.to_string()),
                    summary_method: chat.summary_method.as_str(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let triggers = nested
            .triggers
            .iter()
            .map(|trigger| ctx.name_of(trigger))
            .collect::<Result<Vec<_>>>()?;
        let text = ctx.render(
            "nested_chats",
            context! { name => name, chats => chats, triggers => triggers },
        )?;
        result.push(
            ctx.fragment(text, Section::Agents)
                .sub_position(SubPosition::AfterAll)
                .owned_by(&agent.id)
                .order(NESTED_CHAT_ORDER)
                .build()?,
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

    fn texts(result: &ExportResult) -> Vec<(Option<SubPosition>, &str)> {
        result
            .fragments
            .iter()
            .map(|f| (f.sub_position(), f.text()))
            .collect()
    }

    #[test]
    fn test_assistant_without_models() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [{"id": "a1", "name": "Helper", "kind": "assistant",
                        "systemMessage": "Be brief.", "maxConsecutiveAutoReply": 0}]
        }));
        let agent = &harness.graph.agents[0];
        let result = produce(agent, &harness.ctx()).unwrap();

        assert_eq!(
            texts(&result),
            vec![(
                None,
                "helper = AssistantAgent(\n    name=\"helper\",\n    system_message=\"Be brief.\",\n    human_input_mode=\"NEVER\",\n    max_consecutive_auto_reply=0,\n    llm_config=False,\n)"
            )]
        );
        assert_eq!(result.imports[0].raw(), "from autogen import AssistantAgent");
    }

    #[test]
    fn test_arguments_are_spliced_into_constructor() {
        let mut harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [{"id": "a1", "name": "Writer", "kind": "assistant", "modelIds": ["m1"]}],
            "models": [{"id": "m1", "name": "gpt", "model": "gpt-4o"}]
        }));
        let argument = harness
            .counter
            .fragment("llm_config={\n    \"config_list\": [gpt],\n}", Section::Agents)
            .sub_position(SubPosition::AsArgument)
            .owned_by("a1")
            .build()
            .unwrap();
        harness.merger.add(argument).unwrap();

        let agent = &harness.graph.agents[0];
        let result = produce(agent, &harness.ctx()).unwrap();
        assert_eq!(
            result.fragments[0].text(),
            "writer = AssistantAgent(\n    name=\"writer\",\n    human_input_mode=\"NEVER\",\n    llm_config={\n        \"config_list\": [gpt],\n    },\n)"
        );
    }

    #[test]
    fn test_user_proxy_with_code_execution() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [
                {"id": "u", "name": "User", "kind": "user_proxy", "humanInputMode": "always",
                 "codeExecution": {"workDir": "work", "timeout": 30}},
                {"id": "v", "name": "Viewer", "kind": "user_proxy"}
            ]
        }));
        let result = produce(&harness.graph.agents[0], &harness.ctx()).unwrap();
        let fragments = texts(&result);
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            fragments[0],
            (
                Some(SubPosition::Before),
                "user_executor = LocalCommandLineCodeExecutor(\n    work_dir=\"work\",\n    timeout=30,\n)"
            )
        );
        assert!(fragments[1].1.contains("    human_input_mode=\"ALWAYS\",\n"));
        assert!(fragments[1].1.contains("    code_execution_config={\"executor\": user_executor},\n"));
        let raws: Vec<&str> = result.imports.iter().map(|i| i.raw()).collect();
        assert!(raws.contains(&"from autogen.coding import LocalCommandLineCodeExecutor"));

        let result = produce(&harness.graph.agents[1], &harness.ctx()).unwrap();
        assert!(result.fragments[0].text().contains("    code_execution_config=False,\n"));
    }

    #[test]
    fn test_group_manager_assembles_group_chat_first() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [
                {"id": "w", "name": "Writer", "kind": "assistant"},
                {"id": "c", "name": "Critic", "kind": "assistant"},
                {"id": "m", "name": "Manager", "kind": "group_manager",
                 "group": {"members": ["w", "c"], "maxRound": 6, "speakerSelection": "round_robin"}}
            ]
        }));
        let result = produce(&harness.graph.agents[2], &harness.ctx()).unwrap();
        let fragments = texts(&result);
        assert_eq!(
            fragments[0],
            (
                Some(SubPosition::Before),
                "manager_group_chat = GroupChat(\n    agents=[writer, critic],\n    messages=[],\n    max_round=6,\n    speaker_selection_method=\"round_robin\",\n)"
            )
        );
        assert!(fragments[1].1.starts_with("manager = GroupChatManager(\n"));
        assert!(fragments[1].1.contains("    groupchat=manager_group_chat,\n"));
        let raws: Vec<&str> = result.imports.iter().map(|i| i.raw()).collect();
        assert_eq!(raws, vec!["from autogen import GroupChatManager", "from autogen import GroupChat"]);
    }

    #[test]
    fn test_nested_chats_registered_after_all() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [
                {"id": "r", "name": "Router", "kind": "assistant",
                 "nestedChats": {"triggers": ["u"], "chats": [
                     {"recipientId": "x", "message": "Check it", "maxTurns": 1}
                 ]}},
                {"id": "u", "name": "User", "kind": "user_proxy"},
                {"id": "x", "name": "Checker", "kind": "assistant"}
            ]
        }));
        let result = produce(&harness.graph.agents[0], &harness.ctx()).unwrap();
        let nested = result.fragments.last().unwrap();
        assert_eq!(nested.sub_position(), Some(SubPosition::AfterAll));
        assert_eq!(nested.order(), NESTED_CHAT_ORDER);
        assert_eq!(
            nested.text(),
            "router.register_nested_chats(\n    [\n        {\n            \"recipient\": checker,\n            \"message\": \"Check it\",\n            \"max_turns\": 1,\n            \"summary_method\": \"last_msg\",\n        },\n    ],\n    trigger=[user],\n)"
        );
    }

    #[test]
    fn test_unknown_group_member() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [{"id": "m", "name": "Manager", "kind": "group_manager",
                        "group": {"members": ["ghost"]}}]
        }));
        let err = produce(&harness.graph.agents[0], &harness.ctx()).unwrap_err();
        assert!(matches!(err, ExportError::UnknownEntityReference { .. }));
    }
}
