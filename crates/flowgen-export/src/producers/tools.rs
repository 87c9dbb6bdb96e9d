// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tool functions and their registration with agents.

use flowgen_dsl::Tool;
use minijinja::context;
use tracing::debug;

use super::{ProducerContext, TOOL_REGISTRATION_ORDER};
use crate::content::{EnvVar, ExportResult, Section, SubPosition};
use crate::error::{ExportError, Result};
use crate::imports::{ImportOrigin, ImportStatement};
use crate::naming::{RESERVED_KEYWORDS, is_valid_identifier};

const TOOL: &str = r#"{{ body }}
{% if alias %}

{{ name }} = {{ function_name }}
{% endif %}
"#;

const REGISTRATION: &str = r#"register_function(
    {{ tool }},
    caller={{ caller }},
    executor={{ executor }},
    name={{ name | pystr }},
    description={{ description | pystr }},
)
"#;

const SECRETS_LOADER: &str = r#""""Load tool secrets into the environment."""

import os

{% for key, value in secrets %}
os.environ.setdefault({{ key | pystr }}, {{ value | pystr }})
{% endfor %}
"#;

pub(crate) const TEMPLATES: &[(&str, &str)] = &[
    ("tool", TOOL),
    ("tool_registration", REGISTRATION),
    ("secrets_loader", SECRETS_LOADER),
];

pub(crate) fn produce(ctx: &ProducerContext<'_>) -> Result<ExportResult> {
    let graph = ctx.graph();
    let mut result = ExportResult::new();
    let mut secrets: Vec<(&str, &str)> = Vec::new();

    for tool in &graph.tools {
        let name = ctx.name_of(&tool.id)?;
        let function_name = function_name(tool)?;
        let (imports, body) = split_imports(&tool.content);
        debug!(tool = %tool.id, imports = imports.len(), "extracted tool imports");
        result.imports.extend(imports.into_iter().map(ImportStatement::classified));

        let text = ctx.render(
            "tool",
            context! {
                body => body,
                name => name,
                function_name => function_name,
                alias => name != function_name,
            },
        )?;
        result.push(ctx.fragment(text, Section::Tools).owned_by(&tool.id).build()?);

        for (key, value) in &tool.secrets {
            result.env_var(EnvVar::new(
                key,
                "",
                format!("Secret used by tool {}", tool.name),
                true,
            ));
            secrets.push((key.as_str(), value.as_str()));
        }
    }

    let mut registered = false;
    for agent in &graph.agents {
        for link in &agent.tools {
            let tool = graph
                .tool(&link.tool_id)
                .ok_or_else(|| ExportError::unknown(&link.tool_id))?;
            let tool_name = ctx.name_of(&tool.id)?;
            let caller = ctx.name_of(&agent.id)?;
            let executor = ctx.name_of(&link.executor_id)?;
            let text = ctx.render(
                "tool_registration",
                context! {
                    tool => tool_name,
                    caller => caller,
                    executor => executor,
                    name => tool_name,
                    description => tool.description,
                },
            )?;
            result.push(
                ctx.fragment(text, Section::Agents)
                    .sub_position(SubPosition::AfterAll)
                    .owned_by(&agent.id)
                    .order(TOOL_REGISTRATION_ORDER)
                    .build()?,
            );
            registered = true;
        }
    }
    if registered {
        result.import(
            ctx.runtime_import(None, "register_function"),
            ImportOrigin::ThirdParty,
        );
    }

    if !secrets.is_empty() {
        let loader = ctx.render("secrets_loader", context! { secrets => secrets })?;
        result.set_standalone_text(loader);
    }

    Ok(result)
}

/// The function a tool defines, checked to be a usable identifier.
pub(crate) fn function_name(tool: &Tool) -> Result<&str> {
    let invalid = |reason: String| ExportError::InvalidTool {
        tool_id: tool.id.clone(),
        reason,
    };
    match tool.function_name() {
        None => Err(invalid(
            "no functionName given and the content defines no top-level function".to_string(),
        )),
        Some(name) if !is_valid_identifier(name) || RESERVED_KEYWORDS.contains(&name) => {
            Err(invalid(format!("'{}' is not a valid function name", name)))
        }
        Some(name) => Ok(name),
    }
}

/// Split leading import statements off a tool's source.
///
/// Blank and comment lines between imports are skipped; the body starts
/// right after the last import.
fn split_imports(content: &str) -> (Vec<String>, String) {
    let lines: Vec<&str> = content.lines().collect();
    let mut imports = Vec::new();
    let mut body_start = 0;
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            i += 1;
            continue;
        }
        if !is_import_line(trimmed) {
            break;
        }

        let mut statement = trimmed.to_string();
        if trimmed.contains('(') && !trimmed.contains(')') {
            while i + 1 < lines.len() {
                i += 1;
                statement.push('\n');
                statement.push_str(lines[i].trim());
                if lines[i].contains(')') {
                    break;
                }
            }
        }
        imports.push(statement);
        i += 1;
        body_start = i;
    }
    while body_start < lines.len() && lines[body_start].trim().is_empty() {
        body_start += 1;
    }

    (imports, lines[body_start..].join("\n"))
}

fn is_import_line(line: &str) -> bool {
    line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producers::test_support::Harness;
    use serde_json::json;

    fn flow() -> serde_json::Value {
        json!({
            "id": "wf",
            "name": "Flow",
            "agents": [
                {"id": "a1", "name": "Assistant", "kind": "assistant",
                 "tools": [{"toolId": "t1", "executorId": "a2"}]},
                {"id": "a2", "name": "User", "kind": "user_proxy"}
            ],
            "tools": [
                {"id": "t1", "name": "Weather Lookup", "functionName": "get_weather",
                 "description": "Look up the weather",
                 "content": "import json\nfrom typing import (\n    Dict,\n    List,\n)\n\ndef get_weather(city: str) -> str:\n    return json.dumps({\"city\": city})\n",
                 "secrets": {"WEATHER_TOKEN": "abc"}},
                {"id": "t2", "name": "shout", "content": "def shout(s):\n    return s.upper()"}
            ]
        })
    }

    #[test]
    fn test_split_imports() {
        let (imports, body) = split_imports(
            "# weather helper\nimport json\n\nfrom typing import (\n    Dict,  # mapping\n)\n# body\ndef f():\n    import os\n",
        );
        assert_eq!(imports, vec!["import json", "from typing import (\nDict,  # mapping\n)"]);
        assert_eq!(body, "# body\ndef f():\n    import os");

        let (imports, body) = split_imports("def f():\n    pass");
        assert!(imports.is_empty());
        assert_eq!(body, "def f():\n    pass");
    }

    #[test]
    fn test_tool_fragments_and_alias() {
        let harness = Harness::new(flow());
        let result = produce(&harness.ctx()).unwrap();

        let tools: Vec<&str> = result
            .fragments
            .iter()
            .filter(|f| f.section() == Section::Tools)
            .map(|f| f.text())
            .collect();
        assert_eq!(tools.len(), 2);
        assert!(tools[0].starts_with("def get_weather(city: str) -> str:"));
        assert!(tools[0].ends_with("\n\nweather_lookup = get_weather"));
        assert!(!tools[1].contains(" = shout"));

        let raws: Vec<&str> = result.imports.iter().map(|i| i.raw()).collect();
        assert!(raws.contains(&"import json"));
        assert!(raws.contains(&"from autogen import register_function"));
        assert_eq!(
            result.imports.iter().find(|i| i.raw() == "import json").unwrap().origin(),
            ImportOrigin::Builtin
        );
    }

    #[test]
    fn test_registration_after_all_agents() {
        let harness = Harness::new(flow());
        let result = produce(&harness.ctx()).unwrap();
        let registration = result
            .fragments
            .iter()
            .find(|f| f.section() == Section::Agents)
            .unwrap();
        assert_eq!(registration.sub_position(), Some(SubPosition::AfterAll));
        assert_eq!(registration.order(), TOOL_REGISTRATION_ORDER);
        let tool = harness.names.get("t1").unwrap();
        assert_eq!(
            registration.text().trim_end(),
            format!(
                "register_function(\n    {tool},\n    caller=assistant,\n    executor=user,\n    name=\"{tool}\",\n    description=\"Look up the weather\",\n)"
            )
        );
    }

    #[test]
    fn test_secrets_become_env_vars_and_loader() {
        let harness = Harness::new(flow());
        let result = produce(&harness.ctx()).unwrap();
        assert_eq!(result.env_vars.len(), 1);
        assert_eq!(result.env_vars[0].name, "WEATHER_TOKEN");
        assert!(result.env_vars[0].required);
        let loader = result.standalone_text.unwrap();
        assert!(loader.contains("import os"));
        assert!(loader.contains("os.environ.setdefault(\"WEATHER_TOKEN\", \"abc\")"));
    }

    #[test]
    fn test_function_name_derived_from_content() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "tools": [{"id": "t1", "name": "Weather Lookup",
                       "content": "import json\n\ndef weather_lookup(city):\n    return json.dumps(city)"}]
        }));
        let result = produce(&harness.ctx()).unwrap();
        let text = result.fragments[0].text();
        assert_eq!(text, "def weather_lookup(city):\n    return json.dumps(city)");
        assert!(!text.contains("Weather Lookup"));
        assert_eq!(harness.names.get("t1"), Some("weather_lookup"));
    }

    #[test]
    fn test_alias_binds_valid_identifiers_only() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "tools": [{"id": "t1", "name": "Lookup", "content": "async def fetch_city(city):\n    return city"}]
        }));
        let result = produce(&harness.ctx()).unwrap();
        let alias = result.fragments[0].text().lines().last().unwrap();
        assert_eq!(alias, "lookup = fetch_city");
        let (left, right) = alias.split_once(" = ").unwrap();
        assert!(is_valid_identifier(left) && is_valid_identifier(right));
    }

    #[test]
    fn test_tool_without_function_is_rejected() {
        let tool = |value: serde_json::Value| -> Tool { serde_json::from_value(value).unwrap() };

        let missing = tool(json!({"id": "t1", "name": "Weather Lookup", "content": "x = 1"}));
        let err = function_name(&missing).unwrap_err();
        assert_eq!(err.code(), "INVALID_TOOL");

        let spaced = tool(json!({"id": "t2", "name": "W", "functionName": "Weather Lookup",
                                 "content": "def w(): pass"}));
        assert!(matches!(
            function_name(&spaced),
            Err(ExportError::InvalidTool { ref tool_id, .. }) if tool_id == "t2"
        ));

        let keyword = tool(json!({"id": "t3", "name": "W", "functionName": "class",
                                  "content": "def w(): pass"}));
        assert!(function_name(&keyword).is_err());
    }

    #[test]
    fn test_no_tools_produces_nothing() {
        let harness = Harness::new(json!({"id": "wf", "name": "Flow"}));
        assert!(produce(&harness.ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_tool_link() {
        let harness = Harness::new(json!({
            "id": "wf",
            "name": "Flow",
            "agents": [{"id": "a1", "name": "A", "kind": "assistant",
                        "tools": [{"toolId": "missing", "executorId": "a1"}]}]
        }));
        let err = produce(&harness.ctx()).unwrap_err();
        assert!(matches!(
            err,
            ExportError::UnknownEntityReference { ref entity_id } if entity_id == "missing"
        ));
    }
}
