// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Model configurations and the LLM arguments of agents using them.

use flowgen_dsl::Model;
use minijinja::context;

use super::{ProducerContext, pyfloat};
use crate::content::{EnvVar, ExportResult, Section, SubPosition};
use crate::error::Result;

const MODEL: &str = r#"{{ name }} = {
    "model": {{ model | pystr }},
    "api_type": {{ api_type | pystr }},
{% if api_key_env %}
    "api_key": os.environ.get({{ api_key_env | pystr }}, ""),
{% endif %}
{% if base_url %}
    "base_url": {{ base_url | pystr }},
{% endif %}
{% if temperature %}
    "temperature": {{ temperature }},
{% endif %}
{% if max_tokens %}
    "max_tokens": {{ max_tokens }},
{% endif %}
}
"#;

const LLM_CONFIG: &str = r#"llm_config={
    "config_list": [{{ configs | join(", ") }}],
    "cache_seed": {{ cache_seed }},
}
"#;

pub(crate) const TEMPLATES: &[(&str, &str)] = &[("model", MODEL), ("llm_config", LLM_CONFIG)];

pub(crate) fn produce(ctx: &ProducerContext<'_>) -> Result<ExportResult> {
    let graph = ctx.graph();
    let mut result = ExportResult::new();

    for model in &graph.models {
        let name = ctx.name_of(&model.id)?;
        let api_key_env = api_key_env(model);
        let text = ctx.render(
            "model",
            context! {
                name => name,
                model => model.model,
                api_type => model.api_type.as_str(),
                api_key_env => api_key_env,
                base_url => model.base_url,
                temperature => model.temperature.map(pyfloat),
                max_tokens => model.max_tokens.map(|t| t.to_string()),
            },
        )?;
        result.push(ctx.fragment(text, Section::Models).owned_by(&model.id).build()?);

        if let Some(env) = api_key_env {
            result.env_var(EnvVar::new(
                env,
                "",
                format!("API key for model {}", model.name),
                true,
            ));
        }
    }

    let cache_seed = graph
        .settings
        .cache_seed
        .map(|seed| seed.to_string())
        .unwrap_or_else(|| "None".to_string());
    for agent in &graph.agents {
        if agent.model_ids.is_empty() {
            continue;
        }
        let configs = agent
            .model_ids
            .iter()
            .map(|id| ctx.name_of(id))
            .collect::<Result<Vec<_>>>()?;
        let text = ctx.render(
            "llm_config",
            context! { configs => configs, cache_seed => cache_seed },
        )?;
        result.push(
            ctx.fragment(text, Section::Agents)
                .sub_position(SubPosition::AsArgument)
                .owned_by(&agent.id)
                .build()?,
        );
    }

    Ok(result)
}

/// Environment variable holding the model's API key, if it needs one.
fn api_key_env(model: &Model) -> Option<&str> {
    model
        .api_key_env
        .as_deref()
        .or_else(|| model.api_type.default_api_key_env())
}
