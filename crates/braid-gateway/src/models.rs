/// Which callers may invoke a model. Anonymous (temporary-track) users are
/// limited to the `All` tier; authenticated users may use everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Availability {
    All,
    Authenticated,
}

#[derive(Clone, Copy, Debug)]
pub struct ModelInfo {
    pub label: &'static str,
    pub name: &'static str,
    pub availability: Availability,
}

pub const SUPPORTED_MODELS: &[ModelInfo] = &[
    ModelInfo { label: "Nova Lite", name: "bedrock/amazon.nova-lite-v1:0", availability: Availability::All },
    ModelInfo { label: "Nova Micro", name: "bedrock/amazon.nova-micro-v1:0", availability: Availability::All },
    ModelInfo { label: "DeepSeek V3", name: "fireworks/deepseek-v3", availability: Availability::Authenticated },
    ModelInfo { label: "DeepSeek R1", name: "groq/deepseek-r1-distill-llama-70b", availability: Availability::Authenticated },
    ModelInfo { label: "Claude 3 Haiku", name: "anthropic/claude-v3-haiku", availability: Availability::Authenticated },
    ModelInfo { label: "Qwen 3", name: "deepinfra/qwen3-14b", availability: Availability::Authenticated },
    ModelInfo { label: "Gemini 2.0 Flash", name: "vertex/gemini-2.0-flash-001", availability: Availability::All },
    ModelInfo { label: "Llama 4 Maverick", name: "bedrock/meta.llama4-maverick-17b-instruct-v1", availability: Availability::Authenticated },
    ModelInfo { label: "Llama 4 Scout", name: "bedrock/meta.llama4-scout-17b-instruct-v1", availability: Availability::Authenticated },
    ModelInfo { label: "GPT 4o Mini", name: "openai/gpt-4o-mini", availability: Availability::All },
    ModelInfo { label: "GPT 4.1 Nano", name: "openai/gpt-4.1-nano", availability: Availability::All },
    ModelInfo { label: "Mistral Saba", name: "groq/mistral-saba-24b", availability: Availability::Authenticated },
];

/// Model used for one-shot thread-title generation.
pub const TITLE_MODEL: &str = "vertex/gemini-2.0-flash-001";

pub fn find_model(name: &str) -> Option<&'static ModelInfo> {
    SUPPORTED_MODELS.iter().find(|m| m.name == name)
}

/// Whether anonymous users may invoke this model. Unknown models are not
/// allowed on the temporary track.
pub fn allowed_for_anonymous(name: &str) -> bool {
    matches!(
        find_model(name),
        Some(ModelInfo { availability: Availability::All, .. })
    )
}
