use lens_config::LensConfig;

/// Emit warnings for likely mistyped env var keys that silently fell back to defaults.
pub fn warn_unconfigured(config: &LensConfig) {
    for warning in collect_unconfigured_warnings(config, std::env::vars()) {
        tracing::warn!("{warning}");
    }
}

fn collect_unconfigured_warnings<I>(config: &LensConfig, env: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let env_keys = env.into_iter().map(|(key, _)| key).collect::<Vec<_>>();

    let sections = [
        (config.technical.is_configured(), "Technical", "TECHNICAL", "BASE_URL"),
        (config.serpbear.is_configured(), "SerpBear", "SERPBEAR", "API_KEY"),
        (config.lighthouse.is_configured(), "Lighthouse", "LIGHTHOUSE", "PROJECT_ID"),
        (config.llm.is_configured(), "LLM", "LLM", "API_KEY"),
    ];

    sections
        .into_iter()
        .filter(|(configured, _, section, _)| {
            !configured && has_env_prefix(&env_keys, &format!("SITELENS_{section}"))
        })
        .map(|(_, label, section, example)| {
            format!(
                "{label} config appears default while SITELENS_{section}* env vars exist. Use double underscores (example: SITELENS_{section}__{example})."
            )
        })
        .collect()
}

fn has_env_prefix(keys: &[String], prefix: &str) -> bool {
    keys.iter().any(|key| key.starts_with(prefix))
}
