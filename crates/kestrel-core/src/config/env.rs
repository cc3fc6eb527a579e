use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KESTREL_AUTO_APPROVE") {
            if let Ok(enabled) = v.parse::<bool>() {
                self.agent.auto_approve = enabled;
            } else {
                tracing::warn!("ignoring invalid KESTREL_AUTO_APPROVE value: {v}");
            }
        }
        if let Ok(v) = std::env::var("KESTREL_LLM_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.agent.llm_timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("KESTREL_SHELL_TIMEOUT")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.tools.shell.timeout = secs;
        }
        if let Ok(v) = std::env::var("KESTREL_FETCH_MAX_CHARS")
            && let Ok(n) = v.parse::<usize>()
        {
            self.tools.fetch.max_chars = n;
        }
    }
}
