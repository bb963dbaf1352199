use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful healthcare AI assistant. You provide information and support but always remind users to consult with healthcare professionals for medical advice. Be empathetic, clear, and professional.";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Prompt file '{0}' has an empty system_prompt")]
    EmptySystemPrompt(String),
}

/// The relay's fixed instruction set. Loaded from JSON when a prompts file is
/// configured, otherwise the built-in healthcare persona.
#[derive(Deserialize, Debug, Clone)]
pub struct PromptConfig {
    pub system_prompt: String,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: None,
            last_loaded: None,
        }
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let path = path.as_ref();
    let file_content = fs::read_to_string(path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    if config.system_prompt.trim().is_empty() {
        return Err(PromptError::EmptySystemPrompt(path.display().to_string()));
    }
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompts from {}", path.display());
    Ok(Arc::new(config))
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return load_prompts(path).map(Some);
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn default_is_healthcare_persona() {
        let config = PromptConfig::default();
        assert!(config.system_prompt.contains("consult with healthcare professionals"));
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn loads_prompt_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"system_prompt":"Be brief.","max_tokens":256}}"#).unwrap();
        let config = load_prompts(file.path()).unwrap();
        assert_eq!(config.system_prompt, "Be brief.");
        assert_eq!(config.max_tokens, Some(256));
        assert!(config.last_loaded.is_some());
    }

    #[test]
    fn rejects_blank_system_prompt() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"system_prompt":"  "}}"#).unwrap();
        assert!(matches!(load_prompts(file.path()), Err(PromptError::EmptySystemPrompt(_))));
    }

    #[test]
    fn reload_only_when_file_is_newer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"system_prompt":"v1"}}"#).unwrap();
        let current = load_prompts(file.path()).unwrap();
        assert!(reload_prompts_if_changed(file.path(), &current).unwrap().is_none());

        let stale = Arc::new(PromptConfig {
            last_loaded: current.last_loaded.map(|t| t - Duration::from_secs(3600)),
            ..(*current).clone()
        });
        let reloaded = reload_prompts_if_changed(file.path(), &stale).unwrap().unwrap();
        assert_eq!(reloaded.system_prompt, "v1");
    }

    #[test]
    fn reload_without_timestamp_always_loads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"system_prompt":"fresh"}}"#).unwrap();
        let builtin = Arc::new(PromptConfig::default());
        let reloaded = reload_prompts_if_changed(file.path(), &builtin).unwrap().unwrap();
        assert_eq!(reloaded.system_prompt, "fresh");
    }
}
