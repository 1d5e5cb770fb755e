use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::providers::{
    CardImageRenderer, HeadlineScriptGenerator, ImageRenderer, ScriptGenerator, SilentSpeechSynthesizer,
    SpeechSynthesizer,
};

type Factory<T> = Box<dyn Fn() -> Arc<T> + Send + Sync>;

/// One provider of each kind, injected into the orchestrator
#[derive(Clone)]
pub struct Providers {
    pub script: Arc<dyn ScriptGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub image: Arc<dyn ImageRenderer>,
}

impl Providers {
    pub fn new(
        script: Arc<dyn ScriptGenerator>,
        speech: Arc<dyn SpeechSynthesizer>,
        image: Arc<dyn ImageRenderer>,
    ) -> Self {
        Self { script, speech, image }
    }
}

impl std::fmt::Debug for Providers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Providers")
            .field("script", &self.script.name())
            .field("speech", &self.speech.name())
            .field("image", &self.image.name())
            .finish()
    }
}

/// Registry for the available collaborator backends
///
/// Backends are registered by name and instantiated when a run is
/// configured, so switching TTS or LLM backend is a configuration change.
pub struct ProviderRegistry {
    scripts: HashMap<String, Factory<dyn ScriptGenerator>>,
    speech: HashMap<String, Factory<dyn SpeechSynthesizer>>,
    images: HashMap<String, Factory<dyn ImageRenderer>>,
}

impl ProviderRegistry {
    /// Create a new registry with all built-in providers
    pub fn new() -> Self {
        let mut registry = Self {
            scripts: HashMap::new(),
            speech: HashMap::new(),
            images: HashMap::new(),
        };

        registry.register_builtin_providers();
        registry
    }

    fn register_builtin_providers(&mut self) {
        self.register_script("headline", || Arc::new(HeadlineScriptGenerator::default()));
        self.register_speech("silent", || Arc::new(SilentSpeechSynthesizer::default()));
        self.register_image("card", || Arc::new(CardImageRenderer::default()));
    }

    pub fn register_script<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn ScriptGenerator> + Send + Sync + 'static,
    {
        self.scripts.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_speech<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn SpeechSynthesizer> + Send + Sync + 'static,
    {
        self.speech.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_image<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn ImageRenderer> + Send + Sync + 'static,
    {
        self.images.insert(name.to_string(), Box::new(factory));
    }

    pub fn script(&self, name: &str) -> Result<Arc<dyn ScriptGenerator>, ProviderError> {
        lookup(&self.scripts, name)
    }

    pub fn speech(&self, name: &str) -> Result<Arc<dyn SpeechSynthesizer>, ProviderError> {
        lookup(&self.speech, name)
    }

    pub fn image(&self, name: &str) -> Result<Arc<dyn ImageRenderer>, ProviderError> {
        lookup(&self.images, name)
    }

    /// Instantiate the providers named in the configuration
    pub fn providers(&self, config: &ProviderConfig) -> Result<Providers, ProviderError> {
        Ok(Providers {
            script: self.script(&config.script)?,
            speech: self.speech(&config.speech)?,
            image: self.image(&config.image)?,
        })
    }

    /// Registered names per kind, sorted: (script, speech, image)
    pub fn available(&self) -> (Vec<String>, Vec<String>, Vec<String>) {
        (sorted_keys(&self.scripts), sorted_keys(&self.speech), sorted_keys(&self.images))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lookup<T: ?Sized>(map: &HashMap<String, Factory<T>>, name: &str) -> Result<Arc<T>, ProviderError> {
    map.get(name)
        .map(|factory| factory())
        .ok_or_else(|| ProviderError::NotFound { name: name.to_string() })
}

fn sorted_keys<T: ?Sized>(map: &HashMap<String, Factory<T>>) -> Vec<String> {
    let mut names: Vec<String> = map.keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_providers_available() {
        let registry = ProviderRegistry::new();
        let providers = registry.providers(&ProviderConfig::default()).unwrap();

        assert_eq!(providers.script.name(), "headline");
        assert_eq!(providers.speech.name(), "silent");
        assert_eq!(providers.image.name(), "card");
    }

    #[test]
    fn test_unknown_provider() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig {
            speech: "edge-tts".to_string(),
            ..ProviderConfig::default()
        };

        match registry.providers(&config) {
            Err(ProviderError::NotFound { name }) => assert_eq!(name, "edge-tts"),
            other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_custom_provider_registration() {
        let mut registry = ProviderRegistry::new();
        registry.register_script("short", || {
            Arc::new(HeadlineScriptGenerator::with_sentences(0))
        });

        assert!(registry.script("short").is_ok());
        let (scripts, speech, images) = registry.available();
        assert_eq!(scripts, vec!["headline".to_string(), "short".to_string()]);
        assert_eq!(speech, vec!["silent".to_string()]);
        assert_eq!(images, vec!["card".to_string()]);
    }
}
