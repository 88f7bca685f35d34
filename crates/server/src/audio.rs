//! Synthesized prompt audio
//!
//! Prompts are synthesized once per turn, kept in a bounded in-memory cache
//! and served back to the telephony provider by id.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use uuid::Uuid;

use hotline_config::SpeechConfig;
use hotline_core::attempt_within;
use hotline_llm::{SpeechSynthesizer, SynthesizedAudio};

/// Bounded cache, oldest entry evicted first
pub struct AudioCache {
    entries: RwLock<(HashMap<Uuid, Arc<SynthesizedAudio>>, VecDeque<Uuid>)>,
    capacity: usize,
}

impl AudioCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new((HashMap::new(), VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&self, audio: SynthesizedAudio) -> Uuid {
        let id = Uuid::new_v4();
        let mut guard = self.entries.write();
        let (map, order) = &mut *guard;

        while map.len() >= self.capacity {
            match order.pop_front() {
                Some(old) => {
                    map.remove(&old);
                }
                None => break,
            }
        }

        map.insert(id, Arc::new(audio));
        order.push_back(id);
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<SynthesizedAudio>> {
        self.entries.read().0.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Turns response text into a playable URL when synthesis is available
pub struct VoicePrompter {
    synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    cache: AudioCache,
    timeout: Duration,
    public_base_url: String,
}

impl VoicePrompter {
    pub fn new(synthesizer: Option<Arc<dyn SpeechSynthesizer>>, config: &SpeechConfig) -> Self {
        Self {
            synthesizer,
            cache: AudioCache::new(config.cache_entries),
            timeout: Duration::from_millis(config.timeout_ms),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// No synthesis; every turn is spoken by the telephony provider
    pub fn disabled(config: &SpeechConfig) -> Self {
        Self::new(None, config)
    }

    pub fn is_enabled(&self) -> bool {
        self.synthesizer.is_some()
    }

    /// Synthesize `text`; `None` when disabled, failed or too slow
    pub async fn render(&self, text: &str) -> Option<String> {
        let synthesizer = self.synthesizer.as_ref()?;
        let audio =
            attempt_within("speech_synthesis", self.timeout, synthesizer.synthesize(text)).await?;

        let id = self.cache.insert(audio);
        Some(format!("{}/voice/audio/{}", self.public_base_url, id))
    }

    pub fn audio(&self, id: &Uuid) -> Option<Arc<SynthesizedAudio>> {
        self.cache.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(byte: u8) -> SynthesizedAudio {
        SynthesizedAudio {
            bytes: vec![byte; 4],
            mime_type: "audio/mpeg".to_string(),
        }
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let cache = AudioCache::new(2);
        let first = cache.insert(clip(1));
        let second = cache.insert(clip(2));
        let third = cache.insert(clip(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&first).is_none());
        assert_eq!(cache.get(&second).unwrap().bytes[0], 2);
        assert_eq!(cache.get(&third).unwrap().bytes[0], 3);
    }

    #[tokio::test]
    async fn test_disabled_prompter_renders_nothing() {
        let prompter = VoicePrompter::disabled(&SpeechConfig::default());
        assert!(!prompter.is_enabled());
        assert!(prompter.render("Hello").await.is_none());
    }
}
