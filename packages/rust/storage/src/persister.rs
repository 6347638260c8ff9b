//! Store-stage sink: turns a finished lead into a story row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use newsreel_core::Persister;
use newsreel_shared::{Lead, StageError};

use crate::{Storage, StoryRecord};

/// Persists finished stories into the stories table.
pub struct StoryPersister {
    storage: Arc<Storage>,
}

impl StoryPersister {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Persister for StoryPersister {
    /// Save one finished lead as a story, returning the new story id.
    ///
    /// The lead must carry a script (the write stage's contract); audio
    /// fields are optional so a story that failed voicing can still be kept
    /// when the pipeline is configured to store scripts alone.
    async fn save(&self, lead: &Lead) -> Result<String, StageError> {
        let script = lead
            .metadata
            .script
            .as_deref()
            .ok_or_else(|| StageError::validation("lead reached store with no script"))?;
        // First script line doubles as the headline.
        let headline = script.lines().next().map(|l| l.trim().to_string());

        let record = StoryRecord {
            id: Uuid::now_v7().to_string(),
            lead_id: lead.id,
            headline,
            text: lead.text.clone(),
            script: script.to_string(),
            research_notes: lead.metadata.research_notes.clone(),
            audio_url: lead.metadata.audio_url.clone(),
            audio_size_bytes: lead.metadata.audio_size_bytes,
            anchor: lead.metadata.anchor.clone(),
            source: lead.metadata.source.clone(),
            category: lead.metadata.category.clone(),
            content_hash: content_hash(&lead.text),
            created_at: Utc::now(),
        };

        self.storage
            .insert_story(&record)
            .await
            .map_err(|e| StageError::transient(format!("story insert failed: {e}")))?;

        info!(story_id = %record.id, lead_id = %lead.id, "story persisted");
        Ok(record.id)
    }
}

/// SHA-256 hex digest of the lead text, for cross-run duplicate forensics.
fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use newsreel_shared::ErrorKind;

    use super::*;
    use crate::tests::test_storage;

    fn finished_lead() -> Lead {
        let mut lead = Lead::discovered(
            "Senate passes budget bill",
            "perplexity",
            Some("politics".into()),
        );
        lead.metadata.research_notes = Some("passed 52-48".into());
        lead.metadata.script = Some("Senate Passes Budget\n\nThe Senate tonight...".into());
        lead.metadata.anchor = Some("Alex Morgan".into());
        lead.metadata.audio_url = Some("https://cdn.example.com/audio/x.mp3".into());
        lead.metadata.audio_size_bytes = Some(4096);
        lead
    }

    #[tokio::test]
    async fn save_writes_a_story_row() {
        let storage = Arc::new(test_storage().await);
        let persister = StoryPersister::new(storage.clone());
        let lead = finished_lead();

        let story_id = persister.save(&lead).await.expect("save story");
        assert!(!story_id.is_empty());

        let stories = storage.recent_stories(1).await.unwrap();
        assert_eq!(stories.len(), 1);
        let story = &stories[0];
        assert_eq!(story.id, story_id);
        assert_eq!(story.lead_id, lead.id);
        assert_eq!(story.headline.as_deref(), Some("Senate Passes Budget"));
        assert_eq!(story.anchor.as_deref(), Some("Alex Morgan"));
        assert_eq!(story.content_hash, content_hash(&lead.text));
    }

    #[tokio::test]
    async fn save_without_a_script_is_a_validation_error() {
        let storage = Arc::new(test_storage().await);
        let persister = StoryPersister::new(storage);
        let lead = Lead::discovered("tip", "perplexity", None);

        let err = persister.save(&lead).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn saving_the_same_lead_twice_fails() {
        let storage = Arc::new(test_storage().await);
        let persister = StoryPersister::new(storage);
        let lead = finished_lead();

        persister.save(&lead).await.unwrap();
        let err = persister.save(&lead).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transient);
    }

    #[test]
    fn content_hash_is_stable() {
        assert_eq!(content_hash("abc"), content_hash("abc"));
        assert_ne!(content_hash("abc"), content_hash("abd"));
        assert_eq!(content_hash("abc").len(), 64);
    }
}
