//! Mention enrichment.
//!
//! Resolves a parsed mention into a [`Contact`] by looking up the author's
//! account and the mentioned athlete in the player directory. Any failure is
//! a [`LookupMiss`]: the mention is skipped and nothing reaches the core.

use crate::ingest::directory::PlayerDirectory;
use crate::ingest::mention::MentionRecord;
use crate::models::{Contact, Player};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    /// Mention names no athlete entity
    NoAthlete,
    UnknownSource(String),
    UnknownDestination(String),
    Timeout,
    /// Directory backend failed
    Directory(String),
}

impl std::fmt::Display for LookupMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAthlete => write!(f, "mention names no athlete"),
            Self::UnknownSource(account) => write!(f, "unknown source account: {}", account),
            Self::UnknownDestination(name) => write!(f, "unknown destination player: {}", name),
            Self::Timeout => write!(f, "directory lookup timed out"),
            Self::Directory(reason) => write!(f, "directory error: {}", reason),
        }
    }
}

impl std::error::Error for LookupMiss {}

#[derive(Clone)]
pub struct Enricher {
    directory: Arc<dyn PlayerDirectory>,
    lookup_timeout: Duration,
}

impl Enricher {
    pub fn new(directory: Arc<dyn PlayerDirectory>, lookup_timeout: Duration) -> Self {
        Self {
            directory,
            lookup_timeout,
        }
    }

    /// Resolve both ends of a mention. Each lookup gets its own timeout.
    pub async fn resolve(&self, mention: &MentionRecord) -> Result<Contact, LookupMiss> {
        let athlete = mention.athlete.as_deref().ok_or(LookupMiss::NoAthlete)?;

        let source = self
            .lookup(self.directory.by_account(&mention.source_account))
            .await?
            .ok_or_else(|| LookupMiss::UnknownSource(mention.source_account.clone()))?;
        let destination = self
            .lookup(self.directory.by_name(athlete))
            .await?
            .ok_or_else(|| LookupMiss::UnknownDestination(athlete.to_string()))?;

        debug!(
            source = %source.name,
            destination = %destination.name,
            event_time = mention.event_time,
            "mention enriched"
        );
        Ok(Contact::new(mention.event_time, source, destination))
    }

    async fn lookup<F>(&self, fut: F) -> Result<Option<Player>, LookupMiss>
    where
        F: std::future::Future<Output = anyhow::Result<Option<Player>>>,
    {
        match tokio::time::timeout(self.lookup_timeout, fut).await {
            Ok(Ok(player)) => Ok(player),
            Ok(Err(e)) => Err(LookupMiss::Directory(e.to_string())),
            Err(_) => Err(LookupMiss::Timeout),
        }
    }
}
