use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentMediaItemSource {
    Video {
        link: String,
        description: String,
        headers: Option<HashMap<String, String>>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EpisodeSources {
    pub sources: Vec<ContentMediaItemSource>,
    pub downloads: Vec<ContentMediaItemSource>,
}

/// Terminal result of resolving one locker link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Direct(String),
    /// The locker page itself, offered when no direct link could be obtained.
    Fallback {
        locker_url: String,
        reason: String,
    },
    Failed(String),
}

impl ResolutionOutcome {
    pub fn direct_link(&self) -> Option<&str> {
        match self {
            ResolutionOutcome::Direct(link) => Some(link),
            _ => None,
        }
    }

    /// Turns a failure into a fallback on the locker page.
    pub fn or_fallback(self, locker_url: &str) -> ResolutionOutcome {
        match self {
            ResolutionOutcome::Failed(reason) => ResolutionOutcome::Fallback {
                locker_url: locker_url.to_owned(),
                reason,
            },
            outcome => outcome,
        }
    }
}
