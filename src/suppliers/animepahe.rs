use std::sync::OnceLock;

use anyhow::anyhow;
use log::{debug, error, warn};
use regex::Regex;
use reqwest::header;

use crate::{
    config::ResolverConfig,
    extractors::{kwik::LockerResolver, pahe_win},
    models::{ContentMediaItemSource, EpisodeSources, ResolutionOutcome},
    utils::{self, text},
};

pub const SITE_URL: &str = "https://animepahe.ru";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaheLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockerLink {
    pub label: String,
    pub url: String,
}

pub struct AnimePaheSources {
    site_url: String,
    client: reqwest::Client,
    resolver: LockerResolver,
}

impl AnimePaheSources {
    pub fn new(config: ResolverConfig) -> anyhow::Result<Self> {
        Self::with_site_url(SITE_URL, config)
    }

    pub fn with_site_url(
        site_url: impl Into<String>,
        config: ResolverConfig,
    ) -> anyhow::Result<Self> {
        let client = utils::create_page_client(&config)?;
        let resolver = LockerResolver::new(config)?;

        Ok(Self {
            site_url: site_url.into().trim_end_matches('/').to_owned(),
            client,
            resolver,
        })
    }

    /// Every download of an episode: a direct link where one resolves, and
    /// the locker page for each download either way.
    pub async fn load_episode_sources(
        &self,
        anime_id: &str,
        episode_id: &str,
    ) -> anyhow::Result<EpisodeSources> {
        let play_url = format!("{}/play/{anime_id}/{episode_id}", self.site_url);
        debug!("[animepahe] loading {play_url}");

        let page = self
            .client
            .get(&play_url)
            .header(header::REFERER, format!("{}/", self.site_url))
            .header(header::COOKIE, "__ddg2_=;")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let pahe_links = extract_pahe_links(&page);
        if pahe_links.is_empty() {
            return Err(anyhow!("[animepahe] no downloads found at {play_url}"));
        }

        let lockers = self.hop_to_lockers(pahe_links).await;
        Ok(self.resolve_lockers(lockers).await)
    }

    pub async fn hop_to_lockers(&self, pahe_links: Vec<PaheLink>) -> Vec<LockerLink> {
        let hops = pahe_links.into_iter().map(|pahe| async move {
            match pahe_win::extract(&self.client, &pahe.url).await {
                Ok(url) => Some(LockerLink {
                    label: pahe.label,
                    url,
                }),
                Err(err) => {
                    error!("[animepahe] fail to follow {}: {err}", pahe.url);
                    None
                }
            }
        });

        futures::future::join_all(hops)
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    pub async fn resolve_lockers(&self, lockers: Vec<LockerLink>) -> EpisodeSources {
        let outcomes = self
            .resolver
            .resolve_all(lockers.iter().map(|locker| locker.url.clone()))
            .await;

        collect_sources(&lockers, outcomes)
    }
}

pub fn extract_pahe_links(page: &str) -> Vec<PaheLink> {
    static PAHE_LINK_RE: OnceLock<Regex> = OnceLock::new();
    let re = PAHE_LINK_RE.get_or_init(|| {
        Regex::new(r#"href="(?<link>https?://pahe[.]win/[^"]+)"[^>]+>(?<name>[^<]+)"#).unwrap()
    });

    re.captures_iter(&text::strip_line_breaks(page))
        .filter_map(|m| {
            Some(PaheLink {
                label: text::strip_middots(m.name("name")?.as_str()),
                url: m.name("link")?.as_str().to_owned(),
            })
        })
        .collect()
}

pub fn collect_sources(
    lockers: &[LockerLink],
    outcomes: Vec<ResolutionOutcome>,
) -> EpisodeSources {
    let mut sources = EpisodeSources::default();

    for (locker, outcome) in lockers.iter().zip(outcomes) {
        match outcome {
            ResolutionOutcome::Direct(link) => {
                sources.sources.push(ContentMediaItemSource::Video {
                    link,
                    description: format!("Direct - {}", locker.label),
                    headers: None,
                })
            }
            ResolutionOutcome::Failed(reason) | ResolutionOutcome::Fallback { reason, .. } => {
                warn!("[animepahe] only the page of {} is available: {reason}", locker.url)
            }
        }

        let page_source = ContentMediaItemSource::Video {
            link: locker.url.clone(),
            description: format!("Kwik Page - {}", locker.label),
            headers: None,
        };
        sources.sources.push(page_source.clone());
        sources.downloads.push(page_source);
    }

    sources
}
