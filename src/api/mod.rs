use std::sync::OnceLock;

use anyhow::anyhow;
use log::info;

use crate::{
    config::ResolverConfig,
    extractors::{kwik::LockerResolver, pahe_win},
    models::{EpisodeSources, ResolutionOutcome},
    suppliers::AnimePaheSources,
    utils,
};

static CONFIG: OnceLock<ResolverConfig> = OnceLock::new();

pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Sets the resolver configuration from JSON. Only the first call takes effect.
pub fn configure(json: &str) -> anyhow::Result<()> {
    let config = ResolverConfig::from_json(json)?;

    CONFIG
        .set(config)
        .map_err(|_| anyhow!("resolver already configured"))?;
    info!("resolver configured");
    Ok(())
}

pub fn current_config() -> ResolverConfig {
    CONFIG.get().cloned().unwrap_or_default()
}

pub async fn resolve_locker_link(url: String) -> anyhow::Result<ResolutionOutcome> {
    if !pahe_win::is_locker_url(&url) {
        return Err(anyhow!("not a locker link: {url}"));
    }

    let resolver = LockerResolver::new(current_config())?;
    Ok(resolver.resolve(&url).await.or_fallback(&url))
}

/// Outcomes come back in input order. A locker link that does not resolve
/// falls back to itself; links that are not locker links fail without a
/// request.
pub async fn resolve_locker_links(urls: Vec<String>) -> anyhow::Result<Vec<ResolutionOutcome>> {
    let resolver = LockerResolver::new(current_config())?;

    let (valid, invalid): (Vec<_>, Vec<_>) = urls
        .into_iter()
        .enumerate()
        .partition(|(_, url)| pahe_win::is_locker_url(url));

    let resolved = resolver
        .resolve_all(valid.iter().map(|(_, url)| url.clone()))
        .await;

    let mut outcomes =
        vec![ResolutionOutcome::Failed(String::new()); valid.len() + invalid.len()];
    for ((idx, url), outcome) in valid.into_iter().zip(resolved) {
        outcomes[idx] = outcome.or_fallback(&url);
    }
    for (idx, url) in invalid {
        outcomes[idx] = ResolutionOutcome::Failed(format!("not a locker link: {url}"));
    }

    Ok(outcomes)
}

pub async fn resolve_pahe_link(url: String) -> anyhow::Result<String> {
    let client = utils::create_page_client(&current_config())?;
    pahe_win::extract(&client, &url).await
}

/// `episode_id` is `<anime session>/<episode session>`.
pub async fn load_episode_sources(episode_id: String) -> anyhow::Result<EpisodeSources> {
    let (anime_id, episode) = episode_id
        .split_once('/')
        .filter(|(anime, episode)| !anime.is_empty() && !episode.is_empty())
        .ok_or_else(|| anyhow!("invalid episode id: {episode_id}"))?;

    AnimePaheSources::new(current_config())?
        .load_episode_sources(anime_id, episode)
        .await
}
