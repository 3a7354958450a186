use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use hickory_resolver::config::ResolverConfig as DnsConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::{Resolver, TokioResolver};
use log::debug;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};

/// Hickory backed resolver for reqwest.
///
/// Uses the system configuration when it can be read, `fallback` otherwise.
#[derive(Debug, Clone)]
pub struct DoHResolver {
    fallback: DnsConfig,
    state: Arc<OnceLock<TokioResolver>>,
}

impl Default for DoHResolver {
    fn default() -> Self {
        Self::with_fallback(DnsConfig::cloudflare())
    }
}

impl DoHResolver {
    pub fn with_fallback(fallback: DnsConfig) -> Self {
        Self {
            fallback,
            state: Arc::default(),
        }
    }

    fn resolver(&self) -> &TokioResolver {
        self.state.get_or_init(|| {
            Resolver::builder(TokioConnectionProvider::default())
                .unwrap_or_else(|err| {
                    debug!("[dns] system config unavailable ({err}), using fallback");
                    Resolver::builder_with_config(
                        self.fallback.clone(),
                        TokioConnectionProvider::default(),
                    )
                })
                .build()
        })
    }
}

impl Resolve for DoHResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let this = self.clone();

        Box::pin(async move {
            let lookup = this.resolver().lookup_ip(name.as_str()).await?;
            let addrs: Addrs = Box::new(lookup.into_iter().map(|addr| SocketAddr::new(addr, 0)));

            Ok(addrs)
        })
    }
}
