// src/resolver.rs
use crate::types::{ResolverConfig, SubprobeError};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use trust_dns_resolver::config::{
    LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig as DnsResolverConfig, ResolverOpts,
};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::proto::rr::{RData, RecordType};
use trust_dns_resolver::TokioAsyncResolver;

/// DNS operations the workers need.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// Canonical name of `name`. A name that exists without a CNAME record
    /// is its own canonical name; a name that does not exist is an error.
    async fn lookup_cname(&self, name: &str) -> Result<String, SubprobeError>;

    /// IPv4 addresses of `name`, in answer order.
    async fn lookup_addresses(&self, name: &str) -> Result<Vec<IpAddr>, SubprobeError>;
}

pub struct Resolver {
    resolver: TokioAsyncResolver,
}

impl Resolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, SubprobeError> {
        let (resolver_config, mut opts) = if config.use_system_resolver {
            trust_dns_resolver::system_conf::read_system_conf().map_err(|e| {
                SubprobeError::ResolutionError(format!("Failed to read system resolver config: {}", e))
            })?
        } else {
            let mut resolver_config = DnsResolverConfig::new();

            for ns in &config.nameservers {
                let socket_addr = SocketAddr::from_str(ns).map_err(|e| {
                    SubprobeError::ConfigError(format!("Invalid nameserver address {}: {}", ns, e))
                })?;
                resolver_config.add_name_server(NameServerConfig {
                    socket_addr,
                    protocol: Protocol::Udp,
                    tls_dns_name: None,
                    trust_negative_responses: false,
                    bind_addr: None,
                });
            }

            (resolver_config, ResolverOpts::default())
        };

        opts.timeout = config.timeout;
        opts.attempts = config.attempts;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

#[async_trait]
impl DnsLookup for Resolver {
    async fn lookup_cname(&self, name: &str) -> Result<String, SubprobeError> {
        match self.resolver.lookup(name, RecordType::CNAME).await {
            Ok(lookup) => lookup
                .iter()
                .find_map(|rdata| match rdata {
                    RData::CNAME(cname) => Some(cname.to_string()),
                    _ => None,
                })
                .ok_or_else(|| {
                    SubprobeError::ResolutionError(format!("Empty CNAME answer for {}", name))
                }),
            Err(e) if exists_without_records(&e) => Ok(name.to_string()),
            Err(e) => Err(SubprobeError::ResolutionError(format!(
                "CNAME lookup for {} failed: {}",
                name, e
            ))),
        }
    }

    async fn lookup_addresses(&self, name: &str) -> Result<Vec<IpAddr>, SubprobeError> {
        self.resolver
            .lookup_ip(name)
            .await
            .map(|lookup| lookup.iter().collect())
            .map_err(|e| SubprobeError::ResolutionError(format!("Failed to resolve {}: {}", name, e)))
    }
}

/// NOERROR with an empty answer: the name exists, just not with that type.
fn exists_without_records(error: &ResolveError) -> bool {
    matches!(
        error.kind(),
        ResolveErrorKind::NoRecordsFound { response_code, .. } if *response_code == ResponseCode::NoError
    )
}
