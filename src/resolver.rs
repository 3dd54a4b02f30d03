// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The address resolver: expands DNS names among seed peers into concrete endpoints.
//!
//! Generic over [`Resolve`] so tests can substitute a deterministic fake instead of real DNS.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::net::lookup_host;
use tokio::sync::watch;

use crate::error::ResolveError;

const RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Looks up the A/AAAA records for a hostname. Implemented against real DNS via
/// [`SystemResolver`]; tests substitute a deterministic fake.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolves `host` to its A/AAAA addresses, or an error if DNS resolution fails outright.
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolves via the system resolver (`tokio::net::lookup_host`).
#[derive(Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        // lookup_host needs a "host:port" pair; the port is irrelevant to the address list, so
        // pad with a throwaway one and strip it back off below.
        let probe = format!("{host}:0");
        match lookup_host(&probe).await {
            Ok(iter) => Ok(iter.map(|addr| addr.ip()).collect()),
            Err(source) => Err(ResolveError::Dns { host: host.to_string(), source }),
        }
    }
}

fn split_host_port(seed: &str) -> Option<(&str, &str)> {
    let idx = seed.rfind(':')?;
    Some((&seed[..idx], &seed[idx + 1..]))
}

/// Resolves one seed string into zero or more socket addresses.
///
/// Algorithm: split host/port. Attempt DNS resolution of `host`. If resolution fails outright
/// (malformed seed or a non-retryable client error), treat the seed as already a concrete
/// address and pass it through unchanged. If resolution succeeds but returns zero addresses,
/// retry on a 2-second tick; a retry that surfaces a DNS error propagates it; a retry that still
/// yields zero addresses accepts the empty result unless `wait_if_empty` is set, in which case
/// it keeps retrying until a non-empty result or cancellation.
async fn resolve_seed(
    resolver: &dyn Resolve,
    seed: &str,
    wait_if_empty: bool,
    mut cancel: watch::Receiver<bool>,
) -> Result<Vec<SocketAddr>, ResolveError> {
    let (host, port) = match split_host_port(seed) {
        Some(parts) => parts,
        None => return Err(ResolveError::MalformedSeed(seed.to_string())),
    };

    let first = resolver.lookup(host).await;
    let ips = match first {
        Ok(ips) if !ips.is_empty() => ips,
        Ok(_empty) => {
            let mut ips = Vec::new();
            loop {
                if *cancel.borrow() {
                    return Err(ResolveError::Cancelled(seed.to_string()));
                }
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_INTERVAL) => {}
                    _ = cancel.changed() => {
                        if *cancel.borrow() {
                            return Err(ResolveError::Cancelled(seed.to_string()));
                        }
                        continue;
                    }
                }
                match resolver.lookup(host).await {
                    Ok(retry) if !retry.is_empty() => {
                        ips = retry;
                        break;
                    }
                    Ok(_empty) if !wait_if_empty => break,
                    Ok(_empty) => {
                        debug!("seed {host} still resolves to no addresses, retrying");
                        continue;
                    }
                    Err(err) => return Err(err),
                }
            }
            ips
        }
        Err(_) => {
            // Resolution failed outright: treat the seed as an already-concrete address.
            let addr: SocketAddr = seed.parse().map_err(|_| ResolveError::MalformedSeed(seed.to_string()))?;
            return Ok(vec![addr]);
        }
    };

    let port: u16 = port.parse().map_err(|_| ResolveError::MalformedSeed(seed.to_string()))?;
    Ok(ips.into_iter().map(|ip| SocketAddr::new(ip, port)).collect())
}

/// Resolves every seed in `seeds`, concatenating the results and filtering out `local` so a node
/// never treats itself as a seed to dial. `cancel` lets a caller abort an in-progress
/// `wait_if_empty` retry loop (used by `Join`'s own cancellation path).
pub async fn resolve_seeds(
    resolver: &dyn Resolve,
    seeds: &[String],
    wait_if_empty: bool,
    local: SocketAddr,
    cancel: watch::Receiver<bool>,
) -> Result<Vec<SocketAddr>, ResolveError> {
    let mut resolved = Vec::new();
    for seed in seeds {
        match resolve_seed(resolver, seed, wait_if_empty, cancel.clone()).await {
            Ok(addrs) => resolved.extend(addrs),
            Err(err) => {
                warn!("failed to resolve seed {seed}: {err}");
                return Err(err);
            }
        }
    }
    resolved.retain(|addr| *addr != local);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedResolver {
        responses: Mutex<Vec<Result<Vec<IpAddr>, ResolveError>>>,
    }

    #[async_trait]
    impl Resolve for ScriptedResolver {
        async fn lookup(&self, _host: &str) -> Result<Vec<IpAddr>, ResolveError> {
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn no_cancel() -> watch::Receiver<bool> {
        watch::channel(false).1
    }

    /// A local address that never collides with any seed used in these tests, so it's a no-op
    /// for the self-filtering step unless a test deliberately matches it.
    fn unused_local() -> SocketAddr {
        "0.0.0.0:0".parse().unwrap()
    }

    #[tokio::test]
    async fn direct_address_passes_through_on_resolution_error() {
        let resolver = ScriptedResolver {
            responses: Mutex::new(vec![Err(ResolveError::Dns {
                host: "203.0.113.10".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "no dns"),
            })]),
        };
        let resolved = resolve_seeds(
            &resolver,
            &["203.0.113.10:9094".to_string()],
            false,
            unused_local(),
            no_cancel(),
        )
        .await
        .unwrap();
        assert_eq!(resolved, vec!["203.0.113.10:9094".parse::<SocketAddr>().unwrap()]);
    }

    #[tokio::test]
    async fn successful_lookup_pairs_every_ip_with_the_seed_port() {
        let resolver = ScriptedResolver {
            responses: Mutex::new(vec![Ok(vec![
                "10.0.0.1".parse().unwrap(),
                "10.0.0.2".parse().unwrap(),
            ])]),
        };
        let resolved = resolve_seeds(&resolver, &["peers.svc:7946".to_string()], false, unused_local(), no_cancel())
            .await
            .unwrap();
        assert_eq!(
            resolved,
            vec!["10.0.0.1:7946".parse::<SocketAddr>().unwrap(), "10.0.0.2:7946".parse::<SocketAddr>().unwrap()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_result_without_wait_if_empty_is_accepted() {
        let resolver = ScriptedResolver {
            responses: Mutex::new(vec![Ok(vec![]), Ok(vec![])]),
        };
        let resolved =
            resolve_seeds(&resolver, &["headless.svc:7946".to_string()], false, unused_local(), no_cancel())
                .await
                .unwrap();
        assert!(resolved.is_empty());
    }

    #[tokio::test]
    async fn malformed_seed_without_port_errors() {
        let resolver = ScriptedResolver { responses: Mutex::new(vec![]) };
        let err = resolve_seeds(&resolver, &["not-a-host-or-addr".to_string()], false, unused_local(), no_cancel())
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::MalformedSeed(_)));
    }

    #[tokio::test]
    async fn local_advertise_endpoint_is_filtered_out_of_the_resolved_seeds() {
        let resolver = ScriptedResolver {
            responses: Mutex::new(vec![Ok(vec![
                "10.0.0.1".parse().unwrap(),
                "10.0.0.2".parse().unwrap(),
            ])]),
        };
        let local: SocketAddr = "10.0.0.1:7946".parse().unwrap();
        let resolved = resolve_seeds(&resolver, &["peers.svc:7946".to_string()], false, local, no_cancel())
            .await
            .unwrap();
        assert_eq!(resolved, vec!["10.0.0.2:7946".parse::<SocketAddr>().unwrap()]);
    }
}
