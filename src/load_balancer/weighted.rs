//! Weight-proportional selection.

use std::sync::Arc;

use crate::load_balancer::eligible;
use crate::load_balancer::server::PoolServer;

/// Picks among up servers with probability proportional to weight.
/// Zero-weight servers never receive traffic.
#[derive(Debug, Default)]
pub struct Weighted;

impl Weighted {
    pub fn new() -> Self {
        Self
    }

    pub fn pick(&self, servers: &[Arc<PoolServer>], excluded: &[String]) -> Option<Arc<PoolServer>> {
        let candidates: Vec<&Arc<PoolServer>> = servers
            .iter()
            .filter(|s| s.weight() > 0 && eligible(s, excluded))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let total: u64 = candidates.iter().map(|s| u64::from(s.weight())).sum();
        let mut ticket = fastrand::u64(0..total);
        for candidate in &candidates {
            let weight = u64::from(candidate.weight());
            if ticket < weight {
                return Some((*candidate).clone());
            }
            ticket -= weight;
        }
        // Unreachable: tickets are < total. Kept as a safe fallback.
        candidates.last().map(|s| (*s).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::state::{HealthSlot, HealthThresholds};

    fn server(url: &str, weight: u32) -> Arc<PoolServer> {
        Arc::new(PoolServer::new(url, weight, Arc::new(HealthSlot::new())).unwrap())
    }

    #[test]
    fn test_zero_weight_is_never_picked() {
        let lb = Weighted::new();
        let servers = vec![server("http://a:80", 0), server("http://b:80", 5)];

        for _ in 0..50 {
            assert_eq!(lb.pick(&servers, &[]).unwrap().key(), "http://b:80");
        }
    }

    #[test]
    fn test_distribution_tracks_weights() {
        fastrand::seed(42);
        let lb = Weighted::new();
        let servers = vec![server("http://heavy:80", 9), server("http://light:80", 1)];

        let mut heavy = 0;
        for _ in 0..1000 {
            if lb.pick(&servers, &[]).unwrap().key() == "http://heavy:80" {
                heavy += 1;
            }
        }
        // Expect ~900; allow generous slack.
        assert!(heavy > 800, "heavy server picked only {heavy} times");
        assert!(heavy < 980, "light server starved, heavy picked {heavy} times");
    }

    #[test]
    fn test_down_server_is_skipped() {
        let lb = Weighted::new();
        let servers = vec![server("http://a:80", 10), server("http://b:80", 1)];
        servers[0].health().record_failure(HealthThresholds {
            unhealthy: 1,
            healthy: 1,
        });

        for _ in 0..20 {
            assert_eq!(lb.pick(&servers, &[]).unwrap().key(), "http://b:80");
        }
    }

    #[test]
    fn test_empty_pool_yields_none() {
        assert!(Weighted::new().pick(&[], &[]).is_none());
    }
}
