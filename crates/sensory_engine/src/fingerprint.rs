use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// The identity one fetch presents to the target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprint {
    pub user_agent: String,
    pub viewport: Viewport,
}

/// User-agent and viewport collections fetchers draw from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintPool {
    pub user_agents: Vec<String>,
    pub viewports: Vec<Viewport>,
}

impl Default for FingerprintPool {
    fn default() -> Self {
        Self {
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            viewports: vec![
                Viewport { width: 1920, height: 1080 },
                Viewport { width: 1366, height: 768 },
                Viewport { width: 1440, height: 900 },
                Viewport { width: 1536, height: 864 },
                Viewport { width: 1280, height: 720 },
            ],
        }
    }
}

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 (compatible; SensoryFetcher/1.0)";
const FALLBACK_VIEWPORT: Viewport = Viewport {
    width: 1280,
    height: 720,
};

impl FingerprintPool {
    /// Pick a user agent and a viewport independently. Empty collections fall
    /// back to fixed values instead of failing.
    pub fn pick<R: rand::Rng + ?Sized>(&self, rng: &mut R) -> Fingerprint {
        Fingerprint {
            user_agent: self
                .user_agents
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| FALLBACK_USER_AGENT.to_string()),
            viewport: self.viewports.choose(rng).copied().unwrap_or(FALLBACK_VIEWPORT),
        }
    }
}

/// A pool plus the RNG used to draw from it. A fixed seed makes the sequence
/// of fingerprints reproducible.
#[derive(Debug)]
pub struct FingerprintSource {
    pool: FingerprintPool,
    rng: Mutex<StdRng>,
}

impl FingerprintSource {
    pub fn new(pool: FingerprintPool, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            pool,
            rng: Mutex::new(rng),
        }
    }

    pub fn next(&self) -> Fingerprint {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.pool.pick(&mut *rng)
    }
}

impl Default for FingerprintSource {
    fn default() -> Self {
        Self::new(FingerprintPool::default(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_has_enough_variety() {
        let pool = FingerprintPool::default();
        assert!(pool.user_agents.len() >= 4);
        assert!(pool.viewports.len() >= 4);
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let a = FingerprintSource::new(FingerprintPool::default(), Some(7));
        let b = FingerprintSource::new(FingerprintPool::default(), Some(7));
        let first: Vec<_> = (0..5).map(|_| a.next()).collect();
        let second: Vec<_> = (0..5).map(|_| b.next()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn single_entry_pool_is_deterministic_without_seed() {
        let pool = FingerprintPool {
            user_agents: vec!["TestAgent".into()],
            viewports: vec![Viewport { width: 800, height: 600 }],
        };
        let source = FingerprintSource::new(pool, None);
        let picked = source.next();
        assert_eq!(picked.user_agent, "TestAgent");
        assert_eq!(picked.viewport, Viewport { width: 800, height: 600 });
    }

    #[test]
    fn empty_pool_falls_back() {
        let pool = FingerprintPool {
            user_agents: Vec::new(),
            viewports: Vec::new(),
        };
        let picked = FingerprintSource::new(pool, Some(1)).next();
        assert!(!picked.user_agent.is_empty());
        assert_eq!(picked.viewport, FALLBACK_VIEWPORT);
    }
}
