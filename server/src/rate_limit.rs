use {
    parking_lot::Mutex,
    std::{
        collections::{HashMap, VecDeque},
        net::IpAddr,
        time::{Duration, Instant},
    },
};

pub const WINDOW: Duration = Duration::from_secs(60 * 60);

/// Sliding-window limit on page creations per client address.
#[derive(Debug)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

fn forget_before(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while hits
        .front()
        .is_some_and(|&hit| now.saturating_duration_since(hit) >= window)
    {
        hits.pop_front();
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Records a hit for `ip` if it is within budget.
    pub fn try_acquire(&self, ip: IpAddr, now: Instant) -> bool {
        let mut all_hits = self.hits.lock();
        let hits = all_hits.entry(ip).or_default();
        forget_before(hits, now, self.window);
        if hits.len() >= self.limit {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Drops addresses with no hits left in the window.
    pub fn prune(&self, now: Instant) {
        self.hits.lock().retain(|_, hits| {
            forget_before(hits, now, self.window);
            !hits.is_empty()
        });
    }

    #[must_use]
    pub fn tracked_addresses(&self) -> usize {
        self.hits.lock().len()
    }
}
