use parking_lot::Mutex;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Serialises upstream requests: at most one request per `min_interval`, and
/// a full stop until the window resets once the server reports the budget spent.
///
/// `wait` holds the lock while sleeping, so concurrent callers queue up behind
/// each other instead of bursting when the window reopens.
pub struct RateLimiter {
    state: Mutex<State>,
}

struct State {
    min_interval: Duration,
    last: Option<Instant>,
    blocked_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self { state: Mutex::new(State { min_interval, last: None, blocked_until: None }) }
    }

    /// Block until a request may be sent, then claim the slot.
    pub fn wait(&self) {
        let mut st = self.state.lock();
        let now = Instant::now();
        let mut ready = now;
        if let Some(last) = st.last {
            ready = ready.max(last + st.min_interval);
        }
        if let Some(until) = st.blocked_until {
            ready = ready.max(until);
        }
        if ready > now {
            let pause = ready - now;
            if pause >= Duration::from_secs(2) {
                tracing::info!("rate limit: pausing {:.1}s", pause.as_secs_f64());
            }
            sleep(pause);
        }
        st.last = Some(Instant::now());
        st.blocked_until = None;
    }

    /// Feed back the `X-Ratelimit-Remaining` / `X-Ratelimit-Reset` headers.
    pub fn observe(&self, remaining: Option<f64>, reset_secs: Option<f64>) {
        if let (Some(rem), Some(reset)) = (remaining, reset_secs) {
            if rem < 1.0 && reset > 0.0 {
                let mut st = self.state.lock();
                st.blocked_until = Some(Instant::now() + Duration::from_secs_f64(reset.min(600.0)));
            }
        }
    }

    /// Push the next request back by at least `delay` (used after a 429).
    pub fn penalize(&self, delay: Duration) {
        let mut st = self.state.lock();
        let until = Instant::now() + delay;
        st.blocked_until = Some(st.blocked_until.map_or(until, |u| u.max(until)));
    }
}
