use std::{collections::HashMap, sync::Mutex, time::Duration};

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Fixed one-minute window per tenant. A zero limit disables the limiter.
#[derive(Debug)]
pub struct RateLimiter {
	limit: u32,
	state: Mutex<State>,
}

#[derive(Debug)]
struct State {
	windows: HashMap<String, Window>,
	swept_at: Instant,
}

#[derive(Clone, Copy, Debug)]
struct Window {
	started: Instant,
	count: u32,
}

impl RateLimiter {
	pub fn new(requests_per_minute: u32) -> Self {
		Self {
			limit: requests_per_minute,
			state: Mutex::new(State { windows: HashMap::new(), swept_at: Instant::now() }),
		}
	}

	/// Counts one request for `tenant_id`; `Err` carries the seconds until the window resets.
	pub fn check(&self, tenant_id: &str) -> Result<(), u64> {
		if self.limit == 0 {
			return Ok(());
		}

		let now = Instant::now();
		let mut state = self.state.lock().unwrap_or_else(|err| err.into_inner());

		// Closed windows of idle tenants are dropped at most once per window length.
		if now.duration_since(state.swept_at) >= WINDOW {
			state.windows.retain(|_, window| now.duration_since(window.started) < WINDOW);
			state.swept_at = now;
		}

		let window = state
			.windows
			.entry(tenant_id.to_string())
			.or_insert(Window { started: now, count: 0 });

		if now.duration_since(window.started) >= WINDOW {
			*window = Window { started: now, count: 0 };
		}
		if window.count >= self.limit {
			let reset_in = WINDOW.saturating_sub(now.duration_since(window.started));

			return Err(reset_in.as_secs().max(1));
		}

		window.count += 1;

		Ok(())
	}
}
