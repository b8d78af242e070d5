//! Background keep-alive ping.
//!
//! Each tick pings the discovery endpoint only if no call went out since the
//! previous tick and the session is logged in. The task holds a weak
//! reference so it never keeps an abandoned session alive; it exits on the
//! first tick after the engine is gone.

use std::sync::Weak;
use std::time::Duration;

use protocol::RequestOptions;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::config::DISCOVERY_PATH;
use crate::engine::Inner;

pub(crate) async fn run(session: Weak<Inner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(inner) = session.upgrade() else {
            trace!("session gone, keep-alive stopping");
            return;
        };

        if inner.needs_keep_alive() && inner.is_logged_in() {
            debug!(instance = %inner.instance_id(), "keep-alive ping");
            if let Err(error) = inner.call(DISCOVERY_PATH, &RequestOptions::get()).await {
                trace!(instance = %inner.instance_id(), %error, "keep-alive ping failed");
            }
        }
        inner.mark_idle();
    }
}
