//! Activity indicator.
//!
//! A periodic task blinking a status LED so an operator can see the node
//! is alive. Shares no state with the counters or the poll cycle.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};

use crate::hal::gpio::DigitalOutput;

pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// Visible on-time of each blink.
const BLINK_MS: u64 = 15;

pub fn spawn_heartbeat(mut led: Box<dyn DigitalOutput>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            led.set_high();
            sleep(Duration::from_millis(BLINK_MS)).await;
            led.set_low();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct CountingLed {
        blinks: Arc<AtomicU32>,
    }

    impl DigitalOutput for CountingLed {
        fn set_high(&mut self) {
            self.blinks.fetch_add(1, Ordering::AcqRel);
        }

        fn set_low(&mut self) {}
    }

    #[tokio::test]
    async fn test_heartbeat_blinks_periodically() {
        let blinks = Arc::new(AtomicU32::new(0));
        let handle = spawn_heartbeat(
            Box::new(CountingLed {
                blinks: Arc::clone(&blinks),
            }),
            Duration::from_millis(20),
        );

        sleep(Duration::from_millis(120)).await;
        handle.abort();

        assert!(blinks.load(Ordering::Acquire) >= 2);
    }
}
