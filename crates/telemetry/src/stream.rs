//! Broadcast stream of emitted telemetry lines

use once_cell::sync::Lazy;
use tokio::sync::broadcast;

/// One emitted telemetry line, already tag-prefixed.
pub type LogLine = String;

static CHANNEL: Lazy<broadcast::Sender<LogLine>> = Lazy::new(|| {
    let (tx, _rx) = broadcast::channel(1024);
    tx
});

/// Subscribe to the live telemetry stream. Slow consumers lag and drop
/// lines rather than blocking emitters.
pub fn subscribe() -> broadcast::Receiver<LogLine> {
    CHANNEL.subscribe()
}

pub(crate) fn publish(line: &str) {
    // No receivers is the normal embedded case.
    let _ = CHANNEL.send(line.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn published_lines_reach_subscribers() {
        let mut rx = subscribe();
        publish("[TEST] hello");
        // Other tests share the global stream; skip their lines.
        loop {
            if rx.recv().await.unwrap() == "[TEST] hello" {
                break;
            }
        }
    }
}
