//! Distributed gateway relay
//!
//! One upstream leader owns the real gateway connection and republishes its
//! payloads through a [`crate::broker::PayloadSink`]; any number of
//! downstream workers consume them through a
//! [`crate::broker::PayloadSource`] while presenting the ordinary
//! [`crate::client::GatewayClient`] interface.

mod downstream;
mod upstream;

pub use downstream::DownstreamGatewayClient;
pub use upstream::UpstreamGatewayClient;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::sync::broadcast;

/// Adapt a broadcast subscription into a stream, skipping over lag. Losing
/// the oldest entries is deliberate: every relay topic keeps the latest.
pub(crate) fn broadcast_stream<T: Clone + Send + 'static>(
    rx: broadcast::Receiver<T>,
) -> BoxStream<'static, T> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(item) => return Some((item, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "relay topic lagged, keeping latest");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_stream_yields_in_order() {
        let (tx, rx) = broadcast::channel(8);
        let mut stream = broadcast_stream(rx);

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);

        assert_eq!(stream.next().await, Some(1));
        assert_eq!(stream.next().await, Some(2));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_broadcast_stream_skips_lag() {
        let (tx, rx) = broadcast::channel(2);
        let mut stream = broadcast_stream(rx);

        for i in 0..10 {
            tx.send(i).unwrap();
        }
        drop(tx);

        // the oldest entries were overwritten; the stream resumes at the
        // retained tail
        assert_eq!(stream.next().await, Some(8));
        assert_eq!(stream.next().await, Some(9));
        assert_eq!(stream.next().await, None);
    }
}
