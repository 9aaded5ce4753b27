//! Outbound sinks for delivered values

use std::future::Future;

use tokio::sync::mpsc;

/// Where a delivery loop forwards values (one RPC stream, one socket, ...)
///
/// An error ends the delivery loop for this consumer only.
pub trait DeliverySink<V>: Send {
    /// Error returned when the peer can no longer be reached
    type Error;

    /// Forward one value to the peer
    fn send(&mut self, value: V) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

impl<V: Send> DeliverySink<V> for mpsc::Sender<V> {
    type Error = mpsc::error::SendError<V>;

    async fn send(&mut self, value: V) -> Result<(), Self::Error> {
        mpsc::Sender::send(self, value).await
    }
}

impl<V: Send> DeliverySink<V> for mpsc::UnboundedSender<V> {
    type Error = mpsc::error::SendError<V>;

    async fn send(&mut self, value: V) -> Result<(), Self::Error> {
        mpsc::UnboundedSender::send(self, value)
    }
}
