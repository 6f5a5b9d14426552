use tokio::sync::watch;

/// Transmitter side of the shutdown channel.
///
/// Cloneable handle that broadcasts a shutdown request to every subscribed
/// worker. The signal carries no payload; observing a change is the request.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<()>;

impl ShutdownTx {
    /// Broadcasts the shutdown request to all subscribers.
    ///
    /// Fails if every receiver has already been dropped, which means there
    /// is nothing left to shut down.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Creates a new receiver subscribed to this channel.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates the shutdown channel for a pipeline.
///
/// Workers keep their own [`ShutdownRx`] obtained via [`ShutdownTx::subscribe`]
/// and treat a changed value as the request to stop after the current batch.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), rx)
}
