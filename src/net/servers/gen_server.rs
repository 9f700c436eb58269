use crate::command_handler::SharedCommandHandler;
use crate::DaemonResult;
use async_trait::async_trait;
use tokio::task::{AbortHandle, JoinSet};

/// A trait to unify the different transport protocol servers
#[async_trait]
pub trait GenServer {
    /// Options with which the server is configured
    type Options;

    /// Create a new server but don't bind or start it yet
    fn new(options: Self::Options) -> Self;

    /// Bind the server and start handling requests in a background task that is spawned into *join_set*
    async fn start(
        self,
        handler: SharedCommandHandler,
        join_set: &mut JoinSet<DaemonResult>,
    ) -> anyhow::Result<AbortHandle>;
}
