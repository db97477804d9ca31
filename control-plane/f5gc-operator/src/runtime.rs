use std::net::SocketAddr;

use kube::Client;
use tokio::task::JoinHandle;
use tracing::info;

use crate::{
    config::OperatorConfig,
    controller::run_controller,
    web::{run_http_server, shutdown_signal},
};

/// Compute the HTTP bind address based on config.
pub fn compute_http_addr(cfg: &OperatorConfig) -> SocketAddr {
    ([0, 0, 0, 0], cfg.http_port).into()
}

/// Spawn the Kubernetes controller loop. It stops on SIGTERM or Ctrl+C.
pub fn spawn_controller(
    client: Client,
    cfg: OperatorConfig,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_controller(client, cfg).await })
}

/// Spawn the health server. It drains on SIGTERM or Ctrl+C.
pub fn spawn_http(addr: SocketAddr) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_http_server(addr, shutdown_signal()).await })
}

/// Wait for whichever task finishes first and abort the other, so one side
/// stopping (cleanly or not) takes the process down with it.
pub async fn first_to_finish(
    mut controller: JoinHandle<anyhow::Result<()>>,
    mut http: JoinHandle<anyhow::Result<()>>,
) -> anyhow::Result<()> {
    let (res, controller_finished) = tokio::select! {
        res = &mut controller => (res, true),
        res = &mut http => (res, false),
    };
    let rest = if controller_finished { http } else { controller };
    rest.abort();
    res?
}

/// Start the controller and the health server and wait until either finishes.
pub async fn run_all(client: Client, cfg: OperatorConfig) -> anyhow::Result<()> {
    let http = spawn_http(compute_http_addr(&cfg));
    let controller = spawn_controller(client, cfg);

    first_to_finish(controller, http).await?;
    info!("operator stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn finished_controller_stops_a_server_that_never_returns() {
        let controller = tokio::spawn(async { Ok(()) });
        let http = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        });
        let res = tokio::time::timeout(
            Duration::from_secs(5),
            first_to_finish(controller, http),
        )
        .await
        .expect("waited on the server after the controller stopped");
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn failing_task_error_is_returned() {
        let controller = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        });
        let http = tokio::spawn(async { Err(anyhow::anyhow!("bind failed")) });
        let err = first_to_finish(controller, http).await.unwrap_err();
        assert_eq!(err.to_string(), "bind failed");
    }
}
