use std::sync::Arc;

use anyhow::Context;
use scribe_api::{ApiError, GatewayAdapter, HttpApi, MetricsRender};
use scribe_core::{Gateway, MetricsHandle, NoopMetrics};
use scribe_prometheus::PrometheusMetrics;
use scribe_transport::{
    ControlFeed, JobClient, TERMINATE, inmem,
    tcp::{ControlSubscriber, JobServer, TcpDialer, TcpPublisher},
};
use scribe_worker::{CommandEngine, FfmpegRenderer, Worker};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::{EngineArgs, GatewayArgs, ServerArgs, StandaloneArgs, WorkerArgs};

struct PrometheusRender(PrometheusMetrics);

impl MetricsRender for PrometheusRender {
    fn render(&self) -> Result<String, ApiError> {
        self.0
            .encode_text()
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

/// Gateway against a worker reachable over TCP.
pub async fn gateway(args: GatewayArgs) -> anyhow::Result<()> {
    let transport = args.transport.transport_config();
    let io = CancellationToken::new();

    let feed = ControlFeed::new();
    tokio::spawn(
        ControlSubscriber::new(transport.control_addr.clone(), TERMINATE).run(feed.clone(), io.clone()),
    );
    let jobs = JobClient::new(Arc::new(TcpDialer::new(transport.job_addr.clone())));
    info!(job = %transport.job_addr, control = %transport.control_addr, "worker endpoints");

    let result = serve_gateway(&args.server, jobs, feed).await;
    io.cancel();
    result
}

/// Worker serving the job and control endpoints until interrupted.
pub async fn worker(args: WorkerArgs) -> anyhow::Result<()> {
    let transport = args.transport.transport_config();
    let cfg = args.engine.worker_config();
    let io = CancellationToken::new();

    let server = JobServer::bind(&transport.job_addr)
        .await
        .with_context(|| format!("bind job endpoint {}", transport.job_addr))?;
    let publisher = TcpPublisher::bind(&transport.control_addr, io.clone())
        .await
        .with_context(|| format!("bind control endpoint {}", transport.control_addr))?;
    info!(
        job = %server.local_addr()?,
        control = %publisher.local_addr(),
        "worker endpoints bound"
    );

    let (tx, inbox) = mpsc::channel(cfg.inbox_capacity);
    let serving = tokio::spawn(server.serve(tx, io.clone()));

    let shutdown = interrupt_token();
    let report = build_worker(&args.engine).run(inbox, &publisher, shutdown).await;
    info!(completed = report.completed, failed = report.failed, "worker finished");

    io.cancel();
    serving.await??;
    Ok(())
}

/// Gateway and worker sharing one process.
pub async fn standalone(args: StandaloneArgs) -> anyhow::Result<()> {
    let cfg = args.engine.worker_config();
    let bus = inmem::bus(cfg.inbox_capacity);
    let jobs = JobClient::new(Arc::new(bus.dialer));

    let stop = CancellationToken::new();
    let worker = build_worker(&args.engine);
    let (inbox, publisher, token) = (bus.inbox, bus.publisher, stop.clone());
    let working = tokio::spawn(async move { worker.run(inbox, &publisher, token).await });

    let result = serve_gateway(&args.server, jobs, bus.feed).await;
    stop.cancel();
    let report = working.await?;
    info!(completed = report.completed, failed = report.failed, "worker finished");
    result
}

fn build_worker(args: &EngineArgs) -> Worker {
    Worker::new(
        Arc::new(CommandEngine::new(args.engine.clone()).with_args(args.engine_args.clone())),
        Arc::new(FfmpegRenderer::new(args.ffmpeg.clone())),
        args.worker_config(),
    )
}

/// Run the HTTP surface until interrupted, then drain monitors and persist the ledger.
async fn serve_gateway(
    server: &ServerArgs,
    jobs: JobClient,
    feed: ControlFeed,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(server.http_addr)
        .await
        .with_context(|| format!("bind http {}", server.http_addr))?;

    let prometheus = if server.no_metrics {
        None
    } else {
        Some(PrometheusMetrics::new()?)
    };
    let metrics: MetricsHandle = match &prometheus {
        Some(p) => Arc::new(p.clone()),
        None => Arc::new(NoopMetrics),
    };

    let gateway = Arc::new(Gateway::startup(server.gateway_config(), jobs, feed, metrics).await?);
    gateway.install_interrupt_handler();

    let mut api = HttpApi::new(Arc::new(GatewayAdapter::new(Arc::clone(&gateway))));
    if let Some(p) = prometheus {
        api = api.with_metrics(Arc::new(PrometheusRender(p)));
    }

    info!(addr = %listener.local_addr()?, "http api listening");

    let liveness = gateway.liveness();
    let served = axum_serve(listener, api, liveness).await;
    if let Err(e) = &served {
        error!(error = %e, "http server failed");
    }

    let persisted = gateway.shutdown().await?;
    info!(persisted, "gateway stopped");
    served
}

async fn axum_serve(
    listener: TcpListener,
    api: HttpApi<GatewayAdapter>,
    liveness: CancellationToken,
) -> anyhow::Result<()> {
    scribe_api::axum::serve(listener, api.router())
        .with_graceful_shutdown(async move { liveness.cancelled().await })
        .await?;
    Ok(())
}

/// Cancelled on the first Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let fired = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("interrupt received"),
            Err(e) => error!(error = %e, "failed to listen for interrupt"),
        }
        fired.cancel();
    });
    token
}
