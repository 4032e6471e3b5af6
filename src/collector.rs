//! Receiving side of the upload endpoint (`bandwidth-monitor collector`).
//!
//! Dávky se jen zalogují a promítnou do Prometheus metrik, nic se neukládá.

use std::{convert::Infallible, error::Error as StdError, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::{
    Method, Request, Response, StatusCode,
    body::{Body, Bytes, Incoming},
    header::{CONTENT_TYPE, HeaderValue},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TEXT_FORMAT, TextEncoder};
use tokio::net::TcpListener;

use crate::{config::Config, metrics::CollectorMetrics, netdev::InterfaceSample};

pub const UPLOAD_PATH: &str = "/bandwidth/upload";

/// Strop na velikost těla jedné dávky.
pub const MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;

pub struct CollectorState {
    pub metrics: CollectorMetrics,
}

pub async fn run(cfg: &Config) -> Result<()> {
    let metrics = CollectorMetrics::new(cfg)?;
    let state = Arc::new(CollectorState { metrics });

    let listener = TcpListener::bind(cfg.collector_listen)
        .await
        .with_context(|| format!("bind collector to {}", cfg.collector_listen))?;

    tracing::info!(addr = %cfg.collector_listen, path = UPLOAD_PATH, "collector listening");
    serve(listener, state).await
}

/// Accept loop; každé spojení dostane vlastní task.
pub async fn serve(listener: TcpListener, state: Arc<CollectorState>) -> Result<()> {
    loop {
        // chyba acceptu (EMFILE, ECONNABORTED) se týká jen jednoho spojení
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                crate::log_error_display!(e, "collector accept failed");
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        let state = state.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                crate::log_error_display!(e, %peer, "collector connection error");
            }
        });
    }
}

pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<CollectorState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match path.as_str() {
        UPLOAD_PATH if method == Method::POST => Ok(upload_response(req, &state).await),
        UPLOAD_PATH => Ok(text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed\n",
        )),
        "/metrics" if method == Method::GET => Ok(metrics_response(&state)),
        "/healthz" if method == Method::GET => Ok(text_response(StatusCode::OK, "ok\n")),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "not found\n")),
    }
}

async fn upload_response<B>(req: Request<B>, state: &CollectorState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let body = match Limited::new(req.into_body(), MAX_UPLOAD_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            state.metrics.rejected_batches_total.inc();
            tracing::warn!(limit = MAX_UPLOAD_BYTES, "rejected oversized batch");
            return text_response(StatusCode::PAYLOAD_TOO_LARGE, "batch too large\n");
        }
        Err(e) => {
            crate::log_error_display!(e, "failed to read upload body");
            return text_response(StatusCode::BAD_REQUEST, "unreadable body\n");
        }
    };

    let batch: Vec<InterfaceSample> = match serde_json::from_slice(&body) {
        Ok(batch) => batch,
        Err(e) => {
            state.metrics.rejected_batches_total.inc();
            tracing::warn!(error = %e, bytes = body.len(), "rejected malformed batch");
            return text_response(StatusCode::BAD_REQUEST, "malformed batch\n");
        }
    };

    let interface = batch
        .first()
        .map(|s| s.interface_name.as_str())
        .unwrap_or_default();
    tracing::info!(samples = batch.len(), interface, "batch received");
    state.metrics.record_batch(&batch);

    // kolektor odpovídá 200 s prázdným tělem, klient odpověď stejně nečte
    Response::new(Full::new(Bytes::new()))
}

fn metrics_response(state: &CollectorState) -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        crate::log_error_display!(e, "could not encode metrics");
    }

    let mut resp = Response::new(Full::new(Bytes::from(buffer)));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_FORMAT));
    resp
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, time::Duration};

    use time::macros::datetime;

    use super::*;
    use crate::{config::UploadConfig, upload::Uploader};

    fn state() -> Arc<CollectorState> {
        let cfg = Config::from_lookup(|_| None).unwrap();
        Arc::new(CollectorState {
            metrics: CollectorMetrics::new(&cfg).unwrap(),
        })
    }

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_text(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    const BATCH: &str = r#"[
        {"InterfaceName":"eth0","ReceivedData":{"bytes":1000,"packets":10},"TransmittedData":{"bytes":2000},"TimeRecorded":"2024-05-01T12:00:00Z"},
        {"InterfaceName":"eth0","ReceivedData":{"bytes":1500},"TransmittedData":{"bytes":2600},"TimeRecorded":"2024-05-01T12:00:01Z"}
    ]"#;

    #[tokio::test]
    async fn accepts_batch_with_empty_body() {
        let state = state();

        let resp = handle_request(request(Method::POST, UPLOAD_PATH, BATCH), state.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "");

        assert_eq!(state.metrics.batches_total.get(), 1);
        assert_eq!(state.metrics.samples_total.get(), 2);
        assert_eq!(
            state.metrics.received_bytes.with_label_values(&["eth0"]).get(),
            1500
        );
    }

    #[tokio::test]
    async fn rejects_malformed_batch() {
        let state = state();

        let resp = handle_request(
            request(Method::POST, UPLOAD_PATH, "{\"not\":\"a batch\"}"),
            state.clone(),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.metrics.rejected_batches_total.get(), 1);
        assert_eq!(state.metrics.batches_total.get(), 0);
    }

    #[tokio::test]
    async fn rejects_oversized_batch() {
        let state = state();
        let body = " ".repeat(MAX_UPLOAD_BYTES + 1);

        let resp = handle_request(request(Method::POST, UPLOAD_PATH, &body), state.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(state.metrics.rejected_batches_total.get(), 1);
        assert_eq!(state.metrics.batches_total.get(), 0);
    }

    #[tokio::test]
    async fn batch_at_size_limit_is_read() {
        let state = state();
        // whitespace okolo JSONu je validní, tělo má přesně MAX_UPLOAD_BYTES
        let body = format!("{BATCH}{}", " ".repeat(MAX_UPLOAD_BYTES - BATCH.chars().count()));
        assert_eq!(body.len(), MAX_UPLOAD_BYTES);

        let resp = handle_request(request(Method::POST, UPLOAD_PATH, &body), state.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.metrics.batches_total.get(), 1);
    }

    #[tokio::test]
    async fn routes() {
        let state = state();

        let resp = handle_request(request(Method::GET, UPLOAD_PATH, ""), state.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);

        let resp = handle_request(request(Method::GET, "/healthz", ""), state.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "ok\n");

        let resp = handle_request(request(Method::GET, "/nope", ""), state.clone())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_endpoint_exposes_counters() {
        let state = state();
        handle_request(request(Method::POST, UPLOAD_PATH, BATCH), state.clone())
            .await
            .unwrap();

        let resp = handle_request(request(Method::GET, "/metrics", ""), state)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = body_text(resp).await;
        assert!(text.contains("bandwidth_upload_samples_total 2"));
        assert!(text.contains("bandwidth_interface_transmitted_bytes{interface=\"eth0\"} 2600"));
    }

    #[tokio::test]
    async fn uploader_round_trip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = state();
        tokio::spawn(serve(listener, state.clone()));

        let uploader = Uploader::new(&UploadConfig {
            url: format!("http://{addr}{UPLOAD_PATH}").parse().unwrap(),
            batch_size: 1,
            timeout: Duration::from_secs(5),
        });
        let sample = InterfaceSample {
            interface_name: "wlan0".to_string(),
            received: BTreeMap::from([("bytes".to_string(), 77)]),
            transmitted: BTreeMap::from([("bytes".to_string(), 88)]),
            time_recorded: datetime!(2024-05-01 12:00:00 UTC),
        };

        let status = uploader.upload(&[sample]).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.metrics.samples_total.get(), 1);
        assert_eq!(
            state.metrics.transmitted_bytes.with_label_values(&["wlan0"]).get(),
            88
        );
    }
}
