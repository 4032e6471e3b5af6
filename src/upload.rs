//! Delivery of batched samples to the collector over HTTP.

use std::time::Duration;

use http_body_util::Full;
use hyper::{
    Method, Request, StatusCode, Uri,
    body::Bytes,
    header::{CONTENT_TYPE, HeaderValue},
};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::{config::UploadConfig, error::UploadError, netdev::InterfaceSample};

/// Posílá dávky vzorků na kolektor. Bez retry, bez fronty: at-most-once.
#[derive(Clone)]
pub struct Uploader {
    client: Client<HttpConnector, Full<Bytes>>,
    url: Uri,
    timeout: Duration,
}

impl Uploader {
    pub fn new(cfg: &UploadConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self {
            client,
            url: cfg.url.clone(),
            timeout: cfg.timeout,
        }
    }

    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// Jeden POST s celou dávkou jako JSON pole.
    ///
    /// Tělo odpovědi se nečte. Status mimo 2xx se vrací jako chyba jen kvůli
    /// logování, volání jako takové je dokončené.
    pub async fn upload(&self, batch: &[InterfaceSample]) -> Result<StatusCode, UploadError> {
        let body = serde_json::to_vec(batch)?;

        let mut req = Request::new(Full::new(Bytes::from(body)));
        *req.method_mut() = Method::POST;
        *req.uri_mut() = self.url.clone();
        req.headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = tokio::time::timeout(self.timeout, self.client.request(req))
            .await
            .map_err(|_| UploadError::Timeout(self.timeout))??;

        let status = resp.status();
        if !status.is_success() {
            return Err(UploadError::Status(status));
        }
        Ok(status)
    }

    /// Fire-and-forget varianta pro polling smyčku: chyba se jen zaloguje
    /// a dávka je tím pádem ztracená.
    pub async fn deliver(&self, batch: Vec<InterfaceSample>) {
        let samples = batch.len();
        let interface = batch
            .first()
            .map(|s| s.interface_name.clone())
            .unwrap_or_default();

        match self.upload(&batch).await {
            Ok(status) => {
                tracing::info!(%interface, samples, %status, "batch uploaded");
            }
            Err(e) => {
                // root_cause nese skutečný důvod (connection refused, DNS, ...)
                let err = anyhow::Error::new(e);
                crate::log_anyhow_with_source!(
                    err,
                    %interface,
                    samples,
                    url = %self.url,
                    "batch upload failed, dropping batch"
                );
            }
        }
    }
}
