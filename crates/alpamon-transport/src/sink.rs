//! Wires the reporter pool (alpamon-queue's component C) to the
//! authenticated HTTP client, so the queue crate never depends on this one.

use crate::client::AuthenticatedClient;
use alpamon_queue::{Delivery, Method, QueuedRequest, RequestSink};
use async_trait::async_trait;
use reqwest::Method as ReqwestMethod;
use std::time::Duration;

/// Per-attempt HTTP timeout for queued deliveries ("invoke A with a
/// 5-second timeout").
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

fn to_reqwest_method(method: Method) -> ReqwestMethod {
    match method {
        Method::Get => ReqwestMethod::GET,
        Method::Post => ReqwestMethod::POST,
        Method::Put => ReqwestMethod::PUT,
        Method::Patch => ReqwestMethod::PATCH,
        Method::Delete => ReqwestMethod::DELETE,
    }
}

#[async_trait]
impl RequestSink for AuthenticatedClient {
    async fn deliver(&self, request: &QueuedRequest) -> Delivery {
        let outcome = self
            .request(
                to_reqwest_method(request.method),
                &request.path,
                Some(&request.body),
                DELIVERY_TIMEOUT,
            )
            .await;

        match outcome {
            Ok(response) if response.is_success() => Delivery::Success,
            _ => Delivery::Failure,
        }
    }
}
