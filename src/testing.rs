//! パイプラインテスト用のインメモリ Fetcher

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ScraperError;
use crate::fetch::RawBody;
use crate::traits::Fetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Get,
    Post,
}

#[derive(Debug)]
struct Route {
    method: Method,
    url_contains: String,
    body_contains: Option<String>,
    response: Result<Value, u16>,
}

/// URL (と本文) の部分一致で固定レスポンスを返す。該当なしは 404
#[derive(Debug, Default)]
pub struct StubFetcher {
    routes: Vec<Route>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(mut self, url_contains: &str, response: Value) -> Self {
        self.routes.push(Route {
            method: Method::Get,
            url_contains: url_contains.to_string(),
            body_contains: None,
            response: Ok(response),
        });
        self
    }

    pub fn on_post(mut self, url_contains: &str, body_contains: &str, response: Value) -> Self {
        self.routes.push(Route {
            method: Method::Post,
            url_contains: url_contains.to_string(),
            body_contains: Some(body_contains.to_string()),
            response: Ok(response),
        });
        self
    }

    pub fn fail_get(mut self, url_contains: &str, status: u16) -> Self {
        self.routes.push(Route {
            method: Method::Get,
            url_contains: url_contains.to_string(),
            body_contains: None,
            response: Err(status),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, method: Method, url: &str, body: Option<&str>) -> Result<RawBody, ScraperError> {
        self.calls.lock().unwrap().push(url.to_string());

        let route = self.routes.iter().find(|route| {
            route.method == method
                && url.contains(&route.url_contains)
                && match (&route.body_contains, body) {
                    (Some(needle), Some(body)) => body.contains(needle.as_str()),
                    (Some(_), None) => false,
                    (None, _) => true,
                }
        });

        match route.map(|r| &r.response) {
            Some(Ok(value)) => Ok(RawBody::new(serde_json::to_vec(value)?)),
            Some(Err(status)) => Err(ScraperError::Status {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(ScraperError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn get(&self, url: &str) -> Result<RawBody, ScraperError> {
        self.respond(Method::Get, url, None)
    }

    async fn post(&self, url: &str, body: String) -> Result<RawBody, ScraperError> {
        self.respond(Method::Post, url, Some(&body))
    }
}
