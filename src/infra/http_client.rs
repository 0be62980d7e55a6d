use crate::app::ports::{HttpClientPort, HttpResponse, PageRequest};
use crate::config::FetcherConfig;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::{RETRY_AFTER, USER_AGENT};

/// `reqwest`-backed search client with the identifying header and request timeout
pub struct ReqwestHttp {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl ReqwestHttp {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            user_agent: config.user_agent.clone(),
        })
    }
}

#[async_trait]
impl HttpClientPort for ReqwestHttp {
    async fn get_page(&self, request: &PageRequest) -> Result<HttpResponse> {
        let limit = request.limit.to_string();
        let offset = request.offset.to_string();
        let resp = self
            .client
            .get(&self.base_url)
            .header(USER_AGENT, &self.user_agent)
            .query(&[
                ("q", request.query.as_str()),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status().as_u16();
        let retry_after = resp
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = resp.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}
