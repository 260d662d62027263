use dispatch_core::{LookupStatus, REQUEST_ID_HEADER};
use eyre::{eyre, Result};
use reqwest::{Client, Method, Url};
use uuid::Uuid;

pub mod mock;

/// A response as received over HTTP
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub request_id: Option<Uuid>,
    pub body: String,
}

impl ApiResponse {
    /// Classify the response the way the customer service does
    pub fn lookup_status(&self) -> Option<LookupStatus> {
        LookupStatus::from_code(self.status)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// HTTP client for the fleet and the customer service
pub struct Api {
    client: Client,
    fleet: Url,
    customer: Url,
}

impl Api {
    pub(crate) fn new(fleet: String, customer: String) -> Self {
        // tiny_http stalls on idle keep-alive connections under concurrent load.
        let client = Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .expect("HTTP client");
        Self {
            client,
            fleet: Url::parse(&fleet).expect("server URL"),
            customer: Url::parse(&customer).expect("server URL"),
        }
    }

    pub fn fleet_url(&self) -> &Url {
        &self.fleet
    }

    pub fn customer_url(&self) -> &Url {
        &self.customer
    }

    async fn send(&self, method: Method, url: Url, request_id: Option<Uuid>) -> Result<ApiResponse> {
        let mut request = self.client.request(method, url);
        if let Some(id) = request_id {
            request = request.header(REQUEST_ID_HEADER, id.hyphenated().to_string());
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value).ok());
        let body = response.text().await?;
        Ok(ApiResponse {
            status,
            request_id,
            body,
        })
    }

    /// `GET /lookup/{region}`, with `region` percent-encoded
    pub async fn lookup(&self, region: &str) -> Result<ApiResponse> {
        self.lookup_with_id(region, None).await
    }

    pub async fn lookup_with_id(&self, region: &str, request_id: Option<Uuid>) -> Result<ApiResponse> {
        let mut url = self.fleet.clone();
        url.path_segments_mut()
            .map_err(|()| eyre!("fleet URL cannot be a base"))?
            .clear()
            .push("lookup")
            .push(region);
        self.send(Method::GET, url, request_id).await
    }

    /// `GET /customer?customer={id}`
    pub async fn customer(&self, customer_id: &str) -> Result<ApiResponse> {
        let mut url = self.customer.join("/customer")?;
        url.query_pairs_mut().append_pair("customer", customer_id);
        self.send(Method::GET, url, None).await
    }

    /// Send a raw request to the fleet service
    pub async fn fleet_raw(&self, method: Method, path_and_query: &str) -> Result<ApiResponse> {
        let url = self.fleet.join(path_and_query)?;
        self.send(method, url, None).await
    }

    /// Send a raw request to the customer service
    pub async fn customer_raw(&self, method: Method, path_and_query: &str) -> Result<ApiResponse> {
        let url = self.customer.join(path_and_query)?;
        self.send(method, url, None).await
    }
}
