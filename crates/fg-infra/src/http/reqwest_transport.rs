use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, Url};
use std::sync::Arc;

use fg_core::error::TransportError;
use fg_core::http::{HttpBody, HttpMethod, HttpRequest, HttpResponse, MultipartPart};
use fg_core::ports::{CookieSourcePort, HttpTransportPort};

/// reqwest-backed transport sharing one cookie jar with the backend origin.
///
/// The jar doubles as the [`CookieSourcePort`], so the anti-forgery cookie set
/// by the backend is what the gateway echoes back as a header.
pub struct ReqwestTransport {
    client: Client,
    jar: Arc<Jar>,
    origin: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let origin =
            Url::parse(base_url).with_context(|| format!("invalid api base url: {base_url}"))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            jar,
            origin,
        })
    }

    /// Seeds a cookie for the backend origin, as if the backend had set it.
    pub fn add_cookie(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.origin);
    }
}

fn method_of(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn multipart_form(parts: Vec<MultipartPart>) -> Result<Form, TransportError> {
    let mut form = Form::new();
    for part in parts {
        form = match part {
            MultipartPart::Text { name, value } => form.text(name, value),
            MultipartPart::File {
                name,
                file_name,
                mime_type,
                bytes,
            } => {
                let part = Part::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime_type)
                    .map_err(|e| TransportError::Other(format!("invalid mime type: {e}")))?;
                form.part(name, part)
            }
        };
    }
    Ok(form)
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Unreachable(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[async_trait]
impl HttpTransportPort for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .request(method_of(request.method), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            HttpBody::Empty => builder,
            HttpBody::Json(text) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(text),
            HttpBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl CookieSourcePort for ReqwestTransport {
    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let header = header.to_str().ok()?;
        header.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}
