//! HTTP transport used by the enhancement client only.
//!
//! `accept_invalid_certs` turns off certificate *and* hostname verification
//! for every request made by the built client. It exists for self-hosted
//! enhancement servers with self-signed certificates and is off unless the
//! user opts in. Other outbound traffic must use a client built from
//! [`TransportPolicy::default`].

use crate::utils::error::Result;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("page-enhance/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPolicy {
    pub accept_invalid_certs: bool,
    /// `None` 使用 reqwest 的預設值（不設逾時）
    pub timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportPolicy {
    /// 信任任何憑證與主機名稱，僅供自架伺服器使用
    pub fn trust_all() -> Self {
        Self {
            accept_invalid_certs: true,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build_client(&self) -> Result<Client> {
        Ok(self.apply(Client::builder()).build()?)
    }

    /// 把這個 policy 疊加到呼叫端提供的 builder 上（proxy、預設 header 等保留）
    pub fn apply(&self, builder: ClientBuilder) -> ClientBuilder {
        let mut builder = builder
            .use_rustls_tls()
            .user_agent(self.user_agent.as_str());

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if self.accept_invalid_certs {
            tracing::warn!(
                "⚠️ TLS certificate and hostname verification disabled for the enhancement client"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder
    }
}
