//! Admission control built atop `governor`.
//!
//! Each configured rule becomes a [`RequestLimiter`] (one shared budget, per
//! client IP, or per header value). [`RateLimitRules`] checks an inbound
//! request against every rule whose path prefix matches; the first rule that
//! is exhausted produces the rejection response.
use std::{
    hash::Hash,
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::ConnectInfo,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed, keyed::DefaultKeyedStateStore},
};
use http::{HeaderName, Request, StatusCode};

use crate::{
    config::models::{MissingKeyPolicy, RateLimitBy, RateLimitConfig},
    core::error::ApiError,
};

/// Parse a humantime period such as `1s`, `5m` or `1h`.
pub fn parse_period(period: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(period)
        .map_err(|e| format!("Invalid period string '{period}': {e}"))?;
    if duration.is_zero() {
        return Err(format!("Period '{period}' must be longer than zero"));
    }
    Ok(duration)
}

/// Bundles a concrete governor limiter with response metadata (status +
/// message) and the behaviour on a missing key.
pub struct LimiterWrapper<RL> {
    pub limiter: RL,
    pub status_code: StatusCode,
    pub message: String,
    pub on_missing_key: MissingKeyPolicy,
}

pub type DirectRateLimiterImpl = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;
pub type KeyedRateLimiterImpl<K> = RateLimiter<K, DefaultKeyedStateStore<K>, DefaultClock>;

impl<RL> LimiterWrapper<RL> {
    fn reject(&self, message: impl Into<String>) -> Box<Response> {
        Box::new(
            ApiError::RateLimited {
                status: self.status_code,
                message: message.into(),
            }
            .into_response(),
        )
    }

    fn missing_key(&self, message: impl Into<String>) -> Result<(), Box<Response>> {
        match self.on_missing_key {
            MissingKeyPolicy::Allow => Ok(()),
            MissingKeyPolicy::Deny => Err(self.reject(message)),
        }
    }
}

impl LimiterWrapper<DirectRateLimiterImpl> {
    fn check_direct(&self) -> Result<(), Box<Response>> {
        match self.limiter.check() {
            Ok(()) => Ok(()),
            Err(_) => Err(self.reject(self.message.clone())),
        }
    }
}

impl<K> LimiterWrapper<KeyedRateLimiterImpl<K>>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
{
    fn check_keyed(&self, key: &K) -> Result<(), Box<Response>> {
        match self.limiter.check_key(key) {
            Ok(()) => Ok(()),
            Err(_) => Err(self.reject(self.message.clone())),
        }
    }
}

/// Discriminated union over supported limiter types.
#[derive(Clone)]
pub enum RequestLimiter {
    Server(Arc<LimiterWrapper<DirectRateLimiterImpl>>),
    Ip(Arc<LimiterWrapper<KeyedRateLimiterImpl<IpAddr>>>),
    Header {
        limiter: Arc<LimiterWrapper<KeyedRateLimiterImpl<String>>>,
        header_name: HeaderName,
    },
}

impl RequestLimiter {
    /// Build a limiter from a `RateLimitConfig` definition.
    ///
    /// `requests` per `period` is spread evenly over the period, with a burst
    /// of up to `requests`.
    pub fn new(config: &RateLimitConfig) -> Result<Self, String> {
        let period = parse_period(&config.period)?;

        let requests = u32::try_from(config.requests)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                format!(
                    "Rate limit 'requests' must be between 1 and {}",
                    u32::MAX
                )
            })?;

        let quota = Quota::with_period(period / requests.get())
            .ok_or_else(|| format!("Invalid period duration: {period:?}"))?
            .allow_burst(requests);

        let status_code = StatusCode::from_u16(config.status_code)
            .map_err(|_| format!("Invalid status code: {}", config.status_code))?;

        tracing::info!(
            by = ?config.by,
            requests = config.requests,
            period = %config.period,
            status_code = config.status_code,
            path_prefix = ?config.path_prefix,
            "Creating rate limiter"
        );

        let message = config.message.clone();
        let on_missing_key = config.on_missing_key;
        match config.by {
            RateLimitBy::Server => Ok(RequestLimiter::Server(Arc::new(LimiterWrapper {
                limiter: RateLimiter::direct(quota),
                status_code,
                message,
                on_missing_key,
            }))),
            RateLimitBy::Ip => Ok(RequestLimiter::Ip(Arc::new(LimiterWrapper {
                limiter: RateLimiter::keyed(quota),
                status_code,
                message,
                on_missing_key,
            }))),
            RateLimitBy::Header => {
                let header_name_str = config
                    .header_name
                    .as_ref()
                    .ok_or_else(|| "headerName is required when limiting by header".to_string())?;
                let header_name = HeaderName::from_bytes(header_name_str.as_bytes())
                    .map_err(|e| format!("Invalid headerName '{header_name_str}': {e}"))?;
                Ok(RequestLimiter::Header {
                    limiter: Arc::new(LimiterWrapper {
                        limiter: RateLimiter::keyed(quota),
                        status_code,
                        message,
                        on_missing_key,
                    }),
                    header_name,
                })
            }
        }
    }

    /// Enforce this limiter against an HTTP request.
    pub fn check<T>(&self, req: &Request<T>) -> Result<(), Box<Response>> {
        match self {
            RequestLimiter::Server(limiter) => limiter.check_direct(),
            RequestLimiter::Ip(limiter) => {
                let client_ip = req
                    .extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|connect_info| connect_info.0.ip());

                match client_ip {
                    Some(ip) => limiter.check_keyed(&ip),
                    None => limiter.missing_key("No client IP available"),
                }
            }
            RequestLimiter::Header {
                limiter,
                header_name,
            } => {
                let header_value = req
                    .headers()
                    .get(header_name)
                    .and_then(|hv| hv.to_str().ok());

                match header_value {
                    Some(value) => limiter.check_keyed(&value.to_string()),
                    None => limiter.missing_key(format!("Required header '{header_name}' is missing")),
                }
            }
        }
    }
}

#[derive(Clone)]
struct Rule {
    path_prefix: Option<String>,
    limiter: RequestLimiter,
}

/// All configured rules, evaluated in declaration order.
#[derive(Clone, Default)]
pub struct RateLimitRules {
    rules: Vec<Rule>,
}

impl RateLimitRules {
    pub fn from_config(configs: &[RateLimitConfig]) -> Result<Self, String> {
        let rules = configs
            .iter()
            .enumerate()
            .map(|(i, config)| {
                RequestLimiter::new(config)
                    .map(|limiter| Rule {
                        path_prefix: config.path_prefix.clone(),
                        limiter,
                    })
                    .map_err(|e| format!("rateLimits[{i}]: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn check<T>(&self, req: &Request<T>) -> Result<(), Box<Response>> {
        let path = req.uri().path();
        for rule in &self.rules {
            if rule
                .path_prefix
                .as_deref()
                .is_some_and(|prefix| !path.starts_with(prefix))
            {
                continue;
            }
            rule.limiter.check(req)?;
        }
        Ok(())
    }
}
