use std::fmt;

/// Typed failure raised at the dashboard API boundary.
///
/// Collectors never see raw transport errors; every failure is decoded into
/// one of these variants before it leaves the client.
#[derive(Debug)]
pub enum ApiError {
    /// 429 from the vendor, optionally with a Retry-After hint in seconds.
    RateLimited { retry_after: Option<u64> },
    /// 400/404: the feature or resource does not exist for this target.
    /// Treated as "zero data", not a failure.
    NotAvailable { status: u16 },
    /// Any other 4xx.
    Client { status: u16 },
    /// 5xx.
    Server { status: u16 },
    /// The HTTP request itself timed out.
    Timeout,
    /// The response arrived but did not match the expected shape.
    Validation(String),
    /// Transport-level failure (DNS, connect, TLS, ...).
    Transport(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited { retry_after: Some(secs) } => {
                write!(f, "rate limited, retry after {secs}s")
            }
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::NotAvailable { status } => write!(f, "not available (HTTP {status})"),
            Self::Client { status } => write!(f, "client error (HTTP {status})"),
            Self::Server { status } => write!(f, "server error (HTTP {status})"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Validation(msg) => write!(f, "unexpected response shape: {msg}"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::NotAvailable { .. } => ErrorKind::NotAvailable,
            Self::Client { .. } => ErrorKind::ClientError,
            Self::Server { .. } => ErrorKind::ServerError,
            Self::Timeout => ErrorKind::Timeout,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) => ErrorKind::Unknown,
        }
    }

    /// Whether this failure means "the feature is absent for this resource"
    /// rather than something going wrong.
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NotAvailable { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Validation(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Fixed failure taxonomy used on error counters and in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RateLimit,
    ClientError,
    NotAvailable,
    ServerError,
    Timeout,
    Validation,
    Unknown,
}

impl ErrorKind {
    /// Stable label value; never rename without a metrics migration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::ClientError => "client_error",
            Self::NotAvailable => "not_available",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::Validation => "validation",
            Self::Unknown => "unknown",
        }
    }

    /// Categorize an error that escaped a collector.
    ///
    /// Anything that is not a typed [`ApiError`] ends up as `Unknown` rather
    /// than guessing from the message text.
    pub fn classify(err: &anyhow::Error) -> Self {
        err.downcast_ref::<ApiError>()
            .map_or(Self::Unknown, ApiError::kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
