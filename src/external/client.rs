use std::sync::LazyLock;
use std::time::Duration;

/// Global HTTP client instance shared by all channel adapters.
///
/// Initialized lazily on first access and reused for every provider call.
///
/// # Benefits
/// - **Connection pooling**: reuses TCP connections across sends
/// - **DNS caching**: reduces lookup overhead for bulk dispatch
/// - **Memory efficiency**: single client instance for the subsystem
///
/// Per-request timeouts are set by the adapters; the defaults here are the
/// outer bound for any provider call.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        // Timeouts
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        // Connection pooling
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        // HTTP/2 settings
        .http2_adaptive_window(true)
        .http2_keep_alive_interval(Duration::from_secs(10))
        .http2_keep_alive_timeout(Duration::from_secs(20))
        // Enable compression (gzip, deflate, brotli, zstd)
        .gzip(true)
        .deflate(true)
        .brotli(true)
        .zstd(true)
        // Security
        .https_only(false)
        .use_rustls_tls()
        .user_agent(concat!("courier-rs/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client")
});
