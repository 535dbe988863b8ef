use std::{sync::OnceLock, time::Duration};

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderName, HeaderValue, REFERER};
use tracing::debug;

use crate::Result;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36 Edg/139.0.0.0";

const DEFAULT_REFERER: &str = "https://modelscope.cn/my/myaccesstoken";

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Headers a browser session sends along with the cookie when it polls the
/// quota endpoint from the account page.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    headers.insert(REFERER, HeaderValue::from_static(DEFAULT_REFERER));
    headers.insert(
        HeaderName::from_static("x-modelscope-accept-language"),
        HeaderValue::from_static("zh_CN"),
    );
    headers
}

/// Build the client used for quota calls.
pub fn build_quota_client(request_timeout: Duration) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(DEFAULT_USER_AGENT)
        .default_headers(browser_headers())
        .pool_max_idle_per_host(2);

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    Ok(builder.build()?)
}
