use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::IntoResponse;

use super::{Flow, Guard, RequestInfo};
use crate::config::{Config, RuntimeMode};

/// Redirects insecure traffic according to the deployment mode.
///
/// - review / staging: any plain-HTTP request goes to `https://` on the same host.
/// - production: the app domain always goes to the public domain; plain-HTTP
///   requests on the public domain go to `https://` and are logged.
/// - local: never redirects.
///
/// Hosts are compared without their port, and redirects drop it.
pub struct ForceHttps {
    mode: RuntimeMode,
    app_domain: String,
    public_domain: String,
}

impl ForceHttps {
    pub fn new(mode: RuntimeMode, app_domain: &str, public_domain: &str) -> Self {
        Self {
            mode,
            app_domain: app_domain.trim().to_string(),
            public_domain: public_domain.trim().to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.mode, &config.app_domain, &config.public_domain)
    }
}

/// Empty configured domains never match.
fn domain_matches(host: &str, domain: &str) -> bool {
    !domain.is_empty() && host.eq_ignore_ascii_case(domain)
}

/// 302 to `https://{host}{path_and_query}`, or continue if the target is not a valid header.
fn redirect(host: &str, request: &RequestInfo) -> Flow {
    let location = format!("https://{host}{}", request.path_and_query);
    match HeaderValue::from_str(&location) {
        Ok(value) => Flow::Halt((StatusCode::FOUND, [(header::LOCATION, value)]).into_response()),
        Err(_) => {
            tracing::debug!(host, "redirect target is not a valid header value, passing through");
            Flow::Continue
        }
    }
}

impl Guard for ForceHttps {
    fn inspect(&self, request: &RequestInfo, _headers: &mut HeaderMap) -> Flow {
        let Some(host) = request.hostname() else {
            return Flow::Continue;
        };

        match self.mode {
            RuntimeMode::Review | RuntimeMode::Staging => {
                if request.is_https() {
                    Flow::Continue
                } else {
                    redirect(host, request)
                }
            }
            RuntimeMode::Production => {
                if domain_matches(host, &self.app_domain) {
                    if self.public_domain.is_empty() {
                        return Flow::Continue;
                    }
                    return redirect(&self.public_domain, request);
                }
                if domain_matches(host, &self.public_domain) && !request.is_https() {
                    tracing::warn!(
                        host,
                        path = request.path,
                        ip = request.client_ip().unwrap_or_default(),
                        "insecure request on public domain"
                    );
                    return redirect(host, request);
                }
                Flow::Continue
            }
            RuntimeMode::Local => Flow::Continue,
        }
    }
}
