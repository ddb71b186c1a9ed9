const APP_NAME: &str = "PinShot";
const EXPIRE_AFTER_MS: u32 = 8000;

/// Desktop notification outside any pinned window. Delivery failures are only logged.
pub fn send(summary: &str, body: impl Into<String>) {
    let body = body.into();
    let shown = notify_rust::Notification::new()
        .appname(APP_NAME)
        .summary(summary)
        .body(&body)
        .timeout(notify_rust::Timeout::Milliseconds(EXPIRE_AFTER_MS))
        .show();
    match shown {
        Ok(_) => tracing::debug!(summary, "desktop notification shown"),
        Err(err) => tracing::warn!(summary, ?err, "desktop notification failed"),
    }
}
