use crate::model::Diff;

/// Capability boundary standing in for a real webhook delivery system (retries, HMAC signing,
/// backoff). A production deployment supplies an implementation without touching the Scheduler
/// or Diff Engine.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, diff: &Diff);
}

/// Logs the Diff instead of delivering it anywhere. Used whenever webhooks are disabled.
pub struct LoggingNotifier;

impl ChangeNotifier for LoggingNotifier {
    fn notify(&self, diff: &Diff) {
        tracing::info!(diff_id = diff.id, site_id = diff.site_id, significance = ?diff.significance, "diff ready");
    }
}
