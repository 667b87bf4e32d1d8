use std::sync::Arc;

use time::{Duration, OffsetDateTime, Time};
use tracing::{info, warn};

use super::job::DigestJob;

/// Next occurrence of `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: OffsetDateTime, hour: u8) -> OffsetDateTime {
    let at = Time::from_hms(hour.min(23), 0, 0).unwrap_or(Time::MIDNIGHT);
    let today = now.replace_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Runs the digest once a day at `hour` UTC until the task is dropped.
pub async fn start_scheduler(job: Arc<DigestJob>, hour: u8) {
    loop {
        let now = OffsetDateTime::now_utc();
        let next = next_run_after(now, hour);
        let wait = (next - now).try_into().unwrap_or(std::time::Duration::ZERO);
        info!(next_run = %next, "digest scheduled");
        tokio::time::sleep(wait).await;

        let report = job.run().await;
        if !report.failed_recipients.is_empty() {
            warn!(failed = report.failed_recipients.len(), "digest finished with failed sends");
        }
    }
}
