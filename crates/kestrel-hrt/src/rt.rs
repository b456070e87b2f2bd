//! Dispatcher thread scheduling setup.

/// Promotes the calling thread to `SCHED_FIFO` at the platform's maximum
/// priority, with the policy set explicitly rather than inherited.
///
/// Requires privileges (`CAP_SYS_NICE` or an rtprio limit) on most hosts;
/// without them the dispatcher keeps the default policy and pacing stays
/// best-effort.
#[cfg(unix)]
pub(crate) fn promote_to_realtime() {
    unsafe {
        let policy = libc::SCHED_FIFO;
        let priority = libc::sched_get_priority_max(policy);
        if priority < 0 {
            tracing::warn!("could not query SCHED_FIFO priority range");
            return;
        }
        // sched_param carries extra private fields on some platforms.
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        let rc = libc::pthread_setschedparam(libc::pthread_self(), policy, &param);
        if rc != 0 {
            tracing::warn!(
                errno = rc,
                "SCHED_FIFO unavailable; dispatcher keeps default scheduling"
            );
        } else {
            tracing::info!(priority, "dispatcher promoted to SCHED_FIFO");
        }
    }
}

#[cfg(not(unix))]
pub(crate) fn promote_to_realtime() {}
