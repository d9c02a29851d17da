//! Domain counters exported through the process-wide Prometheus recorder.

use metrics::counter;

use crate::models::ApplicationStatus;

pub fn record_decision(status: ApplicationStatus) {
    counter!("onboarding_decisions_total", "decision" => status.as_str()).increment(1);
}

pub fn record_revert() {
    counter!("onboarding_decisions_total", "decision" => "REVERTED").increment(1);
}

pub fn record_admin_refresh(success: bool) {
    counter!("admin_session_refresh_total", "outcome" => outcome(success)).increment(1);
}

pub fn record_credential_email(success: bool) {
    counter!("credential_email_total", "outcome" => outcome(success)).increment(1);
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "failure"
    }
}
