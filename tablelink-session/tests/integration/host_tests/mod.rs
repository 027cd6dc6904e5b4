pub mod test_failed_guest_ignored_until_it_leaves;
pub mod test_relay_outage_reports_reconnecting;
pub mod test_silent_guest_restarted_once;
