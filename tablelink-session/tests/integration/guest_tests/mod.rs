pub mod test_recovered_blip_keeps_session_quiet;
