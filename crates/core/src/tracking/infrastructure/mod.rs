pub mod json_session_store;
