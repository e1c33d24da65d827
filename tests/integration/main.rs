//! HTTP and WebSocket integration tests

mod common;

mod test_auth_api;
mod test_chat_api;
mod test_checkin_api;
mod test_documents_api;
mod test_families_api;
mod test_prayer_chain_api;
mod test_shared_documents_api;
mod test_system_logs_api;
mod test_websocket;
