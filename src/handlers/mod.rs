pub mod health_handlers;
pub mod history_handlers;
pub mod json_body;
pub mod storage_handlers;
