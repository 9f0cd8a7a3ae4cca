pub mod auth_forms;
pub mod browser;
pub mod chat_interface;
pub mod citation_views;
pub mod dashboard;
pub mod file_management;
pub mod query_interface;
pub mod toast;
