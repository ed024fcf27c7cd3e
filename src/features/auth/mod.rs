pub mod bearer;
pub mod credentials;
pub mod handler;
pub mod models;
pub mod token;

// 对外导出路由构建函数，便于 main.rs 引用
pub use handler::{create_auth_router, issue_token};
