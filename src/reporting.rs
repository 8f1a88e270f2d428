//! # Reporting Module / 报告模块
//!
//! End-of-run reporting for the operator: a colored console summary and an
//! optional standalone HTML page. Commit statuses and coverage uploads are
//! handled by `core::reporter`, not here.
//!
//! 面向操作者的运行结束报告：彩色控制台摘要和可选的独立 HTML 页面。
//! 提交状态和覆盖率上传由 `core::reporter` 处理，而不是这里。

pub mod console;
pub mod html;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
