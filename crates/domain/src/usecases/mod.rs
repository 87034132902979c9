//! Application use cases / business logic

pub mod alert;
pub mod crawl;
pub mod notify;
pub mod render;

pub use alert::{AlertReport, AlertUseCase, LogLevel};
pub use crawl::{CrawlReport, CrawlUseCase, split_categories};
pub use notify::{DestinationError, NotifyConfig, NotifyOutcome, NotifyUseCase};
pub use render::{NotificationItem, render_message};
