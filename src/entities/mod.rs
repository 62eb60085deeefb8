pub mod company;
pub mod membership;
pub mod sale;
pub mod sale_item;
pub mod service_history;
pub mod user;
pub mod warranty;
