pub mod bid;
pub mod bid_type;
pub mod notification;
pub mod role;
pub mod user;
