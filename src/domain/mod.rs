pub mod capability;
pub mod contact;
pub mod conversation;
pub mod favourite;
pub mod message;
pub mod notification;
pub mod privacy;
pub mod summary;
pub mod user;
