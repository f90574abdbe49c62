pub mod event;
pub mod notification;
pub mod password_reset;
pub mod registration;
pub mod user;
