pub mod auth;
pub mod cart;
pub mod checkout;
pub mod dispatch;
pub mod order;
pub mod otp;
pub mod token;
