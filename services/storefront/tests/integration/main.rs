
mod auth_test;
mod checkout_test;
mod order_test;
mod otp_test;
mod router_test;
