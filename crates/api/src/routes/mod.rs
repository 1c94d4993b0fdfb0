pub mod cart;
pub mod coupons;
pub mod health;
pub mod invoices;
pub mod metrics;
pub mod orders;
