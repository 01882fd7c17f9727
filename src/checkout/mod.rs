pub mod carts;
pub mod coupons;
pub mod error;
pub mod inventory;
pub mod merge;
pub mod order_number;
pub mod orders;
pub mod pricing;
pub mod shipping;
pub mod validation;
