//! Coupon redemption ledger. Keeps `uso_atual <= uso_maximo` under concurrent
//! redemption by compare-and-set against the coupon store.

#![warn(clippy::unwrap_used)]

pub mod error;
pub mod ledger;
pub mod model;
pub mod seed;
pub mod store;

pub use error::{LedgerError, StoreError};
pub use ledger::CouponLedger;
pub use model::{AvailableCoupons, Coupon, CouponKind, CouponListing, CouponStatus, CouponView};
pub use store::{CasOutcome, CouponStore, InMemoryCouponStore, RedisCouponStore};
