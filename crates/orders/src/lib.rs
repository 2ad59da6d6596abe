//! Customer orders domain: the order state machine and line bookkeeping.

pub mod order;

pub use order::{LineChange, Order, OrderLine, OrderStatus, PlacedLine};
