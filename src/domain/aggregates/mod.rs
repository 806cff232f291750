//! Aggregates module
pub mod order;
pub mod cart;

pub use order::{
    Action, Address, Checkout, NewOrder, Order, OrderDetails, OrderError, OrderHeader, OrderLine, OrderStatus,
    PayMethod, PayStatus,
};
pub use cart::{Cart, CartLine};
