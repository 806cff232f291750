//! Cart consolidation and the customer's own cart operations.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::aggregates::{Cart, CartLine};
use crate::domain::value_objects::{ProductRef, Quantity};
use crate::store::{CartStore, Catalog, OrderKey, OrderStore};
use crate::{Actor, Error, Result};

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    catalog: Arc<dyn Catalog>,
    orders: Arc<dyn OrderStore>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, catalog: Arc<dyn Catalog>, orders: Arc<dyn OrderStore>) -> Self {
        Self { carts, catalog, orders }
    }

    /// Snapshot of the user's cart. An empty cart is an error so that no
    /// order is ever built from it.
    pub async fn consolidate(&self, user_id: i64) -> Result<Cart> {
        let lines = self.carts.cart_lines(user_id).await?;
        if lines.is_empty() { return Err(Error::CartEmpty); }
        Ok(Cart::snapshot(user_id, lines))
    }

    /// Appends one cart row per line of `order_id` for `user_id`. Rows are
    /// never merged with what is already in the cart.
    #[instrument(skip(self))]
    pub async fn replay(&self, order_id: i64, user_id: i64) -> Result<usize> {
        let header = self.orders.get(&OrderKey::Id(order_id)).await?.ok_or(Error::OrderNotFound)?;
        if header.user_id != user_id { return Err(Error::OrderNotFound); }
        let now = Utc::now();
        let rows: Vec<CartLine> =
            self.orders.lines(order_id).await?.iter().map(|l| CartLine::replayed(user_id, l, now)).collect();
        self.carts.append_lines(&rows).await?;
        info!(order_id, user_id, lines = rows.len(), "order replayed into cart");
        Ok(rows.len())
    }

    pub async fn add(&self, actor: &Actor, product: ProductRef, flavor: Option<String>) -> Result<CartLine> {
        let lines = self.carts.cart_lines(actor.user_id).await?;
        if let Some(existing) = lines.into_iter().find(|l| l.matches(product, flavor.as_deref())) {
            let id = existing.id.ok_or_else(|| Error::DataCorruption("cart line without id".into()))?;
            let quantity = existing.quantity.increment()?;
            self.carts.set_quantity(id, quantity).await?;
            return Ok(CartLine { quantity, ..existing });
        }
        let info = self.catalog.product(product).await?.ok_or(Error::ProductNotFound)?;
        let draft = CartLine::draft(actor.user_id, product, info.name, info.image, flavor, Quantity::ONE, info.price);
        self.carts.insert_line(&draft).await
    }

    /// Takes one unit off the matching row, deleting it at quantity one.
    pub async fn sub(&self, actor: &Actor, product: ProductRef, flavor: Option<String>) -> Result<Option<CartLine>> {
        let lines = self.carts.cart_lines(actor.user_id).await?;
        let line = lines
            .into_iter()
            .find(|l| l.matches(product, flavor.as_deref()))
            .ok_or(Error::CartLineNotFound)?;
        let id = line.id.ok_or_else(|| Error::DataCorruption("cart line without id".into()))?;
        match line.quantity.decrement() {
            Some(quantity) => {
                self.carts.set_quantity(id, quantity).await?;
                Ok(Some(CartLine { quantity, ..line }))
            }
            None => {
                self.carts.delete_line(id).await?;
                Ok(None)
            }
        }
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<CartLine>> { self.carts.cart_lines(actor.user_id).await }

    pub async fn clean(&self, actor: &Actor) -> Result<u64> { self.carts.clear_cart(actor.user_id).await }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{Checkout, NewOrder, OrderHeader, OrderLine};
    use crate::domain::value_objects::{Money, OrderNumber};
    use crate::store::memory::MemoryStore;
    use crate::store::ProductInfo;
    use rust_decimal::Decimal;

    fn service(store: &Arc<MemoryStore>) -> CartService {
        CartService::new(store.clone(), store.clone(), store.clone())
    }

    fn price(units: i64) -> Money { Money::new(Decimal::new(units, 0)).unwrap() }

    fn stocked() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.add_product(ProductRef::Dish(1), ProductInfo { name: "Noodles".into(), image: None, price: price(12) });
        store.add_product(ProductRef::Setmeal(2), ProductInfo { name: "Combo".into(), image: None, price: price(30) });
        store
    }

    fn line(product: ProductRef, name: &str, qty: u32) -> OrderLine {
        OrderLine { product, name: name.into(), image: None, flavor: None, quantity: Quantity::new(qty).unwrap(), unit_amount: price(1) }
    }

    fn past_order(store: &MemoryStore, user_id: i64, lines: Vec<OrderLine>) -> i64 {
        let new = NewOrder {
            number: OrderNumber::parse("1700000000000001").unwrap(),
            user_id, address_book_id: 1, consignee: "Li".into(), phone: "138".into(), address: "x".into(),
            amount: Money::zero(), checkout: Checkout::default(), order_time: Utc::now(), lines: vec![],
        };
        store.seed_order(OrderHeader::inserted(0, &new), lines)
    }

    #[tokio::test]
    async fn test_consolidate_empty_cart() {
        let store = stocked();
        assert!(matches!(service(&store).consolidate(1).await, Err(Error::CartEmpty)));
    }

    #[tokio::test]
    async fn test_add_merges_same_product_and_flavor() {
        let store = stocked();
        let carts = service(&store);
        let actor = Actor::customer(1);
        carts.add(&actor, ProductRef::Dish(1), Some("spicy".into())).await.unwrap();
        let merged = carts.add(&actor, ProductRef::Dish(1), Some("spicy".into())).await.unwrap();
        assert_eq!(merged.quantity.value(), 2);
        carts.add(&actor, ProductRef::Dish(1), None).await.unwrap();
        let cart = carts.consolidate(1).await.unwrap();
        assert_eq!(cart.lines().len(), 2);
        assert_eq!(cart.subtotal(), price(36));
        assert!(matches!(carts.add(&actor, ProductRef::Dish(99), None).await, Err(Error::ProductNotFound)));
    }

    #[tokio::test]
    async fn test_add_refuses_quantity_overflow() {
        let store = stocked();
        let carts = service(&store);
        let actor = Actor::customer(1);
        let full = CartLine::draft(1, ProductRef::Dish(1), "Noodles", None, None, Quantity::new(Quantity::MAX).unwrap(), price(12));
        store.append_lines(&[full]).await.unwrap();
        assert!(matches!(carts.add(&actor, ProductRef::Dish(1), None).await, Err(Error::InvalidRequest(_))));
        assert_eq!(carts.list(&actor).await.unwrap()[0].quantity.value(), Quantity::MAX);
    }

    #[tokio::test]
    async fn test_sub_removes_last_unit() {
        let store = stocked();
        let carts = service(&store);
        let actor = Actor::customer(1);
        carts.add(&actor, ProductRef::Setmeal(2), None).await.unwrap();
        carts.add(&actor, ProductRef::Setmeal(2), None).await.unwrap();
        assert_eq!(carts.sub(&actor, ProductRef::Setmeal(2), None).await.unwrap().unwrap().quantity.value(), 1);
        assert!(carts.sub(&actor, ProductRef::Setmeal(2), None).await.unwrap().is_none());
        assert!(matches!(carts.sub(&actor, ProductRef::Setmeal(2), None).await, Err(Error::CartLineNotFound)));
    }

    #[tokio::test]
    async fn test_replay_appends_without_merging() {
        let store = stocked();
        let carts = service(&store);
        let actor = Actor::customer(1);
        carts.add(&actor, ProductRef::Dish(1), None).await.unwrap();
        let order_id = past_order(&store, 1, vec![line(ProductRef::Dish(1), "Noodles", 2), line(ProductRef::Setmeal(2), "Combo", 1)]);

        assert_eq!(carts.replay(order_id, 1).await.unwrap(), 2);
        let rows = carts.list(&actor).await.unwrap();
        assert_eq!(rows.len(), 3);
        let replayed: Vec<_> = rows[1..].iter().map(|l| (l.product, l.quantity.value())).collect();
        assert_eq!(replayed, [(ProductRef::Dish(1), 2), (ProductRef::Setmeal(2), 1)]);
        assert!(rows.iter().all(|l| l.user_id == 1));
    }

    #[tokio::test]
    async fn test_replay_foreign_order_is_not_found() {
        let store = stocked();
        let order_id = past_order(&store, 7, vec![line(ProductRef::Dish(1), "Noodles", 1)]);
        assert!(matches!(service(&store).replay(order_id, 1).await, Err(Error::OrderNotFound)));
        assert!(service(&store).list(&Actor::customer(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clean() {
        let store = stocked();
        let carts = service(&store);
        let actor = Actor::customer(3);
        carts.add(&actor, ProductRef::Dish(1), None).await.unwrap();
        carts.add(&actor, ProductRef::Setmeal(2), None).await.unwrap();
        assert_eq!(carts.clean(&actor).await.unwrap(), 2);
        assert!(carts.list(&actor).await.unwrap().is_empty());
    }
}
