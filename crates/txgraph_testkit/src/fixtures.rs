//! Test fixtures and engine helpers.
//!
//! The fixture domain is a small order system:
//!
//! - `Customer` (`Name`) has many `Orders`, sorted by descending `OrderNumber`
//! - `Order` (`OrderNumber`) has many `OrderItems` and at most one `OrderTicket`
//! - `OrderItem` (`Product`) must belong to an order
//! - `OrderTicket` (`FileName`) belongs to at most one order
//!
//! The seeded store holds customers 1 and 2. Customer 1 owns orders 1 and 2,
//! customer 2 owns order 3. Order 1 has items 1 and 2 and ticket 1; order 2
//! has item 3.

use std::sync::Arc;
use txgraph_core::{Engine, EngineConfig};
use txgraph_model::{
    ClassDefinition, MappingConfiguration, ObjectId, PropertyDefinition, PropertyType,
    RelationDefinition, SortExpression, Value,
};
use txgraph_storage::InMemoryStore;

/// Returns the fixture mapping.
pub fn order_mapping() -> Arc<MappingConfiguration> {
    let mapping = MappingConfiguration::builder()
        .class(
            ClassDefinition::new("Customer")
                .with_property(PropertyDefinition::new("Name", PropertyType::Text)),
        )
        .class(
            ClassDefinition::new("Order")
                .with_property(PropertyDefinition::new(
                    "OrderNumber",
                    PropertyType::Integer,
                )),
        )
        .class(
            ClassDefinition::new("OrderItem")
                .with_property(PropertyDefinition::new("Product", PropertyType::Text)),
        )
        .class(
            ClassDefinition::new("OrderTicket")
                .with_property(PropertyDefinition::new("FileName", PropertyType::Text)),
        )
        .relation(
            RelationDefinition::one_to_many(
                "Customer:Orders",
                ("Customer", "Orders"),
                ("Order", "Customer"),
            )
            .sorted_by(SortExpression::descending("OrderNumber")),
        )
        .relation(
            RelationDefinition::one_to_many(
                "Order:OrderItems",
                ("Order", "OrderItems"),
                ("OrderItem", "Order"),
            )
            .foreign_key_mandatory(),
        )
        .relation(RelationDefinition::one_to_one(
            "Order:OrderTicket",
            ("Order", "OrderTicket"),
            ("OrderTicket", "Order"),
        ))
        .build()
        .expect("fixture mapping is valid");
    Arc::new(mapping)
}

/// ID of fixture customer `n`.
pub fn customer_id(n: i64) -> ObjectId {
    ObjectId::integer("Customer", n)
}

/// ID of fixture order `n`.
pub fn order_id(n: i64) -> ObjectId {
    ObjectId::integer("Order", n)
}

/// ID of fixture order item `n`.
pub fn item_id(n: i64) -> ObjectId {
    ObjectId::integer("OrderItem", n)
}

/// ID of fixture order ticket `n`.
pub fn ticket_id(n: i64) -> ObjectId {
    ObjectId::integer("OrderTicket", n)
}

/// Returns a store seeded with the fixture data.
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new(order_mapping());
    seed(&store);
    Arc::new(store)
}

/// Writes the fixture data into `store`.
pub fn seed(store: &InMemoryStore) {
    for n in 1..=2 {
        store
            .insert(
                &customer_id(n),
                [("Name", Value::from(format!("Customer {n}")))],
            )
            .expect("Failed to seed customer");
    }
    for (n, owner) in [(1, 1), (2, 1), (3, 2)] {
        store
            .insert(
                &order_id(n),
                [
                    ("OrderNumber", Value::Integer(n)),
                    ("Customer", Value::Object(customer_id(owner))),
                ],
            )
            .expect("Failed to seed order");
    }
    for (n, owner) in [(1, 1), (2, 1), (3, 2)] {
        store
            .insert(
                &item_id(n),
                [
                    ("Product", Value::from(format!("Product {n}"))),
                    ("Order", Value::Object(order_id(owner))),
                ],
            )
            .expect("Failed to seed order item");
    }
    store
        .insert(
            &ticket_id(1),
            [
                ("FileName", Value::from("ticket-1.pdf")),
                ("Order", Value::Object(order_id(1))),
            ],
        )
        .expect("Failed to seed order ticket");
}

/// An engine over its own seeded store.
///
/// Dereferences to the [`Engine`]; the store stays reachable for checking
/// what reached storage and how often it was asked.
pub struct TestEngine {
    /// The engine.
    pub engine: Engine,
    /// The store behind the engine.
    pub store: Arc<InMemoryStore>,
}

impl TestEngine {
    /// Creates an engine over a freshly seeded store.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates an engine with `config` over a freshly seeded store.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::over(seeded_store(), config)
    }

    /// Creates an engine over an existing store.
    pub fn over(store: Arc<InMemoryStore>, config: EngineConfig) -> Self {
        let mapping = Arc::clone(store.mapping());
        let engine = Engine::with_config(store.clone(), mapping, config);
        Self { engine, store }
    }

    /// Creates a second engine sharing this engine's store.
    pub fn second_engine(&self) -> Engine {
        let mapping = Arc::clone(self.store.mapping());
        Engine::new(self.store.clone(), mapping)
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestEngine {
    type Target = Engine;

    fn deref(&self) -> &Self::Target {
        &self.engine
    }
}

impl std::ops::DerefMut for TestEngine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.engine
    }
}

/// Runs a test against an engine over a freshly seeded store.
pub fn with_engine<F, R>(f: F) -> R
where
    F: FnOnce(&mut Engine) -> R,
{
    let mut test_engine = TestEngine::new();
    f(&mut test_engine.engine)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a store with `customers` customers owning `orders_each`
    /// orders apiece, each order carrying one item.
    ///
    /// Order and item numbers run from 1 across all customers.
    pub fn populated_store(customers: i64, orders_each: i64) -> Arc<InMemoryStore> {
        let store = InMemoryStore::new(order_mapping());
        let mut order = 0;
        for c in 1..=customers {
            store
                .insert(
                    &customer_id(c),
                    [("Name", Value::from(format!("Customer {c}")))],
                )
                .expect("Failed to insert customer");
            for _ in 0..orders_each {
                order += 1;
                store
                    .insert(
                        &order_id(order),
                        [
                            ("OrderNumber", Value::Integer(order)),
                            ("Customer", Value::Object(customer_id(c))),
                        ],
                    )
                    .expect("Failed to insert order");
                store
                    .insert(
                        &item_id(order),
                        [
                            ("Product", Value::from(format!("Product {order}"))),
                            ("Order", Value::Object(order_id(order))),
                        ],
                    )
                    .expect("Failed to insert order item");
            }
        }
        Arc::new(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_store() {
        let store = seeded_store();
        assert_eq!(store.len(), 9);
        let order = store.record(&order_id(3)).unwrap();
        assert_eq!(order.value("Customer"), &Value::Object(customer_id(2)));
    }

    #[test]
    fn test_with_engine() {
        with_engine(|engine| {
            let tx = engine.create_root_transaction();
            assert!(engine.get_object(tx, &customer_id(1), false).is_ok());
        });
    }

    #[test]
    fn test_populated_scenario() {
        let store = scenarios::populated_store(3, 2);
        assert_eq!(store.len(), 3 + 6 + 6);
        let item = store.record(&item_id(6)).unwrap();
        assert_eq!(item.value("Order"), &Value::Object(order_id(6)));
    }
}
