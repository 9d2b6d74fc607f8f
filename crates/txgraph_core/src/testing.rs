//! Shared fixture for unit tests.
//!
//! Customer 1 owns orders 1 and 2, customer 2 owns order 3. Order 1 has
//! items 1 and 2 and ticket 1; order 2 has item 3.

use crate::engine::Engine;
use std::sync::Arc;
use txgraph_model::{
    ClassDefinition, MappingConfiguration, ObjectId, PropertyDefinition, PropertyType,
    RelationDefinition, Value,
};
use txgraph_storage::InMemoryStore;

pub(crate) fn mapping() -> Arc<MappingConfiguration> {
    Arc::new(
        MappingConfiguration::builder()
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
            .relation(RelationDefinition::one_to_many(
                "Customer:Orders",
                ("Customer", "Orders"),
                ("Order", "Customer"),
            ))
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
            .unwrap(),
    )
}

pub(crate) fn customer(n: i64) -> ObjectId {
    ObjectId::integer("Customer", n)
}

pub(crate) fn order(n: i64) -> ObjectId {
    ObjectId::integer("Order", n)
}

pub(crate) fn item(n: i64) -> ObjectId {
    ObjectId::integer("OrderItem", n)
}

pub(crate) fn ticket(n: i64) -> ObjectId {
    ObjectId::integer("OrderTicket", n)
}

pub(crate) fn store() -> Arc<InMemoryStore> {
    let store = InMemoryStore::new(mapping());
    for n in 1..=2 {
        store
            .insert(
                &customer(n),
                [("Name", Value::from(format!("Customer {n}")))],
            )
            .unwrap();
    }
    for (n, owner) in [(1, 1), (2, 1), (3, 2)] {
        store
            .insert(
                &order(n),
                [
                    ("OrderNumber", Value::Integer(n)),
                    ("Customer", Value::Object(customer(owner))),
                ],
            )
            .unwrap();
    }
    for (n, owner) in [(1, 1), (2, 1), (3, 2)] {
        store
            .insert(
                &item(n),
                [
                    ("Product", Value::from(format!("Product {n}"))),
                    ("Order", Value::Object(order(owner))),
                ],
            )
            .unwrap();
    }
    store
        .insert(
            &ticket(1),
            [
                ("FileName", Value::from("ticket-1.pdf")),
                ("Order", Value::Object(order(1))),
            ],
        )
        .unwrap();
    Arc::new(store)
}

pub(crate) fn engine() -> Engine {
    let store = store();
    let mapping = Arc::clone(store.mapping());
    Engine::new(store, mapping)
}
