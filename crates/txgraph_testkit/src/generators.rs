//! Property-based test generators using proptest.
//!
//! Provides strategies for random edits of the fixture graph, and the
//! operations to replay them against a transaction.

use crate::fixtures::{customer_id, item_id, order_id, ticket_id};
use proptest::prelude::*;
use txgraph_core::{ClientTransaction, DomainObject, TxResult};
use txgraph_model::{ObjectId, Value};

/// One edit of the seeded fixture graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphOp {
    /// Sets `Order.Customer`.
    SetCustomer {
        /// Order number, 1 to 3.
        order: i64,
        /// Customer number, 1 or 2, or none.
        customer: Option<i64>,
    },
    /// Appends an order to `Customer.Orders` unless it is already there.
    AddOrder {
        /// Customer number.
        customer: i64,
        /// Order number.
        order: i64,
    },
    /// Removes an order from `Customer.Orders`.
    RemoveOrder {
        /// Customer number.
        customer: i64,
        /// Order number.
        order: i64,
    },
    /// Moves an item to another order through `OrderItem.Order`.
    MoveItem {
        /// Item number, 1 to 3.
        item: i64,
        /// Order number.
        order: i64,
    },
    /// Sets `Order.OrderTicket` to ticket 1 or to none.
    SetTicket {
        /// Order number.
        order: i64,
        /// Whether the order gets the ticket.
        ticket: bool,
    },
    /// Sets `Order.OrderNumber`.
    SetNumber {
        /// Order number.
        order: i64,
        /// The new value.
        value: i64,
    },
}

impl GraphOp {
    /// Replays the edit in `tx`.
    pub fn apply(&self, tx: &mut ClientTransaction<'_>) -> TxResult<()> {
        match *self {
            Self::SetCustomer { order, customer } => {
                let order = tx.get_object(&order_id(order), false)?;
                let customer = customer
                    .map(|c| tx.get_object(&customer_id(c), false))
                    .transpose()?;
                tx.set_related_object(&order, "Customer", customer.as_ref())
            }
            Self::AddOrder { customer, order } => {
                let customer = tx.get_object(&customer_id(customer), false)?;
                let order = tx.get_object(&order_id(order), false)?;
                let orders = tx.get_related_objects(&customer, "Orders")?;
                if !orders.contains(&order) {
                    tx.add_related_object(&customer, "Orders", &order)?;
                }
                Ok(())
            }
            Self::RemoveOrder { customer, order } => {
                let customer = tx.get_object(&customer_id(customer), false)?;
                let order = tx.get_object(&order_id(order), false)?;
                tx.remove_related_object(&customer, "Orders", &order)?;
                Ok(())
            }
            Self::MoveItem { item, order } => {
                let item = tx.get_object(&item_id(item), false)?;
                let order = tx.get_object(&order_id(order), false)?;
                tx.set_related_object(&item, "Order", Some(&order))
            }
            Self::SetTicket { order, ticket } => {
                let order = tx.get_object(&order_id(order), false)?;
                let ticket = if ticket {
                    Some(tx.get_object(&ticket_id(1), false)?)
                } else {
                    None
                };
                tx.set_related_object(&order, "OrderTicket", ticket.as_ref())
            }
            Self::SetNumber { order, value } => {
                let order = tx.get_object(&order_id(order), false)?;
                tx.set_value(&order, "OrderNumber", value)
            }
        }
    }
}

/// Strategy for one edit of the seeded fixture graph.
pub fn graph_op_strategy() -> impl Strategy<Value = GraphOp> {
    let order = 1i64..=3;
    let customer = 1i64..=2;
    prop_oneof![
        (order.clone(), proptest::option::of(customer.clone()))
            .prop_map(|(order, customer)| GraphOp::SetCustomer { order, customer }),
        (customer.clone(), order.clone())
            .prop_map(|(customer, order)| GraphOp::AddOrder { customer, order }),
        (customer, order.clone())
            .prop_map(|(customer, order)| GraphOp::RemoveOrder { customer, order }),
        (1i64..=3, order.clone()).prop_map(|(item, order)| GraphOp::MoveItem { item, order }),
        (order.clone(), any::<bool>())
            .prop_map(|(order, ticket)| GraphOp::SetTicket { order, ticket }),
        (order, order_number_strategy())
            .prop_map(|(order, value)| GraphOp::SetNumber { order, value }),
    ]
}

/// Strategy for a sequence of up to `max` edits.
pub fn graph_ops_strategy(max: usize) -> impl Strategy<Value = Vec<GraphOp>> {
    prop::collection::vec(graph_op_strategy(), 0..=max)
}

/// Strategy for order numbers.
pub fn order_number_strategy() -> impl Strategy<Value = i64> {
    -1_000i64..1_000
}

/// Strategy for property values of the fixture's text properties.
pub fn text_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::from),
    ]
}

/// Every object of the seeded fixture graph.
pub fn fixture_ids() -> Vec<ObjectId> {
    let mut ids = vec![customer_id(1), customer_id(2)];
    ids.extend((1..=3).map(order_id));
    ids.extend((1..=3).map(item_id));
    ids.push(ticket_id(1));
    ids
}

/// Loads every object of the seeded fixture graph in `tx`.
pub fn load_fixture(tx: &mut ClientTransaction<'_>) -> TxResult<Vec<DomainObject>> {
    tx.get_objects(&fixture_ids())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_graph_ops_respect_bounds() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let ops = graph_ops_strategy(8)
                .new_tree(&mut runner)
                .unwrap()
                .current();
            assert!(ops.len() <= 8);
            for op in ops {
                match op {
                    GraphOp::MoveItem { item, order } => {
                        assert!((1..=3).contains(&item));
                        assert!((1..=3).contains(&order));
                    }
                    GraphOp::SetCustomer {
                        customer: Some(c), ..
                    } => assert!((1..=2).contains(&c)),
                    _ => {}
                }
            }
        }
    }

    #[test]
    fn test_fixture_ids() {
        assert_eq!(fixture_ids().len(), 9);
    }
}
