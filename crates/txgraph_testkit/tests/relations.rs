//! Bidirectional relation maintenance across the fixture graph.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::sync::Arc;
use txgraph_core::{ClientTransaction, EngineConfig, ObjectState, TxError, TxResult};
use txgraph_storage::{InMemoryStore, StoreConfig};
use txgraph_testkit::prelude::*;

/// Checks that every relation of the fixture graph agrees with its opposite side.
fn assert_symmetric(tx: &mut ClientTransaction<'_>) -> TxResult<()> {
    let customers = tx.get_objects(&[customer_id(1), customer_id(2)])?;
    let orders = tx.get_objects(&[order_id(1), order_id(2), order_id(3)])?;
    let items = tx.get_objects(&[item_id(1), item_id(2), item_id(3)])?;
    let ticket = tx.get_object(&ticket_id(1), false)?;

    for order in &orders {
        let customer = tx.get_related_object(order, "Customer")?;
        for candidate in &customers {
            let listed = tx.get_related_objects(candidate, "Orders")?;
            assert_eq!(
                listed.contains(order),
                customer.as_ref() == Some(candidate),
                "{} and {} disagree",
                order.id(),
                candidate.id()
            );
        }

        let owned: Vec<_> = tx.get_related_objects(order, "OrderItems")?;
        for item in &items {
            let parent = tx.get_related_object(item, "Order")?;
            assert_eq!(owned.contains(item), parent.as_ref() == Some(order));
        }

        let order_ticket = tx.get_related_object(order, "OrderTicket")?;
        let ticket_order = tx.get_related_object(&ticket, "Order")?;
        assert_eq!(
            order_ticket.as_ref() == Some(&ticket),
            ticket_order.as_ref() == Some(order)
        );
    }
    Ok(())
}

fn to_case_error(err: TxError) -> TestCaseError {
    TestCaseError::fail(err.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn relations_stay_symmetric_through_sub_commit(ops in graph_ops_strategy(12)) {
        let mut engine = TestEngine::new();
        let root = engine.create_root_transaction();
        load_fixture(&mut engine.transaction(root)).map_err(to_case_error)?;
        let sub = engine.create_sub_transaction(root).map_err(to_case_error)?;

        {
            let mut tx = engine.transaction(sub);
            for op in &ops {
                op.apply(&mut tx).map_err(to_case_error)?;
            }
            assert_symmetric(&mut tx).map_err(to_case_error)?;
            tx.commit().map_err(to_case_error)?;
        }

        assert_symmetric(&mut engine.transaction(root)).map_err(to_case_error)?;
        prop_assert_eq!(engine.store.statistics().persists, 0);
    }
}

#[test]
fn one_to_one_assignment_steals_the_ticket() {
    init_tracing();
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let mut tx = engine.transaction(root);
    let order1 = tx.get_object(&order_id(1), false).unwrap();
    let order2 = tx.get_object(&order_id(2), false).unwrap();
    let ticket = tx.get_object(&ticket_id(1), false).unwrap();

    tx.set_related_object(&order2, "OrderTicket", Some(&ticket))
        .unwrap();

    assert_eq!(tx.get_related_object(&order1, "OrderTicket").unwrap(), None);
    assert_eq!(
        tx.get_related_object(&ticket, "Order").unwrap(),
        Some(order2.clone())
    );
    assert_eq!(
        tx.get_original_related_object(&order1, "OrderTicket")
            .unwrap(),
        Some(ticket.clone())
    );
    assert_eq!(tx.object_state(&ticket).unwrap(), ObjectState::Changed);
    assert_eq!(tx.object_state(&order1).unwrap(), ObjectState::Changed);
    assert_eq!(tx.object_state(&order2).unwrap(), ObjectState::Changed);

    // Setting it back restores the original graph.
    tx.set_related_object(&order1, "OrderTicket", Some(&ticket))
        .unwrap();
    assert_eq!(tx.object_state(&order1).unwrap(), ObjectState::Unchanged);
    assert_eq!(tx.object_state(&order2).unwrap(), ObjectState::Unchanged);
    assert_eq!(tx.object_state(&ticket).unwrap(), ObjectState::Unchanged);
}

#[test]
fn collections_keep_storage_sort_order_in_sub_transactions() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let customer = engine.get_object(root, &customer_id(1), false).unwrap();
    let orders = engine
        .get_related_objects(root, &customer, "Orders")
        .unwrap();
    let ids: Vec<_> = orders.iter().map(|o| o.id().clone()).collect();
    assert_eq!(ids, vec![order_id(2), order_id(1)]);

    let sub = engine.create_sub_transaction(root).unwrap();
    let orders = engine
        .get_related_objects(sub, &customer, "Orders")
        .unwrap();
    let ids: Vec<_> = orders.iter().map(|o| o.id().clone()).collect();
    assert_eq!(ids, vec![order_id(2), order_id(1)]);
}

#[test]
fn unsorted_store_returns_key_order() {
    let store = InMemoryStore::with_config(
        order_mapping(),
        StoreConfig::new().sort_related_objects(false),
    );
    seed(&store);
    let mut engine = TestEngine::over(Arc::new(store), EngineConfig::default());
    let root = engine.create_root_transaction();
    let customer = engine.get_object(root, &customer_id(1), false).unwrap();
    let orders = engine
        .get_related_objects(root, &customer, "Orders")
        .unwrap();
    let ids: Vec<_> = orders.iter().map(|o| o.id().clone()).collect();
    assert_eq!(ids, vec![order_id(1), order_id(2)]);
}

#[test]
fn collection_edits_are_mirrored_on_the_foreign_key() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let mut tx = engine.transaction(root);
    let customer1 = tx.get_object(&customer_id(1), false).unwrap();
    let customer2 = tx.get_object(&customer_id(2), false).unwrap();
    let order1 = tx.get_object(&order_id(1), false).unwrap();
    let order3 = tx.get_object(&order_id(3), false).unwrap();

    tx.add_related_object(&customer1, "Orders", &order3)
        .unwrap();
    assert_eq!(
        tx.get_related_object(&order3, "Customer").unwrap(),
        Some(customer1.clone())
    );
    let emptied = tx.get_related_objects(&customer2, "Orders").unwrap();
    assert!(emptied.is_empty());

    let removed = tx.remove_related_object(&customer1, "Orders", &order1);
    assert!(removed.unwrap());
    let removed_again = tx.remove_related_object(&customer1, "Orders", &order1);
    assert!(!removed_again.unwrap());
    assert_eq!(tx.get_related_object(&order1, "Customer").unwrap(), None);

    tx.set_related_objects(&customer2, "Orders", &[order1.clone(), order3.clone()])
        .unwrap();
    assert_eq!(
        tx.get_related_objects(&customer2, "Orders").unwrap(),
        vec![order1.clone(), order3.clone()]
    );
    assert_eq!(
        tx.get_related_object(&order3, "Customer").unwrap(),
        Some(customer2.clone())
    );
    assert!(!tx
        .get_related_objects(&customer1, "Orders")
        .unwrap()
        .contains(&order3));

    let err = tx
        .set_related_objects(&customer2, "Orders", &[order1.clone(), order1.clone()])
        .unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));
}

#[test]
fn delete_notifies_opposite_end_points_only() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let customer = engine.get_object(root, &customer_id(2), false).unwrap();
    engine
        .get_related_objects(root, &customer, "Orders")
        .unwrap();
    let order = engine.get_object(root, &order_id(3), false).unwrap();
    engine
        .get_related_objects(root, &order, "OrderItems")
        .unwrap();
    engine
        .get_related_object(root, &order, "OrderTicket")
        .unwrap();

    let log = EventLog::new();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();
    engine.add_object_handler(&order, Arc::new(RecordingHandler::new("h", &log)));

    engine.delete(root, &order).unwrap();
    let relevant: Vec<String> = log
        .entries()
        .into_iter()
        .filter(|e| {
            e.starts_with("h.")
                || e.starts_with("ext.object_delet")
                || e.starts_with("ext.relation_chang")
        })
        .collect();
    assert_eq!(
        relevant,
        vec![
            "ext.object_deleting(Order|3)",
            "h.deleting(Order|3)",
            "ext.relation_changing(Customer|2.Orders: Order|3 -> -)",
            "ext.relation_changed(Customer|2.Orders: Order|3 -> -)",
            "h.deleted(Order|3)",
            "ext.object_deleted(Order|3)",
        ]
    );

    let len = log.len();
    engine.delete(root, &order).unwrap();
    assert_eq!(log.len(), len);
    assert_eq!(
        engine.object_state(root, &order).unwrap(),
        ObjectState::Deleted
    );
}

#[test]
fn deleting_an_order_with_items_fails_the_mandatory_check() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(2), false).unwrap();
    let item = engine.get_object(root, &item_id(3), false).unwrap();
    engine.delete(root, &order).unwrap();
    assert_eq!(
        engine.get_related_object(root, &item, "Order").unwrap(),
        None
    );

    let err = engine.commit(root).unwrap_err();
    assert!(
        matches!(
            &err,
            TxError::MandatoryRelationNotSet { id, property }
                if *id == item_id(3) && property == "Order"
        ),
        "{err}"
    );
    assert_eq!(engine.store.len(), 9);

    engine.delete(root, &item).unwrap();
    engine.commit(root).unwrap();
    assert_eq!(engine.store.len(), 7);
    assert!(engine.store.record(&order_id(2)).is_none());
}

#[test]
fn replace_and_insert_keep_both_sides_in_step() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let mut tx = engine.transaction(root);
    let customer1 = tx.get_object(&customer_id(1), false).unwrap();
    let customer2 = tx.get_object(&customer_id(2), false).unwrap();
    let order1 = tx.get_object(&order_id(1), false).unwrap();
    let order2 = tx.get_object(&order_id(2), false).unwrap();
    let order3 = tx.get_object(&order_id(3), false).unwrap();

    tx.replace_related_object(&customer1, "Orders", 0, &order3)
        .unwrap();
    assert_eq!(
        tx.get_related_objects(&customer1, "Orders").unwrap(),
        vec![order3.clone(), order1.clone()]
    );
    assert_eq!(tx.get_related_object(&order2, "Customer").unwrap(), None);
    assert_eq!(
        tx.get_related_object(&order3, "Customer").unwrap(),
        Some(customer1.clone())
    );
    let emptied = tx.get_related_objects(&customer2, "Orders").unwrap();
    assert!(emptied.is_empty());
    assert_eq!(
        tx.get_original_related_objects(&customer1, "Orders")
            .unwrap(),
        vec![order2.clone(), order1.clone()]
    );

    tx.insert_related_object(&customer2, "Orders", 0, &order2)
        .unwrap();
    assert_eq!(
        tx.get_related_objects(&customer2, "Orders").unwrap(),
        vec![order2.clone()]
    );
    assert_eq!(
        tx.get_related_object(&order2, "Customer").unwrap(),
        Some(customer2.clone())
    );

    let err = tx
        .replace_related_object(&customer2, "Orders", 5, &order1)
        .unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));
}
