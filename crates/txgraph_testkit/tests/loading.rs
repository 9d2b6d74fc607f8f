//! Loading, unloading, queries and transaction membership.

use std::sync::Arc;
use txgraph_core::{CrossTransactionViolation, ObjectState, TxError};
use txgraph_model::{ObjectId, RelationEndPointId, SortExpression, Value};
use txgraph_storage::CollectionQuery;
use txgraph_testkit::prelude::*;

#[test]
fn bulk_load_reports_every_missing_object() {
    init_tracing();
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let missing_order = order_id(99);
    let missing_item = item_id(98);

    let ids = [order_id(1), missing_order.clone(), missing_item.clone()];
    let err = engine.get_objects(root, &ids).unwrap_err();
    match err {
        TxError::ObjectsNotFound { ids } => {
            assert_eq!(ids, vec![missing_order.clone(), missing_item.clone()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.store.statistics().load_objects, 1);

    // The found object stays loaded, the missing ones are invalid now.
    let order = engine.get_object(root, &order_id(1), false).unwrap();
    assert_eq!(
        engine.object_state(root, &order).unwrap(),
        ObjectState::Unchanged
    );
    assert_eq!(engine.store.statistics().load_objects, 1);
    for id in [&missing_order, &missing_item] {
        let err = engine.get_object(root, id, false).unwrap_err();
        assert!(matches!(err, TxError::ObjectInvalid { .. }));
        assert_eq!(engine.try_get_object(root, id).unwrap(), None);
    }
}

#[test]
fn bulk_load_rejects_deleted_objects_like_single_get() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(3), false).unwrap();
    engine.delete(root, &order).unwrap();

    let err = engine
        .get_objects(root, &[order_id(1), order_id(3)])
        .unwrap_err();
    assert!(
        matches!(&err, TxError::ObjectDeleted { id } if *id == order_id(3)),
        "{err}"
    );
    let err = engine.get_object(root, &order_id(3), false).unwrap_err();
    assert!(matches!(err, TxError::ObjectDeleted { .. }));

    let found = engine.try_get_objects(root, &[order_id(3)]).unwrap();
    assert_eq!(found, vec![Some(order)]);
}

#[test]
fn sub_transaction_loads_through_its_parent() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let sub = engine.create_sub_transaction(root).unwrap();

    let order = engine.get_object(sub, &order_id(2), false).unwrap();
    assert_eq!(
        engine.object_state(root, &order).unwrap(),
        ObjectState::Unchanged
    );
    assert_eq!(engine.store.statistics().load_objects, 1);

    let nested = engine.create_sub_transaction(sub).unwrap();
    assert_eq!(
        engine.get_value(nested, &order, "OrderNumber").unwrap(),
        Value::Integer(2)
    );
    assert_eq!(engine.store.statistics().load_objects, 1);
}

#[test]
fn object_reference_defers_loading() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let reference = engine.get_object_reference(root, &order_id(2)).unwrap();
    assert_eq!(
        engine.object_state(root, &reference).unwrap(),
        ObjectState::NotLoadedYet
    );
    assert_eq!(engine.store.statistics().load_objects, 0);

    assert_eq!(
        engine.get_value(root, &reference, "OrderNumber").unwrap(),
        Value::Integer(2)
    );
    assert_eq!(
        engine.object_state(root, &reference).unwrap(),
        ObjectState::Unchanged
    );
    assert_eq!(
        engine.get_object(root, &order_id(2), false).unwrap(),
        reference
    );

    let err = engine
        .get_object_reference(root, &ObjectId::integer("Invoice", 1))
        .unwrap_err();
    assert!(matches!(err, TxError::Model(_)), "{err}");
}

#[test]
fn query_merges_with_loaded_state() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order1 = engine.get_object(root, &order_id(1), false).unwrap();
    engine.set_value(root, &order1, "OrderNumber", 50).unwrap();
    let order2 = engine.get_object(root, &order_id(2), false).unwrap();
    let item = engine.get_object(root, &item_id(3), false).unwrap();
    engine.delete(root, &item).unwrap();
    engine.delete(root, &order2).unwrap();

    let query = CollectionQuery::new("Order")
        .filter("Customer", customer_id(1))
        .sorted_by(SortExpression::ascending("OrderNumber"));
    let result = engine.query_collection(root, &query).unwrap();

    assert_eq!(result, vec![order1.clone()]);
    assert_eq!(
        engine.get_value(root, &order1, "OrderNumber").unwrap(),
        Value::Integer(50)
    );
    assert_eq!(engine.store.statistics().queries, 1);

    let bad = CollectionQuery::new("Order").filter("Colour", "red");
    assert!(engine.query_collection(root, &bad).is_err());
}

#[test]
fn query_in_sub_transaction_registers_in_the_root() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let sub = engine.create_sub_transaction(root).unwrap();

    let query = CollectionQuery::new("OrderItem").filter("Order", order_id(1));
    let items = engine.query_collection(sub, &query).unwrap();
    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(
            engine.object_state(sub, item).unwrap(),
            ObjectState::Unchanged
        );
        assert_eq!(
            engine.object_state(root, item).unwrap(),
            ObjectState::Unchanged
        );
    }
}

#[test]
fn unload_drops_unchanged_data_and_reloads_on_access() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(3), false).unwrap();

    assert!(engine.unload_data(root, &order_id(3)).unwrap());
    assert_eq!(
        engine.object_state(root, &order).unwrap(),
        ObjectState::NotLoadedYet
    );
    assert!(!engine.unload_data(root, &order_id(3)).unwrap());

    let reloaded = engine.get_object(root, &order_id(3), false).unwrap();
    assert_eq!(reloaded, order);
    assert_eq!(
        engine.object_state(root, &order).unwrap(),
        ObjectState::Unchanged
    );
    assert_eq!(engine.store.statistics().load_objects, 2);
}

#[test]
fn unload_refuses_changed_objects_and_active_hierarchies() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(1), false).unwrap();
    engine.get_object(root, &order_id(2), false).unwrap();
    engine.set_value(root, &order, "OrderNumber", 8).unwrap();

    let err = engine.unload_data(root, &order_id(1)).unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));

    let sub = engine.create_sub_transaction(root).unwrap();
    let err = engine.unload_data(root, &order_id(2)).unwrap_err();
    assert!(matches!(err, TxError::ReadOnly { .. }));
    engine.discard(sub).unwrap();

    let log = EventLog::new();
    let pin = RecordingExtension::new("pin", &log).vetoing("objects_unloading");
    engine.add_extension(root, Arc::new(pin)).unwrap();
    let err = engine.unload_data(root, &order_id(2)).unwrap_err();
    assert!(matches!(err, TxError::Vetoed { .. }));
    let order2 = engine.get_object(root, &order_id(2), false).unwrap();
    assert_eq!(
        engine.object_state(root, &order2).unwrap(),
        ObjectState::Unchanged
    );
}

#[test]
fn unload_virtual_end_point_forces_a_reload() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(1), false).unwrap();
    assert_eq!(
        engine
            .get_related_objects(root, &order, "OrderItems")
            .unwrap()
            .len(),
        2
    );
    let loads = engine.store.statistics().load_related_objects;

    let items = RelationEndPointId::new(order_id(1), "OrderItems");
    assert!(engine.unload_virtual_end_point(root, &items).unwrap());
    assert_eq!(
        engine
            .get_related_objects(root, &order, "OrderItems")
            .unwrap()
            .len(),
        2
    );
    assert_eq!(engine.store.statistics().load_related_objects, loads + 1);

    let real = RelationEndPointId::new(item_id(1), "Order");
    let err = engine.unload_virtual_end_point(root, &real).unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));

    let item = engine.get_object(root, &item_id(3), false).unwrap();
    engine
        .set_related_object(root, &item, "Order", Some(&order))
        .unwrap();
    let err = engine.unload_virtual_end_point(root, &items).unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));
}

#[test]
fn objects_from_another_root_must_be_enlisted() {
    let mut engine = TestEngine::new();
    let first = engine.create_root_transaction();
    let second = engine.create_root_transaction();
    let order = engine.get_object(first, &order_id(1), false).unwrap();

    let err = engine.get_value(second, &order, "OrderNumber").unwrap_err();
    assert!(matches!(
        &err,
        TxError::CrossTransaction {
            violation: CrossTransactionViolation::NotEnlisted { .. }
        }
    ));
    assert!(err
        .to_string()
        .contains("it was loaded or created in another transaction"));

    assert!(engine.enlist_domain_object(second, &order).unwrap());
    assert!(!engine.enlist_domain_object(second, &order).unwrap());
    assert!(engine.is_enlisted(second, &order).unwrap());
    assert_eq!(
        engine.get_value(second, &order, "OrderNumber").unwrap(),
        Value::Integer(1)
    );
    assert_eq!(
        engine.get_object(second, &order_id(1), false).unwrap(),
        order
    );

    // A different reference for the same ID cannot join.
    let third = engine.create_root_transaction();
    engine.get_object(third, &order_id(2), false).unwrap();
    let other = engine.get_object(first, &order_id(2), false).unwrap();
    let err = engine.enlist_domain_object(third, &other).unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));
}

#[test]
fn binding_transaction_objects_stay_bound() {
    let mut engine = TestEngine::new();
    let binding = engine.create_binding_transaction();
    let root = engine.create_root_transaction();
    let bound_customer = engine.get_object(binding, &customer_id(1), false).unwrap();
    let bound_order = engine.get_object(binding, &order_id(3), false).unwrap();
    assert_eq!(bound_customer.binding_transaction(), Some(binding));
    let customer = engine.get_object(root, &customer_id(2), false).unwrap();
    let order = engine.get_object(root, &order_id(1), false).unwrap();

    let err = engine.get_value(root, &bound_customer, "Name").unwrap_err();
    assert!(err
        .to_string()
        .contains("it is bound to a BindingClientTransaction"));
    let err = engine
        .enlist_domain_object(root, &bound_customer)
        .unwrap_err();
    assert!(matches!(
        err,
        TxError::CrossTransaction {
            violation: CrossTransactionViolation::Bound { .. }
        }
    ));
    let err = engine.enlist_domain_object(binding, &order).unwrap_err();
    assert!(matches!(
        err,
        TxError::CrossTransaction {
            violation: CrossTransactionViolation::BindingEnlist { .. }
        }
    ));
    let err = engine.create_sub_transaction(binding).unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));

    let err = engine
        .add_related_object(root, &customer, "Orders", &bound_order)
        .unwrap_err();
    assert!(matches!(
        &err,
        TxError::CrossTransaction {
            violation: CrossTransactionViolation::ObjectBound { .. }
        }
    ));
    assert!(err
        .to_string()
        .contains("the object 'Order|3' is bound to a BindingClientTransaction"));

    let err = engine
        .add_related_object(root, &bound_customer, "Orders", &order)
        .unwrap_err();
    assert!(matches!(
        err,
        TxError::CrossTransaction {
            violation: CrossTransactionViolation::OwnerBound { .. }
        }
    ));

    let other_binding = engine.create_binding_transaction();
    let foreign_order = engine
        .get_object(other_binding, &order_id(2), false)
        .unwrap();
    let err = engine
        .add_related_object(binding, &bound_customer, "Orders", &foreign_order)
        .unwrap_err();
    assert!(matches!(
        err,
        TxError::CrossTransaction {
            violation: CrossTransactionViolation::BoundToDifferent { .. }
        }
    ));

    // Inside its own binding transaction everything works as usual.
    engine
        .add_related_object(binding, &bound_customer, "Orders", &bound_order)
        .unwrap();
    engine.commit(binding).unwrap();
    assert_eq!(
        engine.store.record(&order_id(3)).unwrap().value("Customer"),
        &Value::Object(customer_id(1))
    );
}
