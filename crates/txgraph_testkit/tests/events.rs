//! Ordering and vetoing of transaction events.

use std::sync::Arc;
use txgraph_core::{EngineConfig, ObjectState, TxError};
use txgraph_model::Value;
use txgraph_testkit::prelude::*;

fn without_state_updates(log: &EventLog) -> Vec<String> {
    log.entries()
        .into_iter()
        .filter(|e| !e.contains("state_updated"))
        .filter(|e| !e.contains("_read") && !e.contains("_reading"))
        .collect()
}

#[test]
fn moving_an_item_notifies_every_end_point_in_plan_order() {
    init_tracing();
    let mut engine = TestEngine::with_config(EngineConfig::new().logging_listener(false));
    let root = engine.create_root_transaction();
    let item = engine.get_object(root, &item_id(3), false).unwrap();
    let order1 = engine.get_object(root, &order_id(1), false).unwrap();
    let order2 = engine.get_object(root, &order_id(2), false).unwrap();
    engine
        .get_related_objects(root, &order1, "OrderItems")
        .unwrap();
    engine
        .get_related_objects(root, &order2, "OrderItems")
        .unwrap();

    let log = EventLog::new();
    engine
        .add_listener(root, Arc::new(RecordingListener::new("lst", &log)))
        .unwrap();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();
    engine.add_object_handler(&item, Arc::new(RecordingHandler::new("h", &log)));
    engine.add_collection_handler(
        &order1,
        "OrderItems",
        Arc::new(RecordingHandler::new("c1", &log)),
    );
    engine.add_collection_handler(
        &order2,
        "OrderItems",
        Arc::new(RecordingHandler::new("c2", &log)),
    );

    engine
        .set_related_object(root, &item, "Order", Some(&order1))
        .unwrap();

    let item_change = "OrderItem|3.Order: Order|2 -> Order|1";
    let added = "Order|1.OrderItems: - -> OrderItem|3";
    let removed = "Order|2.OrderItems: OrderItem|3 -> -";
    let expected = vec![
        format!("lst.relation_changing({item_change})"),
        format!("ext.relation_changing({item_change})"),
        format!("h.relation_changing({item_change})"),
        format!("lst.relation_changing({added})"),
        format!("ext.relation_changing({added})"),
        "c1.adding(Order|1.OrderItems + OrderItem|3)".to_string(),
        format!("lst.relation_changing({removed})"),
        format!("ext.relation_changing({removed})"),
        "c2.removing(Order|2.OrderItems - OrderItem|3)".to_string(),
        "c2.removed(Order|2.OrderItems - OrderItem|3)".to_string(),
        format!("lst.relation_changed({removed})"),
        format!("ext.relation_changed({removed})"),
        "c1.added(Order|1.OrderItems + OrderItem|3)".to_string(),
        format!("lst.relation_changed({added})"),
        format!("ext.relation_changed({added})"),
        format!("h.relation_changed({item_change})"),
        format!("lst.relation_changed({item_change})"),
        format!("ext.relation_changed({item_change})"),
    ];
    assert_eq!(without_state_updates(&log), expected);

    // State updates come after the change events.
    let last_change = log
        .position(&format!("ext.relation_changed({item_change})"))
        .unwrap();
    let state = log
        .position("lst.state_updated(OrderItem|3=Changed)")
        .unwrap();
    assert!(state > last_change);
    assert_eq!(
        log.count("lst.end_point_state_updated(Order|1.OrderItems=changed)"),
        1
    );
}

#[test]
fn property_change_events_wrap_the_handler() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(1), false).unwrap();

    let log = EventLog::new();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();
    engine.add_object_handler(&order, Arc::new(RecordingHandler::new("h", &log)));

    engine.set_value(root, &order, "OrderNumber", 7).unwrap();
    assert_eq!(
        without_state_updates(&log),
        vec![
            "ext.property_value_changing(Order|1.OrderNumber: 1 -> 7)",
            "h.property_changing(Order|1.OrderNumber: 1 -> 7)",
            "h.property_changed(Order|1.OrderNumber: 1 -> 7)",
            "ext.property_value_changed(Order|1.OrderNumber: 1 -> 7)",
        ]
    );

    // Setting an equal value only touches the property.
    log.clear();
    engine.set_value(root, &order, "OrderNumber", 7).unwrap();
    assert!(log.is_empty());
    assert!(engine.is_touched(root, &order, "OrderNumber").unwrap());
}

#[test]
fn reads_are_reported_with_their_access_kind() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let order = engine.get_object(root, &order_id(2), false).unwrap();

    let log = EventLog::new();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();

    engine.get_value(root, &order, "OrderNumber").unwrap();
    engine
        .get_original_value(root, &order, "OrderNumber")
        .unwrap();
    engine
        .get_related_objects(root, &order, "OrderItems")
        .unwrap();

    assert_eq!(
        log.count("ext.property_value_reading(Order|2.OrderNumber current)"),
        1
    );
    assert_eq!(
        log.count("ext.property_value_read(Order|2.OrderNumber current = 2)"),
        1
    );
    assert_eq!(
        log.count("ext.property_value_read(Order|2.OrderNumber original = 2)"),
        1
    );
    assert_eq!(
        log.count("ext.relation_read(Order|2.OrderItems current = [OrderItem|3])"),
        1
    );
    let reading = log.position("ext.relation_reading(Order|2.OrderItems");
    let read = log.position("ext.relation_read(Order|2.OrderItems");
    assert!(reading.unwrap() < read.unwrap());
}

#[test]
fn load_events_report_found_and_missing_objects() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let log = EventLog::new();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();

    let found = engine
        .try_get_objects(root, &[order_id(1), order_id(99), order_id(1)])
        .unwrap();
    assert_eq!(found.len(), 3);
    assert!(found[1].is_none());
    assert_eq!(found[0], found[2]);

    assert_eq!(
        log.entries(),
        vec![
            "ext.objects_loading(Order|1,Order|99)",
            "ext.objects_not_found(Order|99)",
            "ext.objects_loaded(Order|1)",
        ]
    );
}

#[test]
fn sub_transaction_events_go_to_the_parent() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let log = EventLog::new();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();

    let sub = engine.create_sub_transaction(root).unwrap();
    engine.discard(sub).unwrap();

    assert_eq!(
        log.entries(),
        vec![
            format!("ext.sub_transaction_creating({root})"),
            format!("ext.sub_transaction_created({root} -> {sub})"),
        ]
    );
}

#[test]
fn vetoed_relation_change_leaves_the_graph_untouched() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let item = engine.get_object(root, &item_id(3), false).unwrap();
    let order1 = engine.get_object(root, &order_id(1), false).unwrap();
    let order2 = engine.get_object(root, &order_id(2), false).unwrap();

    let log = EventLog::new();
    engine.add_collection_handler(
        &order2,
        "OrderItems",
        Arc::new(RecordingHandler::new("c2", &log).vetoing("removing")),
    );

    let err = engine
        .set_related_object(root, &item, "Order", Some(&order1))
        .unwrap_err();
    assert!(matches!(&err, TxError::Vetoed { observer, .. } if observer == "c2"));
    assert_eq!(
        engine.get_related_object(root, &item, "Order").unwrap(),
        Some(order2.clone())
    );
    assert_eq!(
        engine
            .get_related_objects(root, &order2, "OrderItems")
            .unwrap(),
        vec![item.clone()]
    );
    assert_eq!(
        engine.object_state(root, &item).unwrap(),
        ObjectState::Unchanged
    );
    assert_eq!(log.count("c2.removed"), 0);
}

#[test]
fn vetoed_property_change_keeps_the_old_value() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let customer = engine.get_object(root, &customer_id(1), false).unwrap();
    let log = EventLog::new();
    let handler = RecordingHandler::new("h", &log).vetoing("property_changing");
    engine.add_object_handler(&customer, Arc::new(handler));

    let err = engine
        .set_value(root, &customer, "Name", "Renamed")
        .unwrap_err();
    assert!(matches!(err, TxError::Vetoed { .. }));
    assert_eq!(
        engine.get_value(root, &customer, "Name").unwrap(),
        Value::from("Customer 1")
    );
    assert_eq!(log.count("h.property_changed"), 0);
}

#[test]
fn extension_keys_are_unique_per_transaction() {
    let mut engine = TestEngine::new();
    let root = engine.create_root_transaction();
    let log = EventLog::new();
    engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap();
    let err = engine
        .add_extension(root, Arc::new(RecordingExtension::new("ext", &log)))
        .unwrap_err();
    assert!(matches!(err, TxError::InvalidOperation { .. }));
    assert_eq!(engine.extensions(root).unwrap(), vec!["ext".to_string()]);

    assert!(engine.remove_extension(root, "ext").unwrap());
    assert!(!engine.remove_extension(root, "ext").unwrap());
    assert!(engine.extensions(root).unwrap().is_empty());
}
