//! One tracked property value.

use txgraph_model::Value;

/// Original and current value of one property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    original: Value,
    current: Value,
    touched: bool,
}

impl PropertyValue {
    /// Creates an unchanged value.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            original: value.clone(),
            current: value,
            touched: false,
        }
    }

    /// Returns the current value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.current
    }

    /// Returns the value as last committed.
    #[must_use]
    pub fn original_value(&self) -> &Value {
        &self.original
    }

    /// Returns whether the current value differs from the original.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.original != self.current
    }

    /// Returns whether the value was written, even with an equal value.
    #[must_use]
    pub fn is_touched(&self) -> bool {
        self.touched
    }

    pub(crate) fn set(&mut self, value: Value) {
        self.current = value;
        self.touched = true;
    }

    pub(crate) fn touch(&mut self) {
        self.touched = true;
    }

    pub(crate) fn commit(&mut self) {
        self.original = self.current.clone();
        self.touched = false;
    }

    pub(crate) fn rollback(&mut self) {
        self.current = self.original.clone();
        self.touched = false;
    }

    /// Takes over the current value of the same property in a sub-transaction.
    pub(crate) fn set_from_sub(&mut self, sub: &PropertyValue) {
        self.current = sub.current.clone();
        self.touched |= sub.touched;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_changes_and_touches() {
        let mut value = PropertyValue::new(Value::Integer(1));
        assert!(!value.has_changed());
        value.set(Value::Integer(2));
        assert!(value.has_changed());
        assert!(value.is_touched());
        assert_eq!(value.original_value(), &Value::Integer(1));
    }

    #[test]
    fn setting_back_to_original_is_unchanged_but_touched() {
        let mut value = PropertyValue::new(Value::Integer(1));
        value.set(Value::Integer(2));
        value.set(Value::Integer(1));
        assert!(!value.has_changed());
        assert!(value.is_touched());
    }

    #[test]
    fn commit_and_rollback() {
        let mut value = PropertyValue::new(Value::Integer(1));
        value.set(Value::Integer(2));
        value.rollback();
        assert_eq!(value.value(), &Value::Integer(1));
        assert!(!value.is_touched());

        value.set(Value::Integer(3));
        value.commit();
        assert_eq!(value.original_value(), &Value::Integer(3));
        assert!(!value.has_changed());
    }

    #[test]
    fn sub_values_merge_touched_flag() {
        let mut parent = PropertyValue::new(Value::Integer(1));
        parent.touch();
        let mut sub = PropertyValue::new(Value::Integer(1));
        sub.set(Value::Integer(5));
        parent.set_from_sub(&sub);
        assert_eq!(parent.value(), &Value::Integer(5));
        assert_eq!(parent.original_value(), &Value::Integer(1));
        assert!(parent.is_touched());
    }
}
