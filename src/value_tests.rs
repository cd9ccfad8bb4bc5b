// ABOUTME: Unit tests for the dynamic Value type.
// ABOUTME: Tests accessors, conversions, the msgpack! macro, and Display.

use crate::msgpack;
use crate::value::Value;

#[test]
fn test_accessors() {
    assert!(Value::Nil.is_nil());
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::Int(-5).as_i64(), Some(-5));
    assert_eq!(Value::Int(5).as_u64(), Some(5));
    assert_eq!(Value::Int(-5).as_u64(), None);
    assert_eq!(Value::UInt(u64::MAX).as_i64(), None);
    assert_eq!(Value::Float(1.5).as_f64(), Some(1.5));
    assert_eq!(Value::Int(2).as_f64(), Some(2.0));
    assert_eq!(Value::String("s".into()).as_str(), Some("s"));
    assert_eq!(Value::Binary(vec![1]).as_bytes(), Some(&[1u8][..]));
    assert!(Value::Binary(vec![1]).is_binary());
    assert!(!Value::String("s".into()).is_number());
}

#[test]
fn test_from_conversions() {
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from(-7i32), Value::Int(-7));
    assert_eq!(Value::from(7u8), Value::Int(7));

    // u64 collapses into Int while it fits
    assert_eq!(Value::from(7u64), Value::Int(7));
    assert_eq!(
        Value::from(u64::MAX),
        Value::UInt(u64::MAX)
    );

    assert_eq!(Value::from(1.5f32), Value::Float(1.5));
    assert_eq!(Value::from("hi"), Value::String("hi".into()));
    assert_eq!(Value::from(vec![1u8, 2]), Value::Binary(vec![1, 2]));
    assert_eq!(
        Value::from(vec![Value::Nil]),
        Value::Array(vec![Value::Nil])
    );
}

#[test]
fn test_from_iterator() {
    let value: Value = (1i32..=3).collect();
    assert_eq!(
        value,
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
}

#[test]
fn test_indexing() {
    let value = msgpack!([10, 20, 30]);
    assert_eq!(value.get(1), Some(&Value::Int(20)));
    assert_eq!(value.get(3), None);

    let value = msgpack!({"a": 1, "b": 2});
    assert_eq!(value.get_key("b"), Some(&Value::Int(2)));
    assert_eq!(value.get_key("c"), None);
}

#[test]
fn test_macro_shapes() {
    assert_eq!(msgpack!(nil), Value::Nil);
    assert_eq!(msgpack!(true), Value::Bool(true));
    assert_eq!(msgpack!(42), Value::Int(42));
    assert_eq!(msgpack!("s"), Value::String("s".into()));
    assert_eq!(msgpack!([]), Value::Array(vec![]));
    assert_eq!(msgpack!({}), Value::Map(vec![]));

    let value = msgpack!({
        "list": [1, [2, 3]],
        "inner": {"x": nil},
    });
    assert_eq!(
        value.get_key("list").and_then(|v| v.get(1)),
        Some(&Value::Array(vec![Value::Int(2), Value::Int(3)]))
    );
    assert_eq!(
        value.get_key("inner").and_then(|v| v.get_key("x")),
        Some(&Value::Nil)
    );
}

#[test]
fn test_map_preserves_order_and_duplicates() {
    let value = Value::Map(vec![
        (Value::String("k".into()), Value::Int(1)),
        (Value::String("k".into()), Value::Int(2)),
    ]);
    // First match wins on lookup; both entries survive
    assert_eq!(value.get_key("k"), Some(&Value::Int(1)));
    assert_eq!(value.as_map().unwrap().len(), 2);
}

#[test]
fn test_display() {
    assert_eq!(Value::Nil.to_string(), "nil");
    assert_eq!(Value::Int(-3).to_string(), "-3");
    assert_eq!(Value::String("a\"b".into()).to_string(), "\"a\\\"b\"");
    assert_eq!(Value::Binary(vec![0xde, 0xad]).to_string(), "h'dead'");
    assert_eq!(
        msgpack!({"a": [1, true]}).to_string(),
        "{\"a\": [1, true]}"
    );
}
