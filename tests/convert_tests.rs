mod common;

use std::rc::Rc;

use kernel_bridge::{
    bridge::convert::{ConvertError, KernelType},
    host::{
        types::HostType,
        value::{Rational, Value},
    },
    kernel::obj::Obj,
};
use num_bigint::BigInt;

fn array_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(array) => array.items.borrow().clone(),
        other => panic!("expected an array, got {}", other),
    }
}

#[test]
fn test_round_trip_preserves_kernel_values() {
    let (mut kernel, bridge) = common::session();
    let big: BigInt = "1234567890123456789012345678901234567890".parse().unwrap();
    let rational = kernel
        .make_rational(&BigInt::from(-3), &BigInt::from(4))
        .unwrap();
    let text = kernel.new_string("kernel text");
    let list = kernel.new_plist(vec![Obj::Int(1), Obj::Int(2), Obj::Int(3)]);
    let name = kernel.new_string("x");
    let record = kernel.new_record(vec![("a".into(), Obj::Int(1)), ("b".into(), name)]);

    let objs = vec![
        Obj::Int(12345),
        kernel.bigint_to_int(&big),
        rational,
        Obj::Float(0.1),
        text,
        Obj::True,
        list,
        record,
    ];
    for obj in objs {
        let value = bridge.to_host(&kernel, obj, &HostType::Any).unwrap();
        let back = bridge.to_kernel(&mut kernel, &value, &KernelType::Any).unwrap();
        assert_eq!(kernel.view(back), kernel.view(obj), "round trip of {}", value);
    }
}

#[test]
fn test_round_trip_preserves_host_values() {
    let (mut kernel, bridge) = common::session();
    let big = (BigInt::from(1) << 64) + 1;
    let three_quarters = Rational::new(BigInt::from(3), BigInt::from(4)).unwrap();
    let values = vec![
        Value::Int64(7),
        Value::Int64(-(1 << 40)),
        Value::bigint(big),
        Value::Rational(Rc::new(three_quarters)),
        Value::Float64(2.5),
        Value::string("host text"),
        Value::Bool(false),
        Value::array(
            HostType::Int64,
            vec![Value::Int64(1), Value::Int64(2), Value::Int64(3)],
        ),
        Value::dict(
            HostType::Symbol,
            HostType::Any,
            vec![
                (Value::symbol("a"), Value::Int64(1)),
                (Value::symbol("b"), Value::string("x")),
            ],
        ),
    ];
    for value in values {
        let obj = bridge.to_kernel(&mut kernel, &value, &KernelType::Any).unwrap();
        let back = bridge.to_host(&kernel, obj, &HostType::Any).unwrap();
        assert_eq!(back, value, "round trip of {}", value);
    }
}

#[test]
fn test_undirected_kernel_to_host() {
    let (mut kernel, bridge) = common::session();
    let name = kernel.new_string("x");
    let inner = kernel.new_plist(vec![Obj::Char(b'c'), Obj::False]);
    let record = kernel.new_record(vec![
        ("name".into(), name),
        ("items".into(), inner),
        ("limit".into(), Obj::Infinity),
    ]);
    let value = bridge.to_host(&kernel, record, &HostType::Any).unwrap();
    insta::assert_snapshot!(
        value.to_string(),
        @r#"Dict{Symbol, Any}(:name => "x", :items => Any['c', false], :limit => 1//0)"#
    );
}

#[test]
fn test_directed_kernel_to_host() {
    let (mut kernel, bridge) = common::session();
    let record = kernel.new_record(vec![("a".into(), Obj::Int(1)), ("b".into(), Obj::Int(-2))]);
    let target = HostType::dict(HostType::String, HostType::Int8);
    let value = bridge.to_host(&kernel, record, &target).unwrap();
    insta::assert_snapshot!(value.to_string(), @r#"Dict{String, Int8}("a" => 1, "b" => -2)"#);

    let list = kernel.new_plist(vec![Obj::Int(1), Obj::Int(2)]);
    let value = bridge
        .to_host(&kernel, list, &HostType::array(HostType::Float64))
        .unwrap();
    insta::assert_snapshot!(value.to_string(), @"Float64[1.0, 2.0]");

    assert_eq!(
        bridge.to_host(&kernel, list, &HostType::String),
        Err(ConvertError::TypeMismatch {
            expected: "String".to_string(),
            found: "list".to_string(),
        })
    );
}

#[test]
fn test_fixed_width_targets_truncate() {
    let (mut kernel, bridge) = common::session();
    assert_eq!(
        bridge.to_host(&kernel, Obj::Int(300), &HostType::Int8),
        Ok(Value::Int8(44))
    );
    assert_eq!(
        bridge.to_host(&kernel, Obj::Int(-1), &HostType::UInt64),
        Ok(Value::UInt64(u64::MAX))
    );
    let big = kernel.make_int((1_i128 << 70) + 3);
    assert_eq!(
        bridge.to_host(&kernel, big, &HostType::UInt8),
        Ok(Value::UInt8(3))
    );
}

#[test]
fn test_rational_zero_denominator_is_infinity() {
    let (mut kernel, bridge) = common::session();
    let pos = Value::Rational(Rc::new(Rational::new(BigInt::from(1), BigInt::from(0)).unwrap()));
    let neg = Value::Rational(Rc::new(Rational::new(BigInt::from(-1), BigInt::from(0)).unwrap()));
    assert_eq!(bridge.to_kernel(&mut kernel, &pos, &KernelType::Any), Ok(Obj::Infinity));
    assert_eq!(bridge.to_kernel(&mut kernel, &neg, &KernelType::Any), Ok(Obj::NegInfinity));

    assert_eq!(bridge.to_host(&kernel, Obj::Infinity, &HostType::Any), Ok(pos));
    assert_eq!(bridge.to_host(&kernel, Obj::NegInfinity, &HostType::Any), Ok(neg));
}

#[test]
fn test_shared_kernel_list_stays_shared() {
    let (mut kernel, bridge) = common::session();
    let inner = kernel.new_plist(vec![Obj::Int(1)]);
    let outer = kernel.new_plist(vec![inner, inner]);
    let value = bridge.to_host(&kernel, outer, &HostType::Any).unwrap();
    let items = array_items(&value);
    assert!(items[0].same(&items[1]));

    // Mutation through one alias shows through the other.
    if let Value::Array(array) = &items[0] {
        array.items.borrow_mut().push(Value::Int64(2));
    }
    insta::assert_snapshot!(value.to_string(), @"Any[Any[1, 2], Any[1, 2]]");
}

#[test]
fn test_shared_host_array_stays_shared() {
    let (mut kernel, bridge) = common::session();
    let inner = Value::array(HostType::Int64, vec![Value::Int64(1)]);
    let outer = Value::tuple(vec![inner.clone(), inner]);
    let list = bridge.to_kernel(&mut kernel, &outer, &KernelType::Any).unwrap();
    let items = kernel.list_items(list).unwrap().to_vec();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], items[1]);
    assert!(matches!(items[0], Obj::Bag(_)));
}

#[test]
fn test_kernel_cycle_becomes_host_cycle() {
    let (mut kernel, bridge) = common::session();
    let list = kernel.new_plist(vec![Obj::Int(1)]);
    kernel.list_push(list, list);

    let value = bridge.to_host(&kernel, list, &HostType::Any).unwrap();
    let items = array_items(&value);
    assert!(items[1].same(&value));
    insta::assert_snapshot!(value.to_string(), @"Any[1, #= circular reference =#]");

    if let Value::Array(array) = &value {
        array.items.borrow_mut().clear();
    }
}

#[test]
fn test_host_cycle_becomes_kernel_cycle() {
    let (mut kernel, bridge) = common::session();
    let value = Value::array(HostType::Any, vec![Value::Int64(1)]);
    let Value::Array(array) = &value else {
        unreachable!()
    };
    array.items.borrow_mut().push(value.clone());

    let list = bridge.to_kernel(&mut kernel, &value, &KernelType::Any).unwrap();
    assert_eq!(kernel.list_items(list).unwrap()[1], list);
    insta::assert_snapshot!(kernel.view(list), @"[ 1, ~ ]");

    // A cycle through a host tuple is still a cycle in the kernel.
    let holder = Value::array(HostType::Any, vec![]);
    let tuple = Value::tuple(vec![holder.clone()]);
    if let Value::Array(holder) = &holder {
        holder.items.borrow_mut().push(tuple.clone());
    }
    let list = bridge.to_kernel(&mut kernel, &tuple, &KernelType::Any).unwrap();
    insta::assert_snapshot!(kernel.view(list), @"[ [ ~ ] ]");

    array.items.borrow_mut().clear();
    if let Value::Array(holder) = &holder {
        holder.items.borrow_mut().clear();
    }
}

#[test]
fn test_cycle_into_tuple_is_refused() {
    let (mut kernel, bridge) = common::session();
    let list = kernel.new_plist(vec![Obj::Int(1)]);
    kernel.list_push(list, list);
    let target = HostType::Tuple(vec![HostType::Int64, HostType::Any]);
    assert_eq!(
        bridge.to_host(&kernel, list, &target),
        Err(ConvertError::CyclicStructure)
    );
}

#[test]
fn test_unsupported_values_fail_explicitly() {
    let (mut kernel, bridge) = common::session();
    assert_eq!(
        bridge.to_kernel(&mut kernel, &Value::Nothing, &KernelType::Any),
        Err(ConvertError::Unsupported("Nothing".to_string()))
    );
    assert_eq!(
        bridge.to_host(&kernel, Obj::Fail, &HostType::Any),
        Err(ConvertError::Unsupported("fail".to_string()))
    );
    let nested = Value::array(HostType::Any, vec![Value::Int64(1), Value::Nothing]);
    assert!(bridge.to_kernel(&mut kernel, &nested, &KernelType::Any).is_err());
}
