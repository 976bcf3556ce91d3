//! Direct box/unbox for the common scalar kinds.
//!
//! These are the fast paths behind `HostUnbox` and `HostBox`. They dispatch
//! on the concrete type only and never consult a target descriptor; anything
//! they do not recognise is refused rather than approximated.

use std::collections::HashSet;

use crate::{
    host::{
        types::HostType,
        value::{NodeId, Value},
    },
    kernel::{
        Kernel,
        heap_object::HeapObject,
        obj::{BagRef, Obj},
    },
};

/// Converts a host value to a kernel object, `Fail` when unsupported.
///
/// Array elements go through the same switch one by one, so an array with an
/// unsupported element becomes a list holding `Fail` at that position. An
/// array reached again from inside itself is unsupported too.
pub fn unbox(kernel: &mut Kernel, value: &Value) -> Obj {
    unbox_inner(kernel, value, &mut HashSet::new())
}

fn unbox_inner(kernel: &mut Kernel, value: &Value, open: &mut HashSet<NodeId>) -> Obj {
    match value {
        Value::Int64(v) => kernel.make_int(*v as i128),
        Value::Int32(v) => Obj::Int(*v as i64),
        Value::Int16(v) => Obj::Int(*v as i64),
        Value::Int8(v) => Obj::Int(*v as i64),
        Value::UInt64(v) => kernel.make_int(*v as i128),
        Value::UInt32(v) => Obj::Int(*v as i64),
        Value::UInt16(v) => Obj::Int(*v as i64),
        Value::UInt8(v) => Obj::Int(*v as i64),
        Value::Float64(v) => Obj::Float(*v),
        Value::Float32(v) => Obj::Float(*v as f64),
        Value::String(s) => kernel.new_string(s.to_string()),
        Value::Bool(b) => Obj::bool(*b),
        Value::Array(array) => {
            let Some(id) = value.identity() else {
                return Obj::Fail;
            };
            if !open.insert(id) {
                return Obj::Fail;
            }
            let elements = array.items.borrow().clone();
            let items: Vec<Obj> = elements
                .iter()
                .map(|item| unbox_inner(kernel, item, open))
                .collect();
            open.remove(&id);
            kernel.new_plist(items)
        }
        _ => Obj::Fail,
    }
}

/// Converts a kernel object to a host value, `None` when unsupported.
///
/// Only immediate integers are boxed; large integers are refused. A plain
/// list is refused as a whole if any element is, including a list that
/// contains itself.
pub fn box_obj(kernel: &Kernel, obj: Obj) -> Option<Value> {
    box_inner(kernel, obj, &mut HashSet::new())
}

fn box_inner(kernel: &Kernel, obj: Obj, open: &mut HashSet<BagRef>) -> Option<Value> {
    let bag = match obj {
        Obj::Int(v) => return Some(Value::Int64(v)),
        Obj::Float(v) => return Some(Value::Float64(v)),
        Obj::True => return Some(Value::Bool(true)),
        Obj::False => return Some(Value::Bool(false)),
        Obj::Bag(bag) => bag,
        _ => return None,
    };
    match kernel.bag_object(obj)? {
        HeapObject::String(s) => Some(Value::string(s)),
        HeapObject::Perm2(images) => Some(Value::array(
            HostType::UInt16,
            images.iter().map(|&image| Value::UInt16(image)).collect(),
        )),
        HeapObject::Perm4(images) => Some(Value::array(
            HostType::UInt32,
            images.iter().map(|&image| Value::UInt32(image)).collect(),
        )),
        HeapObject::PList(items) => {
            if !open.insert(bag) {
                return None;
            }
            let items = items
                .iter()
                .map(|&item| box_inner(kernel, item, open))
                .collect::<Option<Vec<_>>>();
            open.remove(&bag);
            Some(Value::array(HostType::Any, items?))
        }
        _ => None,
    }
}
