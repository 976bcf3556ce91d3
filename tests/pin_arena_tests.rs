mod common;

use std::rc::Rc;

use kernel_bridge::{
    bridge::pin::{PinArena, PinTable},
    host::{types::HostType, value::Value},
    kernel::obj::Obj,
};

#[test]
fn test_slots_are_reused_last_released_first() {
    let mut arena = PinArena::new();
    let a = arena.acquire(Value::Int64(1));
    let b = arena.acquire(Value::Int64(2));
    let c = arena.acquire(Value::Int64(3));
    assert_eq!((a.get(), b.get(), c.get()), (1, 2, 3));

    assert_eq!(arena.release(b), Some(Value::Int64(2)));
    assert_eq!(arena.release(a), Some(Value::Int64(1)));
    assert_eq!(arena.release(a), None);
    assert_eq!(arena.vacant(), 2);

    assert_eq!(arena.acquire(Value::Int64(4)), a);
    assert_eq!(arena.acquire(Value::Int64(5)), b);
    assert_eq!(arena.acquire(Value::Int64(6)).get(), 4);
    assert_eq!(arena.len(), 4);
    assert_eq!(arena.get(c), Some(&Value::Int64(3)));
}

#[test]
fn test_pins_release_on_drop() {
    let table = PinTable::with_capacity(8);
    let pins: Vec<_> = (0..8).map(|i| table.pin(Value::Int64(i))).collect();
    assert_eq!(table.occupied(), 8);
    let indices: Vec<_> = pins.iter().map(|pin| pin.index().get()).collect();
    assert_eq!(indices, (1..=8).collect::<Vec<_>>());

    drop(pins);
    assert_eq!(table.occupied(), 0);
    assert_eq!(table.vacant(), 8);
}

#[test]
fn test_finalized_handles_free_their_slots() {
    let (mut kernel, bridge) = common::session();
    let shared = Value::array(HostType::Int64, vec![Value::Int64(7)]);
    let Value::Array(array) = &shared else {
        unreachable!()
    };

    let handles: Vec<Obj> = (0..16).map(|_| bridge.wrap(&mut kernel, shared.clone())).collect();
    assert_eq!(bridge.pins().occupied(), 16);
    assert_eq!(Rc::strong_count(array), 17);

    // Keep one handle reachable through a kernel global.
    kernel.set_global("kept", handles[3]);
    kernel.collect_garbage();

    assert_eq!(bridge.pins().occupied(), 1);
    assert_eq!(bridge.pins().vacant(), 15);
    assert_eq!(Rc::strong_count(array), 2);
    assert_eq!(
        bridge.types().pin_index_of(&kernel, handles[3]).map(|index| index.get()),
        Some(4)
    );

    kernel.unbind_global("kept");
    kernel.collect_garbage();
    assert_eq!(bridge.pins().occupied(), 0);
    assert_eq!(Rc::strong_count(array), 1);
}

#[test]
fn test_handles_survive_collection_while_rooted() {
    let (mut kernel, bridge) = common::session();
    let handle = bridge.wrap(&mut kernel, Value::string("alive"));
    let list = kernel.new_plist(vec![handle]);
    kernel.push_root(list);
    kernel.collect_garbage();
    assert_eq!(
        bridge.types().value_of(&kernel, handle),
        Some(Value::string("alive"))
    );

    kernel.pop_root();
    kernel.collect_garbage();
    assert_eq!(bridge.pins().occupied(), 0);

    // Freed slots are handed out again.
    let again = bridge.wrap(&mut kernel, Value::Nothing);
    assert_eq!(
        bridge.types().pin_index_of(&kernel, again).map(|index| index.get()),
        Some(1)
    );
}
