//! Kernel package types wrapping host objects.
//!
//! A function handle carries a host callable and needs no pin: host
//! functions live in the host namespaces anyway. A value handle owns a
//! [`Pin`], so the wrapped value stays alive exactly as long as the kernel
//! bag does. The free function takes the pin out of the payload, which makes
//! a second release impossible.

use std::{any::Any, rc::Rc};

use log::trace;

use crate::{
    bridge::pin::{Pin, PinIndex, PinTable},
    host::value::{Function, Value},
    kernel::{Kernel, error::KernelError, obj::Obj, obj::TNum},
};

pub const HOST_FUNCTION_TYPE: &str = "HostFunction";
pub const HOST_OBJECT_TYPE: &str = "HostObject";

/// Payload of a function handle bag.
#[derive(Debug)]
pub struct HostFunctionHandle {
    pub func: Rc<Function>,
}

/// Payload of a value handle bag.
#[derive(Debug)]
pub struct HostValueHandle {
    pin: Option<Pin>,
}

impl HostValueHandle {
    pub fn value(&self) -> Option<Value> {
        self.pin.as_ref().and_then(Pin::value)
    }

    pub fn pin_index(&self) -> Option<PinIndex> {
        self.pin.as_ref().map(Pin::index)
    }
}

/// Free function for value handle bags.
fn release_value_handle(payload: &mut dyn Any) {
    let Some(handle) = payload.downcast_mut::<HostValueHandle>() else {
        return;
    };
    if let Some(pin) = handle.pin.take() {
        trace!("finalising value handle in slot {}", pin.index());
        drop(pin);
    }
}

/// The two wrapper types as registered in one kernel.
#[derive(Debug, Clone)]
pub struct ForeignTypes {
    function_tnum: TNum,
    value_tnum: TNum,
    pins: PinTable,
}

impl ForeignTypes {
    /// Registers both package types and the value handle free function.
    ///
    /// Fails when the kernel already has them.
    pub fn register(kernel: &mut Kernel, pins: PinTable) -> Result<ForeignTypes, KernelError> {
        let function_tnum = kernel.register_package_type(HOST_FUNCTION_TYPE)?;
        let value_tnum = kernel.register_package_type(HOST_OBJECT_TYPE)?;
        kernel.set_free_func(value_tnum, release_value_handle);
        Ok(ForeignTypes {
            function_tnum,
            value_tnum,
            pins,
        })
    }

    pub fn pins(&self) -> &PinTable {
        &self.pins
    }

    pub fn function_tnum(&self) -> TNum {
        self.function_tnum
    }

    pub fn value_tnum(&self) -> TNum {
        self.value_tnum
    }

    pub fn new_function_handle(&self, kernel: &mut Kernel, func: Rc<Function>) -> Obj {
        kernel.new_package_bag(self.function_tnum, Box::new(HostFunctionHandle { func }))
    }

    /// Wraps `value`; the value is pinned before the bag exists.
    pub fn new_value_handle(&self, kernel: &mut Kernel, value: Value) -> Obj {
        let pin = self.pins.pin(value);
        kernel.new_package_bag(self.value_tnum, Box::new(HostValueHandle { pin: Some(pin) }))
    }

    pub fn is_function_handle(&self, kernel: &Kernel, obj: Obj) -> bool {
        obj.as_bag().is_some() && kernel.tnum_of(obj) == self.function_tnum
    }

    pub fn is_value_handle(&self, kernel: &Kernel, obj: Obj) -> bool {
        obj.as_bag().is_some() && kernel.tnum_of(obj) == self.value_tnum
    }

    pub fn function_of(&self, kernel: &Kernel, obj: Obj) -> Option<Rc<Function>> {
        kernel
            .package_payload::<HostFunctionHandle>(obj, self.function_tnum)
            .map(|handle| Rc::clone(&handle.func))
    }

    pub fn value_of(&self, kernel: &Kernel, obj: Obj) -> Option<Value> {
        kernel
            .package_payload::<HostValueHandle>(obj, self.value_tnum)
            .and_then(HostValueHandle::value)
    }

    pub fn pin_index_of(&self, kernel: &Kernel, obj: Obj) -> Option<PinIndex> {
        kernel
            .package_payload::<HostValueHandle>(obj, self.value_tnum)
            .and_then(HostValueHandle::pin_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Host, types::HostType};

    fn setup() -> (Kernel, ForeignTypes) {
        let mut kernel = Kernel::new();
        let types = ForeignTypes::register(&mut kernel, PinTable::new()).unwrap();
        (kernel, types)
    }

    #[test]
    fn test_register_twice_fails() {
        let (mut kernel, _types) = setup();
        kernel.set_error_output(Box::new(std::io::sink()));
        assert!(ForeignTypes::register(&mut kernel, PinTable::new()).is_err());
    }

    #[test]
    fn test_value_handle_pins_value() {
        let (mut kernel, types) = setup();
        let handle = types.new_value_handle(&mut kernel, Value::string("kept"));
        assert!(types.is_value_handle(&kernel, handle));
        assert!(!types.is_function_handle(&kernel, handle));
        assert_eq!(types.value_of(&kernel, handle), Some(Value::string("kept")));
        let index = types.pin_index_of(&kernel, handle).unwrap();
        assert_eq!(types.pins().get(index), Some(Value::string("kept")));
        assert_eq!(kernel.type_name(handle), HOST_OBJECT_TYPE);
    }

    #[test]
    fn test_function_handle() {
        let (mut kernel, types) = setup();
        let func = Host::new().get_function("length").unwrap();
        let handle = types.new_function_handle(&mut kernel, Rc::clone(&func));
        assert!(types.is_function_handle(&kernel, handle));
        assert!(Rc::ptr_eq(&types.function_of(&kernel, handle).unwrap(), &func));
        assert_eq!(types.value_of(&kernel, handle), None);
        assert_eq!(types.pins().len(), 0);
    }

    #[test]
    fn test_collection_releases_pin() {
        let (mut kernel, types) = setup();
        let value = Value::array(HostType::Int64, vec![Value::Int64(1)]);
        let Value::Array(array) = &value else {
            unreachable!()
        };
        let kept = types.new_value_handle(&mut kernel, value.clone());
        types.new_value_handle(&mut kernel, value.clone());
        kernel.set_global("kept", kept);
        assert_eq!(Rc::strong_count(array), 3);

        kernel.collect_garbage();
        assert_eq!(Rc::strong_count(array), 2);
        assert_eq!((types.pins().occupied(), types.pins().vacant()), (1, 1));
        assert_eq!(types.value_of(&kernel, kept), Some(value.clone()));

        kernel.unbind_global("kept");
        kernel.collect_garbage();
        assert_eq!(Rc::strong_count(array), 1);
        assert_eq!(types.pins().vacant(), 2);
    }

    #[test]
    fn test_finalizer_ignores_foreign_payload() {
        let mut payload: Box<dyn Any> = Box::new(5_u32);
        release_value_handle(payload.as_mut());
        assert_eq!(payload.downcast_ref::<u32>(), Some(&5));
    }
}
