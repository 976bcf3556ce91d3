use std::rc::Rc;

use crate::kernel::{
    Kernel, error::KernelError, heap_object::HeapObject, heap_object::KernelFunction, obj::Obj,
};

type BuiltinFn = fn(&mut Kernel, &[Obj]) -> Result<Option<Obj>, KernelError>;

struct Builtin {
    name: &'static str,
    params: &'static [&'static str],
    variadic: bool,
    func: BuiltinFn,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "Length",
        params: &["list"],
        variadic: false,
        func: builtin_length,
    },
    Builtin {
        name: "Error",
        params: &["arg"],
        variadic: true,
        func: builtin_error,
    },
    Builtin {
        name: "IdFunc",
        params: &["obj"],
        variadic: false,
        func: builtin_id_func,
    },
    Builtin {
        name: "IsList",
        params: &["obj"],
        variadic: false,
        func: builtin_is_list,
    },
    Builtin {
        name: "IsRecord",
        params: &["obj"],
        variadic: false,
        func: builtin_is_record,
    },
];

/// Binds every builtin as a global function.
pub(crate) fn install(kernel: &mut Kernel) {
    for builtin in BUILTINS {
        let func = builtin.func;
        let function = kernel.new_function(KernelFunction {
            name: builtin.name.to_string(),
            arity: if builtin.variadic {
                None
            } else {
                Some(builtin.params.len())
            },
            params: builtin.params.iter().map(|p| p.to_string()).collect(),
            handler: Rc::new(func),
        });
        kernel.set_global(builtin.name, function);
    }
}

fn builtin_length(kernel: &mut Kernel, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
    let length = match kernel.bag_object(args[0]) {
        Some(HeapObject::PList(items)) => items.len(),
        Some(HeapObject::String(s)) => s.len(),
        _ => {
            let kind = kernel.type_name(args[0]).to_string();
            return Err(kernel.raise(format!(
                "Length: <list> must be a list (not a {})",
                kind
            )));
        }
    };
    Ok(Some(kernel.make_int(length as i128)))
}

fn builtin_error(kernel: &mut Kernel, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
    let mut message = String::new();
    for arg in args {
        match kernel.string_value(*arg) {
            Some(text) => message.push_str(text),
            None => message.push_str(&kernel.view(*arg)),
        }
    }
    Err(kernel.raise(message))
}

fn builtin_id_func(_kernel: &mut Kernel, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
    Ok(Some(args[0]))
}

fn builtin_is_list(kernel: &mut Kernel, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
    Ok(Some(Obj::bool(kernel.list_items(args[0]).is_some())))
}

fn builtin_is_record(kernel: &mut Kernel, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
    Ok(Some(Obj::bool(kernel.record_components(args[0]).is_some())))
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io, rc::Rc};

    use super::*;

    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_length() {
        let mut kernel = Kernel::new();
        let list = kernel.new_plist(vec![Obj::Int(1), Obj::Int(2)]);
        let result = kernel.call_global("Length", &[list]).unwrap();
        assert_eq!(result, Some(Obj::Int(2)));
    }

    #[test]
    fn test_error_writes_error_stream() {
        let mut kernel = Kernel::new();
        let buffer = Rc::new(RefCell::new(Vec::new()));
        kernel.set_error_output(Box::new(SharedBuffer(Rc::clone(&buffer))));

        let text = kernel.new_string("bad value ");
        let err = kernel.call_global("Error", &[text, Obj::Int(7)]).unwrap_err();
        assert_eq!(err.message, "bad value 7");
        assert_eq!(
            String::from_utf8(buffer.borrow().clone()).unwrap(),
            "Error, bad value 7\n"
        );
    }

    #[test]
    fn test_predicates() {
        let mut kernel = Kernel::new();
        let list = kernel.new_plist(vec![]);
        let rec = kernel.new_record(vec![]);
        assert_eq!(kernel.call_global("IsList", &[list]).unwrap(), Some(Obj::True));
        assert_eq!(kernel.call_global("IsList", &[rec]).unwrap(), Some(Obj::False));
        assert_eq!(kernel.call_global("IsRecord", &[rec]).unwrap(), Some(Obj::True));
        assert_eq!(kernel.call_global("IdFunc", &[Obj::Char(b'x')]).unwrap(), Some(Obj::Char(b'x')));
    }
}
