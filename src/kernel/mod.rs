//! In-process model of the embedded algebra kernel.
//!
//! The kernel owns a mark-and-sweep heap of bags, a global namespace, an
//! explicit root stack and an error output stream. Package types registered
//! at run time get their own type numbers and optional free functions, which
//! is how foreign objects hook into the kernel's collector.
//!
//! Collection only runs at the safe points [`Kernel::collect_garbage`] and
//! [`Kernel::maybe_collect`]. An object survives a collection only when it
//! is reachable from a global variable or from the root stack.

use std::{
    any::Any,
    collections::{BTreeMap, HashSet},
    fmt::Write as _,
    io::{self, Write},
    rc::Rc,
};

use log::debug;
use serde::Deserialize;

use crate::kernel::{
    error::KernelError,
    heap::{DEFAULT_GC_THRESHOLD, Finalizer, KernelHeap},
    heap_object::{HeapObject, KernelFunction},
    obj::{MAX_DEG_PERM2, Obj, TNum},
};

pub mod builtins;
pub mod error;
pub mod heap;
pub mod heap_object;
pub mod integer;
pub mod obj;

/// Kernel start-up options.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KernelOptions {
    /// Allocations between automatic collections at safe points.
    pub gc_threshold: usize,
    pub gc_enabled: bool,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            gc_threshold: DEFAULT_GC_THRESHOLD,
            gc_enabled: true,
        }
    }
}

impl KernelOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone)]
struct PackageType {
    name: String,
    tnum: TNum,
}

pub struct Kernel {
    pub(crate) heap: KernelHeap,
    globals: BTreeMap<String, Obj>,
    roots: Vec<Obj>,
    package_types: Vec<PackageType>,
    error_output: Box<dyn Write>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn new() -> Self {
        Self::with_options(KernelOptions::default())
    }

    pub fn with_options(options: KernelOptions) -> Self {
        let mut heap = KernelHeap::with_threshold(options.gc_threshold);
        heap.set_enabled(options.gc_enabled);
        let mut kernel = Self {
            heap,
            globals: BTreeMap::new(),
            roots: Vec::new(),
            package_types: Vec::new(),
            error_output: Box::new(io::stderr()),
        };
        builtins::install(&mut kernel);
        kernel
    }

    pub fn heap(&self) -> &KernelHeap {
        &self.heap
    }

    /// Returns the heap object behind `obj`, if it is a live bag reference.
    pub fn bag_object(&self, obj: Obj) -> Option<&HeapObject> {
        obj.as_bag().map(|bag| self.heap.get(bag))
    }

    pub fn tnum_of(&self, obj: Obj) -> TNum {
        match obj {
            Obj::Int(_) => TNum::INT,
            Obj::Char(_) => TNum::CHAR,
            Obj::True | Obj::False | Obj::Fail => TNum::BOOL,
            Obj::Float(_) => TNum::MACFLOAT,
            Obj::Infinity | Obj::NegInfinity => TNum::INFINITY,
            Obj::Bag(bag) => self.heap.get(bag).tnum(),
        }
    }

    /// Returns the kernel's name for the kind of `obj`.
    pub fn type_name(&self, obj: Obj) -> &str {
        match self.tnum_of(obj) {
            TNum::INT | TNum::INTPOS | TNum::INTNEG => "integer",
            TNum::RAT => "rational",
            TNum::MACFLOAT => "float",
            TNum::CHAR => "character",
            TNum::BOOL if obj == Obj::Fail => "fail",
            TNum::BOOL => "boolean",
            TNum::INFINITY => "infinity",
            TNum::STRING => "string",
            TNum::PERM2 | TNum::PERM4 => "permutation",
            TNum::PLIST => "list",
            TNum::PREC => "record",
            TNum::FUNCTION => "function",
            tnum => self.package_type_name(tnum).unwrap_or("unknown"),
        }
    }

    // -----------------------------------------------------------------------
    // Package types
    // -----------------------------------------------------------------------

    /// Registers a new package type and returns its type number.
    pub fn register_package_type(&mut self, name: &str) -> Result<TNum, KernelError> {
        if self.package_types.iter().any(|ty| ty.name == name) {
            return Err(self.raise(format!("package type {} is already registered", name)));
        }
        let tnum = TNum(TNum::FIRST_PACKAGE.0 + self.package_types.len() as u16);
        self.package_types.push(PackageType {
            name: name.to_string(),
            tnum,
        });
        debug!("registered package type {} as tnum {}", name, tnum.raw());
        Ok(tnum)
    }

    pub fn package_type_name(&self, tnum: TNum) -> Option<&str> {
        self.package_types
            .iter()
            .find(|ty| ty.tnum == tnum)
            .map(|ty| ty.name.as_str())
    }

    pub fn package_type(&self, name: &str) -> Option<TNum> {
        self.package_types
            .iter()
            .find(|ty| ty.name == name)
            .map(|ty| ty.tnum)
    }

    /// Installs the free function run when bags of `tnum` are collected.
    pub fn set_free_func(&mut self, tnum: TNum, finalizer: Finalizer) {
        self.heap.set_finalizer(tnum, finalizer);
    }

    pub fn new_package_bag(&mut self, tnum: TNum, payload: Box<dyn Any>) -> Obj {
        Obj::Bag(self.heap.alloc(HeapObject::Package { tnum, payload }))
    }

    /// Returns the payload of `obj` when it is a package bag of type `tnum`
    /// holding a `T`.
    pub fn package_payload<T: 'static>(&self, obj: Obj, tnum: TNum) -> Option<&T> {
        match self.bag_object(obj)? {
            HeapObject::Package { tnum: t, payload } if *t == tnum => payload.downcast_ref(),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Strings, lists, records, permutations
    // -----------------------------------------------------------------------

    pub fn new_string(&mut self, text: impl Into<String>) -> Obj {
        Obj::Bag(self.heap.alloc(HeapObject::String(text.into())))
    }

    pub fn string_value(&self, obj: Obj) -> Option<&str> {
        match self.bag_object(obj)? {
            HeapObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn new_plist(&mut self, items: Vec<Obj>) -> Obj {
        Obj::Bag(self.heap.alloc(HeapObject::PList(items)))
    }

    pub fn list_items(&self, obj: Obj) -> Option<&[Obj]> {
        match self.bag_object(obj)? {
            HeapObject::PList(items) => Some(items),
            _ => None,
        }
    }

    /// Appends `item` to a plain list; returns `false` if `list` is not one.
    pub fn list_push(&mut self, list: Obj, item: Obj) -> bool {
        let Some(bag) = list.as_bag() else {
            return false;
        };
        match self.heap.get_mut(bag) {
            HeapObject::PList(items) => {
                items.push(item);
                true
            }
            _ => false,
        }
    }

    pub fn new_record(&mut self, components: Vec<(String, Obj)>) -> Obj {
        Obj::Bag(self.heap.alloc(HeapObject::Record(components)))
    }

    pub fn record_components(&self, obj: Obj) -> Option<&[(String, Obj)]> {
        match self.bag_object(obj)? {
            HeapObject::Record(components) => Some(components),
            _ => None,
        }
    }

    /// Assigns a record component, replacing an existing one of the same name.
    pub fn record_assign(&mut self, record: Obj, name: &str, value: Obj) -> bool {
        let Some(bag) = record.as_bag() else {
            return false;
        };
        match self.heap.get_mut(bag) {
            HeapObject::Record(components) => {
                match components.iter_mut().find(|(key, _)| key == name) {
                    Some((_, slot)) => *slot = value,
                    None => components.push((name.to_string(), value)),
                }
                true
            }
            _ => false,
        }
    }

    /// Builds a permutation from zero-based point images.
    ///
    /// Degrees up to `MAX_DEG_PERM2` use the 16-bit representation.
    pub fn new_perm(&mut self, images: Vec<u32>) -> Result<Obj, KernelError> {
        let degree = images.len();
        let mut seen = vec![false; degree];
        for &image in &images {
            let image = image as usize;
            if image >= degree || seen[image] {
                return Err(self.raise("PermList: <list> must be a permutation"));
            }
            seen[image] = true;
        }

        let object = if degree <= MAX_DEG_PERM2 {
            HeapObject::Perm2(images.into_iter().map(|image| image as u16).collect())
        } else {
            HeapObject::Perm4(images)
        };
        Ok(Obj::Bag(self.heap.alloc(object)))
    }

    /// Returns the zero-based point images of a permutation of either width.
    pub fn perm_images(&self, obj: Obj) -> Option<Vec<u32>> {
        match self.bag_object(obj)? {
            HeapObject::Perm2(images) => Some(images.iter().map(|&i| i as u32).collect()),
            HeapObject::Perm4(images) => Some(images.clone()),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Globals, roots, collection
    // -----------------------------------------------------------------------

    pub fn set_global(&mut self, name: &str, value: Obj) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn global(&self, name: &str) -> Option<Obj> {
        self.globals.get(name).copied()
    }

    pub fn unbind_global(&mut self, name: &str) -> Option<Obj> {
        self.globals.remove(name)
    }

    /// Keeps `obj` alive across collections until the matching `pop_root`.
    pub fn push_root(&mut self, obj: Obj) {
        self.roots.push(obj);
    }

    pub fn pop_root(&mut self) -> Option<Obj> {
        self.roots.pop()
    }

    /// Runs a full collection and returns the number of bags freed.
    pub fn collect_garbage(&mut self) -> usize {
        let globals: Vec<Obj> = self.globals.values().copied().collect();
        self.heap.collect(&globals, &self.roots)
    }

    /// Collects if enough allocations happened since the last collection.
    pub fn maybe_collect(&mut self) -> bool {
        if self.heap.should_collect() {
            self.collect_garbage();
            true
        } else {
            false
        }
    }

    // -----------------------------------------------------------------------
    // Functions and errors
    // -----------------------------------------------------------------------

    pub fn new_function(&mut self, function: KernelFunction) -> Obj {
        Obj::Bag(self.heap.alloc(HeapObject::Function(function)))
    }

    /// Creates a function from a native handler and binds it as a global.
    pub fn install_function(
        &mut self,
        name: &str,
        params: &[&str],
        handler: impl Fn(&mut Kernel, &[Obj]) -> Result<Option<Obj>, KernelError> + 'static,
    ) -> Obj {
        let function = self.new_function(KernelFunction {
            name: name.to_string(),
            arity: Some(params.len()),
            params: params.iter().map(|p| p.to_string()).collect(),
            handler: Rc::new(handler),
        });
        self.set_global(name, function);
        function
    }

    pub fn function(&self, obj: Obj) -> Option<&KernelFunction> {
        match self.bag_object(obj)? {
            HeapObject::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Calls a kernel function object with `args`.
    ///
    /// `Ok(None)` means the function returned no value.
    pub fn call_function(&mut self, func: Obj, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
        let Some(function) = self.function(func) else {
            let kind = self.type_name(func).to_string();
            return Err(self.raise(format!(
                "Function Calls: <func> must be a function (not a {})",
                kind
            )));
        };
        if let Some(arity) = function.arity {
            if arity != args.len() {
                let name = function.name.clone();
                return Err(self.raise(format!(
                    "Function: number of arguments must be {} (not {}) in {}",
                    arity,
                    args.len(),
                    name
                )));
            }
        }
        let handler = Rc::clone(&function.handler);

        // Arguments stay rooted while the handler runs.
        let depth = self.roots.len();
        self.roots.extend_from_slice(args);
        let result = handler(self, args);
        self.roots.truncate(depth);
        result
    }

    /// Calls the function bound to the global `name`.
    pub fn call_global(&mut self, name: &str, args: &[Obj]) -> Result<Option<Obj>, KernelError> {
        match self.global(name) {
            Some(func) => self.call_function(func, args),
            None => Err(self.raise(format!("Variable: '{}' must have an assigned value", name))),
        }
    }

    /// Raises a kernel error: writes it to the error stream and returns it.
    pub fn raise(&mut self, message: impl Into<String>) -> KernelError {
        let error = KernelError::new(message);
        // The error stream is a sink of last resort; a failing write has
        // nowhere else to be reported.
        let _ = writeln!(self.error_output, "{}", error);
        let _ = self.error_output.flush();
        error
    }

    /// Installs a new error stream and returns the previous one.
    pub fn set_error_output(&mut self, output: Box<dyn Write>) -> Box<dyn Write> {
        std::mem::replace(&mut self.error_output, output)
    }

    // -----------------------------------------------------------------------
    // Printing
    // -----------------------------------------------------------------------

    /// Renders `obj` the way the kernel prints values.
    ///
    /// Containers already being printed further up render as `~`.
    pub fn view(&self, obj: Obj) -> String {
        let mut out = String::new();
        let mut active = HashSet::new();
        self.view_into(obj, &mut out, &mut active);
        out
    }

    fn view_into(&self, obj: Obj, out: &mut String, active: &mut HashSet<u32>) {
        let Obj::Bag(bag) = obj else {
            let _ = write!(out, "{}", obj);
            return;
        };
        if !active.insert(bag.index()) {
            out.push('~');
            return;
        }
        match self.heap.get(bag) {
            HeapObject::LargeInt { .. } => match self.int_to_bigint(obj) {
                Some(value) => {
                    let _ = write!(out, "{}", value);
                }
                None => out.push('?'),
            },
            HeapObject::Rational { num, den } => {
                self.view_into(*num, out, active);
                out.push('/');
                self.view_into(*den, out, active);
            }
            HeapObject::String(s) => {
                let _ = write!(out, "{:?}", s);
            }
            HeapObject::Perm2(_) | HeapObject::Perm4(_) => {
                let images = self.perm_images(obj).unwrap_or_default();
                out.push_str(&render_cycles(&images));
            }
            HeapObject::PList(items) => {
                out.push_str("[ ");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.view_into(*item, out, active);
                }
                out.push_str(" ]");
            }
            HeapObject::Record(components) => {
                out.push_str("rec( ");
                for (i, (name, value)) in components.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "{} := ", name);
                    self.view_into(*value, out, active);
                }
                out.push_str(" )");
            }
            HeapObject::Function(function) => {
                let _ = write!(out, "function {}( {} )", function.name, function.params.join(", "));
            }
            HeapObject::Package { tnum, .. } => {
                let name = self.package_type_name(*tnum).unwrap_or("unknown");
                let _ = write!(out, "<{}>", name);
            }
        }
        active.remove(&bag.index());
    }
}

/// Renders zero-based point images in one-based cycle notation.
fn render_cycles(images: &[u32]) -> String {
    let mut seen = vec![false; images.len()];
    let mut out = String::new();
    for start in 0..images.len() {
        if seen[start] || images[start] as usize == start {
            continue;
        }
        out.push('(');
        let mut point = start;
        loop {
            seen[point] = true;
            let _ = write!(out, "{}", point + 1);
            point = images[point] as usize;
            if point == start {
                break;
            }
            out.push(',');
        }
        out.push(')');
    }
    if out.is_empty() {
        out.push_str("()");
    }
    out
}
