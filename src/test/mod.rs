//! Shared fixtures for unit tests.
//!
//! Every fixture builds its own [`TypeRegistry`], so tests never share types.

use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use crate::metadata::{
    method::{MethodBuilder, TypeSig},
    typesystem::{
        CorePrimitive, EventBuilder, ManagedTypeRc, Module, PropertyBuilder, TypeBuilder,
        TypeRegistry,
    },
    value::{ObjectRef, Value},
};

/// Interfaces and mixin implementations.
///
/// `ComplexMixin` implements `IFirst`, `ISecond` and `IThird`; `SimpleMixin` implements
/// `ISimpleMixin`; `OtherMixin` implements `IOtherMixin`. `IDerivedSimple` inherits
/// `ISimpleMixin`.
pub struct MixinFixture {
    pub registry: Arc<TypeRegistry>,
    pub first: ManagedTypeRc,
    pub second: ManagedTypeRc,
    pub third: ManagedTypeRc,
    pub simple: ManagedTypeRc,
    pub other: ManagedTypeRc,
    pub derived_from_simple: ManagedTypeRc,
    pub simple_type: ManagedTypeRc,
    pub other_type: ManagedTypeRc,
    pub complex_type: ManagedTypeRc,
}

impl MixinFixture {
    pub fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new().unwrap());
        let int32 = TypeSig::of(&registry.primitive(CorePrimitive::Int32));
        let string = TypeSig::of(&registry.primitive(CorePrimitive::String));

        let first = TypeBuilder::interface("Samples", "IFirst")
            .method(MethodBuilder::new("First").returns(int32.clone()))
            .build(&registry)
            .unwrap();
        let second = TypeBuilder::interface("Samples", "ISecond")
            .method(MethodBuilder::new("Second").returns(int32.clone()))
            .build(&registry)
            .unwrap();
        let third = TypeBuilder::interface("Samples", "IThird")
            .method(MethodBuilder::new("Third").returns(int32.clone()))
            .build(&registry)
            .unwrap();
        let simple = TypeBuilder::interface("Samples", "ISimpleMixin")
            .method(MethodBuilder::new("DoSomething").returns(int32.clone()))
            .build(&registry)
            .unwrap();
        let other = TypeBuilder::interface("Samples", "IOtherMixin")
            .method(
                MethodBuilder::new("Sum")
                    .param("a", int32.clone())
                    .param("b", int32.clone())
                    .returns(int32.clone()),
            )
            .build(&registry)
            .unwrap();
        let derived_from_simple = TypeBuilder::interface("Samples", "IDerivedSimple")
            .implements(&simple)
            .method(MethodBuilder::new("Describe").returns(string))
            .build(&registry)
            .unwrap();

        let simple_type = TypeBuilder::class("Samples", "SimpleMixin")
            .implements(&simple)
            .method(
                MethodBuilder::new("DoSomething")
                    .returns(int32.clone())
                    .body(|_, _| Ok(Value::I32(1))),
            )
            .build(&registry)
            .unwrap();
        let other_type = TypeBuilder::class("Samples", "OtherMixin")
            .implements(&other)
            .method(
                MethodBuilder::new("Sum")
                    .param("a", int32.clone())
                    .param("b", int32.clone())
                    .returns(int32.clone())
                    .body(|_, frame| {
                        let a = frame.argument(0)?.as_i32().unwrap_or_default();
                        let b = frame.argument(1)?.as_i32().unwrap_or_default();
                        Ok(Value::I32(a + b))
                    }),
            )
            .build(&registry)
            .unwrap();
        let complex_type = TypeBuilder::class("Samples", "ComplexMixin")
            .implements(&first)
            .implements(&second)
            .implements(&third)
            .method(MethodBuilder::new("First").returns(int32.clone()).body(|_, _| Ok(Value::I32(1))))
            .method(MethodBuilder::new("Second").returns(int32.clone()).body(|_, _| Ok(Value::I32(2))))
            .method(MethodBuilder::new("Third").returns(int32).body(|_, _| Ok(Value::I32(3))))
            .build(&registry)
            .unwrap();

        Self {
            registry,
            first,
            second,
            third,
            simple,
            other,
            derived_from_simple,
            simple_type,
            other_type,
            complex_type,
        }
    }

    pub fn simple_mixin(&self) -> ObjectRef {
        ObjectRef::new(&self.simple_type, ())
    }

    pub fn other_mixin(&self) -> ObjectRef {
        ObjectRef::new(&self.other_type, ())
    }

    pub fn complex_mixin(&self) -> ObjectRef {
        ObjectRef::new(&self.complex_type, ())
    }
}

/// State of a `Samples.Calculator` instance
#[derive(Default)]
pub struct CalculatorState {
    pub total: AtomicI32,
}

/// A calculator interface with every parameter shape, its implementation, and a
/// class hierarchy exercising member visibility.
///
/// `ICalculator`:
/// - `int Add(int a, int b)`
/// - `bool TryParse(string text, out int value)`
/// - `void Swap(ref int a, ref int b)`
/// - `T Echo<T>(T value)`
/// - `int Total { get; set; }`
/// - `event Changed`
///
/// `Service` (module `Samples.Services`, trusts nobody):
/// - `virtual string Greet(string name)`
/// - `string Helper()` (non-virtual)
/// - `protected virtual void OnGreet()`
/// - `internal virtual void Audit()`
/// - `private virtual void Secret()`
/// - `sealed string Locked()`
/// - `static void Create()`
/// - `virtual string Name { get; set; }`
///
/// `ServiceBase` (abstract): `abstract int Compute()`, `virtual string Describe()`
pub struct ServiceFixture {
    pub registry: Arc<TypeRegistry>,
    pub int32: ManagedTypeRc,
    pub string: ManagedTypeRc,
    pub calculator_iface: ManagedTypeRc,
    pub calculator: ManagedTypeRc,
    pub service: ManagedTypeRc,
    pub service_base: ManagedTypeRc,
}

impl ServiceFixture {
    pub fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new().unwrap());
        let int32 = registry.primitive(CorePrimitive::Int32);
        let string = registry.primitive(CorePrimitive::String);
        let boolean = registry.primitive(CorePrimitive::Boolean);
        let i = TypeSig::of(&int32);
        let s = TypeSig::of(&string);
        let b = TypeSig::of(&boolean);
        let object = TypeSig::of(&registry.object());

        let calculator_iface = TypeBuilder::interface("Samples", "ICalculator")
            .method(
                MethodBuilder::new("Add")
                    .param("a", i.clone())
                    .param("b", i.clone())
                    .returns(i.clone()),
            )
            .method(
                MethodBuilder::new("TryParse")
                    .param("text", s.clone())
                    .out_param("value", i.clone())
                    .returns(b.clone()),
            )
            .method(
                MethodBuilder::new("Swap")
                    .ref_param("a", i.clone())
                    .ref_param("b", i.clone()),
            )
            .method(
                MethodBuilder::new("Echo")
                    .generic("T")
                    .param("value", TypeSig::MethodParam(0))
                    .returns(TypeSig::MethodParam(0)),
            )
            .property(PropertyBuilder::new("Total", i.clone()).read_write())
            .event(EventBuilder::new("Changed", object).with_accessors())
            .build(&registry)
            .unwrap();

        let calculator = TypeBuilder::class("Samples", "Calculator")
            .implements(&calculator_iface)
            .method(
                MethodBuilder::new("Add")
                    .param("a", i.clone())
                    .param("b", i.clone())
                    .returns(i.clone())
                    .body(|_, frame| {
                        let a = frame.argument(0)?.as_i32().unwrap_or_default();
                        let b = frame.argument(1)?.as_i32().unwrap_or_default();
                        Ok(Value::I32(a + b))
                    }),
            )
            .method(
                MethodBuilder::new("TryParse")
                    .param("text", s.clone())
                    .out_param("value", i.clone())
                    .returns(b)
                    .body(|_, frame| {
                        let parsed = frame
                            .argument(0)?
                            .as_str()
                            .and_then(|text| text.parse::<i32>().ok());
                        frame.set_argument(1, Value::I32(parsed.unwrap_or_default()))?;
                        Ok(Value::Bool(parsed.is_some()))
                    }),
            )
            .method(
                MethodBuilder::new("Swap")
                    .ref_param("a", i.clone())
                    .ref_param("b", i.clone())
                    .body(|_, frame| {
                        let a = frame.argument(0)?.clone();
                        let b = frame.argument(1)?.clone();
                        frame.set_argument(0, b)?;
                        frame.set_argument(1, a)?;
                        Ok(Value::Void)
                    }),
            )
            .method(
                MethodBuilder::new("Echo")
                    .generic("T")
                    .param("value", TypeSig::MethodParam(0))
                    .returns(TypeSig::MethodParam(0))
                    .body(|_, frame| Ok(frame.argument(0)?.clone())),
            )
            .property(
                PropertyBuilder::new("Total", i.clone())
                    .getter(|m| {
                        m.body(|this, _| {
                            let total = this
                                .downcast::<CalculatorState>()
                                .map_or(0, |state| state.total.load(Ordering::SeqCst));
                            Ok(Value::I32(total))
                        })
                    })
                    .setter(|m| {
                        m.body(|this, frame| {
                            let value = frame.argument(0)?.as_i32().unwrap_or_default();
                            if let Some(state) = this.downcast::<CalculatorState>() {
                                state.total.store(value, Ordering::SeqCst);
                            }
                            Ok(Value::Void)
                        })
                    }),
            )
            .event(
                EventBuilder::new("Changed", TypeSig::of(&registry.object()))
                    .adder(|m| m.body(|_, _| Ok(Value::Void)))
                    .remover(|m| m.body(|_, _| Ok(Value::Void))),
            )
            .build(&registry)
            .unwrap();

        let services = Module::new("Samples.Services");
        let service = TypeBuilder::class("Samples", "Service")
            .module(&services)
            .method(
                MethodBuilder::new("Greet")
                    .make_virtual()
                    .param("name", s.clone())
                    .returns(s.clone())
                    .body(|_, frame| {
                        let name = frame.argument(0)?.as_str().unwrap_or_default().to_string();
                        Ok(Value::Str(format!("Hello, {}", name)))
                    }),
            )
            .method(
                MethodBuilder::new("Helper")
                    .returns(s.clone())
                    .body(|_, _| Ok(Value::Str("helper".to_string()))),
            )
            .method(MethodBuilder::new("OnGreet").protected().make_virtual().body(|_, _| Ok(Value::Void)))
            .method(MethodBuilder::new("Audit").internal().make_virtual().body(|_, _| Ok(Value::Void)))
            .method(MethodBuilder::new("Secret").private().make_virtual().body(|_, _| Ok(Value::Void)))
            .method(
                MethodBuilder::new("Locked")
                    .sealed()
                    .returns(s.clone())
                    .body(|_, _| Ok(Value::Str("locked".to_string()))),
            )
            .method(MethodBuilder::new("Create").make_static().body(|_, _| Ok(Value::Void)))
            .property(
                PropertyBuilder::new("Name", s.clone())
                    .getter(|m| m.make_virtual().body(|_, _| Ok(Value::Str("service".to_string()))))
                    .setter(|m| m.make_virtual().body(|_, _| Ok(Value::Void))),
            )
            .build(&registry)
            .unwrap();

        let service_base = TypeBuilder::class("Samples", "ServiceBase")
            .make_abstract()
            .method(MethodBuilder::new("Compute").make_abstract().returns(i))
            .method(
                MethodBuilder::new("Describe")
                    .make_virtual()
                    .returns(s)
                    .body(|_, _| Ok(Value::Str("base".to_string()))),
            )
            .build(&registry)
            .unwrap();

        Self {
            registry,
            int32,
            string,
            calculator_iface,
            calculator,
            service,
            service_base,
        }
    }

    pub fn calculator_instance(&self) -> ObjectRef {
        ObjectRef::new(&self.calculator, CalculatorState::default())
    }
}
