//! Contracts, implementations and interceptors shared by the integration tests.

#![allow(dead_code)]

use std::{any::Any, sync::Arc};

use parking_lot::Mutex;
use proxyscope::{
    metadata::method::{ParamMode, Parameter},
    prelude::*,
};

/// A registry populated with the sample contracts.
pub struct Samples {
    pub registry: Arc<TypeRegistry>,
    pub int32: ManagedTypeRc,
    pub string: ManagedTypeRc,
    /// `ICalculator`: `Add`, `TryParse(string, out int)`, `Swap(ref int, ref int)`,
    /// `Pair<T, U>(T, U)`
    pub calculator_iface: ManagedTypeRc,
    pub calculator: ManagedTypeRc,
    /// `IGreeter`: `string Greet(string)`
    pub greeter_iface: ManagedTypeRc,
    /// `ISimpleMixin` and `SimpleMixin`
    pub simple: ManagedTypeRc,
    pub simple_type: ManagedTypeRc,
    /// Another implementation of `ISimpleMixin`
    pub rival_type: ManagedTypeRc,
    /// `IOtherMixin` and `OtherMixin`
    pub other: ManagedTypeRc,
    pub other_type: ManagedTypeRc,
    /// `Greeter`: a non-sealed class taking a greeting in its constructor
    pub greeter: ManagedTypeRc,
}

/// State of a `Samples.Greeter` instance
pub struct GreeterState {
    pub greeting: String,
}

impl Samples {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(TypeRegistry::new().unwrap()))
    }

    pub fn with_registry(registry: Arc<TypeRegistry>) -> Self {
        let int32 = registry.primitive(CorePrimitive::Int32);
        let string = registry.primitive(CorePrimitive::String);
        let boolean = registry.primitive(CorePrimitive::Boolean);
        let i = TypeSig::of(&int32);
        let s = TypeSig::of(&string);
        let b = TypeSig::of(&boolean);

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
                MethodBuilder::new("Pair")
                    .generic("T")
                    .generic("U")
                    .param("first", TypeSig::MethodParam(0))
                    .param("second", TypeSig::MethodParam(1))
                    .returns(TypeSig::MethodParam(0)),
            )
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
                MethodBuilder::new("Pair")
                    .generic("T")
                    .generic("U")
                    .param("first", TypeSig::MethodParam(0))
                    .param("second", TypeSig::MethodParam(1))
                    .returns(TypeSig::MethodParam(0))
                    .body(|_, frame| {
                        let closed_over = frame
                            .generic_arguments
                            .iter()
                            .map(|ty| ty.fullname())
                            .collect::<Vec<_>>()
                            .join(",");
                        Ok(Value::Str(closed_over))
                    }),
            )
            .build(&registry)
            .unwrap();

        let greeter_iface = TypeBuilder::interface("Samples", "IGreeter")
            .method(MethodBuilder::new("Greet").param("name", s.clone()).returns(s.clone()))
            .build(&registry)
            .unwrap();

        let simple = TypeBuilder::interface("Samples", "ISimpleMixin")
            .method(MethodBuilder::new("DoSomething").returns(i.clone()))
            .build(&registry)
            .unwrap();
        let simple_type = TypeBuilder::class("Samples", "SimpleMixin")
            .implements(&simple)
            .method(
                MethodBuilder::new("DoSomething")
                    .returns(i.clone())
                    .body(|_, _| Ok(Value::I32(1))),
            )
            .build(&registry)
            .unwrap();
        let rival_type = TypeBuilder::class("Samples", "RivalMixin")
            .implements(&simple)
            .method(
                MethodBuilder::new("DoSomething")
                    .returns(i.clone())
                    .body(|_, _| Ok(Value::I32(2))),
            )
            .build(&registry)
            .unwrap();

        let other = TypeBuilder::interface("Samples", "IOtherMixin")
            .method(
                MethodBuilder::new("Sum")
                    .param("a", i.clone())
                    .param("b", i.clone())
                    .returns(i.clone()),
            )
            .build(&registry)
            .unwrap();
        let other_type = TypeBuilder::class("Samples", "OtherMixin")
            .implements(&other)
            .method(
                MethodBuilder::new("Sum")
                    .param("a", i.clone())
                    .param("b", i.clone())
                    .returns(i)
                    .body(|_, frame| {
                        let a = frame.argument(0)?.as_i32().unwrap_or_default();
                        let b = frame.argument(1)?.as_i32().unwrap_or_default();
                        Ok(Value::I32(a + b))
                    }),
            )
            .build(&registry)
            .unwrap();

        let greeter = TypeBuilder::class("Samples", "Greeter")
            .implements(&greeter_iface)
            .constructor(
                vec![Parameter {
                    name: "greeting".to_string(),
                    sig: s.clone(),
                    mode: ParamMode::In,
                }],
                |arguments| {
                    let greeting = arguments
                        .first()
                        .and_then(Value::as_str)
                        .unwrap_or("Hello")
                        .to_string();
                    let state: Arc<dyn Any + Send + Sync> = Arc::new(GreeterState { greeting });
                    Ok(state)
                },
            )
            .method(
                MethodBuilder::new("Greet")
                    .make_virtual()
                    .param("name", s.clone())
                    .returns(s.clone())
                    .body(|this, frame| {
                        let greeting = this
                            .downcast::<GreeterState>()
                            .map_or("Hello", |state| state.greeting.as_str());
                        let name = frame.argument(0)?.as_str().unwrap_or_default();
                        Ok(Value::Str(format!("{}, {}", greeting, name)))
                    }),
            )
            .method(
                MethodBuilder::new("Farewell")
                    .returns(s)
                    .body(|_, _| Ok(Value::Str("Goodbye".to_string()))),
            )
            .build(&registry)
            .unwrap();

        Self {
            registry,
            int32,
            string,
            calculator_iface,
            calculator,
            greeter_iface,
            simple,
            simple_type,
            rival_type,
            other,
            other_type,
            greeter,
        }
    }

    pub fn calculator_instance(&self) -> ObjectRef {
        ObjectRef::new(&self.calculator, ())
    }

    pub fn simple_mixin(&self) -> ObjectRef {
        ObjectRef::new(&self.simple_type, ())
    }

    pub fn rival_mixin(&self) -> ObjectRef {
        ObjectRef::new(&self.rival_type, ())
    }

    pub fn other_mixin(&self) -> ObjectRef {
        ObjectRef::new(&self.other_type, ())
    }
}

/// Routes the crate's logs to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared record of what the interceptors saw
pub type Trail = Arc<Mutex<Vec<String>>>;

pub fn trail() -> Trail {
    Arc::new(Mutex::new(Vec::new()))
}

/// An interceptor that logs `{name}-before` and `{name}-after` around proceeding.
pub fn tracing_interceptor(name: &'static str, trail: &Trail) -> InterceptorRc {
    let trail = Arc::clone(trail);
    Arc::new(FnInterceptor::new(name, move |invocation: &mut Invocation| {
        trail.lock().push(format!("{}-before", name));
        let result = invocation.proceed();
        trail.lock().push(format!("{}-after", name));
        result
    }))
}

/// An interceptor that answers every call itself with `value`.
pub fn answering_interceptor(value: Value) -> InterceptorRc {
    Arc::new(FnInterceptor::new("answer", move |invocation: &mut Invocation| {
        invocation.set_return_value(value.clone());
        Ok(())
    }))
}
