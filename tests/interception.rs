//! Integration tests for the interception pipeline as seen through proxy instances.

mod common;

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use common::{answering_interceptor, trail, tracing_interceptor, Samples};
use parking_lot::Mutex;
use proxyscope::{interception::InvocationParts, prelude::*};

fn calculator_proxy(samples: &Samples, interceptors: Vec<InterceptorRc>) -> ProxyInstanceRc {
    ProxyGenerator::new(samples.registry.clone())
        .create_interface_proxy_with_target(
            &samples.calculator_iface,
            &[],
            samples.calculator_instance(),
            &GenerationOptions::default(),
            interceptors,
        )
        .unwrap()
}

#[test]
fn test_interceptors_wrap_the_target_in_order() -> Result<()> {
    let samples = Samples::new();
    let trail = trail();
    let target_trail = Arc::clone(&trail);
    let int32 = TypeSig::of(&samples.int32);
    let recording = TypeBuilder::class("Samples", "RecordingCalculator")
        .implements(&samples.calculator_iface)
        .method(
            MethodBuilder::new("Add")
                .param("a", int32.clone())
                .param("b", int32.clone())
                .returns(int32)
                .body(move |_, frame| {
                    let a = frame.argument(0)?.as_i32().unwrap_or_default();
                    let b = frame.argument(1)?.as_i32().unwrap_or_default();
                    target_trail.lock().push(format!("T={}", a + b));
                    Ok(Value::I32(a + b))
                }),
        )
        .build(&samples.registry)?;
    let proxy = ProxyGenerator::new(samples.registry.clone()).create_interface_proxy_with_target(
        &samples.calculator_iface,
        &[],
        ObjectRef::new(&recording, ()),
        &GenerationOptions::default(),
        vec![tracing_interceptor("i1", &trail), tracing_interceptor("i2", &trail)],
    )?;

    let sum = proxy.call("Add", &mut [Value::I32(2), Value::I32(3)])?;

    assert_eq!(sum.as_i32(), Some(5));
    assert_eq!(
        *trail.lock(),
        vec!["i1-before", "i2-before", "T=5", "i2-after", "i1-after"]
    );
    Ok(())
}

#[test]
fn test_short_circuit_skips_the_target() -> Result<()> {
    let samples = Samples::new();
    let trail = trail();
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = reached.clone();
    let unreachable: InterceptorRc = Arc::new(FnInterceptor::new("unreachable", move |invocation: &mut Invocation| {
        counter.fetch_add(1, Ordering::SeqCst);
        invocation.proceed()
    }));
    let proxy = calculator_proxy(
        &samples,
        vec![
            tracing_interceptor("i1", &trail),
            answering_interceptor(Value::I32(99)),
            unreachable,
        ],
    );

    let sum = proxy.call("Add", &mut [Value::I32(2), Value::I32(3)])?;

    assert_eq!(sum.as_i32(), Some(99));
    assert_eq!(reached.load(Ordering::SeqCst), 0);
    assert_eq!(*trail.lock(), vec!["i1-before", "i1-after"]);
    Ok(())
}

#[test]
fn test_proceed_after_completion_faults() -> Result<()> {
    common::init_tracing();
    let samples = Samples::new();
    let proxy = calculator_proxy(&samples, Vec::new());
    let descriptor = proxy
        .proxy_type()
        .find_descriptor("Add")?
        .cloned()
        .expect("Add is intercepted");
    let trail = trail();

    let mut invocation = Invocation::new(InvocationParts {
        descriptor,
        proxy: proxy.as_object(),
        target: Some(samples.calculator_instance()),
        interceptors: Some(vec![tracing_interceptor("only", &trail)]),
        arguments: vec![Value::I32(1), Value::I32(1)],
        generic_arguments: Vec::new(),
    });
    invocation.run()?;
    assert!(invocation.is_completed());
    assert_eq!(invocation.return_value().as_i32(), Some(2));

    let error = invocation.proceed().unwrap_err();
    assert!(matches!(error, Error::ProceedPastEnd { interceptors: 1, .. }));
    assert!(matches!(invocation.run(), Err(Error::ProceedPastEnd { .. })));
    assert_eq!(trail.lock().len(), 2);
    Ok(())
}

#[test]
fn test_proceeding_twice_runs_the_rest_again() -> Result<()> {
    let samples = Samples::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let twice: InterceptorRc = Arc::new(FnInterceptor::new("twice", |invocation: &mut Invocation| {
        invocation.proceed()?;
        invocation.proceed()
    }));
    let counting: InterceptorRc = Arc::new(FnInterceptor::new("counting", move |invocation: &mut Invocation| {
        counter.fetch_add(1, Ordering::SeqCst);
        invocation.proceed()
    }));
    let proxy = calculator_proxy(&samples, vec![twice, counting]);

    let sum = proxy.call("Add", &mut [Value::I32(4), Value::I32(4)])?;

    assert_eq!(sum.as_i32(), Some(8));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_target_less_member_names_itself() {
    let samples = Samples::new();
    let generator = ProxyGenerator::new(samples.registry.clone());
    let forwarding: InterceptorRc =
        Arc::new(FnInterceptor::new("forward", |invocation: &mut Invocation| invocation.proceed()));
    let proxy = generator
        .create_interface_proxy_without_target(
            &samples.calculator_iface,
            &[],
            &GenerationOptions::default(),
            vec![forwarding],
        )
        .unwrap();

    let error = proxy
        .call("Add", &mut [Value::I32(1), Value::I32(2)])
        .unwrap_err();

    match &error {
        Error::NoTarget { method } => assert_eq!(method, "Samples.ICalculator.Add"),
        other => panic!("expected NoTarget, got {:?}", other),
    }
    assert!(error.is_pipeline());
    assert!(error.to_string().contains("Samples.ICalculator.Add"));
}

#[test]
fn test_missing_value_type_return_faults() {
    let samples = Samples::new();
    let generator = ProxyGenerator::new(samples.registry.clone());
    let silent: InterceptorRc = Arc::new(FnInterceptor::new("silent", |_: &mut Invocation| Ok(())));
    let proxy = generator
        .create_interface_proxy_without_target(
            &samples.calculator_iface,
            &[samples.greeter_iface.clone()],
            &GenerationOptions::default(),
            vec![silent],
        )
        .unwrap();

    let result = proxy.call("Add", &mut [Value::I32(1), Value::I32(2)]);
    assert!(matches!(result, Err(Error::MissingReturnValue { .. })));

    let greeting = proxy.call("Greet", &mut [Value::Str("Ada".to_string())]).unwrap();
    assert!(matches!(greeting, Value::Null));
}

#[test]
fn test_target_less_proxy_answered_by_interceptor() -> Result<()> {
    let samples = Samples::new();
    let generator = ProxyGenerator::new(samples.registry.clone());
    let proxy = generator.create_interface_proxy_without_target(
        &samples.calculator_iface,
        &[],
        &GenerationOptions::default(),
        vec![answering_interceptor(Value::I32(7))],
    )?;

    assert_eq!(proxy.call("Add", &mut [Value::I32(1), Value::I32(2)])?.as_i32(), Some(7));
    assert!(proxy.target().is_none());
    Ok(())
}

#[test]
fn test_generic_method_is_closed_over_the_call_arguments() -> Result<()> {
    let samples = Samples::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let observer: InterceptorRc = Arc::new(FnInterceptor::new("observer", move |invocation: &mut Invocation| {
        record.lock().extend(invocation.generic_arguments().iter().map(|ty| ty.fullname()));
        let concrete = invocation.concrete_method();
        record
            .lock()
            .push(concrete.return_type().map_or_else(String::new, |ty| ty.fullname()));
        invocation.proceed()
    }));
    let proxy = calculator_proxy(&samples, vec![observer]);

    let forwarded = proxy.call_generic(
        "Pair",
        &[samples.int32.clone(), samples.string.clone()],
        &mut [Value::I32(1), Value::Str("one".to_string())],
    )?;

    assert_eq!(
        *seen.lock(),
        vec!["System.Int32", "System.String", "System.Int32"]
    );
    assert_eq!(forwarded.as_str(), Some("System.Int32,System.String"));

    let wrong_arity = proxy.call_generic("Pair", &[samples.int32.clone()], &mut [Value::I32(1), Value::I32(2)]);
    assert!(matches!(wrong_arity, Err(Error::GenericArity { expected: 2, actual: 1, .. })));
    Ok(())
}

#[test]
fn test_by_ref_writes_reach_the_caller() -> Result<()> {
    let samples = Samples::new();
    let proxy = calculator_proxy(&samples, Vec::new());

    let mut arguments = [Value::Str("17".to_string()), Value::Void];
    let parsed = proxy.call("TryParse", &mut arguments)?;
    assert_eq!(parsed.as_bool(), Some(true));
    assert_eq!(arguments[1].as_i32(), Some(17));

    let mut arguments = [Value::I32(1), Value::I32(2)];
    proxy.call("Swap", &mut arguments)?;
    assert_eq!(arguments[0].as_i32(), Some(2));
    assert_eq!(arguments[1].as_i32(), Some(1));
    Ok(())
}

#[test]
fn test_interceptor_writes_out_arguments() -> Result<()> {
    let samples = Samples::new();
    let generator = ProxyGenerator::new(samples.registry.clone());
    let parser: InterceptorRc = Arc::new(FnInterceptor::new("parser", |invocation: &mut Invocation| {
        invocation.set_argument(1, Value::I32(-1))?;
        invocation.set_return_value(Value::Bool(false));
        Ok(())
    }));
    let proxy = generator.create_interface_proxy_without_target(
        &samples.calculator_iface,
        &[],
        &GenerationOptions::default(),
        vec![parser],
    )?;

    let mut arguments = [Value::Str("nope".to_string()), Value::Void];
    let parsed = proxy.call("TryParse", &mut arguments)?;

    assert_eq!(parsed.as_bool(), Some(false));
    assert_eq!(arguments[1].as_i32(), Some(-1));
    Ok(())
}

#[test]
fn test_by_ref_writes_survive_a_failed_call() {
    let samples = Samples::new();
    let generator = ProxyGenerator::new(samples.registry.clone());
    let failing: InterceptorRc = Arc::new(FnInterceptor::new("failing", |invocation: &mut Invocation| {
        invocation.set_argument(0, Value::I32(10))?;
        Err(Error::Error("rejected".to_string()))
    }));
    let proxy = generator
        .create_interface_proxy_without_target(
            &samples.calculator_iface,
            &[],
            &GenerationOptions::default(),
            vec![failing],
        )
        .unwrap();

    let mut arguments = [Value::I32(1), Value::I32(2)];
    let result = proxy.call("Swap", &mut arguments);

    assert!(matches!(result, Err(Error::Error(ref message)) if message == "rejected"));
    assert_eq!(arguments[0].as_i32(), Some(10));
    assert_eq!(arguments[1].as_i32(), Some(2));
}

#[test]
fn test_interceptor_rewrites_arguments() -> Result<()> {
    let samples = Samples::new();
    let doubling: InterceptorRc = Arc::new(FnInterceptor::new("doubling", |invocation: &mut Invocation| {
        for argument in invocation.arguments_mut() {
            if let Some(value) = argument.as_i32() {
                *argument = Value::I32(value * 2);
            }
        }
        invocation.proceed()
    }));
    let proxy = calculator_proxy(&samples, vec![doubling]);

    let mut arguments = [Value::I32(2), Value::I32(3)];
    let sum = proxy.call("Add", &mut arguments)?;

    assert_eq!(sum.as_i32(), Some(10));
    assert_eq!(arguments[0].as_i32(), Some(2));
    Ok(())
}

#[test]
fn test_token_retries_the_rest_of_the_chain() -> Result<()> {
    let samples = Samples::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let retry: InterceptorRc = Arc::new(FnInterceptor::new("retry", |invocation: &mut Invocation| {
        let token = invocation.capture_proceed_state();
        match invocation.proceed() {
            Ok(()) => Ok(()),
            Err(_) => token.proceed(invocation),
        }
    }));
    let flaky: InterceptorRc = Arc::new(FnInterceptor::new("flaky", move |invocation: &mut Invocation| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            invocation.set_argument(0, Value::I32(1000))?;
            return Err(Error::Error("transient".to_string()));
        }
        invocation.proceed()
    }));
    let proxy = calculator_proxy(&samples, vec![retry, flaky]);

    let sum = proxy.call("Add", &mut [Value::I32(2), Value::I32(3)])?;

    assert_eq!(sum.as_i32(), Some(5));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_standard_interceptor_steps() -> Result<()> {
    struct Auditing {
        trail: common::Trail,
    }

    impl StandardInterceptor for Auditing {
        fn pre_proceed(&self, invocation: &mut Invocation) -> Result<()> {
            self.trail.lock().push(format!("pre {}", invocation.method().name));
            Ok(())
        }

        fn post_proceed(&self, invocation: &mut Invocation) -> Result<()> {
            let value = invocation.return_value().as_i32().unwrap_or_default();
            self.trail.lock().push(format!("post {}", value));
            Ok(())
        }
    }

    let samples = Samples::new();
    let trail = trail();
    let auditing: InterceptorRc = Arc::new(Standard(Auditing {
        trail: trail.clone(),
    }));
    let proxy = calculator_proxy(&samples, vec![auditing]);

    proxy.call("Add", &mut [Value::I32(20), Value::I32(22)])?;

    assert_eq!(*trail.lock(), vec!["pre Add", "post 42"]);
    Ok(())
}

#[test]
fn test_selector_chooses_interceptors_per_member() -> Result<()> {
    let samples = Samples::new();
    let trail = trail();
    let selector: Arc<dyn InterceptorSelector> = Arc::new(FnSelector::new(
        |_: &ManagedTypeRc, method: &MethodRc, interceptors: &[InterceptorRc]| {
            if method.name == "Add" {
                interceptors.to_vec()
            } else {
                Vec::new()
            }
        },
    ));
    let options = GenerationOptions::builder().selector(selector).build();
    let proxy = ProxyGenerator::new(samples.registry.clone()).create_interface_proxy_with_target(
        &samples.calculator_iface,
        &[],
        samples.calculator_instance(),
        &options,
        vec![tracing_interceptor("t", &trail)],
    )?;

    proxy.call("Add", &mut [Value::I32(1), Value::I32(1)])?;
    proxy.call("Swap", &mut [Value::I32(1), Value::I32(2)])?;

    assert_eq!(*trail.lock(), vec!["t-before", "t-after"]);
    Ok(())
}

#[test]
fn test_change_target_on_target_interface_proxy() -> Result<()> {
    let samples = Samples::new();
    let doubled = TypeBuilder::class("Samples", "DoublingCalculator")
        .implements(&samples.calculator_iface)
        .method(
            MethodBuilder::new("Add")
                .param("a", TypeSig::of(&samples.int32))
                .param("b", TypeSig::of(&samples.int32))
                .returns(TypeSig::of(&samples.int32))
                .body(|_, frame| {
                    let a = frame.argument(0)?.as_i32().unwrap_or_default();
                    let b = frame.argument(1)?.as_i32().unwrap_or_default();
                    Ok(Value::I32((a + b) * 2))
                }),
        )
        .build(&samples.registry)?;
    let replacement = ObjectRef::new(&doubled, ());

    let swap_once = replacement.clone();
    let redirect: InterceptorRc = Arc::new(FnInterceptor::new("redirect", move |invocation: &mut Invocation| {
        if invocation.argument(0)?.as_i32() == Some(0) {
            invocation.change_proxy_target(swap_once.clone())?;
        } else {
            invocation.change_invocation_target(swap_once.clone())?;
        }
        invocation.proceed()
    }));
    let generator = ProxyGenerator::new(samples.registry.clone());
    let proxy = generator.create_interface_proxy_with_target_interface(
        &samples.calculator_iface,
        &[],
        samples.calculator_instance(),
        &GenerationOptions::default(),
        vec![redirect],
    )?;
    let original = proxy.target().unwrap();

    assert_eq!(proxy.call("Add", &mut [Value::I32(1), Value::I32(2)])?.as_i32(), Some(6));
    assert!(proxy.target().unwrap().same_instance(&original));

    // The running call keeps its target, later calls use the new one
    assert_eq!(proxy.call("Add", &mut [Value::I32(0), Value::I32(2)])?.as_i32(), Some(2));
    assert!(proxy.target().unwrap().same_instance(&replacement));
    assert!(proxy.unproxied().same_instance(&replacement));
    Ok(())
}

#[test]
fn test_change_target_rejected_on_fixed_target_proxy() {
    let samples = Samples::new();
    let replacement = samples.calculator_instance();
    let redirect: InterceptorRc = Arc::new(FnInterceptor::new("redirect", move |invocation: &mut Invocation| {
        invocation.change_invocation_target(replacement.clone())?;
        invocation.proceed()
    }));
    let proxy = calculator_proxy(&samples, vec![redirect]);

    let result = proxy.call("Add", &mut [Value::I32(1), Value::I32(2)]);
    assert!(matches!(result, Err(Error::TargetChangeNotAllowed { .. })));
}

#[test]
fn test_invocation_exposes_the_call() -> Result<()> {
    let samples = Samples::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    let inspector: InterceptorRc = Arc::new(FnInterceptor::new("inspector", move |invocation: &mut Invocation| {
        let mut seen = record.lock();
        seen.push(invocation.method().full_name());
        if let Some(target) = invocation.method_invocation_target() {
            seen.push(target.full_name());
        }
        if let Some(target_type) = invocation.target_type() {
            seen.push(target_type.fullname());
        }
        seen.push(invocation.proxy().ty().fullname());
        drop(seen);
        invocation.proceed()
    }));
    let proxy = calculator_proxy(&samples, vec![inspector]);

    proxy.call("Add", &mut [Value::I32(1), Value::I32(2)])?;

    assert_eq!(
        *seen.lock(),
        vec![
            "Samples.ICalculator.Add",
            "Samples.Calculator.Add",
            "Samples.Calculator",
            "Proxies.ICalculatorProxy",
        ]
    );
    Ok(())
}

#[test]
fn test_call_shape_is_checked() {
    let samples = Samples::new();
    let proxy = calculator_proxy(&samples, Vec::new());

    let result = proxy.call("Add", &mut [Value::I32(1)]);
    assert!(matches!(result, Err(Error::ArgumentCount { expected: 2, actual: 1, .. })));

    let result = proxy.call("Multiply", &mut []);
    assert!(matches!(result, Err(Error::MemberNotProxied { .. })));
}
