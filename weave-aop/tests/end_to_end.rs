use std::sync::Arc;

use parking_lot::Mutex;
use weave_aop::prelude::*;
use weave_core::prelude::*;
use weave_core::same_instance;

type Journal = Arc<Mutex<Vec<String>>>;

fn order_api() -> Arc<TypeDescriptor> {
    TypeDescriptor::interface("shop.OrderApi")
        .abstract_method("place", vec![ParamType::Str, ParamType::Int], ParamType::Int)
        .abstract_method("fail", vec![], ParamType::Void)
        .build()
}

fn order_service(journal: &Journal) -> Arc<TypeDescriptor> {
    let journal = Arc::clone(journal);
    TypeDescriptor::class("shop.OrderService")
        .implements(&order_api())
        .method(
            "place",
            vec![ParamType::Str, ParamType::Int],
            ParamType::Int,
            move |_, args| {
                journal.lock().push("target".to_string());
                Ok(Value::Int(args[1].as_int().unwrap_or_default() * 10))
            },
        )
        .method("fail", vec![], ParamType::Void, |_, _| {
            Err(MethodError::raised("OutOfStock", "no books left"))
        })
        .method("status", vec![], ParamType::Str, |_, _| Ok(Value::from("open")))
        .build()
}

fn checkout() -> Arc<TypeDescriptor> {
    TypeDescriptor::class("shop.Checkout")
        .field("orders", ParamType::object("shop.OrderApi"))
        .method("checkout", vec![], ParamType::Int, |this, _| {
            let orders = this
                .field("orders")
                .and_then(|v| v.as_object().cloned())
                .ok_or_else(|| MethodError::raised("IllegalState", "orders not injected"))?;
            orders.invoke("place", vec![Value::from("book"), Value::from(2)])
        })
        .build()
}

struct Shop {
    journal: Journal,
    context: Arc<ApplicationContext>,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

fn shop(
    mode: ProxyMode,
    advices: Vec<(&str, Advice)>,
    advisors: Vec<(&str, &str, &str)>,
) -> ContainerResult<Shop> {
    shop_with_journal(Arc::new(Mutex::new(Vec::new())), mode, advices, advisors)
}

/// 目标方法写入给定的日志，便于和通知的记录合并比较
fn shop_with_journal(
    journal: Journal,
    mode: ProxyMode,
    advices: Vec<(&str, Advice)>,
    advisors: Vec<(&str, &str, &str)>,
) -> ContainerResult<Shop> {
    init_logging();
    let catalog = TypeCatalog::new()
        .with(&order_service(&journal))
        .with(&checkout())
        .with(&advisor_component_type());

    let mut settings = ContainerSettings::default();
    settings.aop.proxy_target_type = mode;

    let mut builder = ApplicationContext::builder()
        .settings(settings)
        .plugin(Arc::new(AopPlugin::new()))
        .definition("orderService", ComponentDefinition::of_type("shop.OrderService"))
        .definition(
            "checkout",
            ComponentDefinition::of_type("shop.Checkout")
                .with_property("orders", ValueDescriptor::reference("orderService")),
        )
        .alias("orderService", "orders");

    for (name, advice) in advices {
        let type_name = format!("shop.advice.{}", name);
        catalog.register(&advice_component_type(&type_name, advice));
        builder = builder.definition(name, ComponentDefinition::of_type(type_name.as_str()));
    }
    for (name, advice_name, expression) in advisors {
        builder = builder.definition(name, advisor_definition(advice_name, expression));
    }

    let context = builder.introspector(Arc::new(catalog)).refresh()?;
    Ok(Shop { journal, context })
}

fn recorder(journal: &Journal, label: &'static str) -> Advice {
    let journal = Arc::clone(journal);
    Advice::before(move |jp: &JoinPoint| {
        journal.lock().push(format!("{}:{}", label, jp.method_name()));
        Ok(())
    })
}

#[test]
fn test_before_and_after_returning_wrap_the_real_call() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let returning = {
        let journal = Arc::clone(&journal);
        Advice::after_returning(move |_: &JoinPoint, value: &Value| {
            journal.lock().push(format!("B2:{:?}", value));
            Ok(())
        })
    };
    let shop = shop_with_journal(
        Arc::clone(&journal),
        ProxyMode::Auto,
        vec![("b1", recorder(&journal, "B1")), ("b2", returning)],
        vec![
            ("b1Advisor", "b1", "execution(* shop.OrderApi.place(..))"),
            ("b2Advisor", "b2", "execution(* shop.OrderApi.place(..))"),
        ],
    )
    .unwrap();

    let service = shop.context.get_component("orderService").unwrap();
    let result = service
        .invoke("place", vec![Value::from("book"), Value::from(3)])
        .unwrap();

    assert_eq!(result, Value::Int(30));
    assert!(Arc::ptr_eq(&shop.journal, &journal));
    assert_eq!(journal.lock().clone(), vec!["B1:place", "target", "B2:Int(30)"]);
}

#[test]
fn test_around_can_skip_the_real_method() {
    let shop = shop(
        ProxyMode::Auto,
        vec![(
            "cache",
            Advice::around(|_: &mut AdviceChain| Ok(Value::Int(-1))),
        )],
        vec![("cacheAdvisor", "cache", "execution(* shop.OrderApi.place(..))")],
    )
    .unwrap();

    let service = shop.context.get_component("orderService").unwrap();
    let result = service
        .invoke("place", vec![Value::from("book"), Value::from(3)])
        .unwrap();

    assert_eq!(result, Value::Int(-1));
    assert!(shop.journal.lock().is_empty());
}

#[test]
fn test_throws_advice_sees_the_callers_error() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let throws = {
        let seen = Arc::clone(&seen);
        Advice::throws(move |_: &JoinPoint, error: &MethodError| {
            seen.lock().push(error.to_string());
            Ok(())
        })
    };
    let shop = shop(
        ProxyMode::Auto,
        vec![("onError", throws)],
        vec![("errorAdvisor", "onError", "execution(* shop.OrderApi.fail())")],
    )
    .unwrap();

    let service = shop.context.get_component("orderService").unwrap();
    let err = service.invoke("fail", vec![]).unwrap_err();

    assert_eq!(err.kind(), Some("OutOfStock"));
    assert_eq!(seen.lock().clone(), vec![err.to_string()]);
}

#[test]
fn test_auto_mode_uses_interface_proxy() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let shop = shop(
        ProxyMode::Auto,
        vec![("audit", recorder(&journal, "audit"))],
        vec![("auditAdvisor", "audit", "execution(* shop.OrderApi.*(..))")],
    )
    .unwrap();

    let service = shop.context.get_component("orderService").unwrap();
    assert!(service.proxied_target().is_some());
    assert!(service.is_instance_of(&"shop.OrderApi".into()));
    assert!(!service.is_instance_of(&"shop.OrderService".into()));
    // 接口之外的方法不在代理表面上
    assert!(service.invoke("status", vec![]).is_err());
}

#[test]
fn test_target_type_mode_uses_subclass_proxy() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let shop = shop(
        ProxyMode::TargetType,
        vec![("audit", recorder(&journal, "audit"))],
        vec![("auditAdvisor", "audit", "execution(* shop.OrderService.place(..))")],
    )
    .unwrap();

    let service = shop.context.get_component("orderService").unwrap();
    assert!(service.is_instance_of(&"shop.OrderService".into()));
    assert!(service.is_instance_of(&"shop.OrderApi".into()));

    // 只有匹配的方法经过通知
    assert_eq!(service.invoke("status", vec![]).unwrap(), Value::from("open"));
    assert!(journal.lock().is_empty());
    service
        .invoke("place", vec![Value::from("pen"), Value::from(1)])
        .unwrap();
    assert_eq!(journal.lock().clone(), vec!["audit:place"]);
}

#[test]
fn test_dependents_receive_the_proxy() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let shop = shop(
        ProxyMode::Auto,
        vec![("audit", recorder(&journal, "audit"))],
        vec![("auditAdvisor", "audit", "execution(* shop.OrderApi.place(..))")],
    )
    .unwrap();

    let by_name = shop.context.get_component("orderService").unwrap();
    let by_alias = shop.context.get_component("orders").unwrap();
    assert!(same_instance(&by_name, &by_alias));

    let checkout = shop.context.get_component("checkout").unwrap();
    assert!(checkout.proxied_target().is_none());
    let injected = checkout.field("orders").unwrap();
    assert!(injected.same_object(&Value::Object(Arc::clone(&by_name))));

    assert_eq!(checkout.invoke("checkout", vec![]).unwrap(), Value::Int(20));
    assert_eq!(journal.lock().clone(), vec!["audit:place"]);
}

#[test]
fn test_unmatched_components_stay_plain() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let shop = shop(
        ProxyMode::Auto,
        vec![("audit", recorder(&journal, "audit"))],
        vec![("auditAdvisor", "audit", "within(shop.Inventory)")],
    )
    .unwrap();

    let service = shop.context.get_component("orderService").unwrap();
    assert!(service.proxied_target().is_none());
    assert!(service.is_instance_of(&"shop.OrderService".into()));
}

#[test]
fn test_interfaces_only_fails_for_class_without_interfaces() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let result = shop(
        ProxyMode::InterfacesOnly,
        vec![("audit", recorder(&journal, "audit"))],
        vec![("auditAdvisor", "audit", "execution(* shop.Checkout.checkout())")],
    );

    match result {
        Err(ContainerError::ProxyCreation { name, .. }) => assert_eq!(name, "checkout"),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("refresh should fail"),
    }
}

#[test]
fn test_shutdown_closes_the_container() {
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let shop = shop(
        ProxyMode::Auto,
        vec![("audit", recorder(&journal, "audit"))],
        vec![("auditAdvisor", "audit", "execution(* shop.OrderApi.place(..))")],
    )
    .unwrap();

    assert!(shop.context.is_active());
    shop.context.shutdown();
    assert!(!shop.context.is_active());
}
