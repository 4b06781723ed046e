extern crate lineage;

use lineage::runner::ds::class::{ClassRef, Constitutor};
use lineage::runner::ds::error::ClassError;
use lineage::runner::ds::function_object::{FunctionObject, FunctionRef};
use lineage::runner::ds::object::ObjectRef;
use lineage::runner::ds::object_property::PropertyKey;
use lineage::runner::ds::value::Value;
use lineage::runner::events::EventFilter;
use lineage::runner::members::{MemberKind, PropertyInit, Traits};
use lineage::runner::{Parent, Runtime};
use std::cell::RefCell;
use std::rc::Rc;

/// Helper: a method that always answers `tag`
fn answer(tag: &'static str) -> FunctionRef {
    FunctionObject::new(tag, move |_, _, _| Ok(Value::from(tag)))
}

/// Helper: builds an instance and calls `method` on it
fn call(class: &ClassRef, method: &str) -> Result<Value, ClassError> {
    let instance = class.instantiate(vec![]).unwrap().as_object().unwrap();
    instance.call_method(&PropertyKey::from(method), vec![])
}

/// Helper: a constitutor that logs `label:ClassName`
fn logging(label: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Constitutor {
    let log = log.clone();
    Constitutor::new(label, move |_, class| {
        log.borrow_mut().push(format!("{}:{}", label, class.name()));
        Ok(())
    })
}

// ── Static chain ─────────────────────────────────────────────────────

#[test]
fn test_static_added_to_root_reaches_grandchild() {
    let mut rt = Runtime::new();
    let a = ClassRef::new("A");
    let b = ClassRef::new("B");
    let c = ClassRef::new("C");
    rt.define(&a).unwrap();
    rt.inherits(&a, &b).unwrap();
    rt.inherits(&b, &c).unwrap();

    a.set_static("VERSION", Value::from(3)).unwrap();

    for class in [&a, &b, &c].iter() {
        assert_eq!(class.get_static("VERSION").unwrap(), Value::from(3));
    }
}

#[test]
fn test_static_defined_before_subclass_is_copied() {
    let mut rt = Runtime::new();
    let a = ClassRef::new("A");
    rt.define(&a).unwrap();
    a.set_static("KIND", Value::from("base")).unwrap();

    let b = ClassRef::new("B");
    rt.inherits(&a, &b).unwrap();
    assert_eq!(b.get_static("KIND").unwrap(), Value::from("base"));

    let c = ClassRef::new("C");
    rt.inherits(&b, &c).unwrap();
    assert_eq!(c.get_static("KIND").unwrap(), Value::from("base"));
}

#[test]
fn test_static_is_read_only() {
    let mut rt = Runtime::new();
    let a = ClassRef::new("A");
    rt.define(&a).unwrap();
    a.set_static("ID", Value::from(1)).unwrap();
    assert!(matches!(
        a.assign_static("ID", Value::from(2)),
        Err(ClassError::TypeError(_))
    ));
}

// ── Deferred resolution ──────────────────────────────────────────────

#[test]
fn test_members_added_while_waiting_match_members_added_after() {
    let mut rt = Runtime::new();

    let early = ClassRef::new("Early");
    rt.inherits("Base", &early).unwrap();
    assert!(early.is_waiting());
    early.set_method("greet", answer("early")).unwrap();
    early
        .set_property("label", PropertyInit::Value(Value::from("e")), None)
        .unwrap();

    let base = ClassRef::new("Base");
    base.set_method("greet", answer("base")).unwrap();
    base.set_method("kind", answer("base-kind")).unwrap();
    rt.define(&base).unwrap();
    rt.run_until_idle().unwrap();

    let late = ClassRef::new("Late");
    rt.inherits(&base, &late).unwrap();
    late.set_method("greet", answer("late")).unwrap();
    late.set_property("label", PropertyInit::Value(Value::from("e")), None)
        .unwrap();

    assert!(!early.is_waiting());
    assert_eq!(early.super_class(), Some(base.clone()));
    assert_eq!(call(&early, "greet").unwrap(), Value::from("early"));
    assert_eq!(call(&late, "greet").unwrap(), Value::from("late"));
    assert_eq!(call(&early, "kind").unwrap(), call(&late, "kind").unwrap());

    let e = early.instantiate(vec![]).unwrap().as_object().unwrap();
    let l = late.instantiate(vec![]).unwrap().as_object().unwrap();
    assert_eq!(
        e.get(&PropertyKey::from("label")).unwrap(),
        l.get(&PropertyKey::from("label")).unwrap()
    );
}

#[test]
fn test_overridden_method_keeps_super_after_replay() {
    let mut rt = Runtime::new();
    let child = ClassRef::new("Child");
    rt.inherits("Base", &child).unwrap();
    child
        .set_method(
            "greet",
            FunctionObject::new("greet", |f, this, args| {
                let parent = f.call_super(this, args)?;
                Ok(Value::from(format!("child+{}", parent)))
            }),
        )
        .unwrap();

    let base = ClassRef::new("Base");
    base.set_method("greet", answer("base")).unwrap();
    rt.define(&base).unwrap();
    rt.run_until_idle().unwrap();

    assert_eq!(call(&child, "greet").unwrap(), Value::from("child+base"));
}

#[test]
fn test_scenario_child_declared_before_namespaced_base() {
    let mut rt = Runtime::new();

    let child = ClassRef::new("Child");
    rt.inherits_in("Base", "MyNS", &child).unwrap();
    child.set_method("own", answer("child-own")).unwrap();

    let base = ClassRef::new("Base");
    base.set_method("hello", answer("base-hello")).unwrap();
    rt.inherits_in(Parent::Root, "MyNS", &base).unwrap();
    assert_eq!(rt.get_class("MyNS.Base").unwrap(), Some(base.clone()));

    rt.run_until_idle().unwrap();

    assert_eq!(child.super_class(), Some(base));
    assert_eq!(call(&child, "hello").unwrap(), Value::from("base-hello"));
    assert_eq!(call(&child, "own").unwrap(), Value::from("child-own"));
    assert_eq!(rt.get_class("MyNS.Child").unwrap(), Some(child));
}

#[test]
fn test_waiting_constitutor_runs_after_resolution() {
    let mut rt = Runtime::new();
    let log = Rc::new(RefCell::new(vec![]));

    let child = ClassRef::new("Child");
    rt.inherits("Base", &child).unwrap();
    child.constitute(&mut rt, logging("own", &log)).unwrap();
    assert!(child.constitutors().is_empty());

    let base = ClassRef::new("Base");
    rt.define(&base).unwrap();
    base.constitute(&mut rt, logging("base", &log)).unwrap();

    rt.finish_loading().unwrap();
    rt.run_until_idle().unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["base:Base", "base:Child", "own:Child"]
    );
}

#[test]
fn test_extended_event_carries_names() {
    let mut rt = Runtime::new();
    let seen = Rc::new(RefCell::new(vec![]));
    let s = seen.clone();
    rt.on(EventFilter::extended().ancestor("Base"), move |_, e| {
        s.borrow_mut().push(e.descendant.clone().unwrap_or_default());
        Ok(())
    });

    let base = ClassRef::new("Base");
    rt.define(&base).unwrap();
    rt.inherits(&base, &ClassRef::new("One")).unwrap();
    rt.inherits(&base, &ClassRef::new("Two")).unwrap();
    assert!(seen.borrow().is_empty());

    rt.run_until_idle().unwrap();
    assert_eq!(*seen.borrow(), vec!["One".to_string(), "Two".to_string()]);
}

// ── Multiple inheritance ─────────────────────────────────────────────

fn mixins(rt: &mut Runtime) -> (ClassRef, ClassRef) {
    let x = ClassRef::new("X");
    x.set_method("a", answer("x.a")).unwrap();
    x.set_method("b", answer("x.b")).unwrap();
    rt.define(&x).unwrap();

    let y = ClassRef::new("Y");
    y.set_method("b", answer("y.b")).unwrap();
    y.set_method("c", answer("y.c")).unwrap();
    rt.define(&y).unwrap();
    (x, y)
}

#[test]
fn test_later_parent_wins() {
    let mut rt = Runtime::new();
    let (x, _) = mixins(&mut rt);
    let child = ClassRef::new("Child");
    rt.inherits(vec!["X", "Y"], &child).unwrap();

    assert_eq!(child.super_class().map(|c| c.name()), Some("Y".to_string()));
    assert_eq!(call(&child, "a").unwrap(), Value::from("x.a"));
    assert_eq!(call(&child, "b").unwrap(), Value::from("y.b"));
    assert_eq!(call(&child, "c").unwrap(), Value::from("y.c"));
    assert!(x.children().iter().any(|c| c.ptr_eq(&child)));
}

#[test]
fn test_child_own_member_beats_every_parent() {
    let mut rt = Runtime::new();
    mixins(&mut rt);
    let child = ClassRef::new("Child");
    child.set_method("b", answer("child.b")).unwrap();
    rt.inherits(vec!["X", "Y"], &child).unwrap();

    assert_eq!(call(&child, "b").unwrap(), Value::from("child.b"));
    assert_eq!(call(&child, "a").unwrap(), Value::from("x.a"));
    assert_eq!(call(&child, "c").unwrap(), Value::from("y.c"));
}

#[test]
fn test_flattening_prefers_most_specific_ancestor() {
    let mut rt = Runtime::new();
    let x = ClassRef::new("X");
    rt.define(&x).unwrap();
    let root = ClassRef::new("Root");
    root.set_method("name", answer("root")).unwrap();
    root.set_method("only_root", answer("root-only")).unwrap();
    rt.define(&root).unwrap();
    let leaf = ClassRef::new("Leaf");
    rt.inherits(&root, &leaf).unwrap();
    leaf.set_method("name", answer("leaf")).unwrap();

    let child = ClassRef::new("Child");
    rt.inherits(vec!["X", "Leaf"], &child).unwrap();
    assert_eq!(call(&child, "name").unwrap(), Value::from("leaf"));
    assert_eq!(call(&child, "only_root").unwrap(), Value::from("root-only"));
}

// ── Constitutors ─────────────────────────────────────────────────────

#[test]
fn test_parent_tasks_run_before_child_tasks() {
    let mut rt = Runtime::new();
    let log = Rc::new(RefCell::new(vec![]));

    let p = ClassRef::new("P");
    rt.define(&p).unwrap();
    p.constitute(&mut rt, logging("T1", &log)).unwrap();

    let q = ClassRef::new("Q");
    rt.inherits(&p, &q).unwrap();
    q.constitute(&mut rt, logging("T2", &log)).unwrap();
    assert!(log.borrow().is_empty());

    rt.finish_loading().unwrap();
    rt.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["T1:P", "T1:Q", "T2:Q"]);
}

#[test]
fn test_do_constitutors_twice_runs_once() {
    let mut rt = Runtime::new();
    let log = Rc::new(RefCell::new(vec![]));
    let p = ClassRef::new("P");
    rt.define(&p).unwrap();
    p.constitute(&mut rt, logging("T", &log)).unwrap();

    rt.finish_loading().unwrap();
    rt.do_constitutors(&p).unwrap();
    rt.do_constitutors(&p).unwrap();
    rt.run_until_idle().unwrap();
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_class_declared_after_loading_constitutes_on_its_own() {
    let mut rt = Runtime::new();
    let log = Rc::new(RefCell::new(vec![]));
    let p = ClassRef::new("P");
    rt.define(&p).unwrap();
    p.constitute(&mut rt, logging("T", &log)).unwrap();
    rt.finish_loading().unwrap();
    rt.run_until_idle().unwrap();

    let late = ClassRef::new("Late");
    rt.inherits(&p, &late).unwrap();
    rt.run_until_idle().unwrap();
    assert_eq!(*log.borrow(), vec!["T:P", "T:Late"]);
}

#[test]
fn test_failing_constitutor_surfaces_and_is_dropped() {
    let mut rt = Runtime::new();
    let p = ClassRef::new("P");
    rt.define(&p).unwrap();
    p.constitute(
        &mut rt,
        Constitutor::new("boom", |_, _| Err(ClassError::raised("boom"))),
    )
    .unwrap();

    assert_eq!(rt.finish_loading().unwrap_err(), ClassError::raised("boom"));
    assert!(p.is_constituted());
    rt.do_constitutors(&p).unwrap();
}

// ── Namespaces ───────────────────────────────────────────────────────

#[test]
fn test_namespace_round_trip() {
    let mut rt = Runtime::new();
    let ns = rt.get_namespace("App.Models").unwrap();
    assert!(ns.main_class().is_none());

    let user = ClassRef::new("User");
    rt.inherits_in(Parent::Root, "App.Models", &user).unwrap();
    assert_eq!(rt.get_class("App.Models.User").unwrap(), Some(user));
    assert!(rt.get_namespace("App.Models").unwrap().main_class().is_none());

    let main = ClassRef::new("Models");
    rt.inherits_in(Parent::Root, "App.Models", &main).unwrap();
    assert_eq!(
        rt.get_namespace("App.Models").unwrap().main_class(),
        Some(main.clone())
    );
    assert_eq!(rt.get_class("App.Models").unwrap(), Some(main));
}

#[test]
fn test_namespace_construct_before_main_class_fails() {
    let mut rt = Runtime::new();
    let ns = rt.get_namespace("App.Views").unwrap();
    match ns.construct(vec![]) {
        Err(ClassError::UnresolvedClass { name, namespace }) => {
            assert_eq!(name, "Views");
            assert_eq!(namespace, "App.Views");
        }
        other => panic!("expected UnresolvedClass, got {:?}", other),
    }

    let main = ClassRef::new("Views");
    main.set_method("render", answer("rendered")).unwrap();
    rt.inherits_in(Parent::Root, "App", &main).unwrap();
    let view = ns.construct(vec![]).unwrap().as_object().unwrap();
    assert_eq!(
        view.call_method(&PropertyKey::from("render"), vec![]).unwrap(),
        Value::from("rendered")
    );
}

#[test]
fn test_qualified_parent_name() {
    let mut rt = Runtime::new();
    let base = ClassRef::new("Base");
    base.set_method("id", answer("lib-base")).unwrap();
    rt.inherits_in(Parent::Root, "Lib.Core", &base).unwrap();

    let child = ClassRef::new("Widget");
    rt.inherits_in("Lib.Core.Base", "App", &child).unwrap();
    assert!(!child.is_waiting());
    assert_eq!(call(&child, "id").unwrap(), Value::from("lib-base"));
    assert_eq!(rt.get_class("App.Widget").unwrap(), Some(child));
}

// ── Member definition API ────────────────────────────────────────────

#[test]
fn test_empty_key_rejected() {
    let c = ClassRef::new("C");
    assert!(matches!(
        c.set_method("", answer("x")),
        Err(ClassError::InvalidKey(_))
    ));
    assert!(matches!(
        c.set_static("", Value::Null),
        Err(ClassError::InvalidKey(_))
    ));
}

#[test]
fn test_method_aliases_share_implementation() {
    let c = ClassRef::new("C");
    c.set_method(vec!["remove", "delete"], answer("gone")).unwrap();
    assert_eq!(call(&c, "remove").unwrap(), Value::from("gone"));
    assert_eq!(call(&c, "delete").unwrap(), Value::from("gone"));
}

#[test]
fn test_decorating_field_is_unsupported() {
    let c = ClassRef::new("C");
    let result = c.decorate_method("size", answer("x"), |mut d| {
        d.kind = MemberKind::Field;
        Ok(d)
    });
    assert!(matches!(result, Err(ClassError::Unsupported(_))));
}

#[test]
fn test_lazy_property_computed_once_per_instance() {
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    let c = ClassRef::new("C");
    c.prepare_property(
        "expensive",
        FunctionObject::new("compute", move |_, _, _| {
            *counter.borrow_mut() += 1;
            Ok(Value::from(42))
        }),
    )
    .unwrap();

    let one = c.instantiate(vec![]).unwrap().as_object().unwrap();
    let two = c.instantiate(vec![]).unwrap().as_object().unwrap();
    let key = PropertyKey::from("expensive");
    assert_eq!(one.get(&key).unwrap(), Value::from(42));
    assert_eq!(one.get(&key).unwrap(), Value::from(42));
    assert_eq!(*calls.borrow(), 1);
    assert_eq!(two.get(&key).unwrap(), Value::from(42));
    assert_eq!(*calls.borrow(), 2);
    assert!(one.has_own_property(&key));
}

#[test]
fn test_enforced_property_sees_old_value() {
    let c = ClassRef::new("Counter");
    c.enforce_property(
        "total",
        FunctionObject::new("merge", |_, _, args| {
            let new = args.get(0).and_then(Value::as_number).unwrap_or(0.0);
            let old = args.get(1).and_then(Value::as_number).unwrap_or(0.0);
            Ok(Value::from(new + old))
        }),
    )
    .unwrap();

    let o = c.instantiate(vec![]).unwrap().as_object().unwrap();
    let key = PropertyKey::from("total");
    assert_eq!(o.get(&key).unwrap(), Value::from(0));
    o.set(key.clone(), Value::from(5)).unwrap();
    o.set(key.clone(), Value::from(2)).unwrap();
    assert_eq!(o.get(&key).unwrap(), Value::from(7));
    assert!(!o.own_property_keys().contains(&key));
}

#[test]
fn test_compose_forwards_traits() {
    let engine = ClassRef::new("Engine");
    engine.set_method("start", answer("vroom")).unwrap();
    engine.set_method("stop", answer("halt")).unwrap();

    let car = ClassRef::new("Car");
    car.set_method("stop", answer("car-stop")).unwrap();
    car.compose("engine", &engine, Traits::All).unwrap();

    let o = car.instantiate(vec![]).unwrap().as_object().unwrap();
    assert_eq!(call(&car, "start").unwrap(), Value::from("vroom"));
    assert_eq!(call(&car, "stop").unwrap(), Value::from("car-stop"));

    let composite = o.get(&PropertyKey::from("engine")).unwrap().as_object().unwrap();
    let back = composite
        .get(&lineage::runner::members::COMPOSITOR_PARENT_KEY)
        .unwrap()
        .as_object()
        .unwrap();
    assert!(back.ptr_eq(&o));
}

#[test]
fn test_compose_onto_plain_object() {
    let logger = ClassRef::new("Logger");
    logger.set_method("log", answer("logged")).unwrap();
    let target = ObjectRef::new();
    lineage::runner::members::compose(&target, "logger", &logger, Traits::Only(vec!["log".into()]))
        .unwrap();
    assert_eq!(
        target.call_method(&PropertyKey::from("log"), vec![]).unwrap(),
        Value::from("logged")
    );
}

#[test]
fn test_static_compose_inherits_parent_data() {
    let mut rt = Runtime::new();
    let cache = ClassRef::new("Cache");
    let store = ClassRef::new("Store");
    let base = ClassRef::new("Base");
    rt.define(&base).unwrap();
    base.static_compose("cache", &cache, Traits::None).unwrap();

    let child = ClassRef::new("Child");
    rt.inherits(&base, &child).unwrap();
    child.static_compose("store", &store, Traits::None).unwrap();

    let data = child.compose_data().unwrap();
    assert_eq!(data.get("cache"), Some(&Value::Class(cache)));
    assert_eq!(data.get("store"), Some(&Value::Class(store)));
    assert_eq!(base.compose_data().unwrap().len(), 1);
}

#[test]
fn test_get_children_walks_descendants() {
    let mut rt = Runtime::new();
    let a = ClassRef::new("A");
    let b = ClassRef::new("B");
    let c = ClassRef::new("C");
    let d = ClassRef::new("D");
    rt.define(&a).unwrap();
    rt.inherits(&a, &b).unwrap();
    rt.inherits(&b, &c).unwrap();
    rt.inherits(&a, &d).unwrap();
    let names: Vec<String> = a.get_children().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["B", "C", "D"]);
}

#[test]
fn test_getter_override_inherits_setter() {
    let mut rt = Runtime::new();
    let stored = Rc::new(RefCell::new(Value::Undefined));
    let sink = stored.clone();
    let base = ClassRef::new("Base");
    base.set_property(
        "value",
        PropertyInit::Getter(answer("base-get")),
        Some(FunctionObject::new("set", move |_, _, args| {
            *sink.borrow_mut() = args.into_iter().next().unwrap_or(Value::Undefined);
            Ok(Value::Undefined)
        })),
    )
    .unwrap();
    rt.define(&base).unwrap();

    let child = ClassRef::new("Child");
    rt.inherits(&base, &child).unwrap();
    child
        .set_property(
            "value",
            PropertyInit::Getter(FunctionObject::new("get", |f, this, _| {
                let parent = f.call_super(this, vec![])?;
                Ok(Value::from(format!("child({})", parent)))
            })),
            None,
        )
        .unwrap();

    let o = child.instantiate(vec![]).unwrap().as_object().unwrap();
    let key = PropertyKey::from("value");
    assert_eq!(o.get(&key).unwrap(), Value::from("child(base-get)"));
    o.set(key, Value::from(9)).unwrap();
    assert_eq!(*stored.borrow(), Value::from(9));
}

#[test]
fn test_getter_override_while_waiting_links_parent_accessor() {
    let mut rt = Runtime::new();
    let early = ClassRef::new("Early");
    rt.inherits("Base", &early).unwrap();
    early
        .set_property(
            "value",
            PropertyInit::Getter(FunctionObject::new("get", |f, this, _| {
                let parent = f.call_super(this, vec![])?;
                Ok(Value::from(format!("child({})", parent)))
            })),
            None,
        )
        .unwrap();

    let stored = Rc::new(RefCell::new(Value::Undefined));
    let sink = stored.clone();
    let base = ClassRef::new("Base");
    base.set_property(
        "value",
        PropertyInit::Getter(answer("base-get")),
        Some(FunctionObject::new("set", move |_, _, args| {
            *sink.borrow_mut() = args.into_iter().next().unwrap_or(Value::Undefined);
            Ok(Value::Undefined)
        })),
    )
    .unwrap();
    rt.define(&base).unwrap();
    rt.run_until_idle().unwrap();

    assert!(!early.is_waiting());
    let o = early.instantiate(vec![]).unwrap().as_object().unwrap();
    let key = PropertyKey::from("value");
    assert_eq!(o.get(&key).unwrap(), Value::from("child(base-get)"));
    o.set(key, Value::from(4)).unwrap();
    assert_eq!(*stored.borrow(), Value::from(4));
}

// ── Waiting and loading ──────────────────────────────────────────────

#[test]
fn test_waiting_child_sees_namespace_main_class_statics() {
    let mut rt = Runtime::new();
    rt.get_namespace("App.Models").unwrap();
    let main = ClassRef::new("Models");
    rt.inherits_in(Parent::Root, "App.Models", &main).unwrap();
    main.set_static("ORIGIN", Value::from("models")).unwrap();

    let child = ClassRef::new("Widget");
    rt.inherits_in("App.Models.Base", "App", &child).unwrap();
    assert!(child.is_waiting());
    assert_eq!(child.get_static("ORIGIN").unwrap(), Value::from("models"));
}

#[test]
fn test_parent_resolved_before_loading_constitutes_first() {
    let mut rt = Runtime::new();
    let log = Rc::new(RefCell::new(vec![]));

    let child = ClassRef::new("Child");
    rt.inherits("Base", &child).unwrap();
    child.constitute(&mut rt, logging("own", &log)).unwrap();

    let base = ClassRef::new("Base");
    rt.define(&base).unwrap();
    base.constitute(&mut rt, logging("T", &log)).unwrap();

    rt.run_until_idle().unwrap();
    assert!(!child.is_waiting());
    assert!(log.borrow().is_empty());

    rt.finish_loading().unwrap();
    rt.run_until_idle().unwrap();

    assert!(base.waiting_children().contains(&child));
    assert_eq!(*log.borrow(), vec!["T:Base", "T:Child", "own:Child"]);
}
