//! Layering of Models, Mixins and Core contributions.

use anyblok::prelude::*;
use anyblok::{Category, Declaration};

fn build(declare: impl FnOnce(&mut Declarations)) -> Registry {
    let mut declarations = Declarations::new();
    declare(&mut declarations);
    anyblok::build_in_memory(&declarations).unwrap()
}

fn try_build(declare: impl FnOnce(&mut Declarations)) -> Result<Registry> {
    let mut declarations = Declarations::new();
    declare(&mut declarations);
    anyblok::build_in_memory(&declarations)
}

/// Insert a row and read it back as the first row of the table.
fn check_registry(model: &ModelHandle) {
    let inserted = model
        .insert(values! { "name" => "test", "other" => "other" })
        .unwrap();
    let first = model.query().first().unwrap();
    assert_eq!(first, Some(inserted));
}

fn id() -> Column {
    Column::integer().primary_key()
}

fn string() -> Column {
    Column::string()
}

fn declaration_names(declarations: &Declarations) -> Vec<(Category, &str)> {
    declarations
        .entries()
        .iter()
        .map(|d: &Declaration| (d.category(), d.name()))
        .collect()
}

// ============================================================================
// Model subclassing
// ============================================================================

fn simple_subclass_model(d: &mut Declarations) {
    d.register_model("Test", ClassBody::new().column("id", id()).column("name", string()))
        .unwrap();
    d.register_model("Test", ClassBody::new().column("other", string()))
        .unwrap();
}

#[test]
fn test_simple_subclass_model() {
    let registry = build(simple_subclass_model);
    check_registry(&registry.get("Test").unwrap());
}

#[test]
fn test_declarations_keep_registration_order() {
    let mut declarations = Declarations::new();
    simple_subclass_model(&mut declarations);
    assert_eq!(
        declaration_names(&declarations),
        vec![(Category::Model, "Test"), (Category::Model, "Test")]
    );
}

#[test]
fn test_simple_subclass_model_change_type() {
    let registry = build(|d| {
        d.register_model("Test", ClassBody::new().column("id", id()).column("name", string()))
            .unwrap();
        d.register_model("Test", ClassBody::new().column("name", Column::integer()))
            .unwrap();
    });
    let test = registry.get("Test").unwrap();
    assert_eq!(
        test.class().field("name").unwrap().column.sql_type,
        SqlType::Integer
    );

    let inserted = test.insert(values! { "name" => 1 }).unwrap();
    assert_eq!(test.query().first().unwrap(), Some(inserted.clone()));
    assert_eq!(inserted.get("name"), Some(&Value::Int(1)));
}

#[test]
fn test_simple_subclass_model_change_type_and_subclass_add_field() {
    let registry = build(|d| {
        d.register_model("Test", ClassBody::new().column("id", id()).column("name", string()))
            .unwrap();
        d.register_model("Test", ClassBody::new().column("name", Column::integer()))
            .unwrap();
        d.register_model("Test", ClassBody::new().column("other", string()))
            .unwrap();
    });
    let test = registry.get("Test").unwrap();
    let inserted = test
        .insert(values! { "name" => 1, "other" => "other" })
        .unwrap();
    assert_eq!(test.query().first().unwrap(), Some(inserted.clone()));
    assert_eq!(inserted.get("name"), Some(&Value::Int(1)));
}

// ============================================================================
// Mixins
// ============================================================================

fn mixin_name(d: &mut Declarations) {
    d.register_mixin("MixinName", ClassBody::new().column("name", string()))
        .unwrap();
}

#[test]
fn test_mixin_one_model() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_model(
            "Test",
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .column("id", id())
                .column("other", string()),
        )
        .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
    assert!(registry.mixin("MixinName").is_some());
}

#[test]
fn test_mixin_two_model() {
    let registry = build(|d| {
        mixin_name(d);
        for name in ["Test", "Test2"] {
            d.register_model(
                name,
                ClassBody::new()
                    .inherit(Base::mixin("MixinName"))
                    .column("id", id())
                    .column("other", string()),
            )
            .unwrap();
        }
    });
    let test = registry.get("Test").unwrap();
    let test2 = registry.get("Test2").unwrap();
    check_registry(&test);
    check_registry(&test2);

    test.insert(values! { "name" => "only in test" }).unwrap();
    assert_eq!(test.query().count().unwrap(), 2);
    assert_eq!(test2.query().count().unwrap(), 1);
}

#[test]
fn test_mixin_one_model_with_subclass() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_model(
            "Test",
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .column("id", id()),
        )
        .unwrap();
        d.register_model("Test", ClassBody::new().column("other", string()))
            .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
}

#[test]
fn test_mixin_one_model_by_subclass() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_model("Test", ClassBody::new().column("id", id()))
            .unwrap();
        d.register_model(
            "Test",
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .column("other", string()),
        )
        .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
}

#[test]
fn test_mixin_one_model_by_subclass_and_with() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_model("Test", ClassBody::new().column("id", id()))
            .unwrap();
        d.register_model("Test", ClassBody::new().inherit(Base::mixin("MixinName")))
            .unwrap();
        d.register_model("Test", ClassBody::new().column("other", string()))
            .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
}

#[test]
fn test_mixin_one_model_with_subclass_and_subclass_mixin() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_model("Test", ClassBody::new().column("id", id()))
            .unwrap();
        d.register_model("Test", ClassBody::new().inherit(Base::mixin("MixinName")))
            .unwrap();
        d.register_mixin("MixinName", ClassBody::new().column("other", string()))
            .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
}

#[test]
fn test_inherit_multi_mixins() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_mixin("MixinOther", ClassBody::new().column("other", string()))
            .unwrap();
        d.register_model(
            "Test",
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .inherit(Base::mixin("MixinOther"))
                .column("id", id()),
        )
        .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
}

#[test]
fn test_inherit_cascade_mixins() {
    let registry = build(|d| {
        mixin_name(d);
        d.register_mixin("MixinOther", ClassBody::new().column("other", string()))
            .unwrap();
        d.register_mixin(
            "MTest",
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .inherit(Base::mixin("MixinOther")),
        )
        .unwrap();
        d.register_model(
            "Test",
            ClassBody::new()
                .inherit(Base::mixin("MTest"))
                .column("id", id()),
        )
        .unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
    assert_eq!(
        registry.get("Test").unwrap().layers(),
        &[
            "Model.Test#0",
            "Mixin.MTest#0",
            "Mixin.MixinName#0",
            "Mixin.MixinOther#0",
        ][..]
    );
}

// ============================================================================
// Foreign keys declared in mixins
// ============================================================================

fn mixin_with_foreign_key(d: &mut Declarations, models: &[&str]) {
    d.register_model(
        "TestFk",
        ClassBody::new().column("name", Column::string().primary_key()),
    )
    .unwrap();
    d.register_mixin(
        "MixinName",
        ClassBody::new().column("name", Column::string().foreign_key("TestFk", "name")),
    )
    .unwrap();
    for model in models {
        d.register_model(
            *model,
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .column("id", id()),
        )
        .unwrap();
    }
}

#[test]
fn test_mixin_with_foreign_key_one_model() {
    let registry = build(|d| mixin_with_foreign_key(d, &["Test"]));
    registry
        .get("TestFk")
        .unwrap()
        .insert(values! { "name" => "test" })
        .unwrap();
    let test = registry.get("Test").unwrap();
    let inserted = test.insert(values! { "name" => "test" }).unwrap();
    assert_eq!(test.query().first().unwrap(), Some(inserted));
}

#[test]
fn test_mixin_with_foreign_key_two_model() {
    let registry = build(|d| mixin_with_foreign_key(d, &["Test", "Test2"]));
    let test_fk = registry.get("TestFk").unwrap();
    for name in ["test", "test2"] {
        test_fk.insert(values! { "name" => name }).unwrap();
    }

    let test = registry.get("Test").unwrap();
    let t = test.insert(values! { "name" => "test" }).unwrap();
    assert_eq!(test.query().first().unwrap(), Some(t));

    let test2 = registry.get("Test2").unwrap();
    let t3 = test2.insert(values! { "name" => "test2" }).unwrap();
    assert_eq!(test2.query().first().unwrap(), Some(t3));

    let tables = registry.tables();
    for table in ["test", "test2"] {
        let info = tables.iter().find(|t| t.name == table).unwrap();
        assert_eq!(info.foreign_keys.len(), 1);
        assert_eq!(info.foreign_keys[0].foreign_table, "testfk");
    }
}

#[test]
fn test_mixin_foreign_key_rejects_missing_target_row() {
    let registry = build(|d| mixin_with_foreign_key(d, &["Test"]));
    let err = registry
        .get("Test")
        .unwrap()
        .insert(values! { "name" => "nobody" })
        .unwrap_err();
    assert!(matches!(err, Error::ForeignKeyViolation { .. }));
}

#[test]
fn test_mixin_foreign_key_declared_before_target() {
    let registry = build(|d| {
        d.register_mixin(
            "MixinName",
            ClassBody::new().column("name", Column::string().foreign_key("TestFk", "name")),
        )
        .unwrap();
        d.register_model(
            "Test",
            ClassBody::new()
                .inherit(Base::mixin("MixinName"))
                .column("id", id()),
        )
        .unwrap();
        d.register_model(
            "TestFk",
            ClassBody::new().column("name", Column::string().primary_key()),
        )
        .unwrap();
    });
    let names: Vec<_> = registry.tables().iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"test") && names.contains(&"testfk"));
}

// ============================================================================
// Table inheritance between models
// ============================================================================

fn main_model(d: &mut Declarations) {
    d.register_model(
        "MainModel",
        ClassBody::new().column("id", id()).column("name", string()),
    )
    .unwrap();
}

fn inheriting_model(name: &str, with_other: bool) -> (String, ClassBody) {
    let mut body = ClassBody::new()
        .inherit(Base::model("MainModel"))
        .column("id", id())
        .column("mainmodel", Column::integer().foreign_key("MainModel", "id"));
    if with_other {
        body = body.column("other", string());
    }
    (name.to_string(), body)
}

#[test]
fn test_inherit_by_another_model() {
    let registry = build(|d| {
        main_model(d);
        let (name, body) = inheriting_model("Test", true);
        d.register_model(name, body).unwrap();
    });
    check_registry(&registry.get("Test").unwrap());
    assert_eq!(registry.get("MainModel").unwrap().query().count().unwrap(), 0);
}

#[test]
fn test_inherit_by_two_another_model() {
    let registry = build(|d| {
        main_model(d);
        for model in ["Test", "Test2"] {
            let (name, body) = inheriting_model(model, true);
            d.register_model(name, body).unwrap();
        }
    });
    check_registry(&registry.get("Test").unwrap());
    check_registry(&registry.get("Test2").unwrap());
}

#[test]
fn test_inherit_by_another_model_and_subclass_mainmodel() {
    let registry = build(|d| {
        main_model(d);
        let (name, body) = inheriting_model("Test", false);
        d.register_model(name, body).unwrap();
        d.register_model("MainModel", ClassBody::new().column("other", string()))
            .unwrap();
    });
    let test = registry.get("Test").unwrap();
    assert!(test.class().field("other").is_some());
    check_registry(&test);
}

#[test]
fn test_inherited_model_linked_by_foreign_key() {
    let registry = build(|d| {
        main_model(d);
        let (name, body) = inheriting_model("Test", true);
        d.register_model(name, body).unwrap();
    });
    let main = registry
        .get("MainModel")
        .unwrap()
        .insert(values! { "name" => "parent" })
        .unwrap();
    let child = registry
        .get("Test")
        .unwrap()
        .insert(values! { "name" => "child", "mainmodel" => main.get("id").cloned() })
        .unwrap();
    assert_eq!(child.get("mainmodel"), Some(&Value::Int(1)));
}

// ============================================================================
// Core layers
// ============================================================================

fn times_ten_super(call: &mut anyblok::InstanceCall<'_>, args: &Args) -> Result<Value> {
    let inner = call.super_call(args)?;
    Ok(Value::Int(10 * inner.as_i64().unwrap_or_default()))
}

#[test]
fn test_simple_subclass_core_base() {
    let registry = build(|d| {
        d.register_core("Base", ClassBody::new().method("mymethod", |_, _| Ok(Value::Int(1))))
            .unwrap();
        d.register_core("Base", ClassBody::new().method("mymethod", times_ten_super))
            .unwrap();
        d.register_model("Test", ClassBody::new()).unwrap();
    });
    let mut m = registry.get("Test").unwrap().instance();
    assert_eq!(m.call("mymethod", &Args::new()).unwrap(), Value::Int(10));
}

#[test]
fn test_simple_subclass_core_sql_base() {
    let registry = build(|d| {
        d.register_core("SqlBase", ClassBody::new().method("mymethod", |_, _| Ok(Value::Int(1))))
            .unwrap();
        d.register_core("SqlBase", ClassBody::new().method("mymethod", times_ten_super))
            .unwrap();
        d.register_model("Test", ClassBody::new().column("id", id()))
            .unwrap();
    });
    let mut m = registry.get("Test").unwrap().instance();
    assert_eq!(m.call("mymethod", &Args::new()).unwrap(), Value::Int(10));
}

fn double(_: &mut anyblok::InstanceCall<'_>, args: &Args) -> Result<Value> {
    Ok(Value::Int(args.int(0)? * 2))
}

fn plus_three_super(call: &mut anyblok::InstanceCall<'_>, args: &Args) -> Result<Value> {
    let inner = call.super_call(args)?;
    Ok(Value::Int(inner.as_i64().unwrap_or_default() + 3))
}

fn method_from_base(registry: &Registry) -> Value {
    registry
        .get("Test")
        .unwrap()
        .instance()
        .call("method_from_base", &Args::new().arg(2))
        .unwrap()
}

#[test]
fn test_inherit_base_and_add_method() {
    let registry = build(|d| {
        d.register_core("Base", ClassBody::new().method("method_from_base", double))
            .unwrap();
        d.register_model("Test", ClassBody::new()).unwrap();
    });
    assert_eq!(method_from_base(&registry), Value::Int(4));
}

#[test]
fn test_inherit_base_and_add_method_after_create_model() {
    let registry = build(|d| {
        d.register_model("Test", ClassBody::new()).unwrap();
        d.register_core("Base", ClassBody::new().method("method_from_base", double))
            .unwrap();
    });
    assert_eq!(method_from_base(&registry), Value::Int(4));
}

#[test]
fn test_inherit_base_and_add_method_sub_classes() {
    let registry = build(|d| {
        d.register_core("Base", ClassBody::new().method("method_from_base", double))
            .unwrap();
        d.register_model(
            "Test",
            ClassBody::new().method("method_from_base", plus_three_super),
        )
        .unwrap();
    });
    assert_eq!(method_from_base(&registry), Value::Int(7));
    assert_eq!(
        registry.get("Test").unwrap().class().method_layers("method_from_base"),
        vec!["Model.Test#0", "Core.Base#0"]
    );
}

#[test]
fn test_inherit_base_and_add_method_sub_classes_by_mixin() {
    let registry = build(|d| {
        d.register_core("Base", ClassBody::new().method("method_from_base", double))
            .unwrap();
        d.register_mixin(
            "TestMixin",
            ClassBody::new().method("method_from_base", plus_three_super),
        )
        .unwrap();
        d.register_model("Test", ClassBody::new().inherit(Base::mixin("TestMixin")))
            .unwrap();
    });
    assert_eq!(method_from_base(&registry), Value::Int(7));
}

fn sql_base_markers(d: &mut Declarations) {
    d.register_core(
        "Base",
        ClassBody::new().method("is_sql_base", |_, _| Ok(Value::Bool(false))),
    )
    .unwrap();
    d.register_core(
        "SqlBase",
        ClassBody::new().method("is_sql_base", |_, _| Ok(Value::Bool(true))),
    )
    .unwrap();
}

#[test]
fn test_inherit_sql_base_on_simple_model() {
    let registry = build(|d| {
        sql_base_markers(d);
        d.register_model("Test", ClassBody::new()).unwrap();
    });
    let test = registry.get("Test").unwrap();
    assert!(!test.is_sql());
    let value = test.instance().call("is_sql_base", &Args::new()).unwrap();
    assert_eq!(value, Value::Bool(false));
}

#[test]
fn test_inherit_sql_base_on_sql_model() {
    let registry = build(|d| {
        sql_base_markers(d);
        d.register_model("Test", ClassBody::new().column("id", id()))
            .unwrap();
    });
    let test = registry.get("Test").unwrap();
    assert!(test.is_sql());
    let value = test.instance().call("is_sql_base", &Args::new()).unwrap();
    assert_eq!(value, Value::Bool(true));
}

// ============================================================================
// Rejected declarations
// ============================================================================

#[test]
fn test_unknown_base_is_rejected() {
    let err = try_build(|d| {
        d.register_model("Test", ClassBody::new().inherit(Base::mixin("Nope")))
            .unwrap();
    })
    .unwrap_err();
    assert_eq!(
        err,
        Error::UnknownBase {
            declared_in: "Model.Test".to_string(),
            base: "Mixin.Nope".to_string(),
        }
    );
}

#[test]
fn test_inheritance_cycle_is_rejected() {
    let err = try_build(|d| {
        d.register_mixin("A", ClassBody::new().inherit(Base::mixin("B")))
            .unwrap();
        d.register_mixin("B", ClassBody::new().inherit(Base::mixin("A")))
            .unwrap();
    })
    .unwrap_err();
    let Error::CyclicInheritance { names } = err else {
        panic!("expected a cycle error, got {err:?}");
    };
    assert_eq!(names, vec!["Mixin.A".to_string(), "Mixin.B".to_string()]);
}

#[test]
fn test_primary_key_flip_is_rejected() {
    let err = try_build(|d| {
        d.register_model("Test", ClassBody::new().column("id", id()))
            .unwrap();
        d.register_model("Test", ClassBody::new().column("id", Column::integer()))
            .unwrap();
    })
    .unwrap_err();
    assert!(matches!(err, Error::IncompatibleRedeclaration { .. }));
}

#[test]
fn test_nullable_flip_is_rejected() {
    let err = try_build(|d| {
        d.register_model(
            "Test",
            ClassBody::new().column("id", id()).column("name", string()),
        )
        .unwrap();
        d.register_mixin(
            "Strict",
            ClassBody::new().column("name", Column::string().nullable(false)),
        )
        .unwrap();
        d.register_model("Test", ClassBody::new().inherit(Base::mixin("Strict")))
            .unwrap();
    })
    .unwrap_err();
    assert!(matches!(err, Error::IncompatibleRedeclaration { .. }));
}

#[test]
fn test_unresolved_foreign_key_is_rejected() {
    let err = try_build(|d| {
        d.register_model(
            "Test",
            ClassBody::new()
                .column("id", id())
                .column("parent", Column::integer().foreign_key("Missing", "id")),
        )
        .unwrap();
    })
    .unwrap_err();
    assert!(matches!(err, Error::UnresolvedForeignKey { .. }));
}

#[test]
fn test_table_name_collision_is_rejected() {
    let err = try_build(|d| {
        d.register_model("Test.One", ClassBody::new().column("id", id()))
            .unwrap();
        d.register_model("Test_One", ClassBody::new().column("id", id()))
            .unwrap();
    })
    .unwrap_err();
    let Error::DuplicateTable { table, mut models } = err else {
        panic!("expected a duplicate table error, got {err:?}");
    };
    assert_eq!(table, "test_one");
    models.sort();
    assert_eq!(models, vec!["Test.One".to_string(), "Test_One".to_string()]);
}

#[test]
fn test_missing_method() {
    let registry = build(|d| {
        d.register_model("Test", ClassBody::new()).unwrap();
    });
    let test = registry.get("Test").unwrap();
    let err = test.instance().call("nope", &Args::new()).unwrap_err();
    assert!(matches!(err, Error::MethodNotFound { .. }));
    assert!(matches!(
        test.insert(Values::new()),
        Err(Error::NotStorageBacked(_))
    ));
}

#[test]
fn test_invalid_name_is_rejected() {
    let mut declarations = Declarations::new();
    let err = declarations
        .register_model("Bad Name", ClassBody::new())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidName { .. }));
}
