//! Resolution phase: turn declarations into immutable model classes.
//!
//! 1. Contributions are grouped by `(category, name)` in registration order.
//! 2. Names are ordered topologically over the base graph.
//! 3. Each name is linearised with a C3 merge whose direct bases are its own
//!    contributions, most recent first.
//! 4. Core layers are appended after the linearisation of every model.
//! 5. Columns, attributes and per-method layer lists are collected from the
//!    final layer order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyblok_core::{Error, FieldInfo, Result, Value, table_name_for};

use crate::body::{Category, ClassBody};
use crate::chain::Layer;
use crate::declarations::Declarations;
use crate::model::ModelClass;

type NodeKey = (Category, String);

/// A node of the layer graph: either a contribution, or the synthetic final
/// class of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayerKey {
    Final(usize),
    Contribution(usize, usize),
}

struct Group<'d> {
    key: NodeKey,
    bodies: Vec<&'d ClassBody>,
}

impl Group<'_> {
    fn label(&self) -> String {
        format!("{}.{}", self.key.0, self.key.1)
    }
}

/// Output of a successful resolution.
pub(crate) struct Resolution {
    /// Resolved models, in order of first registration.
    pub(crate) models: Vec<ModelClass>,
    /// Resolved mixin columns by name.
    pub(crate) mixins: BTreeMap<String, Vec<FieldInfo>>,
}

/// Resolve every declaration.
#[tracing::instrument(level = "debug", skip(declarations), fields(declarations = declarations.len()))]
pub(crate) fn resolve(declarations: &Declarations) -> Result<Resolution> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut index: HashMap<NodeKey, usize> = HashMap::new();
    let mut core_base: Vec<&ClassBody> = Vec::new();
    let mut core_sql: Vec<&ClassBody> = Vec::new();

    for decl in declarations.entries() {
        match (decl.category, decl.name.as_str()) {
            (Category::Core, "SqlBase") => core_sql.push(&decl.body),
            (Category::Core, _) => core_base.push(&decl.body),
            (category, name) => {
                let key = (category, name.to_string());
                let slot = *index.entry(key.clone()).or_insert_with(|| {
                    groups.push(Group {
                        key,
                        bodies: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].bodies.push(&decl.body);
            }
        }
    }

    let deps = base_dependencies(&groups, &index)?;
    let order = topological_order(&groups, &deps)?;

    let mut linearisations: HashMap<usize, Vec<LayerKey>> = HashMap::new();
    for &g in &order {
        let lin = linearise(g, &groups[g], &index, &linearisations)
            .ok_or_else(|| Error::InconsistentHierarchy {
                name: groups[g].label(),
            })?;
        linearisations.insert(g, lin);
    }

    let mut models = Vec::new();
    let mut mixins = BTreeMap::new();
    for (g, group) in groups.iter().enumerate() {
        let layers: Vec<(usize, usize)> = linearisations
            .get(&g)
            .map(|lin| {
                lin.iter()
                    .filter_map(|key| match key {
                        LayerKey::Contribution(group, idx) => Some((*group, *idx)),
                        LayerKey::Final(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let fields = merge_columns(&group.key.1, &groups, &layers)?;
        match group.key.0 {
            Category::Mixin => {
                mixins.insert(group.key.1.clone(), fields);
            }
            Category::Model => {
                models.push(build_model(group, &groups, &layers, fields, &core_base, &core_sql));
            }
            Category::Core => {}
        }
    }

    tracing::info!(
        models = models.len(),
        mixins = mixins.len(),
        core_layers = core_base.len() + core_sql.len(),
        "Resolved declarations"
    );
    Ok(Resolution { models, mixins })
}

/// Direct base groups of every group, in declaration order without repeats.
fn base_dependencies(
    groups: &[Group<'_>],
    index: &HashMap<NodeKey, usize>,
) -> Result<Vec<Vec<usize>>> {
    groups
        .iter()
        .map(|group| {
            let mut deps = Vec::new();
            for base in group.bodies.iter().flat_map(|b| b.bases.iter()) {
                let dep = index
                    .get(&(base.category, base.name.clone()))
                    .copied()
                    .ok_or_else(|| Error::UnknownBase {
                        declared_in: group.label(),
                        base: base.to_string(),
                    })?;
                if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            Ok(deps)
        })
        .collect()
}

/// Kahn's algorithm; among ready names the earliest registered goes first.
fn topological_order(groups: &[Group<'_>], deps: &[Vec<usize>]) -> Result<Vec<usize>> {
    let mut pending: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];
    for (g, group_deps) in deps.iter().enumerate() {
        for &d in group_deps {
            dependents[d].push(g);
        }
    }

    let mut ready: BTreeSet<usize> = (0..groups.len()).filter(|&g| pending[g] == 0).collect();
    let mut order = Vec::with_capacity(groups.len());
    while let Some(g) = ready.pop_first() {
        order.push(g);
        for &dependent in &dependents[g] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() < groups.len() {
        let names = (0..groups.len())
            .filter(|&g| pending[g] > 0)
            .map(|g| groups[g].label())
            .collect();
        return Err(Error::CyclicInheritance { names });
    }
    Ok(order)
}

/// Linearisation of the final class of group `g`.
fn linearise(
    g: usize,
    group: &Group<'_>,
    index: &HashMap<NodeKey, usize>,
    done: &HashMap<usize, Vec<LayerKey>>,
) -> Option<Vec<LayerKey>> {
    let mut heads = Vec::with_capacity(group.bodies.len());
    let mut sequences = Vec::with_capacity(group.bodies.len() + 1);

    for (idx, body) in group.bodies.iter().enumerate().rev() {
        let mut base_heads = Vec::new();
        let mut base_sequences = Vec::new();
        for base in &body.bases {
            let b = *index.get(&(base.category, base.name.clone()))?;
            if base_heads.contains(&LayerKey::Final(b)) {
                continue;
            }
            base_heads.push(LayerKey::Final(b));
            base_sequences.push(done.get(&b)?.clone());
        }
        base_sequences.push(base_heads);

        let mut lin = vec![LayerKey::Contribution(g, idx)];
        lin.extend(c3_merge(base_sequences)?);
        heads.push(LayerKey::Contribution(g, idx));
        sequences.push(lin);
    }
    sequences.push(heads);

    let mut lin = vec![LayerKey::Final(g)];
    lin.extend(c3_merge(sequences)?);
    Some(lin)
}

/// C3 merge; `None` when no consistent order exists.
fn c3_merge<T: PartialEq + Copy>(mut sequences: Vec<Vec<T>>) -> Option<Vec<T>> {
    let mut result = Vec::new();
    sequences.retain(|s| !s.is_empty());
    while !sequences.is_empty() {
        let candidate = sequences
            .iter()
            .map(|s| s[0])
            .find(|c| !sequences.iter().any(|s| s[1..].contains(c)))?;
        result.push(candidate);
        for seq in &mut sequences {
            if seq[0] == candidate {
                seq.remove(0);
            }
        }
        sequences.retain(|s| !s.is_empty());
    }
    Some(result)
}

/// Union of the columns over `layers`, applied base-most first.
fn merge_columns(
    name: &str,
    groups: &[Group<'_>],
    layers: &[(usize, usize)],
) -> Result<Vec<FieldInfo>> {
    let mut fields: Vec<FieldInfo> = Vec::new();
    for &(g, idx) in layers.iter().rev() {
        for field in &groups[g].bodies[idx].columns {
            match fields.iter_mut().find(|f| f.name == field.name) {
                Some(existing) => {
                    if let Some(detail) = existing.column.incompatibility_with(&field.column) {
                        return Err(Error::IncompatibleRedeclaration {
                            model: name.to_string(),
                            column: field.name.clone(),
                            detail,
                        });
                    }
                    if existing.column.sql_type != field.column.sql_type {
                        tracing::warn!(
                            model = name,
                            column = %field.name,
                            from = %existing.column.sql_type.sql_name(),
                            to = %field.column.sql_type.sql_name(),
                            "Column retyped by a later declaration"
                        );
                    }
                    existing.column = field.column.clone();
                }
                None => fields.push(field.clone()),
            }
        }
    }
    Ok(fields)
}

fn origin(group: &Group<'_>, idx: usize) -> String {
    format!("{}#{}", group.label(), idx)
}

fn build_model(
    group: &Group<'_>,
    groups: &[Group<'_>],
    layers: &[(usize, usize)],
    fields: Vec<FieldInfo>,
    core_base: &[&ClassBody],
    core_sql: &[&ClassBody],
) -> ModelClass {
    let name = group.key.1.clone();
    let is_sql = !fields.is_empty();

    // Most derived first: model layers, then SqlBase, then Base.
    let mut ordered: Vec<(String, &ClassBody)> = layers
        .iter()
        .map(|&(g, idx)| (origin(&groups[g], idx), groups[g].bodies[idx]))
        .collect();
    if is_sql {
        ordered.extend(
            core_sql
                .iter()
                .enumerate()
                .rev()
                .map(|(i, body)| (format!("Core.SqlBase#{}", i), *body)),
        );
    }
    ordered.extend(
        core_base
            .iter()
            .enumerate()
            .rev()
            .map(|(i, body)| (format!("Core.Base#{}", i), *body)),
    );

    let mut attributes: BTreeMap<String, Value> = BTreeMap::new();
    for (_, body) in ordered.iter().rev() {
        attributes.extend(body.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let mut class = ModelClass::new(name.clone());
    for (label, body) in &ordered {
        for (method, func) in &body.methods {
            class
                .methods
                .entry(method.clone())
                .or_default()
                .push(Layer::new(label.clone(), func.clone()));
        }
        for (method, func) in &body.class_methods {
            class
                .class_methods
                .entry(method.clone())
                .or_default()
                .push(Layer::new(label.clone(), func.clone()));
        }
        if let Some(hook) = &body.insert {
            class.insert_chain.push(Layer::new(label.clone(), hook.clone()));
        }
        if let Some(hook) = &body.initialize {
            class
                .initialize_chain
                .push(Layer::new(label.clone(), hook.clone()));
        }
    }

    class.table_name = is_sql.then(|| {
        group
            .bodies
            .iter()
            .rev()
            .find_map(|b| b.table_name.clone())
            .unwrap_or_else(|| table_name_for(&name))
    });
    class.layers = ordered.into_iter().map(|(label, _)| label).collect();
    class.fields = fields;
    class.attributes = attributes;

    tracing::debug!(
        model = %name,
        layers = ?class.layers,
        columns = class.fields.len(),
        table = ?class.table_name,
        "Resolved model"
    );
    class
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Base;
    use anyblok_core::{Column, SqlType};

    fn resolve_ok(decls: &Declarations) -> Resolution {
        resolve(decls).unwrap()
    }

    fn model<'r>(res: &'r Resolution, name: &str) -> &'r ModelClass {
        res.models.iter().find(|m| m.name() == name).unwrap()
    }

    fn column_names(class: &ModelClass) -> Vec<&str> {
        class.fields().iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_c3_merge() {
        assert_eq!(c3_merge(vec![vec![1, 3], vec![2, 3], vec![1, 2]]), Some(vec![1, 2, 3]));
        assert_eq!(c3_merge(vec![vec![1, 2], vec![2, 1]]), None);
        assert_eq!(c3_merge::<u8>(vec![]), Some(vec![]));
    }

    #[test]
    fn test_redeclaration_layers_latest_first() {
        let mut decls = Declarations::new();
        decls
            .register_model("Test", ClassBody::new().column("id", Column::integer().primary_key()))
            .unwrap()
            .register_model("Test", ClassBody::new().column("other", Column::string()))
            .unwrap();
        let res = resolve_ok(&decls);
        let test = model(&res, "Test");
        assert_eq!(test.layers(), ["Model.Test#1", "Model.Test#0"]);
        assert_eq!(column_names(test), vec!["id", "other"]);
        assert_eq!(test.table_name(), Some("test"));
    }

    #[test]
    fn test_mixin_added_by_later_contribution() {
        let mut decls = Declarations::new();
        decls
            .register_mixin("MixinName", ClassBody::new().column("name", Column::string()))
            .unwrap()
            .register_model("Test", ClassBody::new().column("id", Column::integer().primary_key()))
            .unwrap()
            .register_model(
                "Test",
                ClassBody::new()
                    .inherit(Base::mixin("MixinName"))
                    .column("other", Column::string()),
            )
            .unwrap();
        let res = resolve_ok(&decls);
        let test = model(&res, "Test");
        assert_eq!(
            test.layers(),
            ["Model.Test#1", "Mixin.MixinName#0", "Model.Test#0"]
        );
        assert_eq!(column_names(test), vec!["id", "name", "other"]);
        assert_eq!(res.mixins["MixinName"].len(), 1);
    }

    #[test]
    fn test_retype_keeps_position() {
        let mut decls = Declarations::new();
        decls
            .register_model(
                "Test",
                ClassBody::new()
                    .column("id", Column::integer().primary_key())
                    .column("name", Column::string()),
            )
            .unwrap()
            .register_model("Test", ClassBody::new().column("name", Column::integer()))
            .unwrap();
        let res = resolve_ok(&decls);
        let test = model(&res, "Test");
        assert_eq!(column_names(test), vec!["id", "name"]);
        assert_eq!(test.fields()[1].column.sql_type, SqlType::Integer);
    }

    #[test]
    fn test_flag_flip_is_rejected() {
        let mut decls = Declarations::new();
        decls
            .register_model("Test", ClassBody::new().column("id", Column::integer().primary_key()))
            .unwrap()
            .register_model("Test", ClassBody::new().column("id", Column::integer()))
            .unwrap();
        assert!(matches!(
            resolve(&decls),
            Err(Error::IncompatibleRedeclaration { .. })
        ));
    }

    #[test]
    fn test_unknown_base() {
        let mut decls = Declarations::new();
        decls
            .register_model("Test", ClassBody::new().inherit(Base::mixin("Nope")))
            .unwrap();
        let err = resolve(&decls).err().unwrap();
        assert_eq!(
            err,
            Error::UnknownBase {
                declared_in: "Model.Test".to_string(),
                base: "Mixin.Nope".to_string(),
            }
        );
    }

    #[test]
    fn test_cycle_names_members() {
        let mut decls = Declarations::new();
        decls
            .register_mixin("A", ClassBody::new().inherit(Base::mixin("B")))
            .unwrap()
            .register_mixin("B", ClassBody::new().inherit(Base::mixin("A")))
            .unwrap()
            .register_model("Free", ClassBody::new())
            .unwrap();
        let Err(Error::CyclicInheritance { names }) = resolve(&decls) else {
            panic!("expected a cycle");
        };
        assert_eq!(names, vec!["Mixin.A".to_string(), "Mixin.B".to_string()]);
    }

    #[test]
    fn test_core_layers_follow_model_layers() {
        let mut decls = Declarations::new();
        decls
            .register_core("Base", ClassBody::new())
            .unwrap()
            .register_core("SqlBase", ClassBody::new())
            .unwrap()
            .register_core("Base", ClassBody::new())
            .unwrap()
            .register_model("Plain", ClassBody::new())
            .unwrap()
            .register_model("Stored", ClassBody::new().column("id", Column::integer().primary_key()))
            .unwrap();
        let res = resolve_ok(&decls);
        assert_eq!(
            model(&res, "Plain").layers(),
            ["Model.Plain#0", "Core.Base#1", "Core.Base#0"]
        );
        assert_eq!(
            model(&res, "Stored").layers(),
            ["Model.Stored#0", "Core.SqlBase#0", "Core.Base#1", "Core.Base#0"]
        );
        assert_eq!(model(&res, "Plain").table_name(), None);
    }

    #[test]
    fn test_attributes_later_layer_wins() {
        let mut decls = Declarations::new();
        decls
            .register_core("Base", ClassBody::new().attribute("flag", "core"))
            .unwrap()
            .register_model("Test", ClassBody::new().attribute("flag", "model"))
            .unwrap();
        let res = resolve_ok(&decls);
        assert_eq!(
            model(&res, "Test").attribute("flag"),
            Some(&Value::from("model"))
        );
    }

    #[test]
    fn test_explicit_table_name() {
        let mut decls = Declarations::new();
        decls
            .register_model(
                "Test",
                ClassBody::new()
                    .table_name("custom")
                    .column("id", Column::integer().primary_key()),
            )
            .unwrap();
        assert_eq!(model(&resolve_ok(&decls), "Test").table_name(), Some("custom"));
    }
}
