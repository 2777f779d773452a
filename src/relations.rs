//! Relationship Detector: infers composes / aggregates / associates /
//! imports edges over the sealed model. Inference uses declared or
//! syntactically evident types only; when a type is unknown the edge is
//! simply absent. Each rule fires at most once per (source, target) pair and
//! composition wins over aggregation, which wins over association.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::RelationshipConfig;
use crate::model::{
    AttrInit, Cardinality, Edge, EdgeKind, EntityId, EntityRef, Provenance, SemanticModel,
};
use crate::typeexpr;

pub fn detect(model: &mut SemanticModel, config: &RelationshipConfig) {
    let mut edges: Vec<Edge> = Vec::new();

    if config.detect.contains(&EdgeKind::Imports) {
        detect_imports(model, &mut edges);
    }

    // Pairs already linked by an ownership-flavoured rule; association is
    // suppressed for them, and so is a second firing of the same rule.
    let mut owned_pairs: BTreeSet<(EntityId, EntityId)> = BTreeSet::new();

    if config.detect.contains(&EdgeKind::Composes) {
        detect_composition(model, &mut edges, &mut owned_pairs);
    }
    if config.detect.contains(&EdgeKind::Aggregates) {
        detect_aggregation(model, &mut edges, &mut owned_pairs);
    }
    if config.detect.contains(&EdgeKind::Associates) {
        detect_association(model, &mut edges, &owned_pairs);
    }

    debug!(count = edges.len(), "relationship detection complete");
    for edge in edges {
        model.relationships.push(edge);
    }
}

/// Rule 1: one `imports` edge per resolved import binding. Unresolved
/// imports already carry the external-dependency annotation from sealing.
fn detect_imports(model: &SemanticModel, edges: &mut Vec<Edge>) {
    let mut seen: BTreeSet<(EntityId, EntityId)> = BTreeSet::new();
    for module in model.modules.values() {
        for import in &module.imports {
            let Some(target) = &import.resolved else {
                continue;
            };
            if target == &module.id {
                continue;
            }
            if !seen.insert((module.id.clone(), target.clone())) {
                continue;
            }
            edges.push(Edge {
                source: module.id.clone(),
                target: EntityRef::Entity(target.clone()),
                kind: EdgeKind::Imports,
                cardinality: None,
                optional: false,
                provenance: Provenance {
                    file: module.path.clone(),
                    line: import.line,
                },
            });
        }
    }
}

/// The shape (cardinality/optional) of the declaration text backing an edge.
fn shape_of(text: &str) -> (Option<Cardinality>, bool) {
    let shape = typeexpr::analyze(text);
    let cardinality = if shape.many {
        Cardinality::Many
    } else {
        Cardinality::One
    };
    (Some(cardinality), shape.optional)
}

fn file_of(model: &SemanticModel, owner: &EntityId) -> String {
    model
        .types
        .get(owner)
        .and_then(|t| model.modules.get(&t.module))
        .map(|m| m.path.clone())
        .unwrap_or_default()
}

/// Rule 2: the attribute is freshly constructed in the owner's initialiser.
fn detect_composition(
    model: &SemanticModel,
    edges: &mut Vec<Edge>,
    owned_pairs: &mut BTreeSet<(EntityId, EntityId)>,
) {
    for decl in model.types.values() {
        for attr_id in &decl.attributes {
            let Some(attribute) = model.attributes.get(attr_id) else {
                continue;
            };
            let Some(AttrInit::Constructed { ty }) = &attribute.init else {
                continue;
            };
            let Some(target) = ty.target.entity() else {
                continue;
            };
            if !owned_pairs.insert((decl.id.clone(), target.clone())) {
                continue;
            }
            let text = attribute
                .declared_type
                .as_ref()
                .map(|t| t.text.as_str())
                .unwrap_or(&ty.text);
            let (cardinality, optional) = shape_of(text);
            edges.push(Edge {
                source: decl.id.clone(),
                target: EntityRef::Entity(target.clone()),
                kind: EdgeKind::Composes,
                cardinality,
                optional,
                provenance: Provenance {
                    file: file_of(model, &decl.id),
                    line: attribute.line,
                },
            });
        }
    }
}

/// Rule 3: the attribute is assigned from a constructor parameter, an
/// externally supplied instance the owner holds a reference to.
fn detect_aggregation(
    model: &SemanticModel,
    edges: &mut Vec<Edge>,
    owned_pairs: &mut BTreeSet<(EntityId, EntityId)>,
) {
    for decl in model.types.values() {
        let constructor = decl.methods.iter().find_map(|id| {
            let routine = model.routines.get(id)?;
            matches!(routine.name.as_str(), "__init__" | "__construct" | "constructor")
                .then_some(routine)
        });

        for attr_id in &decl.attributes {
            let Some(attribute) = model.attributes.get(attr_id) else {
                continue;
            };
            let Some(AttrInit::FromParam { param }) = &attribute.init else {
                continue;
            };
            // The supplied instance's type: the parameter's annotation, or
            // the declared type the front-end copied from it.
            let param_ty = constructor
                .and_then(|c| c.params.iter().find(|p| &p.name == param))
                .and_then(|p| p.ty.as_ref())
                .or(attribute.declared_type.as_ref());
            let Some(param_ty) = param_ty else {
                continue;
            };
            let Some(target) = param_ty.target.entity() else {
                continue;
            };
            // Composition wins when both rules match the pair.
            if !owned_pairs.insert((decl.id.clone(), target.clone())) {
                continue;
            }
            let (cardinality, optional) = shape_of(&param_ty.text);
            edges.push(Edge {
                source: decl.id.clone(),
                target: EntityRef::Entity(target.clone()),
                kind: EdgeKind::Aggregates,
                cardinality,
                optional,
                provenance: Provenance {
                    file: file_of(model, &decl.id),
                    line: attribute.line,
                },
            });
        }
    }
}

/// Rule 4: a method of `O` references `T` in a parameter type, return type,
/// or local variable annotation, and `O` holds no field of type `T`.
fn detect_association(
    model: &SemanticModel,
    edges: &mut Vec<Edge>,
    owned_pairs: &BTreeSet<(EntityId, EntityId)>,
) {
    // Field types per owner, including declared and constructed ones that
    // did not produce an edge (unconfigured rules still describe fields).
    let mut field_types: BTreeMap<EntityId, BTreeSet<EntityId>> = BTreeMap::new();
    for decl in model.types.values() {
        let entry = field_types.entry(decl.id.clone()).or_default();
        for attr_id in &decl.attributes {
            let Some(attribute) = model.attributes.get(attr_id) else {
                continue;
            };
            if let Some(ty) = &attribute.declared_type {
                if let Some(target) = ty.target.entity() {
                    entry.insert(target.clone());
                }
            }
            if let Some(AttrInit::Constructed { ty }) = &attribute.init {
                if let Some(target) = ty.target.entity() {
                    entry.insert(target.clone());
                }
            }
        }
    }

    let mut seen: BTreeSet<(EntityId, EntityId)> = BTreeSet::new();
    for decl in model.types.values() {
        let fields = field_types.get(&decl.id);
        for method_id in &decl.methods {
            let Some(routine) = model.routines.get(method_id) else {
                continue;
            };
            let mut candidates: Vec<(&crate::model::TypeRef, u32)> = Vec::new();
            for param in &routine.params {
                if let Some(ty) = &param.ty {
                    candidates.push((ty, routine.span.0));
                }
            }
            if let Some(ty) = &routine.return_type {
                candidates.push((ty, routine.span.0));
            }
            for local in &routine.locals {
                candidates.push((&local.ty, local.line));
            }

            for (ty, line) in candidates {
                let Some(target) = ty.target.entity() else {
                    continue;
                };
                if target == &decl.id {
                    continue;
                }
                if owned_pairs.contains(&(decl.id.clone(), target.clone())) {
                    continue;
                }
                if fields.map(|f| f.contains(target)).unwrap_or(false) {
                    continue;
                }
                if !seen.insert((decl.id.clone(), target.clone())) {
                    continue;
                }
                let (cardinality, optional) = shape_of(&ty.text);
                edges.push(Edge {
                    source: decl.id.clone(),
                    target: EntityRef::Entity(target.clone()),
                    kind: EdgeKind::Associates,
                    cardinality,
                    optional,
                    provenance: Provenance {
                        file: file_of(model, &decl.id),
                        line,
                    },
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::model::{Language, RoutineKind, TypeKind};
    use crate::record::{
        FileRecord, RawAttrInit, RawAttribute, RawParam, RawRoutine, RawTypeDecl,
    };

    /// `Car` constructs an `Engine` and receives a `Driver`; `Garage.check`
    /// mentions `Car` in a parameter.
    fn fixture() -> SemanticModel {
        let mut record = FileRecord::new("cars.py", Language::Python, "cars");
        record
            .types
            .push(RawTypeDecl::new("Engine", TypeKind::Class, (1, 2)));
        record
            .types
            .push(RawTypeDecl::new("Driver", TypeKind::Class, (4, 5)));

        let mut car = RawTypeDecl::new("Car", TypeKind::Class, (7, 15));
        let mut init = RawRoutine::new("__init__", RoutineKind::Method, (8, 11));
        init.params.push(RawParam {
            name: "driver".to_string(),
            ty: Some("Driver".to_string()),
            has_default: false,
            variadic: false,
        });
        car.methods.push(init);

        let mut engine_attr = RawAttribute::new("engine", crate::model::AttributeKind::Instance, 9);
        engine_attr.init = Some(RawAttrInit::Constructed {
            ty: "Engine".to_string(),
        });
        car.attributes.push(engine_attr);

        let mut driver_attr = RawAttribute::new("driver", crate::model::AttributeKind::Instance, 10);
        driver_attr.init = Some(RawAttrInit::FromParam {
            param: "driver".to_string(),
        });
        driver_attr.declared_type = Some("Driver".to_string());
        car.attributes.push(driver_attr);
        record.types.push(car);

        let mut garage = RawTypeDecl::new("Garage", TypeKind::Class, (17, 20));
        let mut check = RawRoutine::new("check", RoutineKind::Method, (18, 19));
        check.params.push(RawParam {
            name: "car".to_string(),
            ty: Some("Car".to_string()),
            has_default: false,
            variadic: false,
        });
        garage.methods.push(check);
        record.types.push(garage);

        let mut diagnostics = Vec::new();
        builder::build(&[record], &mut diagnostics).unwrap()
    }

    fn names(model: &SemanticModel, edge: &Edge) -> (String, String) {
        let source = model.types[&edge.source].name.clone();
        let target = match &edge.target {
            EntityRef::Entity(id) => model.types[id].name.clone(),
            EntityRef::External(text) => format!("external:{text}"),
        };
        (source, target)
    }

    #[test]
    fn composition_and_aggregation() {
        let mut model = fixture();
        detect(&mut model, &RelationshipConfig::default());

        let composes: Vec<_> = model
            .relationships
            .of_kind(EdgeKind::Composes)
            .map(|e| names(&model, e))
            .collect();
        assert_eq!(composes, vec![("Car".to_string(), "Engine".to_string())]);

        let aggregates: Vec<_> = model
            .relationships
            .of_kind(EdgeKind::Aggregates)
            .map(|e| names(&model, e))
            .collect();
        assert_eq!(aggregates, vec![("Car".to_string(), "Driver".to_string())]);

        // No association edges among Car/Engine/Driver: the pairs are owned.
        let associates: Vec<_> = model
            .relationships
            .of_kind(EdgeKind::Associates)
            .map(|e| names(&model, e))
            .collect();
        assert_eq!(associates, vec![("Garage".to_string(), "Car".to_string())]);
    }

    #[test]
    fn composition_wins_over_aggregation() {
        // `self.engine = Engine()` plus an `engine: Engine` constructor
        // parameter assigning the same attribute: one composes edge only.
        let mut record = FileRecord::new("a.py", Language::Python, "a");
        record
            .types
            .push(RawTypeDecl::new("Engine", TypeKind::Class, (1, 2)));
        let mut car = RawTypeDecl::new("Car", TypeKind::Class, (4, 9));
        let mut init = RawRoutine::new("__init__", RoutineKind::Method, (5, 8));
        init.params.push(RawParam {
            name: "engine".to_string(),
            ty: Some("Engine".to_string()),
            has_default: false,
            variadic: false,
        });
        car.methods.push(init);
        let mut attr = RawAttribute::new("engine", crate::model::AttributeKind::Instance, 6);
        attr.init = Some(RawAttrInit::Constructed {
            ty: "Engine".to_string(),
        });
        attr.declared_type = Some("Engine".to_string());
        car.attributes.push(attr);
        // A second attribute aggregating the same pair must not add an edge.
        let mut attr2 = RawAttribute::new("spare", crate::model::AttributeKind::Instance, 7);
        attr2.init = Some(RawAttrInit::FromParam {
            param: "engine".to_string(),
        });
        car.attributes.push(attr2);
        record.types.push(car);

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        detect(&mut model, &RelationshipConfig::default());

        assert_eq!(model.relationships.of_kind(EdgeKind::Composes).count(), 1);
        assert_eq!(model.relationships.of_kind(EdgeKind::Aggregates).count(), 0);
    }

    #[test]
    fn container_attribute_carries_many_cardinality() {
        let mut record = FileRecord::new("a.py", Language::Python, "a");
        record
            .types
            .push(RawTypeDecl::new("Wheel", TypeKind::Class, (1, 2)));
        let mut car = RawTypeDecl::new("Car", TypeKind::Class, (4, 8));
        let mut attr = RawAttribute::new("wheels", crate::model::AttributeKind::Instance, 5);
        attr.init = Some(RawAttrInit::Constructed {
            ty: "Wheel".to_string(),
        });
        attr.declared_type = Some("List[Wheel]".to_string());
        car.attributes.push(attr);
        record.types.push(car);

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[record], &mut diagnostics).unwrap();
        detect(&mut model, &RelationshipConfig::default());

        let edge = model
            .relationships
            .of_kind(EdgeKind::Composes)
            .next()
            .unwrap();
        assert_eq!(edge.cardinality, Some(Cardinality::Many));
    }

    #[test]
    fn imports_edges_from_resolved_imports() {
        use crate::model::{ImportShape, ImportedName};
        use crate::record::RawImport;

        let mut a = FileRecord::new("m/a.py", Language::Python, "m.a");
        a.namespace = Some("m".to_string());
        a.types.push(RawTypeDecl::new("A", TypeKind::Class, (1, 2)));

        let mut b = FileRecord::new("m/b.py", Language::Python, "m.b");
        b.namespace = Some("m".to_string());
        b.imports.push(RawImport {
            module: "a".to_string(),
            shape: ImportShape::Relative { depth: 1 },
            names: vec![ImportedName {
                name: "A".to_string(),
                alias: None,
            }],
            line: 1,
        });

        let mut diagnostics = Vec::new();
        let mut model = builder::build(&[a, b], &mut diagnostics).unwrap();
        detect(&mut model, &RelationshipConfig::default());

        let imports: Vec<_> = model.relationships.of_kind(EdgeKind::Imports).collect();
        assert_eq!(imports.len(), 1);
        assert_eq!(model.modules[&imports[0].source].path, "m/b.py");
    }

    #[test]
    fn disabled_kinds_are_not_computed() {
        let mut model = fixture();
        let mut config = RelationshipConfig::default();
        config.detect.remove(&EdgeKind::Associates);
        detect(&mut model, &config);
        assert_eq!(model.relationships.of_kind(EdgeKind::Associates).count(), 0);
        assert_eq!(model.relationships.of_kind(EdgeKind::Composes).count(), 1);
    }
}
