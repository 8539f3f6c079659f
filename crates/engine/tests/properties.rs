//! Behavioural properties of the field graph exercised through the public API.

use std::cell::RefCell;
use std::f64::consts::FRAC_PI_2;
use std::rc::Rc;

use fieldgraph_core::{
    ChangeKind, Curve, Element, ElementId, EvaluationError, Knot, Location, Manager, Mesh, NodeId, TimeKeeper,
};
use fieldgraph_engine::{
    ConstantCore, CoordinateSystem, FieldCore, ImageFilter, LogicalOp, Module, NodeValueCore, OffsetCore, ThresholdMode,
};

const EPS: f64 = 1e-9;

fn close(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < EPS)
}

/// Two-node line element, both nodes registered in the mesh.
fn line() -> (Rc<Mesh>, Element) {
    let mut mesh = Mesh::new();
    mesh.add_node(NodeId(1));
    mesh.add_node(NodeId(2));
    let element = Element::new(ElementId(1), vec![NodeId(1), NodeId(2)]).unwrap();
    mesh.add_element(element.clone()).unwrap();
    (Rc::new(mesh), element)
}

fn mid(element: &Element) -> Location {
    Location::element_xi(element.clone(), &[0.5], 0.0)
        .unwrap()
        .with_derivatives(true)
}

fn ramp(curves: &Manager<Curve>, name: &str, slope: f64) {
    let knots = vec![
        Knot {
            parameter: 0.0,
            values: vec![0.0],
        },
        Knot {
            parameter: 10.0,
            values: vec![10.0 * slope],
        },
    ];
    curves.add(Curve::from_knots(name, 1, knots).unwrap()).unwrap();
}

// ── Caching ─────────────────────────────────────────────────────────────────

#[test]
fn repeated_evaluation_runs_each_core_once() {
    let module = Module::new("cache");
    let a = module.create_constant("a", vec![1.0, 2.0]).unwrap();
    let b = module.create_constant("b", vec![10.0]).unwrap();
    let sum = module.create_add("sum", &a, &b).unwrap();
    let product = module.create_multiply("product", &sum, &b).unwrap();
    let here = Location::node(NodeId(3), 0.0);
    for _ in 0..5 {
        assert_eq!(product.evaluate(&here).unwrap().values, vec![110.0, 120.0]);
    }
    assert_eq!(product.evaluation_count(), 1);
    assert_eq!(sum.evaluation_count(), 1);
    let stats = module.statistics();
    // four repeats plus `b` read a second time by `product`
    assert_eq!(stats.cache_hits, 5);
    assert_eq!(stats.core_evaluations, 4);
}

#[test]
fn shared_source_is_evaluated_once_per_location() {
    let module = Module::new("diamond");
    let u = module.create_node_value("u", 1).unwrap();
    u.set_values_at_node(NodeId(1), 0.0, &[3.0]).unwrap();
    let squared = module.create_multiply("squared", &u, &u).unwrap();
    let total = module.create_add("total", &squared, &u).unwrap();
    assert_eq!(total.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![12.0]);
    assert_eq!(u.evaluation_count(), 1);
}

#[test]
fn long_chain_stays_cached_until_its_root_changes() {
    let module = Module::new("chain");
    let root = module.create_node_value("root", 1).unwrap();
    root.set_values_at_node(NodeId(1), 0.0, &[0.0]).unwrap();
    let mut top = root.clone();
    for i in 0..200 {
        top = module.create_offset(&format!("step{i}"), &top, vec![1.0]).unwrap();
    }
    let here = Location::node(NodeId(1), 0.0);
    assert_eq!(top.evaluate(&here).unwrap().values, vec![200.0]);
    for _ in 0..3 {
        assert_eq!(top.evaluate(&here).unwrap().values, vec![200.0]);
        assert!(top.has_valid_cache());
    }
    assert_eq!(top.evaluation_count(), 1);

    root.set_values_at_node(NodeId(1), 0.0, &[5.0]).unwrap();
    assert!(!top.has_valid_cache());
    assert_eq!(top.evaluate(&here).unwrap().values, vec![205.0]);
    assert_eq!(top.evaluation_count(), 2);
}

#[test]
fn redefining_a_middle_field_invalidates_only_downstream() {
    let module = Module::new("chain");
    let a = module.create_constant("a", vec![1.0]).unwrap();
    let b = module.create_offset("b", &a, vec![1.0]).unwrap();
    let c = module.create_offset("c", &b, vec![1.0]).unwrap();
    let side = module.create_offset("side", &a, vec![0.5]).unwrap();
    let here = Location::node(NodeId(1), 0.0);
    c.evaluate(&here).unwrap();
    side.evaluate(&here).unwrap();

    module
        .replace_core(&b, FieldCore::Offset(OffsetCore::new(vec![10.0]).unwrap()), &[a.clone()])
        .unwrap();
    assert!(!c.has_valid_cache());
    assert!(side.has_valid_cache());
    assert_eq!(c.evaluate(&here).unwrap().values, vec![12.0]);
    assert!(c.has_valid_cache());
}

// ── Change propagation ─────────────────────────────────────────────────────

#[test]
fn curve_change_invalidates_only_its_readers() {
    let (mesh, element) = line();
    let module = Module::new("curves");
    module.set_mesh(mesh);
    let curves = Manager::new();
    ramp(&curves, "steep", 2.0);
    ramp(&curves, "shallow", 0.5);

    let u = module.create_node_value("u", 1).unwrap();
    u.set_values_at_node(NodeId(1), 0.0, &[2.0]).unwrap();
    u.set_values_at_node(NodeId(2), 0.0, &[4.0]).unwrap();
    let steep = module
        .create_curve_lookup("on_steep", &u, &curves.get("steep").unwrap())
        .unwrap();
    let shallow = module
        .create_curve_lookup("on_shallow", &u, &curves.get("shallow").unwrap())
        .unwrap();

    let at = mid(&element);
    assert!(close(&steep.evaluate(&at).unwrap().values, &[6.0]));
    assert!(close(&shallow.evaluate(&at).unwrap().values, &[1.5]));

    curves
        .modify("steep", |c| c.set_knot(10.0, vec![30.0]))
        .unwrap()
        .unwrap();
    assert!(!steep.has_valid_cache());
    assert!(shallow.has_valid_cache());
    assert!(u.has_valid_cache());
    assert!(close(&steep.evaluate(&at).unwrap().values, &[9.0]));
}

#[test]
fn removed_curve_makes_reader_unavailable() {
    let module = Module::new("curves");
    let curves = Manager::new();
    ramp(&curves, "ramp", 1.0);
    let t = module.create_constant("t", vec![4.0]).unwrap();
    let y = module
        .create_curve_lookup("y", &t, &curves.get("ramp").unwrap())
        .unwrap();
    assert_eq!(y.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![4.0]);
    assert!(y.depends_on_external("ramp"));

    curves.remove("ramp");
    let err = y.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
    assert!(matches!(err, EvaluationError::ExternalResourceUnavailable { .. }));
}

#[test]
fn renamed_curve_keeps_subscription() {
    let module = Module::new("curves");
    let curves = Manager::new();
    ramp(&curves, "ramp", 1.0);
    let t = module.create_constant("t", vec![2.0]).unwrap();
    let y = module
        .create_curve_lookup("y", &t, &curves.get("ramp").unwrap())
        .unwrap();
    curves.rename("ramp", "slope").unwrap();
    assert_eq!(y.describe(), "curve_lookup field y curve slope source_field t");

    y.evaluate_at_node(NodeId(1), 0.0).unwrap();
    curves
        .modify("slope", |c| c.set_knot(10.0, vec![20.0]))
        .unwrap()
        .unwrap();
    assert!(!y.has_valid_cache());
    assert_eq!(y.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![4.0]);
}

#[test]
fn time_keeper_change_reaches_dependents() {
    let module = Module::new("clock");
    let keepers = Manager::new();
    let keeper = keepers.add(TimeKeeper::new("default", 1.0)).unwrap();
    let t = module.create_time_value("t", &keeper).unwrap();
    let ten = module.create_constant("ten", vec![10.0]).unwrap();
    let scaled = module.create_multiply("scaled", &t, &ten).unwrap();
    assert_eq!(scaled.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![10.0]);

    keeper.modify(|k| k.set_time(2.5));
    assert!(!scaled.has_valid_cache());
    assert!(ten.has_valid_cache());
    assert_eq!(scaled.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![25.0]);
}

#[test]
fn module_reports_resource_driven_changes() {
    let module = Module::new("clock");
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = module.subscribe(move |change| sink.borrow_mut().push((change.kind, change.field.clone())));
    let keepers = Manager::new();
    let keeper = keepers.add(TimeKeeper::new("default", 0.0)).unwrap();
    module.create_time_value("t", &keeper).unwrap();
    keeper.modify(|k| k.set_time(1.0));
    assert_eq!(
        *seen.borrow(),
        vec![(ChangeKind::Added, "t".to_string()), (ChangeKind::ObjectChanged, "t".to_string())]
    );
}

// ── Derivatives ────────────────────────────────────────────────────────────

#[test]
fn curve_lookup_applies_chain_rule() {
    let (mesh, element) = line();
    let module = Module::new("chain");
    module.set_mesh(mesh);
    let curves = Manager::new();
    ramp(&curves, "ramp", 3.0);
    let s = module.create_node_value("s", 1).unwrap();
    s.set_values_at_node(NodeId(1), 0.0, &[1.0]).unwrap();
    s.set_values_at_node(NodeId(2), 0.0, &[5.0]).unwrap();
    let y = module
        .create_curve_lookup("y", &s, &curves.get("ramp").unwrap())
        .unwrap();

    let value = y.evaluate(&mid(&element)).unwrap();
    assert!(close(&value.values, &[9.0]));
    // slope 3 times ds/dxi 4
    assert!(close(value.derivatives.as_deref().unwrap(), &[12.0]));
}

#[test]
fn time_lookup_is_transparent_to_spatial_derivatives() {
    let (mesh, element) = line();
    let module = Module::new("time");
    module.set_mesh(mesh);
    let u = module.create_node_value("u", 2).unwrap();
    u.set_values_at_node(NodeId(1), 0.0, &[0.0, 1.0]).unwrap();
    u.set_values_at_node(NodeId(2), 0.0, &[2.0, -1.0]).unwrap();
    let when = module.create_constant("when", vec![7.0]).unwrap();
    let later = module.create_time_lookup("later", &u, &when).unwrap();

    let direct = u.evaluate(&mid(&element)).unwrap();
    let looked_up = later.evaluate(&mid(&element)).unwrap();
    assert_eq!(direct, looked_up);
    assert!(close(looked_up.derivatives.as_deref().unwrap(), &[2.0, -2.0]));
}

#[test]
fn time_lookup_reads_the_source_at_the_looked_up_time() {
    let (mesh, element) = line();
    let module = Module::new("time");
    module.set_mesh(mesh);
    let history = NodeValueCore::new(1)
        .and_then(|core| core.with_sample(NodeId(1), 0.0, vec![0.0]))
        .and_then(|core| core.with_sample(NodeId(1), 10.0, vec![10.0]))
        .and_then(|core| core.with_sample(NodeId(2), 0.0, vec![1.0]))
        .and_then(|core| core.with_sample(NodeId(2), 10.0, vec![-9.0]))
        .unwrap();
    let u = module.create_field("u", FieldCore::NodeValue(history), &[]).unwrap();
    let when = module.create_constant("when", vec![0.0]).unwrap();
    let later = module.create_time_lookup("later", &u, &when).unwrap();
    let at = |time: f64| {
        Location::element_xi(element.clone(), &[0.25], time)
            .unwrap()
            .with_derivatives(true)
    };

    for (t1, t2) in [(0.0, 2.5), (4.0, 1.0), (7.5, 10.0), (-2.0, 6.0)] {
        let constant = ConstantCore::new(vec![t2]).unwrap();
        module.replace_core(&when, FieldCore::Constant(constant), &[]).unwrap();
        let direct_t1 = u.evaluate(&at(t1)).unwrap();
        let direct_t2 = u.evaluate(&at(t2)).unwrap();
        let looked_up = later.evaluate(&at(t1)).unwrap();
        assert!(!close(&direct_t1.values, &direct_t2.values), "({t1}, {t2})");
        assert!(close(&looked_up.values, &direct_t2.values), "({t1}, {t2})");
        assert!(close(
            looked_up.derivatives.as_deref().unwrap(),
            direct_t2.derivatives.as_deref().unwrap()
        ));
    }
    // u = 0.5 t + 0.25 at xi 0.25, held at the last sample beyond t = 10
    assert!(close(&u.evaluate(&at(3.0)).unwrap().values, &[1.75]));
    assert!(close(&u.evaluate(&at(12.0)).unwrap().values, &[5.25]));
}

#[test]
fn assigning_to_a_timed_node_adds_a_sample() {
    let module = Module::new("time");
    let history = NodeValueCore::new(1)
        .and_then(|core| core.with_sample(NodeId(1), 0.0, vec![0.0]))
        .unwrap();
    let u = module.create_field("u", FieldCore::NodeValue(history), &[]).unwrap();
    let shifted = module.create_offset("shifted", &u, vec![1.0]).unwrap();
    shifted.set_values_at_node(NodeId(1), 2.0, &[5.0]).unwrap();
    assert_eq!(u.evaluate_at_node(NodeId(1), 1.0).unwrap().values, vec![2.0]);
    assert_eq!(shifted.evaluate_at_node(NodeId(1), 2.0).unwrap().values, vec![5.0]);
    assert_eq!(u.describe(), "node_value field u component_count 1 node 1 time 0 0 node 1 time 2 4");
}

#[test]
fn function_broadcasts_scalar_map_over_components() {
    let (mesh, element) = line();
    let module = Module::new("function");
    module.set_mesh(mesh);
    let v = module.create_node_value("v", 3).unwrap();
    v.set_values_at_node(NodeId(1), 0.0, &[1.0, 2.0, 3.0]).unwrap();
    v.set_values_at_node(NodeId(2), 0.0, &[3.0, 4.0, 5.0]).unwrap();
    let x = module.create_node_value("x", 1).unwrap();
    let square = module.create_multiply("square", &x, &x).unwrap();
    let squared = module.create_function("squared", &v, &square, &x).unwrap();
    assert_eq!(squared.number_of_components(), 3);

    let value = squared.evaluate(&mid(&element)).unwrap();
    assert!(close(&value.values, &[4.0, 9.0, 16.0]));
    // d(v²)/dxi = 2 v dv/dxi with dv/dxi = 2
    assert!(close(value.derivatives.as_deref().unwrap(), &[8.0, 12.0, 16.0]));
}

#[test]
fn function_with_matching_reference_substitutes_whole_value() {
    let module = Module::new("function");
    let p = module.create_constant("p", vec![1.0, 2.0]).unwrap();
    let reference = module.create_node_value("reference", 2).unwrap();
    let offset = module.create_offset("shifted", &reference, vec![10.0, 20.0]).unwrap();
    let f = module.create_function("f", &p, &offset, &reference).unwrap();
    assert_eq!(f.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![11.0, 22.0]);
}

#[test]
fn missing_derivatives_degrade_to_values() {
    let (mesh, element) = line();
    let module = Module::new("degrade");
    module.set_mesh(mesh);
    let u = module.create_node_value("u", 1).unwrap();
    u.set_values_at_node(NodeId(1), 0.0, &[0.0]).unwrap();
    u.set_values_at_node(NodeId(2), 0.0, &[1.0]).unwrap();
    let filtered = module
        .create_image_filter("filtered", &u, ImageFilter::binary_threshold(0.25, 0.75).unwrap())
        .unwrap();
    let value = filtered.evaluate(&mid(&element)).unwrap();
    assert_eq!(value.values, vec![1.0]);
    assert!(value.derivatives.is_none());
    assert_eq!(module.statistics().derivatives_degraded, 1);
}

#[test]
fn logical_derivatives_are_zero() {
    let (_, element) = line();
    let module = Module::new("logic");
    let a = module.create_constant("a", vec![1.0, 0.0]).unwrap();
    let b = module.create_constant("b", vec![1.0]).unwrap();
    let both = module.create_logical("both", LogicalOp::And, &a, &b).unwrap();
    let value = both.evaluate(&mid(&element)).unwrap();
    assert_eq!(value.values, vec![1.0, 0.0]);
    assert_eq!(value.derivatives, Some(vec![0.0, 0.0]));
}

// ── Cycles ─────────────────────────────────────────────────────────────────

#[test]
fn redefinition_cycle_is_detected_not_recursed() {
    let module = Module::new("cycle");
    let a = module.create_constant("a", vec![1.0]).unwrap();
    let n = module.create_not("n", &a).unwrap();
    module.replace_core(&a, FieldCore::Not, &[n.clone()]).unwrap();
    assert!(a.depends_on_field(&n));
    assert!(n.depends_on_field(&a));

    for _ in 0..2 {
        let err = n.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
        assert!(matches!(err, EvaluationError::CyclicDependency { .. }));
    }
    assert_eq!(module.statistics().cycles_detected, 2);
}

fn is_cycle(result: Result<impl std::fmt::Debug, EvaluationError>) -> bool {
    matches!(result, Err(EvaluationError::CyclicDependency { .. }))
}

#[test]
fn three_field_cycle_is_detected() {
    let module = Module::new("cycle");
    let a = module.create_constant("a", vec![1.0]).unwrap();
    let b = module.create_offset("b", &a, vec![1.0]).unwrap();
    let c = module.create_scale("c", &b, vec![2.0]).unwrap();
    module
        .replace_core(&a, FieldCore::Offset(OffsetCore::new(vec![3.0]).unwrap()), &[c.clone()])
        .unwrap();
    assert!(a.depends_on_field(&a));
    for field in [&a, &b, &c] {
        assert!(is_cycle(field.evaluate_at_node(NodeId(1), 0.0)), "{}", field.name());
        assert!(!field.has_valid_cache());
    }
    assert_eq!(module.statistics().cycles_detected, 3);
}

#[test]
fn cycle_through_function_result_is_detected() {
    let module = Module::new("cycle");
    let p = module.create_constant("p", vec![2.0]).unwrap();
    let x = module.create_node_value("x", 1).unwrap();
    let result = module.create_offset("result", &x, vec![1.0]).unwrap();
    let f = module.create_function("f", &p, &result, &x).unwrap();
    assert_eq!(f.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![3.0]);

    module
        .replace_core(&result, FieldCore::Offset(OffsetCore::new(vec![1.0]).unwrap()), &[f.clone()])
        .unwrap();
    assert!(is_cycle(f.evaluate_at_node(NodeId(1), 0.0)));
    assert_eq!(module.statistics().cycles_detected, 1);
}

#[test]
fn cycle_through_time_lookup_source_is_detected() {
    let module = Module::new("cycle");
    let u = module.create_constant("u", vec![4.0]).unwrap();
    let when = module.create_constant("when", vec![1.0]).unwrap();
    let later = module.create_time_lookup("later", &u, &when).unwrap();
    assert_eq!(later.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![4.0]);

    module
        .replace_core(&u, FieldCore::Offset(OffsetCore::new(vec![1.0]).unwrap()), &[later.clone()])
        .unwrap();
    assert!(is_cycle(later.evaluate_at_node(NodeId(1), 0.0)));
    assert!(is_cycle(u.evaluate_at_node(NodeId(1), 0.0)));
}

#[test]
fn assignment_cycle_is_detected_not_recursed() {
    let module = Module::new("cycle");
    let a = module.create_node_value("a", 1).unwrap();
    let shifted = module.create_offset("shifted", &a, vec![1.0]).unwrap();
    module
        .replace_core(&a, FieldCore::Offset(OffsetCore::new(vec![2.0]).unwrap()), &[a.clone()])
        .unwrap();

    assert!(is_cycle(a.set_values_at_node(NodeId(1), 0.0, &[1.0])));
    assert!(is_cycle(shifted.set_values_at_node(NodeId(1), 0.0, &[1.0])));
    assert_eq!(module.statistics().cycles_detected, 2);

    // the guard is released, so a repaired graph assigns again
    module
        .replace_core(&a, FieldCore::NodeValue(NodeValueCore::new(1).unwrap()), &[])
        .unwrap();
    shifted.set_values_at_node(NodeId(1), 0.0, &[1.0]).unwrap();
    assert_eq!(a.evaluate_at_node(NodeId(1), 0.0).unwrap().values, vec![0.0]);
}

// ── Coordinates and mesh search ────────────────────────────────────────────

#[test]
fn cylindrical_to_cartesian_with_values_assigned_back() {
    let module = Module::new("coordinates");
    let polar = module.create_node_value("polar", 3).unwrap();
    let cartesian = module
        .create_coordinate_transformation(
            "cartesian",
            &polar,
            CoordinateSystem::CylindricalPolar,
            CoordinateSystem::RectangularCartesian,
        )
        .unwrap();
    polar.set_values_at_node(NodeId(1), 0.0, &[2.0, FRAC_PI_2, 5.0]).unwrap();
    let value = cartesian.evaluate_at_node(NodeId(1), 0.0).unwrap();
    assert!(close(&value.values, &[0.0, 2.0, 5.0]));

    cartesian.set_values_at_node(NodeId(2), 0.0, &[0.0, -3.0, 1.0]).unwrap();
    let back = polar.evaluate_at_node(NodeId(2), 0.0).unwrap();
    assert!(close(&back.values, &[3.0, -FRAC_PI_2, 1.0]));
}

#[test]
fn compose_finds_element_xi_by_value() {
    let (mesh, _) = line();
    let module = Module::new("compose");
    module.set_mesh(mesh);
    let x = module.create_node_value("x", 1).unwrap();
    x.set_values_at_node(NodeId(1), 0.0, &[0.0]).unwrap();
    x.set_values_at_node(NodeId(2), 0.0, &[10.0]).unwrap();
    let temperature = module.create_node_value("temperature", 1).unwrap();
    temperature.set_values_at_node(NodeId(1), 0.0, &[100.0]).unwrap();
    temperature.set_values_at_node(NodeId(2), 0.0, &[200.0]).unwrap();

    let target = module.create_constant("target", vec![2.5]).unwrap();
    let sampled = module.create_compose("sampled", &target, &x, &temperature).unwrap();
    let value = sampled.evaluate_at_node(NodeId(1), 0.0).unwrap();
    assert!(close(&value.values, &[125.0]));

    let outside = module.create_constant("outside", vec![20.0]).unwrap();
    let missed = module.create_compose("missed", &outside, &x, &temperature).unwrap();
    let err = missed.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
    assert!(matches!(err, EvaluationError::NotDefined { .. }));
}

#[test]
fn compose_without_mesh_is_unavailable() {
    let module = Module::new("compose");
    let x = module.create_node_value("x", 1).unwrap();
    let target = module.create_constant("target", vec![1.0]).unwrap();
    let sampled = module.create_compose("sampled", &target, &x, &x).unwrap();
    let err = sampled.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
    assert!(matches!(err, EvaluationError::ExternalResourceUnavailable { .. }));
}

// ── Image filters ──────────────────────────────────────────────────────────

#[test]
fn threshold_filter_replaces_outside_values() {
    let module = Module::new("filters");
    let grey = module.create_constant("grey", vec![0.1, 0.5, 0.9]).unwrap();
    let filter = ImageFilter::threshold(ThresholdMode::Outside, -1.0, 0.2, 0.8).unwrap();
    let clipped = module.create_image_filter("clipped", &grey, filter).unwrap();
    assert_eq!(
        clipped.evaluate_at_node(NodeId(1), 0.0).unwrap().values,
        vec![-1.0, 0.5, -1.0]
    );
}

#[test]
fn division_by_zero_component_is_not_defined() {
    let module = Module::new("divide");
    let a = module.create_constant("a", vec![1.0, 2.0]).unwrap();
    let b = module.create_constant("b", vec![2.0, 0.0]).unwrap();
    let q = module.create_divide("q", &a, &b).unwrap();
    let err = q.evaluate_at_node(NodeId(1), 0.0).unwrap_err();
    assert!(matches!(err, EvaluationError::NotDefined { .. }));
}
