use paramsync_core::{
    Atom, ChainLink, ContainerPath, MemoryHost, ParamValue, ParametersUi, PatchGraph, Role,
    StoreRegistry, SyncOptions, DEFAULT_UPDATE_TARGET,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MyParams {
    dial: f64,
    slider: f64,
    numbox: f64,
    button: bool,
    menu: i64,
}

const CONTROLS: [(&str, &str); 5] = [
    ("dial", "live.dial"),
    ("slider", "live.slider"),
    ("numbox", "live.numbox"),
    ("button", "live.text"),
    ("menu", "live.menu"),
];

/// Controls plus the identity display.
const PATCH_CHILDREN: usize = CONTROLS.len() + 1;
const INFRA_NODES: usize = 4;

fn defaults() -> MyParams {
    MyParams {
        dial: 0.0,
        slider: 0.0,
        numbox: 0.0,
        button: false,
        menu: 0,
    }
}

fn patch() -> MemoryHost {
    let mut host = MemoryHost::new();
    let root = host.root();
    for (name, class) in CONTROLS {
        host.add_control(root, name, class);
    }
    host.add_display(root, "id");
    host
}

fn create(host: &mut MemoryHost) -> ParametersUi<MyParams> {
    ParametersUi::create(host, &ContainerPath::root(), "test", defaults(), SyncOptions::default())
        .unwrap()
}

#[test]
fn repeated_construction_is_idempotent() {
    let mut host = patch();
    let root = host.root();

    let first = create(&mut host);
    assert_eq!(
        host.child_count(root),
        PATCH_CHILDREN + INFRA_NODES + CONTROLS.len() * ChainLink::ALL.len()
    );
    let chains_before: Vec<_> = CONTROLS
        .iter()
        .map(|(key, _)| host.find_role(root, &Role::chain(*key, ChainLink::Bind)))
        .collect();

    let second = create(&mut host);
    assert_eq!(
        host.child_count(root),
        PATCH_CHILDREN + INFRA_NODES + CONTROLS.len() * ChainLink::ALL.len()
    );
    assert_eq!(first.infrastructure(), second.infrastructure());
    let chains_after: Vec<_> = CONTROLS
        .iter()
        .map(|(key, _)| host.find_role(root, &Role::chain(*key, ChainLink::Bind)))
        .collect();
    assert_eq!(chains_before, chains_after);
}

#[test]
fn scenario_set_dial_then_fetch() {
    let mut host = patch();
    let root = host.root();
    let mut params = create(&mut host);
    assert_eq!(params.fetch(&host).unwrap(), defaults());
    host.take_broadcasts();

    let mut values = defaults();
    values.dial = 64.0;
    params.set(&mut host, values.clone(), true).unwrap();

    assert_eq!(params.fetch(&host).unwrap(), values);
    assert_eq!(
        host.control_named(root, "dial").and_then(|state| state.value),
        Some(ParamValue::Float(64.0))
    );
    let broadcasts = host.take_broadcasts();
    assert_eq!(broadcasts.len(), CONTROLS.len());
    assert!(broadcasts.iter().all(|broadcast| {
        broadcast.target == DEFAULT_UPDATE_TARGET
            && broadcast.message.atoms() == [Atom::symbol("test"), Atom::symbol("bang")]
    }));
}

#[test]
fn set_without_notify_only_touches_recall_store() {
    let mut host = patch();
    let mut params = create(&mut host);
    host.take_broadcasts();

    let mut values = defaults();
    values.menu = 2;
    params.set(&mut host, values.clone(), false).unwrap();

    assert_eq!(params.params(), &values);
    assert!(host.broadcasts().is_empty());
    assert_eq!(host.get_entry("test_recall", "menu").unwrap(), Some(ParamValue::Int(2)));
    assert_eq!(host.get_entry("test", "menu").unwrap(), Some(ParamValue::Int(0)));
    assert_eq!(params.fetch(&host).unwrap().menu, 0);
}

#[test]
fn user_gesture_propagates_to_params_store() {
    let mut host = patch();
    let root = host.root();
    let mut params = create(&mut host);

    host.touch_control(root, "slider", ParamValue::Float(0.25));
    host.touch_control(root, "button", ParamValue::Bool(true));

    let fetched = params.fetch(&host).unwrap();
    assert_eq!(fetched.slider, 0.25);
    assert!(fetched.button);
}

#[test]
fn deleting_one_chain_element_rebuilds_all_chains() {
    let mut host = patch();
    let root = host.root();
    let params = create(&mut host);
    let menu_bind = host.find_role(root, &Role::chain("menu", ChainLink::Bind));

    let victim = host
        .find_role(root, &Role::chain("dial", ChainLink::TagPrepend))
        .expect("dial tag prepend");
    host.remove_node(root, victim);
    assert!(!params.parameters_exist(&host));

    let rebuilt = create(&mut host);
    assert!(rebuilt.parameters_exist(&host));
    assert_ne!(host.find_role(root, &Role::chain("menu", ChainLink::Bind)), menu_bind);
    assert_eq!(
        host.child_count(root),
        PATCH_CHILDREN + INFRA_NODES + CONTROLS.len() * ChainLink::ALL.len()
    );
}

#[test]
fn deleting_a_store_rebuilds_infrastructure_and_chains() {
    let mut host = patch();
    let root = host.root();
    let first = create(&mut host);
    let recall = first.infrastructure().expect("infrastructure").recall;
    host.remove_node(root, recall);
    assert!(!first.infrastructure_exists(&host));

    let mut second = create(&mut host);
    assert!(second.infrastructure_exists(&host));
    assert!(second.parameters_exist(&host));

    let mut values = defaults();
    values.numbox = 12.0;
    second.set(&mut host, values.clone(), true).unwrap();
    assert_eq!(second.fetch(&host).unwrap(), values);
}

#[test]
fn nested_container_is_resolved() {
    let mut host = MemoryHost::new();
    let root = host.root();
    let synth = host.add_subpatcher(root, "synth");
    let filter = host.add_subpatcher(synth, "filter");
    host.add_control(filter, "dial", "live.dial");

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Filter {
        dial: f64,
    }

    let mut params = ParametersUi::create(
        &mut host,
        &ContainerPath::from("synth/filter"),
        "filter",
        Filter { dial: 3.0 },
        SyncOptions::default(),
    )
    .unwrap();
    assert_eq!(params.container(), Some(filter));
    assert_eq!(host.child_count(filter), 1 + INFRA_NODES + ChainLink::ALL.len());
    assert_eq!(params.fetch(&host).unwrap(), Filter { dial: 3.0 });
}

#[test]
fn replace_parameters_drops_chains_of_removed_keys() {
    let mut host = patch();
    let root = host.root();
    host.add_control(root, "cutoff", "live.dial");

    let mut params = ParametersUi::create(
        &mut host,
        &ContainerPath::root(),
        "test",
        json!({"dial": 1, "slider": 2, "menu": 0}),
        SyncOptions::default(),
    )
    .unwrap();

    let replaced = params
        .replace_parameters(&mut host, json!({"dial": 5, "cutoff": 0.5}))
        .unwrap();
    assert_eq!(replaced, json!({"dial": 5, "cutoff": 0.5}));
    assert_eq!(params.keys(), ["dial", "cutoff"]);
    assert!(params.parameters_exist(&host));
    for stale in ["slider", "menu"] {
        assert!(host
            .find_role(root, &Role::chain(stale, ChainLink::Bind))
            .is_none());
    }
    assert_eq!(
        host.child_count(root),
        PATCH_CHILDREN + 1 + INFRA_NODES + 2 * ChainLink::ALL.len()
    );
}

#[test]
fn never_resolved_instance_raises_state_error() {
    let host = MemoryHost::new();
    let mut params = ParametersUi::detached("test", defaults()).unwrap();
    let err = params.fetch(&host).unwrap_err();
    assert!(err.is_state());
}

#[test]
fn non_scalar_record_is_rejected() {
    let mut host = patch();
    let err = ParametersUi::create(
        &mut host,
        &ContainerPath::root(),
        "test",
        json!({"dial": [1, 2]}),
        SyncOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, paramsync_core::SyncError::InvalidRecord(_)));
}
