use std::sync::Arc;

use tessera::{
    BlendMode, CancelToken, ExecuteOpts, ExecutionModelKind, Executor, GraphDescription,
    InlineScheduler, NodeKindDef, Quality,
};

#[test]
fn json_description_executes_end_to_end() {
    let json = r#"{
        "canvas": { "width": 8, "height": 6 },
        "execution_model": "full_frame",
        "nodes": [
            { "id": "fill", "type": "color_fill", "color": [255, 0, 0, 255] },
            { "id": "out", "type": "output", "input": "fill" }
        ]
    }"#;

    let desc: GraphDescription = serde_json::from_str(json).unwrap();
    assert_eq!(desc.execution_model, ExecutionModelKind::FullFrame);
    desc.validate().unwrap();

    let mut exec = Executor::new(
        Arc::new(desc),
        ExecuteOpts::default(),
        CancelToken::new(),
        Arc::new(InlineScheduler),
    )
    .unwrap();
    let frame = exec.execute().unwrap();

    assert_eq!(frame.data.len(), 8 * 6 * 4);
    for px in frame.data.chunks_exact(4) {
        assert_eq!(px, [255, 0, 0, 255]);
    }
}

#[test]
fn omitted_fields_take_their_documented_defaults() {
    let json = r#"{
        "canvas": { "width": 4, "height": 4 },
        "nodes": [
            { "id": "a", "type": "color_fill", "color": [0, 0, 255, 255] },
            { "id": "b", "type": "gradient", "bottom": [0, 0, 0, 0], "top": [255, 255, 255, 255] },
            { "id": "m", "type": "mix", "a": "a", "b": "b", "factor": 0.25 },
            { "id": "out", "type": "output", "input": "m" }
        ]
    }"#;

    let desc: GraphDescription = serde_json::from_str(json).unwrap();
    assert_eq!(desc.execution_model, ExecutionModelKind::Tiled);
    assert_eq!(desc.render_quality, Quality::High);
    assert!(!desc.use_accelerated);

    let mix = desc.node("m").unwrap();
    match &mix.kind {
        NodeKindDef::Mix { blend, factor, .. } => {
            assert_eq!(*blend, BlendMode::Over);
            assert_eq!(*factor, 0.25);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
}

#[test]
fn unknown_node_types_are_rejected_by_serde() {
    let json = r#"{
        "canvas": { "width": 4, "height": 4 },
        "nodes": [ { "id": "x", "type": "holographic_displace" } ]
    }"#;
    assert!(serde_json::from_str::<GraphDescription>(json).is_err());
}
