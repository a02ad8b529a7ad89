use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

use crate::exec::context::ExecutionContext;
use crate::exec::operation::{ExecutionGroup, GroupId, Operation, OperationId};
use crate::exec::ops::{
    ColorFillOperation, GradientOperation, InvertOperation, MixOperation, OpacityOperation,
    OutputOperation,
};
use crate::foundation::error::{TesseraError, TesseraResult};
use crate::scene::model::{GraphDescription, NodeDef, NodeKindDef};

/// Compiles a [`GraphDescription`] into operations and execution groups.
///
/// Operations come out in topological order (inputs before consumers), one
/// per node. Groups are formed per output node and contain the output's
/// transitive inputs, so the tiled model can schedule each sink
/// independently.
pub struct GraphBuilder<'a> {
    context: &'a ExecutionContext,
}

impl<'a> GraphBuilder<'a> {
    /// Build a builder over the execution context's graph description.
    pub fn new(context: &'a ExecutionContext) -> Self {
        Self { context }
    }

    #[tracing::instrument(skip(self))]
    /// Compile the description into owned operations and execution groups.
    pub fn build(&self) -> TesseraResult<(Vec<Arc<dyn Operation>>, Vec<ExecutionGroup>)> {
        let graph = self.context.graph();
        graph.validate()?;

        let order = topological_order(graph)?;

        let mut operations: Vec<Arc<dyn Operation>> = Vec::with_capacity(order.len());
        let mut op_of_node: HashMap<&str, OperationId> = HashMap::with_capacity(order.len());
        for &node_index in &order {
            let node = &graph.nodes[node_index];
            let op = compile_node(node, &op_of_node)?;
            op_of_node.insert(node.id.as_str(), OperationId(operations.len() as u32));
            operations.push(Arc::from(op));
        }

        let mut groups = Vec::new();
        for &node_index in &order {
            let node = &graph.nodes[node_index];
            if !matches!(node.kind, NodeKindDef::Output { .. }) {
                continue;
            }
            let output = op_of_node[node.id.as_str()];
            groups.push(collect_group(
                GroupId(groups.len() as u32),
                output,
                &operations,
            ));
        }

        tracing::debug!(
            operations = operations.len(),
            groups = groups.len(),
            "graph compiled"
        );
        Ok((operations, groups))
    }
}

/// Topological node order, deterministic: when several nodes are ready, the
/// lowest description index goes first.
fn topological_order(graph: &GraphDescription) -> TesseraResult<Vec<usize>> {
    let n = graph.nodes.len();
    let index_of: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.as_str(), i))
        .collect();

    let mut indegree = vec![0u32; n];
    let mut dependents = vec![Vec::<usize>::new(); n];
    for (i, node) in graph.nodes.iter().enumerate() {
        for input in node.kind.input_ids() {
            let Some(&j) = index_of.get(input) else {
                return Err(TesseraError::compile(format!(
                    "node '{}' references unknown input '{input}'",
                    node.id
                )));
            };
            dependents[j].push(i);
            indegree[i] += 1;
        }
    }

    let mut ready = BinaryHeap::new();
    for (i, &deg) in indegree.iter().enumerate() {
        if deg == 0 {
            ready.push(Reverse(i));
        }
    }

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &dep in &dependents[i] {
            indegree[dep] -= 1;
            if indegree[dep] == 0 {
                ready.push(Reverse(dep));
            }
        }
    }

    if order.len() != n {
        return Err(TesseraError::compile("graph contains a cycle"));
    }
    Ok(order)
}

fn compile_node(
    node: &NodeDef,
    op_of_node: &HashMap<&str, OperationId>,
) -> TesseraResult<Box<dyn Operation>> {
    let resolve = |id: &str| -> TesseraResult<OperationId> {
        op_of_node.get(id).copied().ok_or_else(|| {
            TesseraError::compile(format!(
                "node '{}' input '{id}' was not compiled before its consumer",
                node.id
            ))
        })
    };

    Ok(match &node.kind {
        NodeKindDef::ColorFill { color } => Box::new(ColorFillOperation::new(*color)),
        NodeKindDef::Gradient { bottom, top } => Box::new(GradientOperation::new(*bottom, *top)),
        NodeKindDef::Invert { input } => Box::new(InvertOperation::new(resolve(input)?)),
        NodeKindDef::Opacity { input, factor } => {
            Box::new(OpacityOperation::new(resolve(input)?, *factor))
        }
        NodeKindDef::Mix {
            a,
            b,
            factor,
            blend,
        } => Box::new(MixOperation::new(
            resolve(a)?,
            resolve(b)?,
            *factor,
            *blend,
        )),
        NodeKindDef::Output { input } => Box::new(OutputOperation::new(resolve(input)?)),
    })
}

/// Collect `output` and its transitive inputs into a group, members in
/// topological (ascending id) order.
fn collect_group(
    id: GroupId,
    output: OperationId,
    operations: &[Arc<dyn Operation>],
) -> ExecutionGroup {
    let mut member = HashSet::new();
    let mut stack = vec![output];
    while let Some(op_id) = stack.pop() {
        if member.insert(op_id) {
            stack.extend(operations[op_id.0 as usize].inputs().iter().copied());
        }
    }

    let members = (0..operations.len() as u32)
        .map(OperationId)
        .filter(|op_id| member.contains(op_id))
        .collect();
    ExecutionGroup {
        id,
        operations: members,
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::context::ExecuteOpts;
    use crate::foundation::core::Canvas;
    use crate::scene::cancel::CancelToken;
    use crate::scene::model::{BlendMode, ExecutionModelKind};

    fn node(id: &str, kind: NodeKindDef) -> NodeDef {
        NodeDef {
            id: id.to_owned(),
            kind,
        }
    }

    fn context_for(nodes: Vec<NodeDef>) -> ExecutionContext {
        let graph = Arc::new(GraphDescription {
            canvas: Canvas {
                width: 8,
                height: 8,
            },
            execution_model: ExecutionModelKind::Tiled,
            render_quality: Default::default(),
            edit_quality: Default::default(),
            use_accelerated: false,
            nodes,
        });
        ExecutionContext::new(graph, ExecuteOpts::default(), CancelToken::new(), false)
    }

    fn diamond() -> Vec<NodeDef> {
        // out <- mix <- {inv <- fill, fill}
        vec![
            node(
                "out",
                NodeKindDef::Output {
                    input: "mix".to_owned(),
                },
            ),
            node(
                "mix",
                NodeKindDef::Mix {
                    a: "fill".to_owned(),
                    b: "inv".to_owned(),
                    factor: 0.5,
                    blend: BlendMode::Over,
                },
            ),
            node(
                "inv",
                NodeKindDef::Invert {
                    input: "fill".to_owned(),
                },
            ),
            node(
                "fill",
                NodeKindDef::ColorFill {
                    color: [255, 0, 0, 255],
                },
            ),
        ]
    }

    #[test]
    fn operations_come_out_in_topological_order() {
        let ctx = context_for(diamond());
        let (ops, groups) = GraphBuilder::new(&ctx).build().unwrap();
        assert_eq!(ops.len(), 4);
        assert_eq!(groups.len(), 1);

        // Every operation's inputs precede it.
        for (i, op) in ops.iter().enumerate() {
            for input in op.inputs() {
                assert!((input.0 as usize) < i, "input {input:?} after consumer {i}");
            }
        }
        assert_eq!(ops[0].name(), "color_fill");
        assert_eq!(ops.last().unwrap().name(), "output");
    }

    #[test]
    fn groups_contain_the_transitive_closure_output_last() {
        let mut nodes = diamond();
        // A second, smaller sink over just the fill.
        nodes.push(node(
            "out2",
            NodeKindDef::Output {
                input: "fill".to_owned(),
            },
        ));
        let ctx = context_for(nodes);
        let (ops, groups) = GraphBuilder::new(&ctx).build().unwrap();
        assert_eq!(groups.len(), 2);

        for group in &groups {
            assert_eq!(*group.operations.last().unwrap(), group.output);
            assert!(ops[group.output.0 as usize].is_output());
        }
        let sizes: Vec<usize> = groups.iter().map(|g| g.operations.len()).collect();
        let mut sorted = sizes.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![2, 4]);
    }

    #[test]
    fn cycles_are_a_compile_error() {
        let nodes = vec![
            node(
                "a",
                NodeKindDef::Invert {
                    input: "b".to_owned(),
                },
            ),
            node(
                "b",
                NodeKindDef::Invert {
                    input: "a".to_owned(),
                },
            ),
            node(
                "out",
                NodeKindDef::Output {
                    input: "a".to_owned(),
                },
            ),
        ];
        let ctx = context_for(nodes);
        let err = GraphBuilder::new(&ctx).build().err().unwrap();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn invalid_descriptions_fail_before_compilation() {
        let ctx = context_for(vec![node(
            "fill",
            NodeKindDef::ColorFill { color: [0; 4] },
        )]);
        assert!(GraphBuilder::new(&ctx).build().is_err());
    }
}
