use plugflow::{Graph, GraphDescription, GraphError, NodeRegistry, PlugDefinition, ValueType};

/// A loop whose body adds one to `previous`, starting from `in = 5`.
/// `loop.out` evaluates to `5 + iterations`.
pub fn increment_loop(iterations: i64) -> Result<GraphDescription, GraphError> {
    let registry = NodeRegistry::with_default_nodes();
    let mut graph = Graph::new();
    let root = graph.root();

    let looped = graph.add_node(root, "loop", registry.create("utility.loop")?)?;
    let in_plug = graph.add_plug(looped, PlugDefinition::input("in", ValueType::Int).dynamic())?;
    graph.add_plug(looped, PlugDefinition::output("out", ValueType::Int).dynamic())?;
    graph.set_value(in_plug, 5)?;
    let iterations_plug = graph.find("loop.iterations")?;
    graph.set_value(iterations_plug, iterations)?;

    let body = graph.add_node(root, "increment", registry.create("math.add")?)?;
    graph.set_value(graph.descendant(body, &["op2"])?, 1)?;
    graph.connect(graph.find("loop.previous")?, graph.descendant(body, &["op1"])?)?;
    graph.connect(graph.descendant(body, &["result"])?, graph.find("loop.next")?)?;

    graph.describe()
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugflow::{Context, Value};

    #[test]
    fn test_demo_evaluates_after_reload() {
        let description = increment_loop(6).unwrap();
        let json = description.to_json().unwrap();
        let graph = Graph::from_description(
            &GraphDescription::from_json(&json).unwrap(),
            &NodeRegistry::with_default_nodes(),
        )
        .unwrap();
        let out = graph.find("loop.out").unwrap();
        assert_eq!(graph.get(out, &Context::new()).unwrap(), Value::Int(11));
    }
}
