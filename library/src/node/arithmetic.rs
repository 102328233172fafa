use std::any::Any;

use uuid::Uuid;

use super::{output_hash_prefix, NodeBehavior};
use crate::error::GraphError;
use crate::evaluation::{Context, PlugHash};
use crate::graph::Graph;
use crate::model::{PlugDefinition, Value, ValueType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
}

impl Operation {
    fn tag(self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
        }
    }
}

/// `result = op1 <operation> op2` over integers or floats.
pub struct ArithmeticNode {
    operation: Operation,
    value_type: ValueType,
    type_name: String,
}

impl ArithmeticNode {
    /// `value_type` must be `Int` or `Float`; anything else is treated as `Float`.
    pub fn new(operation: Operation, value_type: ValueType) -> Self {
        let value_type = match value_type {
            ValueType::Int => ValueType::Int,
            _ => ValueType::Float,
        };
        let suffix = if value_type == ValueType::Float { "_float" } else { "" };
        Self {
            operation,
            value_type,
            type_name: format!("math.{}{}", operation.tag(), suffix),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    fn operands(&self, graph: &Graph, node: Uuid) -> Result<(Uuid, Uuid), GraphError> {
        let op = |name: &str| {
            graph
                .child(node, name)
                .ok_or_else(|| GraphError::not_found(format!("{}.{}", graph.full_name(node), name)))
        };
        Ok((op("op1")?, op("op2")?))
    }

    fn apply_int(&self, a: i64, b: i64) -> Result<i64, GraphError> {
        let result = match self.operation {
            Operation::Add => a.checked_add(b),
            Operation::Subtract => a.checked_sub(b),
            Operation::Multiply => a.checked_mul(b),
        };
        result.ok_or_else(|| {
            GraphError::compute(format!("integer overflow in {} {} {}", a, self.operation.tag(), b))
        })
    }

    fn apply_float(&self, a: f64, b: f64) -> f64 {
        match self.operation {
            Operation::Add => a + b,
            Operation::Subtract => a - b,
            Operation::Multiply => a * b,
        }
    }
}

impl NodeBehavior for ArithmeticNode {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn initialize(&mut self, graph: &mut Graph, node: Uuid) -> Result<(), GraphError> {
        graph.add_plug(node, PlugDefinition::input("op1", self.value_type))?;
        graph.add_plug(node, PlugDefinition::input("op2", self.value_type))?;
        graph.add_plug(node, PlugDefinition::output("result", self.value_type))?;
        Ok(())
    }

    fn affects(&self, graph: &Graph, node: Uuid, input: Uuid, outputs: &mut Vec<Uuid>) {
        let name = graph.name(input);
        if graph.parent(input) == Some(node) && (name == "op1" || name == "op2") {
            if let Some(result) = graph.child(node, "result") {
                outputs.push(result);
            }
        }
    }

    fn hash(
        &self,
        graph: &Graph,
        node: Uuid,
        output: Uuid,
        _context: &Context,
    ) -> Result<PlugHash, GraphError> {
        let mut h = output_hash_prefix(graph, &self.type_name, node, output)?;
        let (op1, op2) = self.operands(graph, node)?;
        h.append_hash(&graph.hash(op1)?);
        h.append_hash(&graph.hash(op2)?);
        Ok(h.finish())
    }

    fn compute(
        &self,
        graph: &Graph,
        node: Uuid,
        _output: Uuid,
        _context: &Context,
    ) -> Result<Value, GraphError> {
        let (op1, op2) = self.operands(graph, node)?;
        let a = graph.get_value(op1)?;
        let b = graph.get_value(op2)?;
        match self.value_type {
            ValueType::Int => {
                let (Some(a), Some(b)) = (a.as_int(), b.as_int()) else {
                    return Err(GraphError::type_mismatch(ValueType::Int, a.value_type()));
                };
                Ok(Value::Int(self.apply_int(a, b)?))
            }
            _ => {
                let (Some(a), Some(b)) = (a.as_float(), b.as_float()) else {
                    return Err(GraphError::type_mismatch(ValueType::Float, a.value_type()));
                };
                Ok(Value::from(self.apply_float(a, b)))
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(operation: Operation, value_type: ValueType) -> (Graph, Uuid) {
        let mut graph = Graph::new();
        let root = graph.root();
        let node = graph
            .add_node(root, "op", Box::new(ArithmeticNode::new(operation, value_type)))
            .unwrap();
        (graph, node)
    }

    fn run(graph: &mut Graph, node: Uuid, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value, GraphError> {
        let op1 = graph.child(node, "op1").unwrap();
        let op2 = graph.child(node, "op2").unwrap();
        graph.set_value(op1, a).unwrap();
        graph.set_value(op2, b).unwrap();
        let result = graph.child(node, "result").unwrap();
        graph.get(result, &Context::new())
    }

    #[test]
    fn test_integer_operations() {
        let (mut graph, node) = setup(Operation::Subtract, ValueType::Int);
        assert_eq!(run(&mut graph, node, 10, 4).unwrap(), Value::Int(6));
        let (mut graph, node) = setup(Operation::Multiply, ValueType::Int);
        assert_eq!(run(&mut graph, node, 6, 7).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_float_add() {
        let (mut graph, node) = setup(Operation::Add, ValueType::Float);
        assert_eq!(graph.component(node).unwrap().type_name(), Some("math.add_float"));
        assert_eq!(run(&mut graph, node, 0.5, 0.25).unwrap(), Value::from(0.75));
    }

    #[test]
    fn test_overflow_is_a_compute_error() {
        let (mut graph, node) = setup(Operation::Add, ValueType::Int);
        assert!(matches!(
            run(&mut graph, node, i64::MAX, 1),
            Err(GraphError::Compute(_))
        ));
    }

    #[test]
    fn test_operations_hash_differently() {
        let (mut add, add_node) = setup(Operation::Add, ValueType::Int);
        let (mut mul, mul_node) = setup(Operation::Multiply, ValueType::Int);
        run(&mut add, add_node, 2, 2).unwrap();
        run(&mut mul, mul_node, 2, 2).unwrap();
        let add_result = add.child(add_node, "result").unwrap();
        let mul_result = mul.child(mul_node, "result").unwrap();
        assert_ne!(
            add.get_hash(add_result, &Context::new()).unwrap(),
            mul.get_hash(mul_result, &Context::new()).unwrap()
        );
    }
}
