use uuid::Uuid;

use super::plug::PlugData;

/// What a component in the ownership tree is.
#[derive(Clone, Debug, PartialEq)]
pub enum ComponentKind {
    /// The graph's top-level container.
    Root,
    /// A node; its behaviour is looked up by id in the graph.
    Node { type_name: String },
    Plug(PlugData),
}

/// An entity of the ownership tree.
///
/// Children are exclusively owned: removing a component destroys its subtree.
/// Identity is the `id`, never the contents.
#[derive(Clone, Debug, PartialEq)]
pub struct Component {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) parent: Option<Uuid>,
    pub(crate) children: Vec<Uuid>,
    pub(crate) kind: ComponentKind,
}

impl Component {
    pub(crate) fn new(name: &str, kind: ComponentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent: None,
            children: Vec::new(),
            kind,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    pub fn children(&self) -> &[Uuid] {
        &self.children
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn as_plug(&self) -> Option<&PlugData> {
        match &self.kind {
            ComponentKind::Plug(p) => Some(p),
            _ => None,
        }
    }

    pub(crate) fn as_plug_mut(&mut self) -> Option<&mut PlugData> {
        match &mut self.kind {
            ComponentKind::Plug(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_plug(&self) -> bool {
        matches!(self.kind, ComponentKind::Plug(_))
    }

    pub fn is_node(&self) -> bool {
        matches!(self.kind, ComponentKind::Node { .. })
    }

    /// Node type name, for node components.
    pub fn type_name(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Node { type_name } => Some(type_name),
            _ => None,
        }
    }
}
