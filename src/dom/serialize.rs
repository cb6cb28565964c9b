//! Serialize a DOM subtree back to markup with html5ever's serializer.

use std::io;

use html5ever::QualName;
use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};

use super::arena::{Dom, NodeData, NodeId};

/// A node of a [`Dom`] that html5ever can serialize.
struct SerializableNode<'a> {
    dom: &'a Dom,
    id: NodeId,
}

enum Step<'a> {
    Open(NodeId),
    Close(&'a QualName),
}

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        let mut ops = match traversal_scope {
            TraversalScope::IncludeNode => vec![Step::Open(self.id)],
            TraversalScope::ChildrenOnly(_) => {
                let mut children: Vec<_> = self.dom.children(self.id).map(Step::Open).collect();
                children.reverse();
                children
            }
        };

        while let Some(op) = ops.pop() {
            match op {
                Step::Open(id) => {
                    let Some(node) = self.dom.get(id) else {
                        continue;
                    };
                    match &node.data {
                        NodeData::Element { name, attrs } => {
                            serializer.start_elem(
                                (**name).clone(),
                                attrs.iter().map(|a| (&a.name, a.value.as_str())),
                            )?;
                            ops.push(Step::Close(&**name));
                            let mut children: Vec<_> =
                                self.dom.children(id).map(Step::Open).collect();
                            children.reverse();
                            ops.extend(children);
                        }
                        NodeData::Document => {
                            let mut children: Vec<_> =
                                self.dom.children(id).map(Step::Open).collect();
                            children.reverse();
                            ops.extend(children);
                        }
                        NodeData::Text(text) => serializer.write_text(text)?,
                        NodeData::Comment(text) => serializer.write_comment(text)?,
                        NodeData::Doctype(name) => serializer.write_doctype(name)?,
                    }
                }
                Step::Close(name) => serializer.end_elem(name.clone())?,
            }
        }

        Ok(())
    }
}

/// Serialize `id` including its own start and end tags.
pub fn outer_html(dom: &Dom, id: NodeId) -> String {
    let mut bytes = Vec::new();
    let node = SerializableNode { dom, id };
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::IncludeNode,
        ..Default::default()
    };

    // Writing into a Vec cannot fail.
    if serialize(&mut bytes, &node, opts).is_err() {
        return String::new();
    }

    String::from_utf8(bytes).unwrap_or_default()
}
