use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

pub const TAG_ROOT: &str = "ROOT";
pub const TAG_OP: &str = "OP";
pub const TAG_ID: &str = "ID";
pub const TAG_UUID: &str = "UUID";
pub const TAG_ATTRIBUTE: &str = "ATTRIBUTE";
pub const TAG_ATTMOD: &str = "ATTMOD";
pub const TAG_TAG: &str = "TAG";
pub const TAG_PATTERN: &str = "PATTERN";
pub const TAG_WORD: &str = "WORD";
pub const TAG_INFIX: &str = "INFIX";
pub const TAG_OPERAND: &str = "OPERAND";
pub const TAG_IMPLICIT: &str = "IMPLICIT";

/// One node of the parsed filter. The lowering step builds the tree once;
/// everything downstream only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    name: String,
    tags: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
    branches: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn root() -> Self {
        Self::new("root").with_tag(TAG_ROOT)
    }

    pub fn operator(canonical: &str) -> Self {
        Self::new("op")
            .with_tag(TAG_OP)
            .with_attribute("canonical", canonical)
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag(tag);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&mut self, tag: &str) {
        self.tags.insert(tag.to_string());
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn push(&mut self, branch: Node) {
        self.branches.push(branch);
    }

    pub fn branches(&self) -> &[Node] {
        &self.branches
    }

    pub fn is_operator(&self, canonical: &str) -> bool {
        self.has_tag(TAG_OP) && self.attribute("canonical") == Some(canonical)
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let _ = write!(out, "{:indent$}{}", "", self.name, indent = depth * 2);
        for (name, value) in &self.attributes {
            let _ = write!(out, " {}={}", name, value);
        }
        for tag in &self.tags {
            let _ = write!(out, " \x1b[1;37;44m{}\x1b[0m", tag);
        }
        out.push('\n');
        for branch in &self.branches {
            branch.dump_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Node, TAG_ATTRIBUTE, TAG_OP};

    #[test]
    fn operator_nodes_carry_canonical_form() {
        let node = Node::operator("or");
        assert!(node.has_tag(TAG_OP));
        assert!(node.is_operator("or"));
        assert!(!node.is_operator("xor"));
    }

    #[test]
    fn dump_lists_branches_indented() {
        let mut root = Node::root();
        root.push(
            Node::new("status:pending")
                .with_tag(TAG_ATTRIBUTE)
                .with_attribute("name", "status"),
        );
        let dump = root.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("root"));
        assert!(lines[1].starts_with("  status:pending name=status"));
    }
}
