use crate::filter::tree::{Node, TAG_ATTRIBUTE, TAG_ID, TAG_IMPLICIT, TAG_OP, TAG_UUID};
use tracing::debug;

/// Decides from the top level of the tree whether completed tasks can match
/// at all. It may say yes when the answer is no, never the other way round.
pub fn needs_completed_partition(tree: &Node) -> bool {
    let counts = Counts::of(tree);

    if let Some(first) = tree.branches().first() {
        if is_pending_restriction(first) && counts.or == 0 && counts.xor == 0 {
            debug!("skipping completed partition (status:pending first)");
            return false;
        }
    }

    if counts.explicit_or == 0
        && counts.xor == 0
        && counts.not == 0
        && counts.uuid == 0
        && counts.id > 0
    {
        debug!("skipping completed partition (IDs, no OR, no XOR, no UUID)");
        return false;
    }

    true
}

#[derive(Debug, Default)]
struct Counts {
    or: usize,
    explicit_or: usize,
    xor: usize,
    not: usize,
    id: usize,
    uuid: usize,
}

impl Counts {
    fn of(tree: &Node) -> Self {
        let mut counts = Self::default();
        for node in tree.branches() {
            if node.has_tag(TAG_OP) {
                match node.attribute("canonical") {
                    Some("or") => {
                        counts.or += 1;
                        // implicit ors only join runs of ID/UUID selectors
                        if !node.has_tag(TAG_IMPLICIT) {
                            counts.explicit_or += 1;
                        }
                    }
                    Some("xor") => counts.xor += 1,
                    Some("not") => counts.not += 1,
                    _ => {}
                }
            } else if node.has_tag(TAG_ID) {
                counts.id += 1;
            } else if node.has_tag(TAG_UUID) {
                counts.uuid += 1;
            }
        }
        counts
    }
}

fn is_pending_restriction(node: &Node) -> bool {
    node.has_tag(TAG_ATTRIBUTE)
        && node.attribute("name") == Some("status")
        && node.attribute("value") == Some("pending")
        && matches!(node.attribute("modifier"), None | Some("is" | "equals"))
}
