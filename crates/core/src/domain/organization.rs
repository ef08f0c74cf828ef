use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganizationId(pub String);

impl fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PersonId(pub String);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationNode {
    pub id: OrganizationId,
    pub name: String,
    pub parent_id: Option<OrganizationId>,
}

impl OrganizationNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, parent_id: Option<&str>) -> Self {
        Self {
            id: OrganizationId(id.into()),
            name: name.into(),
            parent_id: parent_id.map(|parent| OrganizationId(parent.to_string())),
        }
    }
}

/// Ordered chain from the requester's organization (index 0) up to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPath {
    nodes: Vec<OrganizationNode>,
}

impl OrganizationPath {
    pub fn new(nodes: Vec<OrganizationNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[OrganizationNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn own(&self) -> Option<&OrganizationNode> {
        self.nodes.first()
    }

    /// Immediate parent, or the own organization when it has none.
    pub fn parent(&self) -> Option<&OrganizationNode> {
        self.nodes.get(1).or_else(|| self.own())
    }

    pub fn root(&self) -> Option<&OrganizationNode> {
        self.nodes.last()
    }

    pub fn position_of(&self, id: &OrganizationId) -> Option<usize> {
        self.nodes.iter().position(|node| &node.id == id)
    }

    /// Nodes strictly above `id`, nearest first. Empty when `id` is not on the path.
    pub fn ancestors_after(&self, id: &OrganizationId) -> &[OrganizationNode] {
        match self.position_of(id) {
            Some(index) => &self.nodes[index + 1..],
            None => &[],
        }
    }
}

/// A person currently holding one of the searched roles in an organization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverCandidate {
    pub person_id: PersonId,
    pub person_name: String,
    pub role: String,
    pub organization_id: OrganizationId,
    pub organization_name: String,
}

#[cfg(test)]
mod tests {
    use super::{OrganizationId, OrganizationNode, OrganizationPath};

    fn choir_path() -> OrganizationPath {
        OrganizationPath::new(vec![
            OrganizationNode::new("org-choir", "Choir Team", Some("org-music")),
            OrganizationNode::new("org-music", "Music Department", Some("org-root")),
            OrganizationNode::new("org-root", "Grace Church", None),
        ])
    }

    #[test]
    fn path_exposes_own_parent_and_root() {
        let path = choir_path();

        assert_eq!(path.own().map(|node| node.name.as_str()), Some("Choir Team"));
        assert_eq!(path.parent().map(|node| node.name.as_str()), Some("Music Department"));
        assert_eq!(path.root().map(|node| node.name.as_str()), Some("Grace Church"));
        assert_eq!(path.position_of(&OrganizationId("org-root".to_string())), Some(2));
    }

    #[test]
    fn ancestors_after_lists_nodes_above_the_given_one() {
        let path = choir_path();

        let above_choir: Vec<&str> = path
            .ancestors_after(&OrganizationId("org-choir".to_string()))
            .iter()
            .map(|node| node.id.0.as_str())
            .collect();
        assert_eq!(above_choir, ["org-music", "org-root"]);
        assert!(path.ancestors_after(&OrganizationId("org-root".to_string())).is_empty());
        assert!(path.ancestors_after(&OrganizationId("org-elsewhere".to_string())).is_empty());
        assert_eq!(path.position_of(&OrganizationId("org-elsewhere".to_string())), None);
    }

    #[test]
    fn single_node_path_resolves_parent_and_root_to_itself() {
        let path = OrganizationPath::new(vec![OrganizationNode::new("org-root", "Grace Church", None)]);

        assert_eq!(path.parent(), path.own());
        assert_eq!(path.root(), path.own());
    }
}
