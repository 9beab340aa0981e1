//! Topology - nodes, ports and the channels between them
//!
//! Topology structure is immutable for a run. Large chains are never held
//! in memory at once: [`ChainLayout`] describes the chain and hands out
//! [`ChainSegment`]s of bounded width on demand.

use std::mem::size_of;

use qnet_channel::Channel;
use qnet_core::{NodeId, QnetError, QnetResult};
use serde::Serialize;

/// Direction of qubit flow through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PortDirection {
    In,
    Out,
}

/// What a port is attached to, from the node's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PortRole {
    /// Towards the previous node of a chain
    Left,
    /// Towards the next node of a chain
    Right,
    /// Switch side of a client link
    Client(u32),
    /// Client side of a switch link
    Uplink,
}

/// Attachment point of a channel on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Port {
    pub role: PortRole,
    pub direction: PortDirection,
    /// Index of the channel in the owning topology
    pub channel: usize,
}

impl Port {
    pub fn new(role: PortRole, direction: PortDirection, channel: usize) -> Self {
        Self {
            role,
            direction,
            channel,
        }
    }
}

/// Repeater, end node, source or switch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    /// Ordered ports
    pub ports: Vec<Port>,
    /// Position along the chain (0 for non-chain nodes)
    pub position: usize,
}

impl Node {
    pub fn new(id: NodeId, position: usize) -> Self {
        Self {
            id,
            ports: Vec::new(),
            position,
        }
    }

    pub fn with_port(mut self, port: Port) -> Self {
        self.ports.push(port);
        self
    }

    /// First port with the given role
    pub fn port(&self, role: PortRole) -> Option<&Port> {
        self.ports.iter().find(|p| p.role == role)
    }

    /// Port attached to a channel
    pub fn port_for_channel(&self, channel: usize) -> Option<&Port> {
        self.ports.iter().find(|p| p.channel == channel)
    }
}

/// A set of nodes wired by channels
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Topology {
    nodes: Vec<Node>,
    channels: Vec<Channel>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, rejecting duplicate ids
    pub fn add_node(&mut self, node: Node) -> QnetResult<()> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(QnetError::InvalidConfiguration(format!(
                "duplicate node id {}",
                node.id
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add a channel, returning its index
    pub fn add_channel(&mut self, channel: Channel) -> usize {
        self.channels.push(channel);
        self.channels.len() - 1
    }

    /// Wire `channel` from an output port on `from` to an input port on `to`
    pub fn connect(
        &mut self,
        from: NodeId,
        from_role: PortRole,
        to: NodeId,
        to_role: PortRole,
        channel: usize,
    ) -> QnetResult<()> {
        if channel >= self.channels.len() {
            return Err(QnetError::InvalidConfiguration(format!(
                "unknown channel {}",
                channel
            )));
        }
        if self.node(to).is_none() {
            return Err(QnetError::UnknownNode(to));
        }
        self.node_mut(from)?
            .ports
            .push(Port::new(from_role, PortDirection::Out, channel));
        self.node_mut(to)?
            .ports
            .push(Port::new(to_role, PortDirection::In, channel));
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> QnetResult<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(QnetError::UnknownNode(id))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// (sender, receiver) of a channel
    pub fn endpoints(&self, channel: usize) -> Option<(NodeId, NodeId)> {
        let end = |direction| {
            self.nodes.iter().find_map(|n| {
                n.ports
                    .iter()
                    .any(|p| p.channel == channel && p.direction == direction)
                    .then_some(n.id)
            })
        };
        Some((end(PortDirection::Out)?, end(PortDirection::In)?))
    }

    /// Approximate heap + inline bytes held by this topology
    pub fn footprint_bytes(&self) -> usize {
        let ports: usize = self.nodes.iter().map(|n| n.ports.capacity()).sum();
        self.nodes.capacity() * size_of::<Node>()
            + ports * size_of::<Port>()
            + self.channels.capacity() * size_of::<Channel>()
    }

    /// Star around a switch: one channel from the switch to each client.
    ///
    /// The switch is node 0, clients are nodes 1..=clients.
    pub fn star(clients: usize, channel: &Channel) -> QnetResult<Self> {
        let switch = NodeId::new(0);
        let mut topology = Topology::new();
        topology.add_node(Node::new(switch, 0))?;
        for i in 0..clients {
            let client = NodeId::new(i as u64 + 1);
            topology.add_node(Node::new(client, 0))?;
            let ch = topology.add_channel(channel.clone());
            topology.connect(switch, PortRole::Client(i as u32), client, PortRole::Uplink, ch)?;
        }
        Ok(topology)
    }

    /// Midpoint source between two end nodes.
    ///
    /// Node 0 and node 2 are the ends, node 1 the source. Channel 0 runs to
    /// node 0, channel 1 to node 2.
    pub fn midpoint_source(towards_a: &Channel, towards_b: &Channel) -> QnetResult<Self> {
        let (a, source, b) = (NodeId::new(0), NodeId::new(1), NodeId::new(2));
        let mut topology = Topology::new();
        topology.add_node(Node::new(a, 0))?;
        topology.add_node(Node::new(source, 1))?;
        topology.add_node(Node::new(b, 2))?;
        let ch_a = topology.add_channel(towards_a.clone());
        let ch_b = topology.add_channel(towards_b.clone());
        topology.connect(source, PortRole::Left, a, PortRole::Right, ch_a)?;
        topology.connect(source, PortRole::Right, b, PortRole::Left, ch_b)?;
        Ok(topology)
    }
}

/// Channels of a chain: one shared description or one per link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChainLinks {
    Uniform(Channel),
    PerLink(Vec<Channel>),
}

/// Description of a linear repeater chain, without materialising it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainLayout {
    node_count: usize,
    links: ChainLinks,
}

impl ChainLayout {
    /// Homogeneous chain of `node_count` nodes
    pub fn uniform(node_count: usize, channel: Channel) -> QnetResult<Self> {
        if node_count < 2 {
            return Err(QnetError::InvalidConfiguration(format!(
                "a chain needs at least 2 nodes, got {}",
                node_count
            )));
        }
        Ok(Self {
            node_count,
            links: ChainLinks::Uniform(channel),
        })
    }

    /// Chain with one channel per link (`channels.len() + 1` nodes)
    pub fn from_channels(channels: Vec<Channel>) -> QnetResult<Self> {
        if channels.is_empty() {
            return Err(QnetError::InvalidConfiguration(
                "a chain needs at least one link".into(),
            ));
        }
        Ok(Self {
            node_count: channels.len() + 1,
            links: ChainLinks::PerLink(channels),
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn link_count(&self) -> usize {
        self.node_count - 1
    }

    /// Channel of link `index` (between nodes `index` and `index + 1`)
    pub fn channel(&self, index: usize) -> Option<&Channel> {
        match &self.links {
            ChainLinks::Uniform(ch) => (index < self.link_count()).then_some(ch),
            ChainLinks::PerLink(chs) => chs.get(index),
        }
    }

    /// Total fibre length end to end
    pub fn total_length_km(&self) -> f64 {
        (0..self.link_count())
            .filter_map(|i| self.channel(i))
            .map(Channel::length_km)
            .sum()
    }

    /// Node at a chain position, with its ports
    pub fn node_at(&self, position: usize) -> Node {
        let mut node = Node {
            id: NodeId::new(position as u64),
            ports: Vec::with_capacity(2),
            position,
        };
        if position > 0 {
            node.ports
                .push(Port::new(PortRole::Left, PortDirection::In, position - 1));
        }
        if position + 1 < self.node_count {
            node.ports
                .push(Port::new(PortRole::Right, PortDirection::Out, position));
        }
        node
    }

    /// Iterate over segments of at most `width` nodes.
    ///
    /// Consecutive segments share their boundary node, so each link belongs
    /// to exactly one segment.
    pub fn segments(&self, width: usize) -> QnetResult<ChainSegments<'_>> {
        if width < 2 {
            return Err(QnetError::InvalidConfiguration(format!(
                "segment width must be at least 2 nodes, got {}",
                width
            )));
        }
        Ok(ChainSegments {
            layout: self,
            width,
            next_start: 0,
        })
    }

    /// Whole chain as one segment
    pub fn build(&self) -> ChainSegment {
        self.segment(0, self.node_count - 1)
    }

    fn segment(&self, first: usize, last: usize) -> ChainSegment {
        let nodes = (first..=last).map(|p| self.node_at(p)).collect();
        let channels = (first..last)
            .filter_map(|i| self.channel(i).cloned())
            .collect();
        ChainSegment {
            first_position: first,
            is_last: last + 1 == self.node_count,
            nodes,
            channels,
        }
    }
}

/// Materialised slice of a chain.
///
/// Ports keep their global channel indices; local channel `i` is global
/// link `first_position + i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSegment {
    pub first_position: usize,
    pub is_last: bool,
    pub nodes: Vec<Node>,
    pub channels: Vec<Channel>,
}

impl ChainSegment {
    pub fn link_count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_first(&self) -> bool {
        self.first_position == 0
    }

    /// Global link index of a local channel
    pub fn global_link(&self, local: usize) -> usize {
        self.first_position + local
    }

    /// Node id at a local position
    pub fn node_id(&self, local: usize) -> Option<NodeId> {
        self.nodes.get(local).map(|n| n.id)
    }

    pub fn footprint_bytes(&self) -> usize {
        let ports: usize = self.nodes.iter().map(|n| n.ports.capacity()).sum();
        self.nodes.capacity() * size_of::<Node>()
            + ports * size_of::<Port>()
            + self.channels.capacity() * size_of::<Channel>()
    }
}

/// Estimated bytes of a resident segment of `width` nodes
pub fn segment_footprint_estimate(width: usize) -> usize {
    // Inner nodes carry two ports
    width * (size_of::<Node>() + 2 * size_of::<Port>())
        + width.saturating_sub(1) * size_of::<Channel>()
}

/// Iterator over chain segments, see [`ChainLayout::segments`]
pub struct ChainSegments<'a> {
    layout: &'a ChainLayout,
    width: usize,
    next_start: usize,
}

impl Iterator for ChainSegments<'_> {
    type Item = ChainSegment;

    fn next(&mut self) -> Option<Self::Item> {
        let last_node = self.layout.node_count - 1;
        if self.next_start >= last_node {
            return None;
        }
        let first = self.next_start;
        let last = (first + self.width - 1).min(last_node);
        self.next_start = last;
        Some(self.layout.segment(first, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fibre() -> Channel {
        Channel::telecom(10.0).unwrap()
    }

    #[test]
    fn test_chain_requires_two_nodes() {
        assert!(ChainLayout::uniform(1, fibre()).is_err());
        assert!(ChainLayout::from_channels(Vec::new()).is_err());
        assert_eq!(ChainLayout::uniform(2, fibre()).unwrap().link_count(), 1);
    }

    #[test]
    fn test_chain_node_ports() {
        let layout = ChainLayout::uniform(4, fibre()).unwrap();
        let chain = layout.build();
        assert_eq!(chain.nodes.len(), 4);
        assert_eq!(chain.channels.len(), 3);

        assert_eq!(chain.nodes[0].ports.len(), 1);
        assert_eq!(chain.nodes[0].port(PortRole::Right).unwrap().channel, 0);
        let repeater = &chain.nodes[2];
        assert_eq!(repeater.port(PortRole::Left).unwrap().channel, 1);
        assert_eq!(repeater.port(PortRole::Right).unwrap().direction, PortDirection::Out);
        assert!(chain.nodes[3].port(PortRole::Right).is_none());
    }

    #[test]
    fn test_segments_cover_every_link_once() {
        let layout = ChainLayout::uniform(10, fibre()).unwrap();
        let segments: Vec<_> = layout.segments(4).unwrap().collect();
        // nodes 0-3, 3-6, 6-9
        assert_eq!(segments.len(), 3);
        let links: usize = segments.iter().map(ChainSegment::link_count).sum();
        assert_eq!(links, 9);
        assert_eq!(segments[1].first_position, 3);
        assert_eq!(segments[1].global_link(0), 3);
        assert!(segments[0].is_first() && !segments[0].is_last);
        assert!(segments[2].is_last);
        // Boundary node is shared
        assert_eq!(segments[0].nodes.last().unwrap().id, segments[1].nodes[0].id);
    }

    #[test]
    fn test_wide_segment_is_whole_chain() {
        let layout = ChainLayout::uniform(5, fibre()).unwrap();
        let segments: Vec<_> = layout.segments(100).unwrap().collect();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0], layout.build());
        assert!(layout.segments(1).is_err());
    }

    #[test]
    fn test_per_link_channels() {
        let layout = ChainLayout::from_channels(vec![
            Channel::telecom(5.0).unwrap(),
            Channel::telecom(15.0).unwrap(),
        ])
        .unwrap();
        assert_eq!(layout.node_count(), 3);
        assert!((layout.total_length_km() - 20.0).abs() < 1e-12);
        assert_eq!(layout.channel(1).unwrap().length_km(), 15.0);
        assert!(layout.channel(2).is_none());
    }

    #[test]
    fn test_star_topology() {
        let star = Topology::star(3, &fibre()).unwrap();
        assert_eq!(star.node_count(), 4);
        assert_eq!(star.channels().len(), 3);
        let switch = star.node(NodeId::new(0)).unwrap();
        assert_eq!(switch.ports.len(), 3);
        assert_eq!(star.endpoints(2), Some((NodeId::new(0), NodeId::new(3))));
    }

    #[test]
    fn test_midpoint_source_topology() {
        let topo = Topology::midpoint_source(&fibre(), &fibre()).unwrap();
        assert_eq!(topo.endpoints(0), Some((NodeId::new(1), NodeId::new(0))));
        assert_eq!(topo.endpoints(1), Some((NodeId::new(1), NodeId::new(2))));
    }

    #[test]
    fn test_connect_validates() {
        let mut topo = Topology::new();
        topo.add_node(Node::new(NodeId::new(1), 0)).unwrap();
        assert!(topo.add_node(Node::new(NodeId::new(1), 0)).is_err());
        let ch = topo.add_channel(fibre());
        assert_eq!(
            topo.connect(NodeId::new(1), PortRole::Right, NodeId::new(9), PortRole::Left, ch),
            Err(QnetError::UnknownNode(NodeId::new(9)))
        );
        assert!(topo
            .connect(NodeId::new(1), PortRole::Right, NodeId::new(1), PortRole::Left, 5)
            .is_err());
    }

    #[test]
    fn test_footprint_bounded_by_width() {
        let layout = ChainLayout::uniform(1_000, fibre()).unwrap();
        let max = layout
            .segments(50)
            .unwrap()
            .map(|s| s.footprint_bytes())
            .max()
            .unwrap();
        assert!(max <= 2 * segment_footprint_estimate(50));
        assert!(max < layout.build().footprint_bytes());
    }
}
