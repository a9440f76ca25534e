//! Scene graph with handle-based nodes.
//!
//! Nodes are never freed: removing a node from the scene detaches it from
//! its parent and keeps its state, so it can be attached again later (the
//! mining respawn does exactly that). Everything that owns a node holds its
//! [`NodeId`] from creation time instead of searching for it.

use glam::{Mat4, Quat, Vec3};

use crate::utils::{intersect_box, intersect_plane, intersect_sphere, Ray};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Pure grouping node; never drawn or hit.
    Group,
    Box { half_extents: Vec3 },
    Sphere { radius: f32 },
    Plane { half_x: f32, half_z: f32 },
}

impl Shape {
    /// Scale that maps the unit mesh for this shape onto its real size.
    pub fn mesh_scale(&self) -> Vec3 {
        match *self {
            Shape::Group => Vec3::ONE,
            Shape::Box { half_extents } => half_extents,
            Shape::Sphere { radius } => Vec3::splat(radius),
            Shape::Plane { half_x, half_z } => Vec3::new(half_x, 1.0, half_z),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self { translation, ..Self::IDENTITY }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub shape: Shape,
    pub color: [f32; 4],
    pub local: Transform,
    /// Animation offset applied on top of `local`; owned by the mixers.
    pub pose: Transform,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    fn local_matrix(&self) -> Mat4 {
        self.local.matrix() * self.pose.matrix()
    }
}

/// Blueprint for a subtree; models are built from these.
#[derive(Debug, Clone)]
pub struct NodeDesc {
    pub name: Option<String>,
    pub shape: Shape,
    pub color: [f32; 4],
    pub local: Transform,
    pub children: Vec<NodeDesc>,
}

impl NodeDesc {
    pub fn new(name: &str, shape: Shape) -> Self {
        Self {
            name: Some(name.to_string()),
            shape,
            color: [0.8, 0.8, 0.8, 1.0],
            local: Transform::IDENTITY,
            children: Vec::new(),
        }
    }

    pub fn group(name: &str) -> Self {
        Self::new(name, Shape::Group)
    }

    pub fn color(mut self, color: [f32; 4]) -> Self {
        self.color = color;
        self
    }

    pub fn at(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    pub fn child(mut self, child: NodeDesc) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub node: NodeId,
    pub distance: f32,
    pub point: Vec3,
}

pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = Node {
            name: Some("scene".to_string()),
            shape: Shape::Group,
            color: [1.0; 4],
            local: Transform::IDENTITY,
            pose: Transform::IDENTITY,
            parent: None,
            children: Vec::new(),
        };
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].name.as_deref()
    }

    /// Builds `desc` (recursively) and attaches it under `parent`.
    pub fn instantiate(&mut self, desc: &NodeDesc, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: desc.name.clone(),
            shape: desc.shape,
            color: desc.color,
            local: desc.local,
            pose: Transform::IDENTITY,
            parent: None,
            children: Vec::new(),
        });
        self.attach(id, parent);
        for child in &desc.children {
            self.instantiate(child, id);
        }
        id
    }

    /// Moves `id` under `parent`, detaching it from any previous parent.
    pub fn attach(&mut self, id: NodeId, parent: NodeId) -> bool {
        if id == parent || self.is_ancestor(id, parent) {
            return false;
        }
        self.detach(id);
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        true
    }

    /// Removes `id` (and its subtree) from the scene. Returns false when it
    /// was not attached.
    pub fn detach(&mut self, id: NodeId) -> bool {
        match self.nodes[id.0].parent.take() {
            Some(parent) => {
                self.nodes[parent.0].children.retain(|c| *c != id);
                true
            }
            None => false,
        }
    }

    /// True when `id` is reachable from the root.
    pub fn in_scene(&self, id: NodeId) -> bool {
        let mut cur = id;
        loop {
            if cur == self.root() {
                return true;
            }
            match self.nodes[cur.0].parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, of: NodeId) -> bool {
        let mut cur = self.nodes[of.0].parent;
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes[p.0].parent;
        }
        false
    }

    /// Depth-first search below `from` for a node called `name`.
    pub fn find_in(&self, from: NodeId, name: &str) -> Option<NodeId> {
        if self.name(from) == Some(name) {
            return Some(from);
        }
        self.nodes[from.0]
            .children
            .iter()
            .find_map(|c| self.find_in(*c, name))
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.find_in(self.root(), name)
    }

    pub fn set_translation(&mut self, id: NodeId, translation: Vec3) {
        self.nodes[id.0].local.translation = translation;
    }

    pub fn set_rotation(&mut self, id: NodeId, rotation: Quat) {
        self.nodes[id.0].local.rotation = rotation;
    }

    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let node = &self.nodes[id.0];
        match node.parent {
            Some(p) => self.world_matrix(p) * node.local_matrix(),
            None => node.local_matrix(),
        }
    }

    /// Calls `f` with every attached, drawable node and its world matrix.
    pub fn visit_drawables(&self, mut f: impl FnMut(NodeId, &Node, Mat4)) {
        self.visit(self.root(), Mat4::IDENTITY, &mut f);
    }

    fn visit(&self, id: NodeId, parent_world: Mat4, f: &mut impl FnMut(NodeId, &Node, Mat4)) {
        let node = &self.nodes[id.0];
        let world = parent_world * node.local_matrix();
        if node.shape != Shape::Group {
            f(id, node, world);
        }
        for child in &node.children {
            self.visit(*child, world, f);
        }
    }

    /// Nearest hit of `ray` against every attached shape, recursing through
    /// groups.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        self.visit_drawables(|id, node, world| {
            let inv = world.inverse();
            let origin = inv.transform_point3(ray.origin);
            let dir = inv.transform_vector3(ray.dir);
            let t = match node.shape {
                Shape::Group => None,
                Shape::Box { half_extents } => intersect_box(origin, dir, half_extents),
                Shape::Sphere { radius } => intersect_sphere(origin, dir, radius),
                Shape::Plane { half_x, half_z } => intersect_plane(origin, dir, half_x, half_z),
            };
            if let Some(t) = t {
                if best.map_or(true, |b| t < b.distance) {
                    best = Some(RayHit { node: id, distance: t, point: ray.at(t) });
                }
            }
        });
        best
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(name: &str, at: Vec3) -> NodeDesc {
        NodeDesc::new(name, Shape::Box { half_extents: Vec3::splat(0.5) })
            .at(Transform::from_translation(at))
    }

    #[test]
    fn nearest_hit_wins() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        scene.instantiate(&cube("far", Vec3::new(0.0, 0.0, 5.0)), root);
        let near = scene.instantiate(&cube("near", Vec3::new(0.0, 0.0, 2.0)), root);

        let hit = scene.intersect_ray(&Ray::new(Vec3::ZERO, Vec3::Z)).unwrap();
        assert_eq!(hit.node, near);
        assert!((hit.distance - 1.5).abs() < 1e-5);
    }

    #[test]
    fn hits_recurse_through_groups() {
        let mut scene = SceneGraph::new();
        let group = NodeDesc::group("rig")
            .at(Transform::from_translation(Vec3::new(0.0, 0.0, 4.0)))
            .child(cube("part", Vec3::new(1.0, 0.0, 0.0)));
        scene.instantiate(&group, scene.root());

        let hit = scene
            .intersect_ray(&Ray::new(Vec3::new(1.0, 0.0, 0.0), Vec3::Z))
            .unwrap();
        assert_eq!(scene.name(hit.node), Some("part"));
    }

    #[test]
    fn detached_nodes_are_not_hit_and_can_return() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let id = scene.instantiate(&cube("box", Vec3::new(0.0, 0.0, 3.0)), root);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);

        assert!(scene.detach(id));
        assert!(!scene.in_scene(id));
        assert!(scene.intersect_ray(&ray).is_none());
        assert!(scene.find_by_name("box").is_none());

        scene.attach(id, root);
        assert!(scene.intersect_ray(&ray).is_some());
    }

    #[test]
    fn scaled_rotated_node_reports_world_distance() {
        let mut scene = SceneGraph::new();
        let desc = cube("big", Vec3::new(0.0, 0.0, 10.0)).at(
            Transform::from_translation(Vec3::new(0.0, 0.0, 10.0))
                .with_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2))
                .with_scale(2.0),
        );
        scene.instantiate(&desc, scene.root());
        let hit = scene.intersect_ray(&Ray::new(Vec3::ZERO, Vec3::Z)).unwrap();
        assert!((hit.distance - 9.0).abs() < 1e-4, "{}", hit.distance);
    }

    #[test]
    fn attach_refuses_cycles() {
        let mut scene = SceneGraph::new();
        let parent = scene.instantiate(&NodeDesc::group("a").child(NodeDesc::group("b")), scene.root());
        let child = scene.find_in(parent, "b").unwrap();
        assert!(!scene.attach(parent, child));
        assert!(scene.in_scene(child));
    }
}
