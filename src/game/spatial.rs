//! Quadtree for collision candidate generation
//!
//! Rebuilt from scratch every tick. Items are axis-aligned boxes stored in the
//! deepest node that fully contains them; queries return a conservative
//! superset, callers do the exact circle test.

use serde::{Deserialize, Serialize};

use crate::game::constants::spatial::{MAX_DEPTH, MAX_PER_NODE};
use crate::game::state::EntityId;
use crate::util::vec2::Vec2;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_circle(center: Vec2, radius: f64) -> Self {
        let r = Vec2::new(radius, radius);
        Self {
            min: center - r,
            max: center + r,
        }
    }

    pub fn expand(&self, margin: f64) -> Self {
        let m = Vec2::new(margin, margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Split into NW, NE, SW, SE quadrants
    fn quadrants(&self) -> [Aabb; 4] {
        let c = self.center();
        [
            Aabb::new(self.min, c),
            Aabb::new(Vec2::new(c.x, self.min.y), Vec2::new(self.max.x, c.y)),
            Aabb::new(Vec2::new(self.min.x, c.y), Vec2::new(c.x, self.max.y)),
            Aabb::new(c, self.max),
        ]
    }
}

/// Entity data stored in the quadtree
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntity {
    pub id: EntityId,
    pub position: Vec2,
    pub radius: f64,
}

impl SpatialEntity {
    #[inline]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_circle(self.position, self.radius)
    }
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Aabb,
    depth: u32,
    items: Vec<SpatialEntity>,
    /// Indices of the four children, once subdivided
    children: Option<[usize; 4]>,
}

impl Node {
    fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }
}

/// Bounded quadtree; nodes live in a flat vector indexed by position
#[derive(Debug, Clone)]
pub struct Quadtree {
    nodes: Vec<Node>,
    len: usize,
}

impl Quadtree {
    pub fn new(bounds: Aabb) -> Self {
        Self {
            nodes: vec![Node::new(bounds, 0)],
            len: 0,
        }
    }

    /// Drop every item and child, keeping the root bounds
    pub fn clear(&mut self) {
        let bounds = self.bounds();
        self.nodes.clear();
        self.nodes.push(Node::new(bounds, 0));
        self.len = 0;
    }

    /// Clear and insert all `items`
    pub fn rebuild(&mut self, items: impl IntoIterator<Item = SpatialEntity>) {
        self.clear();
        for item in items {
            self.insert(item);
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, item: SpatialEntity) {
        self.len += 1;
        self.insert_at(0, item);
    }

    fn insert_at(&mut self, mut idx: usize, item: SpatialEntity) {
        let bounds = item.bounds();
        // Descend while some child fully contains the item
        while let Some(children) = self.nodes[idx].children {
            match children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].bounds.contains(&bounds))
            {
                Some(child) => idx = child,
                None => break,
            }
        }

        let node = &mut self.nodes[idx];
        node.items.push(item);
        if node.children.is_none() && node.items.len() > MAX_PER_NODE && node.depth < MAX_DEPTH {
            self.subdivide(idx);
        }
    }

    fn subdivide(&mut self, idx: usize) {
        let depth = self.nodes[idx].depth + 1;
        let quads = self.nodes[idx].bounds.quadrants();
        let first = self.nodes.len();
        for q in quads {
            self.nodes.push(Node::new(q, depth));
        }
        self.nodes[idx].children = Some([first, first + 1, first + 2, first + 3]);

        // Push items down where they fit; straddlers stay here
        let items = std::mem::take(&mut self.nodes[idx].items);
        for item in items {
            let b = item.bounds();
            match (first..first + 4).find(|&c| self.nodes[c].bounds.contains(&b)) {
                Some(child) => self.insert_at(child, item),
                None => self.nodes[idx].items.push(item),
            }
        }
    }

    /// Append every item whose box intersects `area` to `out`
    pub fn query_into(&self, area: &Aabb, out: &mut Vec<SpatialEntity>) {
        // The root is always visited since items may poke outside its bounds
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            out.extend(node.items.iter().filter(|i| i.bounds().intersects(area)));
            if let Some(children) = node.children {
                stack.extend(
                    children
                        .iter()
                        .copied()
                        .filter(|&c| self.nodes[c].bounds.intersects(area)),
                );
            }
        }
    }

    pub fn query(&self, area: &Aabb) -> Vec<SpatialEntity> {
        let mut out = Vec::new();
        self.query_into(area, &mut out);
        out
    }

    /// Candidates near a circle, with `margin` slack for fast movers
    pub fn query_circle(&self, center: Vec2, radius: f64, margin: f64) -> Vec<SpatialEntity> {
        self.query(&Aabb::from_circle(center, radius).expand(margin))
    }

    /// Get statistics about the tree
    pub fn stats(&self) -> QuadtreeStats {
        QuadtreeStats {
            node_count: self.nodes.len(),
            max_depth: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            max_items_per_node: self.nodes.iter().map(|n| n.items.len()).max().unwrap_or(0),
            total_items: self.len,
        }
    }
}

/// Statistics about the quadtree
#[derive(Debug, Clone, PartialEq)]
pub struct QuadtreeStats {
    pub node_count: usize,
    pub max_depth: u32,
    pub max_items_per_node: usize,
    pub total_items: usize,
}
