use crate::geom::{axis_vec_diff, dominant_axis_angle, is_orthogonal};
use crate::params::GridGraphParams;
use camcal_core::Corner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, VecDeque};
use std::f32::consts::FRAC_PI_2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    pub fn opposite(self) -> Self {
        match self {
            NeighborDirection::Right => NeighborDirection::Left,
            NeighborDirection::Left => NeighborDirection::Right,
            NeighborDirection::Up => NeighborDirection::Down,
            NeighborDirection::Down => NeighborDirection::Up,
        }
    }

    /// Grid step `(di, dj)` taken when following this edge.
    pub fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            NeighborDirection::Right => 0,
            NeighborDirection::Left => 1,
            NeighborDirection::Up => 2,
            NeighborDirection::Down => 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// Classify an edge into a direction of the grid frame rotated by `axis_angle`.
fn direction_quadrant(vec_to_neighbor: &Vector2<f32>, axis_angle: f32) -> NeighborDirection {
    let (s, c) = axis_angle.sin_cos();
    // Rotate by -axis_angle into the grid frame.
    let x = c * vec_to_neighbor.x + s * vec_to_neighbor.y;
    let y = -s * vec_to_neighbor.x + c * vec_to_neighbor.y;
    if x.abs() > y.abs() {
        if x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    params: &GridGraphParams,
    axis_angle: f32,
    spacing_window: (f32, f32),
    base_spacing: f32,
) -> Option<NodeNeighbor> {
    // 1. ChESS orientations of adjacent corners are roughly orthogonal.
    if params.use_orientation
        && !is_orthogonal(
            corner.orientation,
            neighbor.orientation,
            params.orientation_tolerance_deg.to_radians(),
        )
    {
        return None;
    }

    // 2. Distance close to the board spacing.
    let vec_to_neighbor = neighbor.position - corner.position;
    let distance = vec_to_neighbor.norm();
    if distance < spacing_window.0 || distance > spacing_window.1 {
        return None;
    }

    // 3. Edge runs along one of the two grid axes.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let axis_diff = axis_vec_diff(axis_angle, edge_angle)
        .min(axis_vec_diff(axis_angle + FRAC_PI_2, edge_angle));
    if axis_diff > params.axis_tolerance_deg.to_radians() {
        return None;
    }

    let direction = direction_quadrant(&vec_to_neighbor, axis_angle);
    let score = distance / base_spacing + axis_diff;

    Some(NodeNeighbor {
        direction,
        index: neighbor_index,
        distance,
        score,
    })
}

/// One edge per direction: the lowest score wins, ties go to the shorter edge.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut slots: [Option<NodeNeighbor>; 4] = Default::default();
    for cand in candidates {
        let slot = &mut slots[cand.direction.slot()];
        let better = slot.as_ref().is_none_or(|kept| {
            (cand.score, cand.distance) < (kept.score, kept.distance)
        });
        if better {
            *slot = Some(cand);
        }
    }
    slots.into_iter().flatten().collect()
}

fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    Some(values[values.len() / 2])
}

/// 4-connected neighbor graph over chessboard corner candidates.
pub struct GridGraph {
    /// Mutually confirmed edges of every corner, at most one per direction.
    pub neighbors: Vec<Vec<NodeNeighbor>>,
    /// Grid axis angle in `(-π/4, π/4]`; edges are classified in this frame.
    pub axis_angle: f32,
    /// Median nearest-neighbor distance.
    pub base_spacing: f32,
}

impl GridGraph {
    /// Build the graph; `None` when there are too few corners to estimate
    /// spacing and axes.
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Option<Self> {
        if corners.len() < 2 {
            return None;
        }

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();
        let radius_sq = params.search_radius_pix * params.search_radius_pix;

        // Candidates within the search radius, self excluded.
        let nearby: Vec<Vec<(usize, f32)>> = coords
            .iter()
            .enumerate()
            .map(|(i, q)| {
                tree.within_unsorted::<SquaredEuclidean>(q, radius_sq)
                    .into_iter()
                    .map(|nn| (nn.item as usize, nn.distance.sqrt()))
                    .filter(|&(j, d)| j != i && d > 0.0)
                    .collect()
            })
            .collect();

        let nearest: Vec<Option<(usize, f32)>> = nearby
            .iter()
            .map(|cands| {
                cands
                    .iter()
                    .copied()
                    .min_by(|a, b| a.1.total_cmp(&b.1))
            })
            .collect();

        let base_spacing = median(nearest.iter().flatten().map(|&(_, d)| d).collect())?;

        // Nearest neighbors on a chessboard are axis neighbors, never diagonals.
        let axis_angle = dominant_axis_angle(nearest.iter().enumerate().filter_map(|(i, nn)| {
            let (j, _) = (*nn)?;
            let v = corners[j].position - corners[i].position;
            Some(v.y.atan2(v.x))
        }))?;

        let window = (
            params.min_spacing_rel * base_spacing,
            params.max_spacing_rel * base_spacing,
        );

        let mut neighbors: Vec<Vec<NodeNeighbor>> = corners
            .iter()
            .zip(nearby.iter())
            .map(|(corner, cands)| {
                let node_neighbors = cands
                    .iter()
                    .filter_map(|&(j, _)| {
                        is_good_neighbor(
                            corner,
                            &corners[j],
                            j,
                            params,
                            axis_angle,
                            window,
                            base_spacing,
                        )
                    })
                    .collect();
                select_neighbors(node_neighbors)
            })
            .collect();

        // Keep only edges confirmed from both ends.
        let snapshot: Vec<Vec<(NeighborDirection, usize)>> = neighbors
            .iter()
            .map(|nn| nn.iter().map(|n| (n.direction, n.index)).collect())
            .collect();
        for (a, node_neighbors) in neighbors.iter_mut().enumerate() {
            node_neighbors.retain(|n| {
                snapshot[n.index]
                    .iter()
                    .any(|&(dir, back)| back == a && dir == n.direction.opposite())
            });
        }

        Some(Self {
            neighbors,
            axis_angle,
            base_spacing,
        })
    }
}

/// Node sets of the graph's connected components, each in BFS order.
pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let n = graph.neighbors.len();
    let mut seen = vec![false; n];
    let mut out = Vec::new();

    for root in 0..n {
        if seen[root] {
            continue;
        }
        seen[root] = true;
        let mut members = vec![root];
        let mut head = 0;
        while let Some(&node) = members.get(head) {
            head += 1;
            for edge in &graph.neighbors[node] {
                if !std::mem::replace(&mut seen[edge.index], true) {
                    members.push(edge.index);
                }
            }
        }
        out.push(members);
    }
    out
}

/// BFS integer grid coordinates `(node, i, j)` for one component.
///
/// Returns `None` if the graph is inconsistent: a node reached with two
/// different coordinates, or two nodes claiming the same cell.
pub fn assign_grid_coordinates(
    graph: &GridGraph,
    component: &[usize],
) -> Option<Vec<(usize, i32, i32)>> {
    let start = *component.first()?;
    let mut assigned: HashMap<usize, (i32, i32)> = HashMap::with_capacity(component.len());
    let mut occupied: HashMap<(i32, i32), usize> = HashMap::with_capacity(component.len());
    let mut queue = VecDeque::new();

    assigned.insert(start, (0, 0));
    occupied.insert((0, 0), start);
    queue.push_back(start);

    while let Some(node_idx) = queue.pop_front() {
        let (i, j) = assigned[&node_idx];
        for neighbor in &graph.neighbors[node_idx] {
            let (di, dj) = neighbor.direction.step();
            let cell = (i + di, j + dj);
            match assigned.get(&neighbor.index) {
                Some(&existing) if existing != cell => return None,
                Some(_) => {}
                None => {
                    if occupied.insert(cell, neighbor.index).is_some() {
                        return None;
                    }
                    assigned.insert(neighbor.index, cell);
                    queue.push_back(neighbor.index);
                }
            }
        }
    }

    let mut coords: Vec<(usize, i32, i32)> =
        assigned.into_iter().map(|(n, (i, j))| (n, i, j)).collect();
    coords.sort_unstable_by_key(|&(_, i, j)| (j, i));
    Some(coords)
}
