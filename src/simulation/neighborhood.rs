use crate::grid::GridGeometry;

/// Nearest already-simulated cells around a target cell.
///
/// Rings of growing Chebyshev radius are scanned around the target until the
/// `limit` closest visited cells are known for certain, every visited cell
/// has been seen, or the search radius is exhausted.
#[derive(Debug, Clone)]
pub(crate) struct NeighborSearch {
  geometry: GridGeometry,
  visited: Vec<bool>,
  visited_count: usize,
  limit: usize,
  radius: Option<f64>,
  found: Vec<(f64, usize)>,
}

impl NeighborSearch {
  pub(crate) fn new(geometry: GridGeometry, limit: usize, radius: Option<f64>) -> Self {
    Self {
      geometry,
      visited: vec![false; geometry.len()],
      visited_count: 0,
      limit,
      radius,
      found: Vec::with_capacity(limit.saturating_mul(2).min(geometry.len())),
    }
  }

  pub(crate) fn mark_visited(&mut self, cell: usize) {
    if !self.visited[cell] {
      self.visited[cell] = true;
      self.visited_count += 1;
    }
  }

  /// `(distance, cell)` pairs sorted by distance then cell index.
  pub(crate) fn find(&mut self, cell: usize) -> &[(f64, usize)] {
    self.found.clear();
    if self.limit == 0 || self.visited_count == 0 {
      return &self.found;
    }

    let (rows, cols) = self.geometry.shape();
    let (dx, dy) = self.geometry.cell_size();
    let step = dx.min(dy);
    let (r0, c0) = self.geometry.cell_position(cell);
    let max_ring = rows.max(cols);
    let mut seen = 0;

    for ring in 1..=max_ring {
      if let Some(radius) = self.radius {
        if ring as f64 * step > radius {
          break;
        }
      }

      let r_lo = r0.saturating_sub(ring);
      let r_hi = (r0 + ring).min(rows - 1);
      let c_lo = c0.saturating_sub(ring);
      let c_hi = (c0 + ring).min(cols - 1);
      for r in r_lo..=r_hi {
        let on_edge_row = r + ring == r0 || r == r0 + ring;
        for c in c_lo..=c_hi {
          if !on_edge_row && c + ring != c0 && c != c0 + ring {
            continue;
          }
          let idx = r * cols + c;
          if !self.visited[idx] {
            continue;
          }
          seen += 1;
          let d = self.geometry.cell_distance((r0, c0), (r, c));
          if self.radius.map_or(true, |radius| d <= radius) {
            self.found.push((d, idx));
          }
        }
      }

      if seen == self.visited_count {
        break;
      }
      if self.found.len() >= self.limit {
        self.found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        if self.found[self.limit - 1].0 <= ring as f64 * step {
          break;
        }
      }
    }

    self.found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    self.found.truncate(self.limit);
    &self.found
  }
}
