//! Text plot of a waveform window.

/// Rows of a `height` x `width` character plot of `samples`.
///
/// Values are mapped linearly from `bounds` (min, max) onto the rows, top row
/// being the maximum; anything outside is pinned to the edge. The zero line
/// is drawn where it falls inside the bounds.
pub fn plot(samples: &[f32], width: usize, height: usize, bounds: (f32, f32)) -> Vec<String> {
    let mut grid = vec![vec![' '; width]; height];
    if width == 0 || height == 0 {
        return grid.into_iter().map(|row| row.into_iter().collect()).collect();
    }
    let (low, high) = bounds;
    let span = high - low;

    let row_of = |value: f32| -> usize {
        if span <= 0.0 {
            return height / 2;
        }
        let position = ((high - value) / span).clamp(0.0, 1.0);
        (position * (height - 1) as f32).round() as usize
    };

    if low < 0.0 && 0.0 < high {
        let zero = row_of(0.0);
        grid[zero].iter_mut().for_each(|cell| *cell = '·');
    }

    if !samples.is_empty() {
        for (column, row) in grid_columns(samples.len(), width).into_iter().enumerate() {
            let Some(index) = row else { continue };
            grid[row_of(samples[index])][column] = '*';
        }
    }

    grid.into_iter().map(|row| row.into_iter().collect()).collect()
}

/// Sample index drawn in each column, stretching or squeezing `len` samples
/// across `width` columns.
fn grid_columns(len: usize, width: usize) -> Vec<Option<usize>> {
    (0..width)
        .map(|column| {
            if len >= width {
                Some(column * len / width)
            } else {
                // Fewer samples than columns: leave gaps instead of repeating.
                let index = column * len / width;
                (index * width / len == column).then_some(index)
            }
        })
        .collect()
}
