// field.rs - Initial grid from a field description
//
// Format: whitespace-separated integers `width height count`, then `count`
// pairs `x y` naming the cells alive at generation 0.

use std::path::Path;

use crate::error::FieldError;
use crate::grid::{Buffer, Grid};

pub const DEFAULT_FIELD: &str = "game.config";

pub fn parse_field(text: &str) -> Result<Grid, FieldError> {
    let mut numbers = text.split_whitespace().map(|token| {
        token
            .parse::<i64>()
            .map_err(|_| FieldError::Malformed(format!("`{token}` is not an integer")))
    });
    let mut next = |what: &str| {
        numbers
            .next()
            .unwrap_or_else(|| Err(FieldError::Malformed(format!("missing {what}"))))
    };

    let width = dimension(next("width")?, "width")?;
    let height = dimension(next("height")?, "height")?;
    let count = next("cell count")?;
    if count < 0 {
        return Err(FieldError::Malformed(format!("negative cell count {count}")));
    }

    let grid = Grid::new(width, height)?;
    for _ in 0..count {
        let x = next("x coordinate")?;
        let y = next("y coordinate")?;
        if !(0..width as i64).contains(&x) || !(0..height as i64).contains(&y) {
            return Err(FieldError::OutOfRange { x, y, width, height });
        }
        grid.set(Buffer::Current, x as isize, y as isize, true);
    }
    Ok(grid)
}

pub fn load_field(path: &Path) -> Result<Grid, FieldError> {
    let text = std::fs::read_to_string(path).map_err(|source| FieldError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let grid = parse_field(&text)?;
    log::info!(
        "loaded {}x{} field from {}",
        grid.width(),
        grid.height(),
        path.display()
    );
    Ok(grid)
}

fn dimension(value: i64, what: &str) -> Result<usize, FieldError> {
    usize::try_from(value)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| FieldError::Malformed(format!("{what} must be positive, got {value}")))
}
