// Stateless layout of the day-by-row planning grid in normalized device space.

use bytemuck::{Pod, Zeroable};

use crate::error::GridError;

/// Side length of the square area the grid spans.
pub const GRID_SIZE: f32 = 1.8;
/// Bottom-left corner of the grid on both axes.
pub const GRID_ORIGIN: f32 = -0.9;
/// Resource rows shown in the planning table.
pub const GRID_ROWS: u32 = 5;
/// Largest day count a grid is built for. Keeps the vertex buffer well under
/// the WebGL2 buffer size limit.
pub const MAX_DAYS: u32 = 100_000;
pub const MAX_ROWS: u32 = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    #[inline]
    fn at(x: f32, y: f32) -> Self {
        Vertex { position: [x, y, 0.0] }
    }
}

/// Column and row counts of the grid. One column per planned day.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GridLayout {
    columns: u32,
    rows: u32,
}

impl GridLayout {
    pub fn new(days: u32) -> Result<Self, GridError> {
        Self::with_rows(days, GRID_ROWS)
    }

    pub fn with_rows(columns: u32, rows: u32) -> Result<Self, GridError> {
        if columns == 0 { return Err(GridError::NoDays); }
        if rows == 0 { return Err(GridError::NoRows); }
        if columns > MAX_DAYS {
            return Err(GridError::TooManyDays { days: columns, max: MAX_DAYS });
        }
        if rows > MAX_ROWS {
            return Err(GridError::TooManyRows { rows, max: MAX_ROWS });
        }
        Ok(GridLayout { columns, rows })
    }

    pub fn columns(&self) -> u32 { self.columns }

    pub fn rows(&self) -> u32 { self.rows }

    pub fn column_step(&self) -> f32 { GRID_SIZE / self.columns as f32 }

    pub fn row_step(&self) -> f32 { GRID_SIZE / self.rows as f32 }

    #[inline]
    pub fn column_x(&self, column: u32) -> f32 {
        GRID_ORIGIN + self.column_step() * column as f32
    }

    #[inline]
    pub fn row_y(&self, row: u32) -> f32 {
        GRID_ORIGIN + self.row_step() * row as f32
    }

    /// Vertices drawn as independent line segments: two per horizontal and
    /// two per vertical line.
    pub fn line_vertex_count(&self) -> u32 {
        2 * (self.columns + self.rows + 2)
    }

    pub fn intersection_count(&self) -> u32 {
        (self.rows + 1) * (self.columns + 1)
    }

    pub fn build_mesh(&self) -> GridMesh {
        let total = self.line_vertex_count() + self.intersection_count();
        let mut vertices: Vec<Vertex> = Vec::with_capacity(total as usize);

        let start = GRID_ORIGIN;
        let end = GRID_ORIGIN + GRID_SIZE;

        for row in 0..=self.rows {
            let y = self.row_y(row);
            vertices.push(Vertex::at(start, y));
            vertices.push(Vertex::at(end, y));
        }

        for column in 0..=self.columns {
            let x = self.column_x(column);
            vertices.push(Vertex::at(x, start));
            vertices.push(Vertex::at(x, end));
        }

        // Row-major corner points, uploaded after the lines but never drawn.
        for row in 0..=self.rows {
            let y = self.row_y(row);
            for column in 0..=self.columns {
                vertices.push(Vertex::at(self.column_x(column), y));
            }
        }

        GridMesh { layout: *self, vertices }
    }
}

/// Vertex data for one layout: line endpoints first, then intersections.
#[derive(Clone, Debug)]
pub struct GridMesh {
    layout: GridLayout,
    vertices: Vec<Vertex>,
}

impl GridMesh {
    pub fn layout(&self) -> GridLayout { self.layout }

    pub fn vertices(&self) -> &[Vertex] { &self.vertices }

    pub fn line_vertex_count(&self) -> u32 { self.layout.line_vertex_count() }

    pub fn line_vertices(&self) -> &[Vertex] {
        &self.vertices[..self.line_vertex_count() as usize]
    }

    pub fn intersections(&self) -> &[Vertex] {
        &self.vertices[self.line_vertex_count() as usize..]
    }

    /// Size of the vertex buffer holding every vertex.
    pub fn byte_len(&self) -> u64 {
        std::mem::size_of_val(self.vertices.as_slice()) as u64
    }

    /// Flat `x, y, z` sequence as uploaded to the vertex buffer.
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }
}
