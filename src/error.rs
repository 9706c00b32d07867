use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("planning grid needs at least one day")]
    NoDays,
    #[error("planning grid needs at least one row")]
    NoRows,
    #[error("planning grid supports at most {max} days, got {days}")]
    TooManyDays { days: u32, max: u32 },
    #[error("planning grid supports at most {max} rows, got {rows}")]
    TooManyRows { rows: u32, max: u32 },
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file selected")]
    NoFile,
    #[error("request failed: {0}")]
    Network(String),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("invalid optimization id: {0}")]
    InvalidId(&'static str),
    #[error("response body is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("invalid maintenance summary: {0}")]
    Summary(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not create drawing surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("could not open graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("drawing surface is not supported by the graphics adapter")]
    IncompatibleSurface,
    #[error("grid needs a {bytes} byte vertex buffer, device allows {limit}")]
    MeshTooLarge { bytes: u64, limit: u64 },
}

/// Failures while placing a new grid on the page.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("day count must be between 1 and 100000, got {0:?}")]
    InvalidDays(String),
    #[error("server url must start with http:// or https://, got {0:?}")]
    InvalidServer(String),
}
