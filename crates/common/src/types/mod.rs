use serde::Serialize;

/// Liveness payload served by `GET /status`.
#[derive(Serialize, Debug)]
pub struct Status {
    pub status: &'static str,
}

impl Status {
    pub fn running() -> Self {
        Self { status: "running" }
    }
}
