use actix_web::{HttpMessage, HttpRequest};

/// The authenticated viewer, or anonymous (0). JWT verification is out of
/// scope for this crate; in production an upstream auth middleware would
/// inject this into request extensions. Absent that middleware, this crate
/// reads the same value from an `X-Viewer-Id` header so handlers have a
/// single extraction point regardless of which layer populates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewerId(pub u64);

impl ViewerId {
    pub const ANONYMOUS: ViewerId = ViewerId(0);

    pub fn is_anonymous(self) -> bool {
        self.0 == 0
    }
}

pub fn extract_viewer_id(req: &HttpRequest) -> ViewerId {
    if let Some(viewer) = req.extensions().get::<ViewerId>() {
        return *viewer;
    }
    req.headers()
        .get("X-Viewer-Id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(ViewerId)
        .unwrap_or(ViewerId::ANONYMOUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_is_zero() {
        assert!(ViewerId::ANONYMOUS.is_anonymous());
        assert!(ViewerId(0).is_anonymous());
        assert!(!ViewerId(7).is_anonymous());
    }
}
