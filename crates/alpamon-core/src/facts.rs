//! Location of the host's fact-query tool: an osquery-compatible
//! binary the control channel and the inventory reconciler both need to know
//! is present before they trust `commit`/`osquery` requests.

use std::path::Path;

/// Default install path for the fact-query tool.
pub const FACT_TOOL_PATH: &str = "/usr/bin/osqueryi";

/// Whether the fact-query tool is present on this host ("if the
/// fact-query tool is present; otherwise request graceful quit").
pub fn fact_tool_present() -> bool {
    Path::new(FACT_TOOL_PATH).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_tool_reports_false() {
        assert!(!Path::new("/nonexistent/osqueryi-definitely-not-here").exists());
        assert!(FACT_TOOL_PATH.starts_with('/'));
    }
}
