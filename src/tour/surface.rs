//! Read-only view of the block editor.
//!
//! The tour never touches the editor directly. It reads rendered region text
//! and the generated program through [`EditorSurface`], which lets the engine
//! run against a browser bridge, a scripted replay, or a test double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::rule::DetectionRule;
use super::types::RegionRef;

/// Queries the tour is allowed to make against the editor
pub trait EditorSurface: Send + Sync {
    /// Rendered text content of a region, or `None` if it is not rendered
    fn query_region_text(&self, region: &RegionRef) -> Option<String>;

    /// Current generated program text, or `None` if no code view exists
    fn query_generated_code(&self) -> Option<String>;

    /// Whether the region is currently rendered
    fn is_rendered(&self, region: &RegionRef) -> bool {
        self.query_region_text(region).is_some()
    }
}

/// Point-in-time read of the regions a rule cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiSnapshot {
    regions: HashMap<RegionRef, String>,
    generated_code: Option<String>,
}

impl UiSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read only what `rule` inspects from the surface
    pub fn capture(surface: &dyn EditorSurface, rule: &DetectionRule) -> Self {
        let regions = rule
            .regions
            .iter()
            .filter_map(|region| {
                surface
                    .query_region_text(region)
                    .map(|text| (region.clone(), text))
            })
            .collect();

        let generated_code = if rule.code_tokens.is_empty() {
            None
        } else {
            surface.query_generated_code()
        };

        Self {
            regions,
            generated_code,
        }
    }

    pub fn with_region(mut self, region: impl Into<RegionRef>, text: &str) -> Self {
        self.regions.insert(region.into(), text.to_string());
        self
    }

    pub fn with_code(mut self, code: &str) -> Self {
        self.generated_code = Some(code.to_string());
        self
    }

    pub fn region_text(&self, region: &RegionRef) -> Option<&str> {
        self.regions.get(region).map(String::as_str)
    }

    pub fn generated_code(&self) -> Option<&str> {
        self.generated_code.as_deref()
    }
}

#[derive(Debug, Default)]
struct SurfaceState {
    regions: HashMap<RegionRef, String>,
    generated_code: Option<String>,
}

/// Editor surface held in memory.
///
/// Cloning shares the underlying state, so a host can keep one clone to
/// mutate while the controller polls another.
#[derive(Debug, Clone, Default)]
pub struct InMemorySurface {
    state: Arc<Mutex<SurfaceState>>,
    queries: Arc<AtomicUsize>,
}

impl InMemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render (or re-render) a region with the given text
    pub fn set_region_text(&self, region: impl Into<RegionRef>, text: &str) {
        self.lock().regions.insert(region.into(), text.to_string());
    }

    /// Unmount a region
    pub fn remove_region(&self, region: &RegionRef) {
        self.lock().regions.remove(region);
    }

    pub fn set_generated_code(&self, code: &str) {
        self.lock().generated_code = Some(code.to_string());
    }

    pub fn clear_generated_code(&self) {
        self.lock().generated_code = None;
    }

    /// Number of region/code queries served so far
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl EditorSurface for InMemorySurface {
    fn query_region_text(&self, region: &RegionRef) -> Option<String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.lock().regions.get(region).cloned()
    }

    fn query_generated_code(&self) -> Option<String> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.lock().generated_code.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_reads_only_rule_regions() {
        let surface = InMemorySurface::new();
        surface.set_region_text("canvas", "repetir 5 veces");
        surface.set_region_text("console", "Hola");
        surface.set_generated_code("repetir 5 veces:");

        let rule = DetectionRule::in_region("canvas").keyword("repetir");
        let snapshot = UiSnapshot::capture(&surface, &rule);

        assert_eq!(
            snapshot.region_text(&RegionRef::new("canvas")),
            Some("repetir 5 veces")
        );
        assert_eq!(snapshot.region_text(&RegionRef::new("console")), None);
        // No code tokens in the rule, so the code view is not read
        assert_eq!(snapshot.generated_code(), None);
    }

    #[test]
    fn test_capture_skips_unrendered_regions() {
        let surface = InMemorySurface::new();
        let rule = DetectionRule::in_region("panel")
            .keyword("x")
            .code_token("x");
        let snapshot = UiSnapshot::capture(&surface, &rule);
        assert_eq!(snapshot, UiSnapshot::new());
    }

    #[test]
    fn test_clones_share_state() {
        let surface = InMemorySurface::new();
        let host_side = surface.clone();
        host_side.set_region_text("panel", "");

        assert!(surface.is_rendered(&RegionRef::new("panel")));
        host_side.remove_region(&RegionRef::new("panel"));
        assert!(!surface.is_rendered(&RegionRef::new("panel")));
        assert_eq!(host_side.query_count(), 2);
    }

    #[test]
    fn test_generated_code_roundtrip() {
        let surface = InMemorySurface::new();
        assert_eq!(surface.query_generated_code(), None);
        surface.set_generated_code("mostrar \"hola\"");
        assert_eq!(
            surface.query_generated_code().as_deref(),
            Some("mostrar \"hola\"")
        );
        surface.clear_generated_code();
        assert_eq!(surface.query_generated_code(), None);
    }
}
