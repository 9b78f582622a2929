//! Map widget seam: attaching and detaching heatmap layers

use crate::heatmap::HeatmapOverlay;

/// Opaque id of a layer attached to a map widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(u64);

pub trait MapWidget {
    fn attach(&mut self, overlay: HeatmapOverlay) -> OverlayHandle;
    /// Detaching an unknown or already detached handle is a no-op
    fn detach(&mut self, handle: OverlayHandle);
}

/// Overlay slots of the terminal world map
#[derive(Debug, Default)]
pub struct WorldMap {
    layers: Vec<(OverlayHandle, HeatmapOverlay)>,
    next_id: u64,
}

impl WorldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attached overlays in attach order
    pub fn overlays(&self) -> impl Iterator<Item = &HeatmapOverlay> {
        self.layers.iter().map(|(_, overlay)| overlay)
    }

    pub fn overlay(&self, handle: OverlayHandle) -> Option<&HeatmapOverlay> {
        self.layers
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, overlay)| overlay)
    }

    #[cfg(test)]
    pub fn attached_count(&self) -> usize {
        self.layers.len()
    }
}

impl MapWidget for WorldMap {
    fn attach(&mut self, overlay: HeatmapOverlay) -> OverlayHandle {
        self.next_id += 1;
        let handle = OverlayHandle(self.next_id);
        log::debug!(
            "Attached overlay {:?} ({} locations, radius {}, dissipating {})",
            handle,
            overlay.locations.len(),
            overlay.radius,
            overlay.dissipating
        );
        self.layers.push((handle, overlay));
        handle
    }

    fn detach(&mut self, handle: OverlayHandle) {
        self.layers.retain(|(h, _)| *h != handle);
    }
}
