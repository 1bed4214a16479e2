//! Render settings surface
//!
//! A typed settings store shared between the application and the engine.
//! Subsystems that need a live value take a [`SettingWatcher`] (an explicit
//! observer handle created with a field-projection function) and read the
//! current value on each use.

use std::sync::{Arc, RwLock};

/// Settings consumed by the rendering core
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Number of frames the CPU may record ahead of the GPU
    pub num_frames_in_flight: u8,
    /// Shadow map resolution (square, per face/cascade)
    pub shadow_resolution: u16,
    /// Number of cascades allocated for each directional light
    pub num_directional_light_cascades: u8,
    /// Far bound of the cascaded shadow range, in world units
    pub max_shadow_distance: f32,
    pub enable_shadows: bool,
    pub enable_punctual_lighting: bool,
    pub enable_image_based_lighting: bool,
    pub enable_gtao: bool,
    pub enable_clustered_lighting: bool,
    pub enable_deferred_rendering: bool,
    pub enable_mesh_shader: bool,
    pub enable_wireframe: bool,
    /// Internal rendering resolution (width, height)
    pub render_resolution: (u32, u32),
    /// Cascade split distances, written by the engine on camera changes
    pub directional_light_cascade_splits: Vec<f32>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            num_frames_in_flight: 3,
            shadow_resolution: 2048,
            num_directional_light_cascades: 4,
            max_shadow_distance: 100.0,
            enable_shadows: true,
            enable_punctual_lighting: true,
            enable_image_based_lighting: true,
            enable_gtao: true,
            enable_clustered_lighting: true,
            enable_deferred_rendering: false,
            enable_mesh_shader: true,
            enable_wireframe: false,
            render_resolution: (1920, 1080),
            directional_light_cascade_splits: Vec::new(),
        }
    }
}

/// Shared settings store
///
/// Cloning the store is cheap; all clones observe the same settings.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<RenderSettings>>,
}

impl SettingsStore {
    /// Create a store with the given initial settings
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Read one value out of the current settings
    pub fn get<T>(&self, getter: fn(&RenderSettings) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(|p| p.into_inner());
        getter(&guard)
    }

    /// Snapshot the full settings struct
    pub fn snapshot(&self) -> RenderSettings {
        let guard = self.inner.read().unwrap_or_else(|p| p.into_inner());
        guard.clone()
    }

    /// Mutate the settings in place
    pub fn update(&self, f: impl FnOnce(&mut RenderSettings)) {
        let mut guard = self.inner.write().unwrap_or_else(|p| p.into_inner());
        f(&mut guard);
    }

    /// Create a typed observer handle for one field
    ///
    /// The watcher reads the live value on every [`SettingWatcher::get`], so
    /// holders always see the current setting without re-querying the store.
    pub fn watch<T>(&self, getter: fn(&RenderSettings) -> T) -> SettingWatcher<T> {
        SettingWatcher {
            inner: Arc::clone(&self.inner),
            getter,
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(RenderSettings::default())
    }
}

/// Typed handle observing one settings field
pub struct SettingWatcher<T> {
    inner: Arc<RwLock<RenderSettings>>,
    getter: fn(&RenderSettings) -> T,
}

impl<T> SettingWatcher<T> {
    /// Read the current value of the watched field
    pub fn get(&self) -> T {
        let guard = self.inner.read().unwrap_or_else(|p| p.into_inner());
        (self.getter)(&guard)
    }
}

impl<T> Clone for SettingWatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            getter: self.getter,
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
